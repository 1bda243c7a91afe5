//! Rebound Animation
//!
//! Higher-level helpers built on `rebound_core`:
//!
//! - **SpringChain**: a row of springs where motion of a control spring
//!   ripples outward to its neighbours with a per-link delay
//! - **AnimationQueue**: replays a value stream to several callbacks, each
//!   one frame behind the previous

pub mod chain;
pub mod queue;

pub use chain::SpringChain;
pub use queue::{AnimationQueue, QueueCallback};
