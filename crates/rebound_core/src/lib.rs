//! Rebound Core
//!
//! Physical spring simulation for driving values (typically UI properties)
//! towards targets with tension/friction dynamics instead of fixed-duration
//! easing curves.
//!
//! # Features
//!
//! - **Spring**: fixed-step RK4 integrator with rest detection, overshoot
//!   clamping, and frame catch-up limits
//! - **SpringSystem**: owns springs, tracks the active set, and starts or
//!   stops its looper as springs wake up and settle
//! - **Loopers**: deterministic stepping and synchronous run-to-idle drivers
//! - **SpringConfig**: shared tension/friction pairs, with origami and
//!   bounciness/speed conversions and TOML presets
//! - **SpringConfigRegistry**: named configs for tuning tools
//!
//! Everything here is single-threaded: springs, systems, and listeners are
//! `Rc`-based and are driven from the thread that calls
//! [`SpringSystem::tick`].
//!
//! ```ignore
//! use rebound_core::{SpringConfig, SpringSystem};
//!
//! let (system, looper) = SpringSystem::stepping()?;
//! let spring = system.create_spring();
//! spring.set_config(SpringConfig::from_origami_tension_and_friction(40.0, 6.0));
//! spring.set_end_value(1.0)?;
//!
//! while !looper.step(16.0) {
//!     println!("{}", spring.current_value());
//! }
//! ```

pub mod config;
pub mod conversion;
pub mod error;
pub mod listener;
pub mod looper;
pub mod presets;
pub mod registry;
pub mod spring;
pub mod system;

pub use config::SpringConfig;
pub use conversion::BouncyConversion;
pub use error::{ReboundError, Result};
pub use listener::{FnSpringListener, SpringEvent, SpringListener, SpringSystemListener};
pub use looper::{LooperBinding, SpringLooper, SteppingLooper, SynchronousLooper, SIXTY_FPS};
pub use presets::{PresetFile, PresetUnits, SpringPreset};
pub use registry::SpringConfigRegistry;
pub use spring::{PhysicsState, Spring};
pub use system::{SpringId, SpringSystem, WeakSpringSystem};
