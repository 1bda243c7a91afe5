//! Spring and system listeners
//!
//! Listeners are held as `Rc<dyn ..>` and called synchronously on the thread
//! driving the system. Callbacks may call straight back into the spring or
//! system API (for example, retargeting another spring from
//! `on_spring_update`).

use crate::spring::Spring;
use crate::system::SpringSystem;
use std::fmt;

/// Lifecycle events a spring emits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpringEvent {
    /// The spring left rest and started moving
    Activate,
    /// The spring's current value changed
    Update,
    /// The spring came to rest
    AtRest,
    /// The spring's end value changed
    EndStateChange,
}

/// Receives spring lifecycle callbacks
///
/// All methods default to doing nothing, so implementors only override the
/// callbacks they care about. Within one integration step the order is
/// always activate, update, at-rest.
pub trait SpringListener {
    fn on_spring_update(&self, _spring: &Spring) {}

    fn on_spring_at_rest(&self, _spring: &Spring) {}

    fn on_spring_activate(&self, _spring: &Spring) {}

    fn on_spring_end_state_change(&self, _spring: &Spring) {}
}

/// Adapts a closure taking a [`SpringEvent`] into a [`SpringListener`]
///
/// ```ignore
/// let listener = Rc::new(FnSpringListener::new(|event, spring| {
///     if event == SpringEvent::Update {
///         view.set_scale(spring.current_value());
///     }
/// }));
/// spring.add_listener(listener);
/// ```
pub struct FnSpringListener<F> {
    callback: F,
}

impl<F> FnSpringListener<F>
where
    F: Fn(SpringEvent, &Spring),
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> SpringListener for FnSpringListener<F>
where
    F: Fn(SpringEvent, &Spring),
{
    fn on_spring_update(&self, spring: &Spring) {
        (self.callback)(SpringEvent::Update, spring);
    }

    fn on_spring_at_rest(&self, spring: &Spring) {
        (self.callback)(SpringEvent::AtRest, spring);
    }

    fn on_spring_activate(&self, spring: &Spring) {
        (self.callback)(SpringEvent::Activate, spring);
    }

    fn on_spring_end_state_change(&self, spring: &Spring) {
        (self.callback)(SpringEvent::EndStateChange, spring);
    }
}

impl<F> fmt::Debug for FnSpringListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnSpringListener")
    }
}

/// Hooks around each integration pass of a [`SpringSystem`]
pub trait SpringSystemListener {
    /// Called before the active springs are advanced
    fn on_before_integrate(&self, _system: &SpringSystem) {}

    /// Called after the active springs are advanced and idleness is updated
    fn on_after_integrate(&self, _system: &SpringSystem) {}
}
