//! Spring physics
//!
//! A [`Spring`] integrates a damped harmonic oscillator towards its end
//! value using fixed 1ms RK4 sub-steps. Real frame time is accumulated and
//! drained in whole sub-steps; any fractional remainder is blended in by
//! interpolating between the last two integrated states so motion does not
//! visibly step.
//!
//! Springs are created by, and belong to, a [`SpringSystem`]. The handle is
//! cheap to clone; all clones refer to the same spring.

use crate::config::SpringConfig;
use crate::error::{ReboundError, Result};
use crate::listener::{SpringEvent, SpringListener};
use crate::system::{SpringId, SpringSystem};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Most real time simulated per advance, in seconds (4 frames at 60 FPS)
pub const MAX_DELTA_TIME_SEC: f64 = 0.064;
/// Fixed solver sub-step, in seconds
pub const SOLVER_TIMESTEP_SEC: f64 = 0.001;
/// Default speed below which a spring may be considered at rest
pub const DEFAULT_REST_SPEED_THRESHOLD: f64 = 0.005;
/// Default distance from the end value below which a spring may be considered at rest
pub const DEFAULT_REST_DISPLACEMENT_THRESHOLD: f64 = 0.005;

type ListenerList = SmallVec<[Rc<dyn SpringListener>; 2]>;

/// Position and velocity sample
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhysicsState {
    pub position: f64,
    pub velocity: f64,
}

/// Which callbacks an advance needs to fire
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct AdvanceOutcome {
    activated: bool,
    came_to_rest: bool,
}

pub(crate) struct SpringState {
    config: SpringConfig,
    current: PhysicsState,
    previous: PhysicsState,
    temp: PhysicsState,
    start_value: f64,
    end_value: f64,
    was_at_rest: bool,
    rest_speed_threshold: f64,
    rest_displacement_threshold: f64,
    time_accumulator: f64,
    overshoot_clamping: bool,
}

impl SpringState {
    fn new(config: SpringConfig) -> Self {
        Self {
            config,
            current: PhysicsState::default(),
            previous: PhysicsState::default(),
            temp: PhysicsState::default(),
            start_value: 0.0,
            end_value: 0.0,
            was_at_rest: true,
            rest_speed_threshold: DEFAULT_REST_SPEED_THRESHOLD,
            rest_displacement_threshold: DEFAULT_REST_DISPLACEMENT_THRESHOLD,
            time_accumulator: 0.0,
            overshoot_clamping: false,
        }
    }

    fn displacement_distance(&self, state: PhysicsState) -> f64 {
        (self.end_value - state.position).abs()
    }

    fn is_at_rest(&self) -> bool {
        // Zero tension is a free particle: it only has to stop moving
        self.current.velocity.abs() <= self.rest_speed_threshold
            && (self.displacement_distance(self.current) <= self.rest_displacement_threshold
                || self.config.tension() == 0.0)
    }

    fn is_overshooting(&self) -> bool {
        let position = self.current.position;
        self.config.tension() > 0.0
            && ((self.start_value < self.end_value && position > self.end_value)
                || (self.start_value > self.end_value && position < self.end_value))
    }

    fn set_at_rest(&mut self) {
        self.end_value = self.current.position;
        self.temp.position = self.current.position;
        self.current.velocity = 0.0;
    }

    /// Blend the previous and current states; `alpha` 0 is previous, 1 is current
    fn interpolate(&mut self, alpha: f64) {
        self.current.position =
            self.current.position * alpha + self.previous.position * (1.0 - alpha);
        self.current.velocity =
            self.current.velocity * alpha + self.previous.velocity * (1.0 - alpha);
    }

    fn advance(&mut self, real_delta_secs: f64) -> Option<AdvanceOutcome> {
        if self.is_at_rest() && self.was_at_rest {
            return None;
        }

        // Long stalls are not caught up on; the excess is dropped
        let delta = real_delta_secs.max(0.0).min(MAX_DELTA_TIME_SEC);
        self.integrate(delta);

        let tension = self.config.tension();
        let came_to_rest =
            self.is_at_rest() || (self.overshoot_clamping && self.is_overshooting());
        if came_to_rest {
            if tension > 0.0 {
                self.start_value = self.end_value;
                self.current.position = self.end_value;
            } else {
                self.end_value = self.current.position;
                self.start_value = self.end_value;
            }
            self.current.velocity = 0.0;
        }

        let activated = self.was_at_rest;
        self.was_at_rest = came_to_rest;

        Some(AdvanceOutcome {
            activated,
            came_to_rest,
        })
    }

    fn integrate(&mut self, delta: f64) {
        const H: f64 = SOLVER_TIMESTEP_SEC;

        let tension = self.config.tension();
        let friction = self.config.friction();
        let end_value = self.end_value;
        let acceleration = |x: f64, v: f64| tension * (end_value - x) - friction * v;

        let mut position = self.current.position;
        let mut velocity = self.current.velocity;

        // Without a full sub-step this call, interpolation must be a no-op
        self.previous = self.current;
        self.time_accumulator += delta;

        while self.time_accumulator >= H {
            self.time_accumulator -= H;

            if self.time_accumulator < H {
                // Last sub-step; keep the state before it for interpolation
                self.previous = PhysicsState { position, velocity };
            }

            let a_velocity = velocity;
            let a_acceleration = acceleration(position, velocity);

            self.temp.position = position + a_velocity * H * 0.5;
            self.temp.velocity = velocity + a_acceleration * H * 0.5;
            let b_velocity = self.temp.velocity;
            let b_acceleration = acceleration(self.temp.position, self.temp.velocity);

            self.temp.position = position + b_velocity * H * 0.5;
            self.temp.velocity = velocity + b_acceleration * H * 0.5;
            let c_velocity = self.temp.velocity;
            let c_acceleration = acceleration(self.temp.position, self.temp.velocity);

            self.temp.position = position + c_velocity * H;
            self.temp.velocity = velocity + c_acceleration * H;
            let d_velocity = self.temp.velocity;
            let d_acceleration = acceleration(self.temp.position, self.temp.velocity);

            let dxdt = (a_velocity + 2.0 * (b_velocity + c_velocity) + d_velocity) / 6.0;
            let dvdt =
                (a_acceleration + 2.0 * (b_acceleration + c_acceleration) + d_acceleration) / 6.0;

            position += dxdt * H;
            velocity += dvdt * H;
        }

        self.current = PhysicsState { position, velocity };

        if self.time_accumulator > 0.0 {
            self.interpolate(self.time_accumulator / H);
        }
    }
}

/// Shared storage behind a spring handle
pub(crate) struct SpringNode {
    state: RefCell<SpringState>,
    listeners: RefCell<ListenerList>,
    destroyed: Cell<bool>,
}

impl SpringNode {
    pub(crate) fn new(config: SpringConfig) -> Self {
        Self {
            state: RefCell::new(SpringState::new(config)),
            listeners: RefCell::new(SmallVec::new()),
            destroyed: Cell::new(false),
        }
    }
}

/// A spring owned by a [`SpringSystem`]
///
/// ```ignore
/// let (system, looper) = SpringSystem::stepping()?;
/// let spring = system.create_spring();
/// spring.set_config(SpringConfig::from_origami_tension_and_friction(40.0, 6.0));
/// spring.set_end_value(1.0)?;
///
/// while !looper.step(16.0) {}
/// assert!(spring.current_value_is_approximately(1.0));
/// ```
#[derive(Clone)]
pub struct Spring {
    id: SpringId,
    node: Rc<SpringNode>,
    system: SpringSystem,
}

impl Spring {
    pub(crate) fn from_parts(id: SpringId, node: Rc<SpringNode>, system: SpringSystem) -> Self {
        Self { id, node, system }
    }

    /// Unique id of this spring within its system
    pub fn id(&self) -> SpringId {
        self.id
    }

    /// The system that owns this spring
    pub fn system(&self) -> &SpringSystem {
        &self.system
    }

    pub fn config(&self) -> SpringConfig {
        self.node.state.borrow().config.clone()
    }

    pub fn set_config(&self, config: SpringConfig) -> &Self {
        self.node.state.borrow_mut().config = config;
        self
    }

    /// Move the spring to `value` and put it at rest there
    pub fn set_current_value(&self, value: f64) -> Result<&Self> {
        self.set_current_value_with(value, true)
    }

    /// Move the spring to `value`, optionally leaving its end value alone
    ///
    /// With `set_at_rest` false the spring starts resolving from `value`
    /// towards its existing end value on the next tick. That is rarely what
    /// a caller wants; [`Spring::set_current_value`] is the common form.
    ///
    /// The rest snap happens before the update event, so an update listener
    /// already sees the end value moved to `value` and zero velocity.
    pub fn set_current_value_with(&self, value: f64, set_at_rest: bool) -> Result<&Self> {
        self.ensure_alive()?;
        {
            let mut state = self.node.state.borrow_mut();
            state.start_value = value;
            state.current.position = value;
            if set_at_rest {
                state.set_at_rest();
            }
        }
        self.system.activate_spring(self.id)?;
        self.notify(SpringEvent::Update);
        Ok(self)
    }

    /// Value the spring started its current motion from
    pub fn start_value(&self) -> f64 {
        self.node.state.borrow().start_value
    }

    pub fn current_value(&self) -> f64 {
        self.node.state.borrow().current.position
    }

    pub fn current_state(&self) -> PhysicsState {
        self.node.state.borrow().current
    }

    /// Distance between the current value and the end value
    pub fn current_displacement_distance(&self) -> f64 {
        let state = self.node.state.borrow();
        state.displacement_distance(state.current)
    }

    /// Retarget the spring
    ///
    /// Setting the same end value on a spring that is already at rest does
    /// nothing: no events fire and the spring is not activated.
    pub fn set_end_value(&self, end_value: f64) -> Result<&Self> {
        self.ensure_alive()?;
        {
            let mut state = self.node.state.borrow_mut();
            if state.end_value == end_value && state.is_at_rest() {
                return Ok(self);
            }
            state.start_value = state.current.position;
            state.end_value = end_value;
        }
        self.system.activate_spring(self.id)?;
        self.notify(SpringEvent::EndStateChange);
        Ok(self)
    }

    pub fn end_value(&self) -> f64 {
        self.node.state.borrow().end_value
    }

    /// Set the velocity, in units per second
    pub fn set_velocity(&self, velocity: f64) -> Result<&Self> {
        self.ensure_alive()?;
        {
            let mut state = self.node.state.borrow_mut();
            if state.current.velocity == velocity {
                return Ok(self);
            }
            state.current.velocity = velocity;
        }
        self.system.activate_spring(self.id)?;
        Ok(self)
    }

    pub fn velocity(&self) -> f64 {
        self.node.state.borrow().current.velocity
    }

    pub fn set_rest_speed_threshold(&self, threshold: f64) -> &Self {
        self.node.state.borrow_mut().rest_speed_threshold = threshold;
        self
    }

    pub fn rest_speed_threshold(&self) -> f64 {
        self.node.state.borrow().rest_speed_threshold
    }

    pub fn set_rest_displacement_threshold(&self, threshold: f64) -> &Self {
        self.node.state.borrow_mut().rest_displacement_threshold = threshold;
        self
    }

    pub fn rest_displacement_threshold(&self) -> f64 {
        self.node.state.borrow().rest_displacement_threshold
    }

    /// Snap to the end value the moment the spring passes it
    pub fn set_overshoot_clamping_enabled(&self, enabled: bool) -> &Self {
        self.node.state.borrow_mut().overshoot_clamping = enabled;
        self
    }

    pub fn is_overshoot_clamping_enabled(&self) -> bool {
        self.node.state.borrow().overshoot_clamping
    }

    /// Whether the spring has moved past its end value, seen from its start value
    pub fn is_overshooting(&self) -> bool {
        self.node.state.borrow().is_overshooting()
    }

    pub fn is_at_rest(&self) -> bool {
        self.node.state.borrow().is_at_rest()
    }

    /// Whether the spring was at rest after its previous advance
    pub fn was_at_rest(&self) -> bool {
        self.node.state.borrow().was_at_rest
    }

    /// Whether the system still has to advance this spring
    ///
    /// True while moving, and for the one settling advance that fires the
    /// at-rest callback.
    pub fn system_should_advance(&self) -> bool {
        let state = self.node.state.borrow();
        !state.is_at_rest() || !state.was_at_rest
    }

    /// Stop the spring where it is: end value becomes the current value, velocity zero
    ///
    /// No events are fired.
    pub fn set_at_rest(&self) -> &Self {
        self.node.state.borrow_mut().set_at_rest();
        self
    }

    /// Whether the current value is within the rest displacement threshold of `value`
    pub fn current_value_is_approximately(&self, value: f64) -> bool {
        let state = self.node.state.borrow();
        (state.current.position - value).abs() <= state.rest_displacement_threshold
    }

    /// Advance the simulation by `real_delta_secs` of real time
    ///
    /// Called by the owning system once per tick for active springs.
    pub fn advance(&self, real_delta_secs: f64) {
        let outcome = self.node.state.borrow_mut().advance(real_delta_secs);
        let Some(outcome) = outcome else {
            return;
        };

        if outcome.came_to_rest {
            tracing::trace!(spring = %self.id, "spring came to rest");
        }

        for listener in self.listeners() {
            if outcome.activated {
                listener.on_spring_activate(self);
            }
            listener.on_spring_update(self);
            if outcome.came_to_rest {
                listener.on_spring_at_rest(self);
            }
        }
    }

    pub fn add_listener(&self, listener: Rc<dyn SpringListener>) -> &Self {
        let mut listeners = self.node.listeners.borrow_mut();
        if !listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
        self
    }

    pub fn remove_listener<L>(&self, listener: &Rc<L>) -> &Self
    where
        L: SpringListener + ?Sized,
    {
        let target = Rc::as_ptr(listener) as *const ();
        self.node
            .listeners
            .borrow_mut()
            .retain(|l| Rc::as_ptr(l) as *const () != target);
        self
    }

    pub fn remove_all_listeners(&self) -> &Self {
        self.node.listeners.borrow_mut().clear();
        self
    }

    pub fn listener_count(&self) -> usize {
        self.node.listeners.borrow().len()
    }

    /// Deregister the spring from its system and drop its listeners
    ///
    /// The spring must not be used afterwards; mutating calls fail with
    /// [`ReboundError::InvalidArgument`].
    pub fn destroy(&self) -> Result<()> {
        if self.node.destroyed.replace(true) {
            return Err(ReboundError::InvalidArgument(format!(
                "spring {} was already destroyed",
                self.id
            )));
        }
        self.node.listeners.borrow_mut().clear();
        self.system.deregister_spring(self)?;
        tracing::debug!(spring = %self.id, "destroyed spring");
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.node.destroyed.get()
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.node.destroyed.get() {
            Err(ReboundError::InvalidArgument(format!(
                "spring {} has been destroyed",
                self.id
            )))
        } else {
            Ok(())
        }
    }

    fn listeners(&self) -> ListenerList {
        self.node.listeners.borrow().clone()
    }

    fn notify(&self, event: SpringEvent) {
        for listener in self.listeners() {
            match event {
                SpringEvent::Activate => listener.on_spring_activate(self),
                SpringEvent::Update => listener.on_spring_update(self),
                SpringEvent::AtRest => listener.on_spring_at_rest(self),
                SpringEvent::EndStateChange => listener.on_spring_end_state_change(self),
            }
        }
    }
}

impl PartialEq for Spring {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for Spring {}

impl fmt::Debug for Spring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.node.state.borrow();
        f.debug_struct("Spring")
            .field("id", &self.id)
            .field("position", &state.current.position)
            .field("velocity", &state.current.velocity)
            .field("end_value", &state.end_value)
            .finish()
    }
}
