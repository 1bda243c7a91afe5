//! Spring loopers
//!
//! A looper is what keeps calling [`SpringSystem::tick`] while the system
//! has active springs. The system calls [`SpringLooper::start`] when it
//! wakes up and [`SpringLooper::stop`] when it goes idle; what happens in
//! between is up to the looper. Platform loopers hook into a display frame
//! callback; the two here are headless:
//!
//! - [`SteppingLooper`] advances only when asked, by an exact interval.
//! - [`SynchronousLooper`] blocks in `start` until the system is idle.

use crate::error::{ReboundError, Result};
use crate::system::{SpringSystem, WeakSpringSystem};
use std::cell::{Cell, OnceCell};

/// Sixty frames per second, in milliseconds
pub const SIXTY_FPS: f64 = 16.6667;

/// Set-once link from a looper back to the system it drives
#[derive(Default)]
pub struct LooperBinding {
    system: OnceCell<WeakSpringSystem>,
}

impl LooperBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&self, system: &SpringSystem) -> Result<()> {
        self.system.set(system.downgrade()).map_err(|_| {
            ReboundError::InvalidArgument(
                "looper is already bound to a spring system".to_string(),
            )
        })
    }

    pub fn is_bound(&self) -> bool {
        self.system.get().is_some()
    }

    /// The bound system, if it is bound and still alive
    pub fn system(&self) -> Option<SpringSystem> {
        self.system.get().and_then(WeakSpringSystem::upgrade)
    }
}

/// Drives a [`SpringSystem`] while it has active springs
///
/// `start` and `stop` may be called re-entrantly from inside a tick (the
/// system stops its looper from within `tick` once idle), so
/// implementations keep their state in cells rather than behind `&mut`.
pub trait SpringLooper {
    /// Link to the system this looper drives
    fn binding(&self) -> &LooperBinding;

    /// Begin calling the system's tick
    fn start(&self);

    /// Stop scheduling further ticks; a tick already running completes
    fn stop(&self);
}

/// Deterministic looper advancing by explicit intervals
///
/// ```ignore
/// let (system, looper) = SpringSystem::stepping()?;
/// spring.set_end_value(1.0)?;
/// while !looper.step(16.0) {}
/// ```
#[derive(Default)]
pub struct SteppingLooper {
    binding: LooperBinding,
    started: Cell<bool>,
    elapsed_millis: Cell<f64>,
}

impl SteppingLooper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started.get()
    }

    /// Simulated milliseconds stepped since the last start
    pub fn elapsed_millis(&self) -> f64 {
        self.elapsed_millis.get()
    }

    /// Tick the system by exactly `interval_millis`
    ///
    /// Returns whether the system is idle afterwards. A looper that has not
    /// been started does not tick and just reports the system's idleness.
    /// Returns false when no system is bound.
    pub fn step(&self, interval_millis: f64) -> bool {
        let Some(system) = self.binding.system() else {
            return false;
        };
        if !self.started.get() {
            return system.is_idle();
        }
        self.elapsed_millis
            .set(self.elapsed_millis.get() + interval_millis);
        system.tick(interval_millis);
        system.is_idle()
    }
}

impl SpringLooper for SteppingLooper {
    fn binding(&self) -> &LooperBinding {
        &self.binding
    }

    fn start(&self) {
        self.started.set(true);
        self.elapsed_millis.set(0.0);
    }

    fn stop(&self) {
        self.started.set(false);
    }
}

/// Looper that runs the system to idle inside `start`
///
/// Ticks by a fixed time step in a tight loop. A `stop` issued from a
/// listener during a tick ends the loop before the next tick. A spring that
/// never comes to rest (no tension and no friction) keeps this looping
/// until something stops it.
pub struct SynchronousLooper {
    binding: LooperBinding,
    time_step: Cell<f64>,
    running: Cell<bool>,
}

impl SynchronousLooper {
    pub fn new() -> Self {
        Self {
            binding: LooperBinding::new(),
            time_step: Cell::new(SIXTY_FPS),
            running: Cell::new(false),
        }
    }

    /// Milliseconds passed to each tick
    pub fn time_step(&self) -> f64 {
        self.time_step.get()
    }

    pub fn set_time_step(&self, time_step: f64) {
        self.time_step.set(time_step);
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }
}

impl Default for SynchronousLooper {
    fn default() -> Self {
        Self::new()
    }
}

impl SpringLooper for SynchronousLooper {
    fn binding(&self) -> &LooperBinding {
        &self.binding
    }

    fn start(&self) {
        let Some(system) = self.binding.system() else {
            tracing::warn!("synchronous looper started without a spring system");
            return;
        };

        self.running.set(true);
        let mut ticks = 0u64;
        while !system.is_idle() && self.running.get() {
            system.tick(self.time_step.get());
            ticks += 1;
        }
        tracing::debug!(ticks, "synchronous looper finished");
    }

    fn stop(&self) {
        self.running.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpringConfig;
    use crate::listener::SpringSystemListener;
    use std::rc::Rc;

    #[test]
    fn test_step_before_start_does_nothing() {
        let (system, looper) = SpringSystem::stepping().unwrap();
        let spring = system.create_spring();

        assert!(looper.step(16.0));
        assert_eq!(looper.elapsed_millis(), 0.0);
        assert_eq!(spring.current_value(), 0.0);

        spring.set_end_value(1.0).unwrap();
        assert!(!looper.step(16.0));
        assert_eq!(looper.elapsed_millis(), 16.0);
        assert!(spring.current_value() > 0.0);
    }

    #[test]
    fn test_step_loop_ends_when_retarget_is_a_no_op() {
        let (system, looper) = SpringSystem::stepping().unwrap();
        let spring = system.create_spring();

        spring.set_end_value(0.0).unwrap();
        assert!(!looper.is_started());

        let mut steps = 0;
        while !looper.step(16.0) {
            steps += 1;
            assert!(steps < 10);
        }
        assert_eq!(steps, 0);
        assert!(system.is_idle());
    }

    #[test]
    fn test_step_after_stop_reports_idle() {
        let (system, looper) = SpringSystem::stepping().unwrap();
        let spring = system.create_spring();
        spring.set_end_value(1.0).unwrap();
        while !looper.step(16.0) {}

        assert!(!looper.is_started());
        assert!(looper.step(16.0));
        assert_eq!(spring.current_value(), 1.0);
    }

    #[test]
    fn test_unbound_stepper() {
        let looper = SteppingLooper::new();
        looper.start();
        assert!(!looper.binding().is_bound());
        assert!(!looper.step(16.0));
    }

    #[test]
    fn test_binding_does_not_keep_system_alive() {
        let looper = Rc::new(SteppingLooper::new());
        let system = SpringSystem::new(looper.clone()).unwrap();
        assert!(looper.binding().system().is_some());

        drop(system);
        assert!(looper.binding().is_bound());
        assert!(looper.binding().system().is_none());
    }

    #[test]
    fn test_synchronous_runs_to_idle() {
        let (system, looper) = SpringSystem::synchronous().unwrap();
        let spring = system.create_spring();

        // Blocks until the spring settles
        spring.set_end_value(1.0).unwrap();

        assert!(system.is_idle());
        assert!(!looper.is_running());
        assert_eq!(spring.current_value(), 1.0);
        assert!(spring.is_at_rest());
    }

    #[test]
    fn test_synchronous_time_step() {
        let looper = SynchronousLooper::new();
        assert_eq!(looper.time_step(), SIXTY_FPS);
        looper.set_time_step(8.0);
        assert_eq!(looper.time_step(), 8.0);
    }

    #[test]
    fn test_synchronous_honors_stop_from_listener() {
        struct StopAfter {
            looper: Rc<SynchronousLooper>,
            limit: u32,
            ticks: Cell<u32>,
        }

        impl SpringSystemListener for StopAfter {
            fn on_after_integrate(&self, _system: &SpringSystem) {
                self.ticks.set(self.ticks.get() + 1);
                if self.ticks.get() == self.limit {
                    self.looper.stop();
                }
            }
        }

        let (system, looper) = SpringSystem::synchronous().unwrap();
        let stopper = Rc::new(StopAfter {
            looper: looper.clone(),
            limit: 3,
            ticks: Cell::new(0),
        });
        system.add_listener(stopper.clone());

        let spring = system.create_spring();
        spring.set_config(SpringConfig::from_origami_tension_and_friction(40.0, 6.0));
        spring.set_end_value(1.0).unwrap();

        assert_eq!(stopper.ticks.get(), 3);
        assert!(!system.is_idle());
        assert!(!spring.is_at_rest());
    }
}
