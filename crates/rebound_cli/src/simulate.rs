//! Run a single spring to rest and record its trajectory

use anyhow::Result;
use rebound_core::{Spring, SpringConfig, SpringSystem, SpringSystemListener};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// One recorded tick
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Sample {
    pub time_ms: f64,
    pub position: f64,
    pub velocity: f64,
}

#[derive(Debug)]
pub struct Simulation {
    pub config: SpringConfig,
    pub from: f64,
    pub to: f64,
    pub time_step_ms: f64,
    pub overshoot_clamping: bool,
    /// Simulated time after which the run is cut short
    pub max_duration_ms: f64,
}

#[derive(Debug)]
pub struct Trajectory {
    pub samples: Vec<Sample>,
    /// Whether the spring came to rest before the time limit
    pub settled: bool,
}

/// Records the spring after every integration pass
struct Recorder {
    spring: Spring,
    time_step_ms: f64,
    max_duration_ms: f64,
    samples: RefCell<Vec<Sample>>,
}

impl SpringSystemListener for Recorder {
    fn on_after_integrate(&self, system: &SpringSystem) {
        let time_ms = {
            let mut samples = self.samples.borrow_mut();
            let time_ms = (samples.len() + 1) as f64 * self.time_step_ms;
            let state = self.spring.current_state();
            samples.push(Sample {
                time_ms,
                position: state.position,
                velocity: state.velocity,
            });
            time_ms
        };

        if time_ms >= self.max_duration_ms && !system.is_idle() {
            warn!("Spring still moving after {} ms, stopping", time_ms);
            system.looper().stop();
        }
    }
}

impl Simulation {
    pub fn run(&self) -> Result<Trajectory> {
        if !(self.time_step_ms > 0.0) {
            anyhow::bail!("Time step must be positive (got {})", self.time_step_ms);
        }

        let (system, looper) = SpringSystem::synchronous()?;
        looper.set_time_step(self.time_step_ms);

        let spring = system.create_spring();
        spring
            .set_config(self.config.clone())
            .set_overshoot_clamping_enabled(self.overshoot_clamping);
        spring.set_current_value(self.from)?;

        let recorder = Rc::new(Recorder {
            spring: spring.clone(),
            time_step_ms: self.time_step_ms,
            max_duration_ms: self.max_duration_ms,
            samples: RefCell::new(Vec::new()),
        });
        system.add_listener(recorder.clone());

        debug!(
            "Simulating {:?} from {} to {} in {} ms steps",
            self.config, self.from, self.to, self.time_step_ms
        );
        // The synchronous looper runs the whole simulation inside this call
        spring.set_end_value(self.to)?;

        system.remove_listener(&recorder);
        let samples = recorder.samples.take();
        Ok(Trajectory {
            samples,
            settled: spring.is_at_rest(),
        })
    }
}
