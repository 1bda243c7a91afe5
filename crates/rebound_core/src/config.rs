//! Spring configuration
//!
//! A [`SpringConfig`] is a shared tension/friction pair. Clones are handles
//! to the same entity: equality and hashing are by identity, so two configs
//! built from equal numbers are still distinct (this is what the registry
//! and spring chains key on). Values can be tuned live; every spring
//! holding the handle picks up the change on its next integration step.

use crate::conversion::{friction_from_origami, tension_from_origami, BouncyConversion};
use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Origami tension of the default spring
pub const DEFAULT_ORIGAMI_TENSION: f64 = 40.0;
/// Origami friction of the default spring
pub const DEFAULT_ORIGAMI_FRICTION: f64 = 7.0;

struct ConfigValues {
    tension: Cell<f64>,
    friction: Cell<f64>,
}

thread_local! {
    static DEFAULT_CONFIG: SpringConfig = SpringConfig::from_origami_tension_and_friction(
        DEFAULT_ORIGAMI_TENSION,
        DEFAULT_ORIGAMI_FRICTION,
    );
}

/// Tension and friction for a spring
#[derive(Clone)]
pub struct SpringConfig {
    values: Rc<ConfigValues>,
}

impl SpringConfig {
    /// Create a config from raw tension and friction coefficients
    pub fn new(tension: f64, friction: f64) -> Self {
        Self {
            values: Rc::new(ConfigValues {
                tension: Cell::new(tension),
                friction: Cell::new(friction),
            }),
        }
    }

    /// Create a config from origami tension and friction values
    pub fn from_origami_tension_and_friction(tension: f64, friction: f64) -> Self {
        Self::new(tension_from_origami(tension), friction_from_origami(friction))
    }

    /// Create a config from a bounciness/speed pair
    ///
    /// Bounciness and speed follow the Origami "Bouncy" patch; the result is
    /// converted through origami units into raw coefficients.
    pub fn from_bounciness_and_speed(bounciness: f64, speed: f64) -> Self {
        let conversion = BouncyConversion::new(speed, bounciness);
        Self::from_origami_tension_and_friction(
            conversion.bouncy_tension(),
            conversion.bouncy_friction(),
        )
    }

    /// The shared default config (origami 40/7)
    ///
    /// There is one instance per thread; the engine is driven from a single
    /// thread, so in practice this is the process-wide default.
    pub fn default_config() -> Self {
        DEFAULT_CONFIG.with(Clone::clone)
    }

    pub fn tension(&self) -> f64 {
        self.values.tension.get()
    }

    pub fn friction(&self) -> f64 {
        self.values.friction.get()
    }

    pub fn set_tension(&self, tension: f64) {
        self.values.tension.set(tension);
    }

    pub fn set_friction(&self, friction: f64) {
        self.values.friction.set(friction);
    }

    /// Check whether both handles refer to the same config
    pub fn ptr_eq(&self, other: &SpringConfig) -> bool {
        Rc::ptr_eq(&self.values, &other.values)
    }
}

impl PartialEq for SpringConfig {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SpringConfig {}

impl Hash for SpringConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.values), state);
    }
}

impl fmt::Debug for SpringConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpringConfig")
            .field("tension", &self.tension())
            .field("friction", &self.friction())
            .finish()
    }
}
