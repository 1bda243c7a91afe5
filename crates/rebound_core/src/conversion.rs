//! Parameter conversions
//!
//! Springs are tuned in "origami" units (the scale used by the Quartz
//! Composer / Origami spring patches) or with a speed/bounciness pair.
//! The functions here map those onto the raw tension and friction
//! coefficients the integrator works with.

/// Convert an origami tension value to a raw tension coefficient
pub fn tension_from_origami(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        (value - 30.0) * 3.62 + 194.0
    }
}

/// Convert a raw tension coefficient back to origami units
pub fn origami_from_tension(tension: f64) -> f64 {
    if tension == 0.0 {
        0.0
    } else {
        (tension - 194.0) / 3.62 + 30.0
    }
}

/// Convert an origami friction value to a raw friction coefficient
pub fn friction_from_origami(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        (value - 8.0) * 3.0 + 25.0
    }
}

/// Convert a raw friction coefficient back to origami units
pub fn origami_from_friction(friction: f64) -> f64 {
    if friction == 0.0 {
        0.0
    } else {
        (friction - 25.0) / 3.0 + 8.0
    }
}

/// Speed/bounciness pair converted to origami tension and friction
///
/// Bounciness controls the amount of overshoot, speed how quickly the
/// spring covers the distance. The friction is picked along a piecewise
/// cubic fit of the no-bounce damping curve and then eased towards zero
/// as bounciness grows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BouncyConversion {
    speed: f64,
    bounciness: f64,
    bouncy_tension: f64,
    bouncy_friction: f64,
}

impl BouncyConversion {
    pub fn new(speed: f64, bounciness: f64) -> Self {
        let b = normalize(bounciness / 1.7, 0.0, 20.0);
        let b = project_normal(b, 0.0, 0.8);
        let s = normalize(speed / 1.7, 0.0, 20.0);
        let bouncy_tension = project_normal(s, 0.5, 200.0);
        let bouncy_friction = quadratic_out_interpolation(b, b3_nobounce(bouncy_tension), 0.01);

        Self {
            speed,
            bounciness,
            bouncy_tension,
            bouncy_friction,
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn bounciness(&self) -> f64 {
        self.bounciness
    }

    /// Tension in origami units
    pub fn bouncy_tension(&self) -> f64 {
        self.bouncy_tension
    }

    /// Friction in origami units
    pub fn bouncy_friction(&self) -> f64 {
        self.bouncy_friction
    }
}

fn normalize(value: f64, start: f64, end: f64) -> f64 {
    (value - start) / (end - start)
}

fn project_normal(n: f64, start: f64, end: f64) -> f64 {
    start + n * (end - start)
}

fn linear_interpolation(t: f64, start: f64, end: f64) -> f64 {
    t * end + (1.0 - t) * start
}

fn quadratic_out_interpolation(t: f64, start: f64, end: f64) -> f64 {
    linear_interpolation(2.0 * t - t * t, start, end)
}

fn b3_friction1(x: f64) -> f64 {
    0.0007 * x.powi(3) - 0.031 * x.powi(2) + 0.64 * x + 1.28
}

fn b3_friction2(x: f64) -> f64 {
    0.000044 * x.powi(3) - 0.006 * x.powi(2) + 0.36 * x + 2.0
}

fn b3_friction3(x: f64) -> f64 {
    0.00000045 * x.powi(3) - 0.000332 * x.powi(2) + 0.1078 * x + 5.84
}

/// Friction that just avoids bouncing for the given origami tension
fn b3_nobounce(tension: f64) -> f64 {
    if tension <= 18.0 {
        b3_friction1(tension)
    } else if tension <= 44.0 {
        b3_friction2(tension)
    } else {
        b3_friction3(tension)
    }
}
