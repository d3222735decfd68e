//! Motion profiles for driven sub-constraints.
//!
//! A [`Drive`] is pure configuration: value, rate, and rate-of-change are
//! closed-form functions of absolute time, so drives never accumulate state
//! and evaluate identically no matter how often they are sampled.

use serde::{Deserialize, Serialize};

/// Shape function of a drive, over normalized progress `q` in `[0, 1]`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveFunc {
    /// Constant rate.
    #[default]
    Linear,
    /// Constant acceleration to the midpoint, constant deceleration after.
    Quadratic,
    /// Harmonic (cosine) blend; smooth rate, discontinuous acceleration at the ends.
    Harmonic,
    /// Cycloidal (sinusoidal) blend; smooth rate and acceleration.
    Cycloid,
    /// Quintic smoothstep; zero rate and acceleration at both ends.
    Quintic,
    /// Constant output for externally-driven input; never runs on its own.
    Static,
}

impl DriveFunc {
    /// Normalized value, first, and second derivative at progress `q`.
    fn shape(self, q: f64) -> (f64, f64, f64) {
        match self {
            DriveFunc::Linear => (q, 1.0, 0.0),
            DriveFunc::Quadratic => {
                if q < 0.5 {
                    (2.0 * q * q, 4.0 * q, 4.0)
                } else {
                    (-2.0 * q * q + 4.0 * q - 1.0, 4.0 - 4.0 * q, -4.0)
                }
            }
            DriveFunc::Harmonic => {
                let pi = core::f64::consts::PI;
                (
                    0.5 * (1.0 - (pi * q).cos()),
                    0.5 * pi * (pi * q).sin(),
                    0.5 * pi * pi * (pi * q).cos(),
                )
            }
            DriveFunc::Cycloid => {
                let two_pi = core::f64::consts::TAU;
                (
                    q - (two_pi * q).sin() / two_pi,
                    1.0 - (two_pi * q).cos(),
                    two_pi * (two_pi * q).sin(),
                )
            }
            DriveFunc::Quintic => (
                q * q * q * (10.0 - 15.0 * q + 6.0 * q * q),
                30.0 * q * q * (1.0 - q) * (1.0 - q),
                60.0 * q * (1.0 - q) * (1.0 - 2.0 * q),
            ),
            DriveFunc::Static => (0.0, 0.0, 0.0),
        }
    }
}

/// Parametrized motion profile mapping absolute time to a scalar
/// value/rate/acceleration triple.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Drive {
    /// Shape function.
    pub func: DriveFunc,
    /// Start time.
    pub t0: f64,
    /// Base duration; `bounce` and `repeat` scale the effective duration.
    pub dt: f64,
    /// Output range.
    pub dz: f64,
    /// Base offset; the value at `t0`.
    pub z0: f64,
    /// Mirror the profile back to its start (ping-pong), doubling the
    /// effective duration.
    pub bounce: bool,
    /// Number of cycles to tile, scaling the effective duration.
    pub repeat: u32,
}

impl Drive {
    /// Create a drive over `[t0, t0 + dt]` ramping from `z0` by `dz`.
    pub fn new(func: DriveFunc, z0: f64, dz: f64, t0: f64, dt: f64) -> Self {
        Drive { func, t0, dt, dz, z0, bounce: false, repeat: 1 }
    }

    /// A static drive holding `z0`.
    pub fn fixed_at(z0: f64) -> Self {
        Drive::new(DriveFunc::Static, z0, 0.0, 0.0, 1.0)
    }

    /// Enable ping-pong mirroring.
    pub fn with_bounce(mut self, bounce: bool) -> Self {
        self.bounce = bounce;
        self
    }

    /// Set the cycle count.
    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat.max(1);
        self
    }

    /// Effective duration: `dt`, doubled by bounce, scaled by repeat.
    pub fn duration(&self) -> f64 {
        self.dt * if self.bounce { 2.0 } else { 1.0 } * f64::from(self.repeat.max(1))
    }

    /// Whether `t` lies inside the running window.
    pub fn is_running(&self, t: f64) -> bool {
        self.func != DriveFunc::Static && t >= self.t0 && t <= self.t0 + self.duration()
    }

    /// Transformed progress and the chain-rule factor of the transform.
    ///
    /// Progress is clamped to `[0, 1]`, tiled by `repeat` (the final endpoint
    /// maps to 1, not back to 0), then mirrored by `bounce`.
    fn progress(&self, t: f64) -> (f64, f64) {
        let dur = self.duration();
        let mut q = if dur > 0.0 { ((t - self.t0) / dur).clamp(0.0, 1.0) } else { 1.0 };
        let mut fac = 1.0;
        let n = self.repeat.max(1);
        if n > 1 && q < 1.0 {
            q = (q * f64::from(n)).fract();
            fac *= f64::from(n);
        } else if n > 1 {
            fac *= f64::from(n);
        }
        if self.bounce {
            if q < 0.5 {
                q *= 2.0;
                fac *= 2.0;
            } else {
                q = 2.0 - 2.0 * q;
                fac *= -2.0;
            }
        }
        (q, fac)
    }

    /// Drive value at absolute time `t`; holds its endpoint outside the
    /// running window.
    pub fn value(&self, t: f64) -> f64 {
        let (q, _) = self.progress(t);
        let (f, _, _) = self.func.shape(q);
        self.z0 + self.dz * f
    }

    /// Drive rate at `t`; exactly zero outside the running window.
    pub fn rate(&self, t: f64) -> f64 {
        let dur = self.duration();
        if dur <= 0.0 || t < self.t0 || t > self.t0 + dur {
            return 0.0;
        }
        let (q, fac) = self.progress(t);
        let (_, fd, _) = self.func.shape(q);
        self.dz * fd * fac / dur
    }

    /// Drive acceleration at `t`; exactly zero outside the running window.
    pub fn rate_of_change(&self, t: f64) -> f64 {
        let dur = self.duration();
        if dur <= 0.0 || t < self.t0 || t > self.t0 + dur {
            return 0.0;
        }
        let (q, fac) = self.progress(t);
        let (_, _, fdd) = self.func.shape(q);
        self.dz * fdd * fac * fac / (dur * dur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_hit_both_endpoints() {
        for func in [
            DriveFunc::Linear,
            DriveFunc::Quadratic,
            DriveFunc::Harmonic,
            DriveFunc::Cycloid,
            DriveFunc::Quintic,
        ] {
            let (f0, _, _) = func.shape(0.0);
            let (f1, _, _) = func.shape(1.0);
            assert!(f0.abs() < 1e-12, "{func:?} f(0) = {f0}");
            assert!((f1 - 1.0).abs() < 1e-12, "{func:?} f(1) = {f1}");
        }
    }

    #[test]
    fn quadratic_is_continuous_at_midpoint() {
        let (lo, lod, _) = DriveFunc::Quadratic.shape(0.5 - 1e-9);
        let (hi, hid, _) = DriveFunc::Quadratic.shape(0.5 + 1e-9);
        assert!((lo - hi).abs() < 1e-6);
        assert!((lod - hid).abs() < 1e-6);
    }

    #[test]
    fn bounce_returns_to_start() {
        let d = Drive::new(DriveFunc::Linear, 3.0, 2.0, 0.0, 1.0).with_bounce(true);
        assert!((d.duration() - 2.0).abs() < 1e-12);
        assert!((d.value(1.0) - 5.0).abs() < 1e-12);
        assert!((d.value(2.0) - 3.0).abs() < 1e-12);
        assert!((d.value(10.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn repeat_tiles_cycles() {
        let d = Drive::new(DriveFunc::Linear, 0.0, 1.0, 0.0, 1.0).with_repeat(3);
        assert!((d.duration() - 3.0).abs() < 1e-12);
        assert!((d.value(0.5) - 0.5).abs() < 1e-12);
        assert!((d.value(1.5) - 0.5).abs() < 1e-12);
        // Final endpoint holds at 1, not back at 0.
        assert!((d.value(3.0) - 1.0).abs() < 1e-12);
        assert!((d.value(4.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rate_zero_outside_window() {
        let d = Drive::new(DriveFunc::Cycloid, 0.0, 1.0, 1.0, 2.0);
        assert_eq!(d.rate(0.5), 0.0);
        assert_eq!(d.rate(3.5), 0.0);
        assert_eq!(d.rate_of_change(0.5), 0.0);
        assert!(d.rate(2.0) > 0.0);
    }

    #[test]
    fn static_profile_holds() {
        let d = Drive::fixed_at(7.0);
        assert_eq!(d.value(0.0), 7.0);
        assert_eq!(d.value(100.0), 7.0);
        assert_eq!(d.rate(50.0), 0.0);
        assert!(!d.is_running(50.0));
    }
}
