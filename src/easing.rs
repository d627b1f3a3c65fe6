//! Easing curves used for indicator fades and smoothed brightness.

use serde::Deserialize;
use std::f64::consts::PI;

/// Maps a progress fraction in `[0, 1]` onto an eased fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Constant rate.
    #[default]
    Linear,
    /// Quadratic, slow start.
    QuadIn,
    /// Quadratic, slow finish.
    QuadOut,
    /// Quadratic, slow at both ends.
    QuadInOut,
    /// Cubic, slow at both ends.
    CubicInOut,
    /// Half a cosine period.
    SineInOut,
    /// Exponential, very slow start.
    ExponentialIn,
    /// Exponential, very slow finish.
    ExponentialOut,
}

impl Easing {
    /// Eased progress for `t`, clamped to `[0, 1]`.
    pub fn ease(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => t * (2.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    0.5 * u * u * u + 1.0
                }
            }
            Easing::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
            Easing::ExponentialIn => {
                if t == 0.0 {
                    0.0
                } else {
                    2f64.powf(10.0 * (t - 1.0))
                }
            }
            Easing::ExponentialOut => {
                if t == 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * t)
                }
            }
        }
    }

    /// Value between `start` and `end` at progress `t`.
    pub fn interpolate(self, start: f64, end: f64, t: f64) -> f64 {
        start + (end - start) * self.ease(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 8] = [
        Easing::Linear,
        Easing::QuadIn,
        Easing::QuadOut,
        Easing::QuadInOut,
        Easing::CubicInOut,
        Easing::SineInOut,
        Easing::ExponentialIn,
        Easing::ExponentialOut,
    ];

    #[test]
    fn test_endpoints_are_fixed() {
        for easing in ALL {
            assert!(easing.ease(0.0).abs() < 1e-3, "{easing:?} at 0");
            assert!((easing.ease(1.0) - 1.0).abs() < 1e-9, "{easing:?} at 1");
        }
    }

    #[test]
    fn test_interpolate_descending_range() {
        assert_eq!(Easing::Linear.interpolate(200.0, 100.0, 0.25), 175.0);
        assert_eq!(Easing::QuadIn.interpolate(0.0, 1.0, 0.5), 0.25);
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(Easing::Linear.ease(-1.0), 0.0);
        assert_eq!(Easing::Linear.ease(2.0), 1.0);
    }

    #[test]
    fn test_deserialize_from_config_name() {
        #[derive(Deserialize)]
        struct Holder {
            easing: Easing,
        }
        let holder: Holder = toml::from_str("easing = \"exponential_in\"").unwrap();
        assert_eq!(holder.easing, Easing::ExponentialIn);
    }
}
