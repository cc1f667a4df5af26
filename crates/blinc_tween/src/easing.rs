//! Easing functions for tweens
//!
//! Eases only shape progress. [`Easing::interpolate`] maps the shaped
//! progress onto a `start..end` range, so every curve in the catalog is a
//! pure function of normalized progress.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, TweenError};

/// How an ease is described in configuration: a catalog name or bezier points
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EaseSpec {
    Named(String),
    Bezier([f64; 4]),
}

impl Default for EaseSpec {
    fn default() -> Self {
        Self::Named("linear".to_string())
    }
}

impl From<&str> for EaseSpec {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for EaseSpec {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<[f64; 4]> for EaseSpec {
    fn from(points: [f64; 4]) -> Self {
        Self::Bezier(points)
    }
}

/// Easing function type
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Easing {
    #[default]
    Linear,
    EaseInBack,
    EaseOutBack,
    EaseInOutBack,
    EaseInBounce,
    EaseOutBounce,
    EaseInOutBounce,
    EaseInCirc,
    EaseOutCirc,
    EaseInOutCirc,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    EaseInElastic,
    EaseOutElastic,
    EaseInOutElastic,
    EaseInExpo,
    EaseOutExpo,
    EaseInOutExpo,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInQuart,
    EaseOutQuart,
    EaseInOutQuart,
    EaseInQuint,
    EaseOutQuint,
    EaseInOutQuint,
    EaseInSine,
    EaseOutSine,
    EaseInOutSine,
    CubicBezier(CubicBezier),
}

/// Catalog of named eases, matched exactly
const NAMED: &[(&str, Easing)] = &[
    ("linear", Easing::Linear),
    ("easeInBack", Easing::EaseInBack),
    ("easeOutBack", Easing::EaseOutBack),
    ("easeInOutBack", Easing::EaseInOutBack),
    ("easeInBounce", Easing::EaseInBounce),
    ("easeOutBounce", Easing::EaseOutBounce),
    ("easeInOutBounce", Easing::EaseInOutBounce),
    ("easeInCirc", Easing::EaseInCirc),
    ("easeOutCirc", Easing::EaseOutCirc),
    ("easeInOutCirc", Easing::EaseInOutCirc),
    ("easeInCubic", Easing::EaseInCubic),
    ("easeOutCubic", Easing::EaseOutCubic),
    ("easeInOutCubic", Easing::EaseInOutCubic),
    ("easeInElastic", Easing::EaseInElastic),
    ("easeOutElastic", Easing::EaseOutElastic),
    ("easeInOutElastic", Easing::EaseInOutElastic),
    ("easeInExpo", Easing::EaseInExpo),
    ("easeOutExpo", Easing::EaseOutExpo),
    ("easeInOutExpo", Easing::EaseInOutExpo),
    ("easeInQuad", Easing::EaseInQuad),
    ("easeOutQuad", Easing::EaseOutQuad),
    ("easeInOutQuad", Easing::EaseInOutQuad),
    ("easeInQuart", Easing::EaseInQuart),
    ("easeOutQuart", Easing::EaseOutQuart),
    ("easeInOutQuart", Easing::EaseInOutQuart),
    ("easeInQuint", Easing::EaseInQuint),
    ("easeOutQuint", Easing::EaseOutQuint),
    ("easeInOutQuint", Easing::EaseInOutQuint),
    ("easeInSine", Easing::EaseInSine),
    ("easeOutSine", Easing::EaseOutSine),
    ("easeInOutSine", Easing::EaseInOutSine),
];

impl Easing {
    /// Resolve a configured ease.
    ///
    /// Unknown names degrade to [`Easing::Linear`] with a warning. Bezier
    /// points whose x components leave `[0, 1]` are rejected.
    pub fn resolve(spec: &EaseSpec) -> Result<Self> {
        match spec {
            EaseSpec::Named(name) => Ok(Self::from_name(name).unwrap_or_else(|| {
                warn!(name = %name, "unknown easing, falling back to linear");
                Easing::Linear
            })),
            EaseSpec::Bezier([x1, y1, x2, y2]) => {
                CubicBezier::new(*x1, *y1, *x2, *y2).map(Easing::CubicBezier)
            }
        }
    }

    /// Look up a catalog ease by its exact name
    pub fn from_name(name: &str) -> Option<Self> {
        NAMED
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, easing)| *easing)
    }

    /// Names of every catalog ease
    pub fn names() -> impl Iterator<Item = &'static str> {
        NAMED.iter().map(|(name, _)| *name)
    }

    /// Map `start..end` through the eased progress
    #[inline]
    pub fn interpolate(&self, progress: f64, start: f64, end: f64) -> f64 {
        start + self.apply(progress) * (end - start)
    }

    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::EaseInBack => {
                let c1 = 1.70158;
                let c3 = c1 + 1.0;
                c3 * t * t * t - c1 * t * t
            }
            Easing::EaseOutBack => {
                let c1 = 1.70158;
                let c3 = c1 + 1.0;
                1.0 + c3 * (t - 1.0).powi(3) + c1 * (t - 1.0).powi(2)
            }
            Easing::EaseInOutBack => {
                let c2 = 1.70158 * 1.525;
                if t < 0.5 {
                    ((2.0 * t).powi(2) * ((c2 + 1.0) * 2.0 * t - c2)) / 2.0
                } else {
                    ((2.0 * t - 2.0).powi(2) * ((c2 + 1.0) * (t * 2.0 - 2.0) + c2) + 2.0) / 2.0
                }
            }
            Easing::EaseInBounce => 1.0 - bounce_out(1.0 - t),
            Easing::EaseOutBounce => bounce_out(t),
            Easing::EaseInOutBounce => {
                if t < 0.5 {
                    (1.0 - bounce_out(1.0 - 2.0 * t)) / 2.0
                } else {
                    (1.0 + bounce_out(2.0 * t - 1.0)) / 2.0
                }
            }
            Easing::EaseInCirc => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
            Easing::EaseOutCirc => (1.0 - (t - 1.0).powi(2)).max(0.0).sqrt(),
            Easing::EaseInOutCirc => {
                if t < 0.5 {
                    (1.0 - (1.0 - (2.0 * t).powi(2)).max(0.0).sqrt()) / 2.0
                } else {
                    ((1.0 - (-2.0 * t + 2.0).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
                }
            }
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::EaseInElastic => {
                if t <= 0.0 || t >= 1.0 {
                    return t.clamp(0.0, 1.0);
                }
                let c4 = (2.0 * PI) / 3.0;
                -(2.0_f64.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * c4).sin()
            }
            Easing::EaseOutElastic => {
                if t <= 0.0 || t >= 1.0 {
                    return t.clamp(0.0, 1.0);
                }
                let c4 = (2.0 * PI) / 3.0;
                2.0_f64.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
            }
            Easing::EaseInOutElastic => {
                if t <= 0.0 || t >= 1.0 {
                    return t.clamp(0.0, 1.0);
                }
                let c5 = (2.0 * PI) / 4.5;
                if t < 0.5 {
                    -(2.0_f64.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * c5).sin()) / 2.0
                } else {
                    (2.0_f64.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * c5).sin()) / 2.0 + 1.0
                }
            }
            Easing::EaseInExpo => {
                if t <= 0.0 {
                    0.0
                } else {
                    2.0_f64.powf(10.0 * t - 10.0)
                }
            }
            Easing::EaseOutExpo => {
                if t >= 1.0 {
                    1.0
                } else {
                    1.0 - 2.0_f64.powf(-10.0 * t)
                }
            }
            Easing::EaseInOutExpo => {
                if t <= 0.0 || t >= 1.0 {
                    t.clamp(0.0, 1.0)
                } else if t < 0.5 {
                    2.0_f64.powf(20.0 * t - 10.0) / 2.0
                } else {
                    (2.0 - 2.0_f64.powf(-20.0 * t + 10.0)) / 2.0
                }
            }
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::EaseInQuart => t * t * t * t,
            Easing::EaseOutQuart => 1.0 - (1.0 - t).powi(4),
            Easing::EaseInOutQuart => {
                if t < 0.5 {
                    8.0 * t * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
                }
            }
            Easing::EaseInQuint => t.powi(5),
            Easing::EaseOutQuint => 1.0 - (1.0 - t).powi(5),
            Easing::EaseInOutQuint => {
                if t < 0.5 {
                    16.0 * t.powi(5)
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(5) / 2.0
                }
            }
            Easing::EaseInSine => 1.0 - (t * PI / 2.0).cos(),
            Easing::EaseOutSine => (t * PI / 2.0).sin(),
            Easing::EaseInOutSine => -((PI * t).cos() - 1.0) / 2.0,
            Easing::CubicBezier(curve) => curve.solve(t),
        }
    }
}

fn bounce_out(t: f64) -> f64 {
    let n1 = 7.5625;
    let d1 = 2.75;
    if t < 1.0 / d1 {
        n1 * t * t
    } else if t < 2.0 / d1 {
        let t = t - 1.5 / d1;
        n1 * t * t + 0.75
    } else if t < 2.5 / d1 {
        let t = t - 2.25 / d1;
        n1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / d1;
        n1 * t * t + 0.984375
    }
}

const SPLINE_TABLE_SIZE: usize = 11;
const SAMPLE_STEP: f64 = 1.0 / (SPLINE_TABLE_SIZE as f64 - 1.0);
const NEWTON_ITERATIONS: usize = 4;
const NEWTON_MIN_SLOPE: f64 = 0.001;
const SUBDIVISION_PRECISION: f64 = 1e-7;
const SUBDIVISION_MAX_ITERATIONS: usize = 10;

/// CSS-style cubic bezier ease with a precomputed `x(t)` sample table
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicBezier {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    samples: [f64; SPLINE_TABLE_SIZE],
}

impl CubicBezier {
    /// Build a curve. The x components must lie in `[0, 1]`.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        let finite = [x1, y1, x2, y2].iter().all(|v| v.is_finite());
        if !finite || !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
            return Err(TweenError::InvalidBezier([x1, y1, x2, y2]));
        }

        let mut samples = [0.0; SPLINE_TABLE_SIZE];
        for (i, sample) in samples.iter_mut().enumerate() {
            *sample = bezier_sample(i as f64 * SAMPLE_STEP, x1, x2);
        }

        Ok(Self {
            x1,
            y1,
            x2,
            y2,
            samples,
        })
    }

    /// Control points as `[x1, y1, x2, y2]`
    pub fn points(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    fn is_linear(&self) -> bool {
        self.x1 == self.y1 && self.x2 == self.y2
    }

    /// Evaluate the curve's y for a given x (progress)
    pub fn solve(&self, x: f64) -> f64 {
        // Endpoints are always exact
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        if self.is_linear() {
            return x;
        }
        bezier_sample(self.t_for_x(x), self.y1, self.y2)
    }

    fn t_for_x(&self, x: f64) -> f64 {
        let last_sample = SPLINE_TABLE_SIZE - 1;
        let mut interval_start = 0.0;
        let mut current = 1;

        while current != last_sample && self.samples[current] <= x {
            interval_start += SAMPLE_STEP;
            current += 1;
        }
        current -= 1;

        // Linear interpolation inside the sampled interval gives the first guess
        let span = self.samples[current + 1] - self.samples[current];
        let dist = if span.abs() > f64::EPSILON {
            (x - self.samples[current]) / span
        } else {
            0.0
        };
        let guess = interval_start + dist * SAMPLE_STEP;

        let slope = bezier_slope(guess, self.x1, self.x2);
        if slope >= NEWTON_MIN_SLOPE {
            self.newton_raphson(x, guess)
        } else if slope == 0.0 {
            guess
        } else {
            self.binary_subdivide(x, interval_start, interval_start + SAMPLE_STEP)
        }
    }

    fn newton_raphson(&self, x: f64, mut guess: f64) -> f64 {
        for _ in 0..NEWTON_ITERATIONS {
            let slope = bezier_slope(guess, self.x1, self.x2);
            if slope == 0.0 {
                return guess;
            }
            let err = bezier_sample(guess, self.x1, self.x2) - x;
            guess -= err / slope;
        }
        guess
    }

    fn binary_subdivide(&self, x: f64, mut lo: f64, mut hi: f64) -> f64 {
        let mut t = lo;
        for _ in 0..SUBDIVISION_MAX_ITERATIONS {
            t = lo + (hi - lo) / 2.0;
            let err = bezier_sample(t, self.x1, self.x2) - x;
            if err.abs() <= SUBDIVISION_PRECISION {
                break;
            }
            if err > 0.0 {
                hi = t;
            } else {
                lo = t;
            }
        }
        t
    }
}

/// Evaluate cubic bezier at parameter t: B(t) = 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³
#[inline]
fn bezier_sample(t: f64, p1: f64, p2: f64) -> f64 {
    // Horner form: ((1-3p2+3p1)t + 3p2-6p1)t + 3p1) * t
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

/// Derivative of cubic bezier: B'(t) = 3(1-t)²·p1 + 6(1-t)t·(p2-p1) + 3t²·(1-p2)
#[inline]
fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    (3.0 * a * t + 2.0 * b) * t + c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_endpoints() {
        for name in Easing::names() {
            let easing = Easing::from_name(name).unwrap();
            assert!(easing.apply(0.0).abs() < 1e-9, "{name} at 0");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-9, "{name} at 1");
        }
    }

    #[test]
    fn test_catalog_size() {
        assert_eq!(Easing::names().count(), 31);
    }

    #[test]
    fn test_interpolate_maps_range() {
        let easing = Easing::Linear;
        assert_eq!(easing.interpolate(0.25, 10.0, 20.0), 12.5);
        assert_eq!(Easing::EaseInQuad.interpolate(0.5, 0.0, 100.0), 25.0);
    }

    #[test]
    fn test_unknown_name_falls_back_to_linear() {
        let easing = Easing::resolve(&"wobbleInOut".into()).unwrap();
        assert_eq!(easing, Easing::Linear);
    }

    #[test]
    fn test_bezier_out_of_range_rejected() {
        let err = Easing::resolve(&[1.5, 0.0, 0.5, 1.0].into()).unwrap_err();
        assert_eq!(err, TweenError::InvalidBezier([1.5, 0.0, 0.5, 1.0]));
        assert!(Easing::resolve(&[0.2, -0.6, 0.8, 1.6].into()).is_ok());
    }

    #[test]
    fn test_bezier_endpoints_exact() {
        let curve = CubicBezier::new(0.25, 0.1, 0.25, 1.0).unwrap();
        assert_eq!(curve.solve(0.0), 0.0);
        assert_eq!(curve.solve(1.0), 1.0);
    }

    #[test]
    fn test_bezier_degenerate_is_identity() {
        let curve = CubicBezier::new(0.3, 0.3, 0.7, 0.7).unwrap();
        for i in 0..=10 {
            let x = i as f64 / 10.0;
            assert!((curve.solve(x) - x).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bezier_matches_css_ease() {
        // CSS `ease` at x = 0.5 is ~0.8024
        let curve = CubicBezier::new(0.25, 0.1, 0.25, 1.0).unwrap();
        assert!((curve.solve(0.5) - 0.8024).abs() < 1e-3);
    }

    #[test]
    fn test_bezier_is_monotonic_for_monotonic_points() {
        let curve = CubicBezier::new(0.42, 0.0, 0.58, 1.0).unwrap();
        let mut prev = 0.0;
        for i in 1..=100 {
            let y = curve.solve(i as f64 / 100.0);
            assert!(y >= prev - 1e-9);
            prev = y;
        }
        // ease-in-out is symmetric around the midpoint
        assert!((curve.solve(0.5) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_ease_spec_deserializes_both_forms() {
        let named: EaseSpec = serde_json::from_str("\"easeOutCubic\"").unwrap();
        assert_eq!(named, EaseSpec::Named("easeOutCubic".into()));
        let bezier: EaseSpec = serde_json::from_str("[0.1, 0.2, 0.3, 0.4]").unwrap();
        assert_eq!(bezier, EaseSpec::Bezier([0.1, 0.2, 0.3, 0.4]));
    }
}
