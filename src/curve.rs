// src/curve.rs
//
// Time-keyed control curves and transient events.
//
// Everything here is pure: given a curve and a time, produce a value.
// Curves are validated once on construction so evaluation never fails.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    #[error("keyframe {index} has a non-finite time or value")]
    NonFinite { index: usize },
    #[error("keyframe {index} has a negative time")]
    NegativeTime { index: usize },
    #[error("keyframe {index} goes back in time")]
    Unordered { index: usize },
}

/// One `(time, value)` sample of a control curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f64,
    pub value: f64,
}

impl Keyframe {
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

/// Piecewise-linear control curve with values normalized to [0, 1].
///
/// Keyframe times are non-negative and non-decreasing. Two keyframes may
/// share a time to express a step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    keys: Vec<Keyframe>,
}

impl Curve {
    /// Build a curve, clamping values into [0, 1].
    pub fn new(keys: Vec<Keyframe>) -> Result<Self, CurveError> {
        let mut keys = keys;
        let mut prev = 0.0;
        for (index, key) in keys.iter_mut().enumerate() {
            if !key.time.is_finite() || !key.value.is_finite() {
                return Err(CurveError::NonFinite { index });
            }
            if key.time < 0.0 {
                return Err(CurveError::NegativeTime { index });
            }
            if key.time < prev {
                return Err(CurveError::Unordered { index });
            }
            prev = key.time;
            key.value = key.value.clamp(0.0, 1.0);
        }
        Ok(Self { keys })
    }

    /// Build a curve from `(time, value)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, CurveError> {
        Self::new(pairs.iter().map(|&(t, v)| Keyframe::new(t, v)).collect())
    }

    /// A curve holding `value` forever.
    pub fn constant(value: f64) -> Self {
        Self {
            keys: vec![Keyframe::new(0.0, value.clamp(0.0, 1.0))],
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Time of the last keyframe (0 for an empty curve).
    #[inline]
    pub fn duration(&self) -> f64 {
        self.keys.last().map_or(0.0, |k| k.time)
    }

    /// Linearly interpolated value at `t`, held flat outside the keyframes.
    ///
    /// An empty curve evaluates to 0.
    pub fn value_at(&self, t: f64) -> f64 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // First keyframe strictly after t; guaranteed in 1..len here
        let idx = self.keys.partition_point(|k| k.time <= t);
        let a = self.keys[idx - 1];
        let b = self.keys[idx];
        let span = b.time - a.time;
        if span <= 0.0 {
            return b.value;
        }
        a.value + (b.value - a.value) * ((t - a.time) / span)
    }

    /// Value at `t`, reduced modulo `period` first when looping.
    pub fn sample(&self, t: f64, looping: bool, period: f64) -> f64 {
        if looping && period > 0.0 {
            self.value_at(t.rem_euclid(period))
        } else {
            self.value_at(t)
        }
    }
}

/// A short discrete pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transient {
    /// Time inside the effect, in seconds.
    pub time: f64,
    /// Normalized amplitude.
    pub amplitude: f64,
    /// Frequency in Hz.
    pub frequency: f64,
}

impl Transient {
    pub fn new(time: f64, amplitude: f64, frequency: f64) -> Self {
        Self {
            time,
            amplitude,
            frequency,
        }
    }
}

/// Transients whose time lies in `[start, end)`.
///
/// `transients` must be sorted by time.
pub fn transients_in(transients: &[Transient], start: f64, end: f64) -> &[Transient] {
    let lo = transients.partition_point(|t| t.time < start);
    let hi = transients.partition_point(|t| t.time < end);
    &transients[lo..hi.max(lo)]
}

/// Transients whose time lies in `[start, end]`.
pub fn transients_through(transients: &[Transient], start: f64, end: f64) -> &[Transient] {
    let lo = transients.partition_point(|t| t.time < start);
    let hi = transients.partition_point(|t| t.time <= end);
    &transients[lo..hi.max(lo)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Curve {
        Curve::from_pairs(&[(0.0, 0.0), (2.0, 1.0)]).unwrap()
    }

    #[test]
    fn test_interpolation() {
        let curve = ramp();
        assert_eq!(curve.value_at(1.0), 0.5);
        assert_eq!(curve.value_at(0.5), 0.25);
        assert_eq!(curve.duration(), 2.0);
    }

    #[test]
    fn test_held_outside_range() {
        let curve = Curve::from_pairs(&[(1.0, 0.2), (2.0, 0.8)]).unwrap();
        assert_eq!(curve.value_at(0.0), 0.2);
        assert_eq!(curve.value_at(5.0), 0.8);
    }

    #[test]
    fn test_empty_curve_is_silent() {
        assert_eq!(Curve::default().value_at(1.0), 0.0);
    }

    #[test]
    fn test_step_keyframes() {
        let curve = Curve::from_pairs(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (2.0, 1.0)]).unwrap();
        assert_eq!(curve.value_at(0.999), 0.0);
        assert_eq!(curve.value_at(1.5), 1.0);
    }

    #[test]
    fn test_looping_sample() {
        let curve = ramp();
        assert_eq!(curve.sample(3.0, true, 2.0), 0.5);
        assert_eq!(curve.sample(3.0, false, 2.0), 1.0);
    }

    #[test]
    fn test_values_are_normalized() {
        let curve = Curve::from_pairs(&[(0.0, -1.0), (1.0, 3.0)]).unwrap();
        assert_eq!(curve.value_at(0.0), 0.0);
        assert_eq!(curve.value_at(1.0), 1.0);
    }

    #[test]
    fn test_rejects_malformed_keys() {
        assert_eq!(
            Curve::from_pairs(&[(0.0, 0.0), (f64::NAN, 1.0)]),
            Err(CurveError::NonFinite { index: 1 })
        );
        assert_eq!(
            Curve::from_pairs(&[(1.0, 0.0), (0.5, 1.0)]),
            Err(CurveError::Unordered { index: 1 })
        );
        assert_eq!(
            Curve::from_pairs(&[(-1.0, 0.0)]),
            Err(CurveError::NegativeTime { index: 0 })
        );
    }

    #[test]
    fn test_transient_windows() {
        let transients = [
            Transient::new(0.0, 1.0, 80.0),
            Transient::new(1.0, 1.0, 80.0),
            Transient::new(2.0, 1.0, 80.0),
        ];
        assert_eq!(transients_in(&transients, 0.0, 1.0).len(), 1);
        assert_eq!(transients_in(&transients, 1.0, 2.0)[0].time, 1.0);
        assert_eq!(transients_through(&transients, 1.0, 2.0).len(), 2);
        assert!(transients_in(&transients, 2.5, 3.0).is_empty());
    }
}
