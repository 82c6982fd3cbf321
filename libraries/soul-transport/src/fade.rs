//! Gain fades for click-free transport transitions
//!
//! Every fade is a three-point value curve `[from, mid, to]` scheduled on the
//! output gain node. The midpoint `(from + to) / 1.5` sits above the arithmetic
//! mean, so a fade-out keeps most of its level early and drops late.

use std::time::Duration;

/// Clamp a volume into `[0, 1]`, mapping NaN to silence
#[inline]
pub fn clamp_volume(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A scheduled gain transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    from: f32,
    to: f32,
    duration: Duration,
}

impl Fade {
    /// Create a fade; endpoints are clamped to `[0, 1]`
    ///
    /// Negative or non-finite durations collapse to an instant fade.
    pub fn new(from: f32, to: f32, duration_ms: f64) -> Self {
        let duration = if duration_ms.is_finite() && duration_ms > 0.0 {
            Duration::from_secs_f64(duration_ms / 1000.0)
        } else {
            Duration::ZERO
        };

        Self {
            from: clamp_volume(from),
            to: clamp_volume(to),
            duration,
        }
    }

    pub fn from(&self) -> f32 {
        self.from
    }

    pub fn to(&self) -> f32 {
        self.to
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether the gain should simply be set to `to`
    ///
    /// Equal endpoints count as instant: the curve midpoint would otherwise
    /// bump the level for no audible change.
    pub fn is_instant(&self) -> bool {
        self.duration.is_zero() || (self.from - self.to).abs() <= f32::EPSILON
    }

    /// Curve control values handed to the output context
    pub fn curve(&self) -> [f32; 3] {
        // Near-full fades would overshoot the [0, 1] gain range at the midpoint
        let mid = clamp_volume((self.from + self.to) / 1.5);
        [self.from, mid, self.to]
    }
}

/// Evaluate a value curve at normalized progress (linear between points)
pub fn curve_value(curve: &[f32], progress: f64) -> f32 {
    match curve {
        [] => 0.0,
        [only] => *only,
        _ => {
            let progress = progress.clamp(0.0, 1.0);
            let segments = (curve.len() - 1) as f64;
            let scaled = progress * segments;
            let index = (scaled.floor() as usize).min(curve.len() - 2);
            let local = (scaled - index as f64) as f32;
            curve[index] + (curve[index + 1] - curve[index]) * local
        }
    }
}
