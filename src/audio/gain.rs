//! Shared volume control
//!
//! Written by the control thread, read once per packet by the receive thread.
//! The ratio is stored as `f32` bits in a single atomic word.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Gain ratio in `[0.0, 1.0]`
#[derive(Debug)]
pub struct GainControl {
    bits: AtomicU32,
}

impl GainControl {
    pub fn new(ratio: f32) -> Self {
        Self {
            bits: AtomicU32::new(clamp_ratio(ratio).to_bits()),
        }
    }

    /// Create from a volume percentage, values above 100 saturate
    pub fn from_percent(percent: u8) -> Self {
        Self::new(percent_to_ratio(percent))
    }

    pub fn ratio(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set_ratio(&self, ratio: f32) {
        self.bits.store(clamp_ratio(ratio).to_bits(), Ordering::Relaxed);
    }

    pub fn set_percent(&self, percent: u8) {
        self.set_ratio(percent_to_ratio(percent));
    }

    pub fn percent(&self) -> u8 {
        (self.ratio() * 100.0).round() as u8
    }
}

impl Default for GainControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Thread-safe handle to a gain control
pub type SharedGain = Arc<GainControl>;

pub fn percent_to_ratio(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

fn clamp_ratio(ratio: f32) -> f32 {
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

/// Scale one sample, rounding to nearest and saturating at the i16 range
#[inline]
pub fn scale_sample(sample: i16, ratio: f32) -> i16 {
    let scaled = (f32::from(sample) * ratio).round();
    scaled.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

/// Scale a frame in place
pub fn apply_gain(samples: &mut [i16], ratio: f32) {
    if ratio == 1.0 {
        return;
    }
    for sample in samples.iter_mut() {
        *sample = scale_sample(*sample, ratio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_half_volume() {
        let mut frame = vec![1000i16; 1024];
        apply_gain(&mut frame, percent_to_ratio(50));
        assert!(frame.iter().all(|&s| s == 500));
    }

    #[test]
    fn test_rounds_to_nearest() {
        assert_eq!(scale_sample(3, 0.5), 2);
        assert_eq!(scale_sample(-3, 0.5), -2);
        assert_eq!(scale_sample(1, 0.49), 0);
    }

    #[test]
    fn test_clamps_ratio_and_percent() {
        let gain = GainControl::new(3.0);
        assert_eq!(gain.ratio(), 1.0);
        gain.set_ratio(-1.0);
        assert_eq!(gain.ratio(), 0.0);
        gain.set_ratio(f32::NAN);
        assert_eq!(gain.ratio(), 0.0);
        gain.set_percent(250);
        assert_eq!(gain.percent(), 100);
        gain.set_percent(37);
        assert_eq!(gain.percent(), 37);
    }

    #[test]
    fn test_extremes_do_not_overflow() {
        assert_eq!(scale_sample(i16::MIN, 1.0), i16::MIN);
        assert_eq!(scale_sample(i16::MAX, 1.0), i16::MAX);
        assert_eq!(scale_sample(i16::MIN, 0.0), 0);
    }

    proptest! {
        #[test]
        fn prop_scales_by_percent(percent in 0u8..=100, sample in any::<i16>()) {
            let ratio = percent_to_ratio(percent);
            let expected = f64::from(sample) * f64::from(percent) / 100.0;
            let got = f64::from(scale_sample(sample, ratio));
            prop_assert!((got - expected).abs() <= 1.0, "{} * {}% = {}", sample, percent, got);
            prop_assert!(got.abs() <= f64::from(sample).abs());
        }
    }
}
