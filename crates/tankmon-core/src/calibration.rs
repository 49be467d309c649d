//! Raw ADC counts to tank level
//!
//! The mapping is a clamped linear interpolation between the two calibration
//! reference points. Sensor noise or an out-of-calibration mount can push the
//! raw value outside the configured range; the clamp keeps the percentage in
//! `0..=100` and the volume non-negative no matter what the ADC reports.

use crate::config::CalibrationConfig;

/// Unprocessed reading from the level sensor, in ADC counts.
pub type RawSample = u16;

/// Largest value the 12-bit ADC can report
pub const ADC_MAX: RawSample = 4095;

/// Latest calibrated view of the tank.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelReading {
    /// Fill level, always within `0..=100`
    pub percentage: u8,
    pub volume_litre: f32,
    pub raw_value: RawSample,
}

/// Map a raw sample onto the tank using the calibration reference points.
pub fn map(raw: RawSample, calibration: &CalibrationConfig) -> LevelReading {
    let percentage = percentage(raw, calibration);
    let volume_litre = f32::from(percentage) / 100.0 * f32::from(calibration.tank_capacity_litre());

    LevelReading {
        percentage,
        volume_litre,
        raw_value: raw,
    }
}

fn percentage(raw: RawSample, calibration: &CalibrationConfig) -> u8 {
    let min = u32::from(calibration.min_raw());
    let max = u32::from(calibration.max_raw());
    let clamped = u32::from(raw).clamp(min, max);

    // `min < max` holds for every CalibrationConfig, so the span is never zero.
    let scaled = (clamped - min) * 100 / (max - min);
    scaled.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> CalibrationConfig {
        CalibrationConfig::new(1900, 3850, 4, 40).unwrap()
    }

    #[test]
    fn test_reference_points() {
        let cfg = scenario();

        let empty = map(1900, &cfg);
        assert_eq!(empty.percentage, 0);
        assert_eq!(empty.volume_litre, 0.0);

        let full = map(3850, &cfg);
        assert_eq!(full.percentage, 100);
        assert_eq!(full.volume_litre, 4.0);

        let half = map(2875, &cfg);
        assert_eq!(half.percentage, 50);
        assert_eq!(half.volume_litre, 2.0);
        assert_eq!(half.raw_value, 2875);
    }

    #[test]
    fn test_below_range_clamps_to_empty() {
        let reading = map(500, &scenario());
        assert_eq!(reading.percentage, 0);
        assert_eq!(reading.volume_litre, 0.0);
        assert_eq!(reading.raw_value, 500);
    }

    #[test]
    fn test_above_range_clamps_to_full() {
        let cfg = scenario();
        assert_eq!(map(4000, &cfg).percentage, 100);
        assert_eq!(map(RawSample::MAX, &cfg).percentage, 100);
        assert_eq!(map(RawSample::MAX, &cfg).volume_litre, 4.0);
    }

    #[test]
    fn test_percentage_bounded_over_adc_domain() {
        let cfg = scenario();
        for raw in 0..=ADC_MAX {
            let reading = map(raw, &cfg);
            assert!(reading.percentage <= 100, "raw {raw} gave {}", reading.percentage);
            assert!(reading.volume_litre >= 0.0);
            if raw <= cfg.min_raw() {
                assert_eq!(reading.percentage, 0, "raw {raw}");
            }
            if raw >= cfg.max_raw() {
                assert_eq!(reading.percentage, 100, "raw {raw}");
            }
        }
    }

    #[test]
    fn test_monotonic_within_range() {
        let cfg = scenario();
        let mut previous = 0;
        for raw in cfg.min_raw()..=cfg.max_raw() {
            let current = map(raw, &cfg).percentage;
            assert!(current >= previous, "raw {raw}: {current} < {previous}");
            previous = current;
        }
    }

    #[test]
    fn test_volume_follows_percentage() {
        let cfg = CalibrationConfig::new(0, 4095, 250, 40).unwrap();
        for raw in (0..=ADC_MAX).step_by(7) {
            let reading = map(raw, &cfg);
            let expected = f32::from(reading.percentage) / 100.0 * 250.0;
            assert!((reading.volume_litre - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn test_narrow_range() {
        let cfg = CalibrationConfig::new(10, 11, 4, 40).unwrap();
        assert_eq!(map(10, &cfg).percentage, 0);
        assert_eq!(map(11, &cfg).percentage, 100);
        assert_eq!(map(0, &cfg).percentage, 0);
    }
}
