//! Calibrator properties against step-function probes.
//!
//! For a probe that fails below a threshold `t` and passes at or above it,
//! the result must be a passing value within the resolution of `t`.

use anyhow::Result;
use proptest::prelude::*;

use rankcheck_core::RankError;
use rankcheck_sim::calibrate::{CalibrationConfig, calibrate};

fn step_at(threshold: u32) -> impl FnMut(u32) -> Result<()> {
    move |tsf| {
        if tsf >= threshold {
            Ok(())
        } else {
            Err(RankError::WarningThresholdExceeded.into())
        }
    }
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(500))]

    #[test]
    fn absolute_resolution_bounds_overshoot(
        lower in 0_u32..100,
        offset in 1_u32..5000,
        base_step in 1_u32..50,
        resolution in 1_u32..64,
    ) {
        let threshold = lower + offset;
        let config = CalibrationConfig {
            lower,
            base_step,
            resolution: f64::from(resolution),
            ..CalibrationConfig::default()
        };
        let report = calibrate(&config, step_at(threshold)).expect("threshold is reachable");

        prop_assert!(report.value >= threshold);
        prop_assert!(report.value - threshold < resolution.max(1));
    }

    #[test]
    fn fractional_resolution_bounds_overshoot(
        lower in 0_u32..100,
        offset in 1_u32..5000,
        base_step in 1_u32..50,
        resolution in 0.001_f64..0.5,
    ) {
        let threshold = lower + offset;
        let config = CalibrationConfig {
            lower,
            base_step,
            resolution,
            ..CalibrationConfig::default()
        };
        let report = calibrate(&config, step_at(threshold)).expect("threshold is reachable");

        prop_assert!(report.value >= threshold);
        let slack = (resolution * f64::from(report.value)).max(1.0);
        prop_assert!(f64::from(report.value - threshold) <= slack);
    }

    #[test]
    fn explicit_bracket_agrees_with_range_finding(
        lower in 0_u32..100,
        offset in 1_u32..2000,
        extra in 0_u32..2000,
    ) {
        let threshold = lower + offset;
        let bracketed = CalibrationConfig {
            lower,
            upper: Some(threshold + extra),
            resolution: 1.0,
            ..CalibrationConfig::default()
        };
        let searched = CalibrationConfig {
            upper: None,
            ..bracketed.clone()
        };

        let a = calibrate(&bracketed, step_at(threshold)).expect("bracketed");
        let b = calibrate(&searched, step_at(threshold)).expect("searched");
        prop_assert_eq!(a.value, threshold);
        prop_assert_eq!(b.value, threshold);
        prop_assert_eq!(a.phase1_probes, 0);
    }

    #[test]
    fn every_probe_outcome_matches_step(
        lower in 0_u32..100,
        offset in 1_u32..5000,
    ) {
        let threshold = lower + offset;
        let config = CalibrationConfig {
            lower,
            resolution: 1.0,
            ..CalibrationConfig::default()
        };
        let report = calibrate(&config, step_at(threshold)).expect("calibrates");
        for probe in &report.probes {
            prop_assert_eq!(probe.passed, probe.time_scale_factor >= threshold);
        }
    }
}
