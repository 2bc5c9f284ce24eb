//! Timing-parameter calibration.
//!
//! Finds the smallest `time_scale_factor` at which a run completes without
//! data-loss warnings, assuming the outcome is a step function of the value
//! (everything below some threshold warns, everything at or above it is
//! clean).
//!
//! # Algorithm
//!
//! Phase 1, only when no upper bound is configured, brackets the threshold:
//!
//! ```text
//! candidate_i = lower + base_step * 2^i      for i = 0..max_doublings
//! ```
//!
//! Each failing candidate raises `low`; the first passing one becomes
//! `high`. Phase 2 bisects `[low, high]` until the gap is within the
//! resolution, which is either an absolute count (`resolution >= 1`) or a
//! fraction of the current midpoint (`resolution < 1`).
//!
//! With `verify_monotone` the result is probed once more at the end. A
//! failure there means either the backend is not deterministic (the value
//! passed before) or the configured upper bound was never good. When no
//! probe failed at all, `lower` itself is probed too, since a passing lower
//! bound would otherwise be reported as `lower + 1`.
//!
//! A probe fails only with [`RankError::WarningThresholdExceeded`]. Every
//! other probe error is a genuine fault and aborts the search unchanged.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use rankcheck_core::error::RankError;

use crate::backend::ExecutionBackend;
use crate::simulation::{PageRankSimulation, VerifyMode};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Search bounds and budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Known (or assumed) failing value.
    /// Default: 1.
    #[serde(default = "default_lower")]
    pub lower: u32,
    /// Known (or assumed) passing value. `None` runs range finding first.
    #[serde(default)]
    pub upper: Option<u32>,
    /// Stop once `high - low` is within this: an absolute count when `>= 1`,
    /// a fraction of the midpoint when `< 1`.
    /// Default: 10.
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    /// First range-finding offset.
    /// Default: 10.
    #[serde(default = "default_base_step")]
    pub base_step: u32,
    /// Range-finding attempts before giving up.
    /// Default: 16.
    #[serde(default = "default_max_doublings")]
    pub max_doublings: u32,
    /// Re-probe the result and check every outcome against earlier ones.
    /// Default: true.
    #[serde(default = "default_verify_monotone")]
    pub verify_monotone: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            lower: default_lower(),
            upper: None,
            resolution: default_resolution(),
            base_step: default_base_step(),
            max_doublings: default_max_doublings(),
            verify_monotone: default_verify_monotone(),
        }
    }
}

const fn default_lower() -> u32 {
    1
}

const fn default_resolution() -> f64 {
    10.0
}

const fn default_base_step() -> u32 {
    10
}

const fn default_max_doublings() -> u32 {
    16
}

const fn default_verify_monotone() -> bool {
    true
}

impl CalibrationConfig {
    /// Validate configuration before probing.
    ///
    /// # Errors
    ///
    /// Returns [`RankError::InvalidParameter`] for a zero step, an empty
    /// bracket or an unusable resolution.
    pub fn validate(&self) -> Result<Resolution, RankError> {
        if self.base_step == 0 {
            return Err(RankError::InvalidParameter(
                "base_step must be > 0".to_string(),
            ));
        }
        if let Some(upper) = self.upper {
            if upper <= self.lower {
                return Err(RankError::InvalidParameter(format!(
                    "upper ({upper}) must be > lower ({})",
                    self.lower
                )));
            }
        }
        Resolution::from_f64(self.resolution)
    }
}

/// Termination criterion of the bisection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    /// Stop when `high - low <= n`.
    Absolute(u32),
    /// Stop when `high - low <= fraction * midpoint`.
    Fraction(f64),
}

impl Resolution {
    /// Interpret a configured resolution.
    ///
    /// # Errors
    ///
    /// Returns [`RankError::InvalidParameter`] unless `value` is finite and
    /// positive.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f64(value: f64) -> Result<Self, RankError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(RankError::InvalidParameter(format!(
                "resolution must be finite and > 0, got {value}"
            )));
        }
        if value >= 1.0 {
            Ok(Self::Absolute(value.min(f64::from(u32::MAX)) as u32))
        } else {
            Ok(Self::Fraction(value))
        }
    }

    /// Whether `[low, high]` is narrow enough.
    #[must_use]
    pub fn is_resolved(self, low: u32, high: u32) -> bool {
        let gap = high.saturating_sub(low);
        match self {
            Self::Absolute(n) => gap <= n,
            Self::Fraction(f) => f64::from(gap) <= f * f64::from(midpoint(low, high)),
        }
    }
}

fn midpoint(low: u32, high: u32) -> u32 {
    low + high.saturating_sub(low) / 2
}

// ---------------------------------------------------------------------------
// State and report
// ---------------------------------------------------------------------------

/// Current bracket. `low <= candidate <= high` holds at every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub low: u32,
    pub high: u32,
    pub candidate: Option<u32>,
}

impl CalibrationState {
    #[must_use]
    pub const fn new(low: u32, high: u32) -> Self {
        Self {
            low,
            high,
            candidate: None,
        }
    }

    /// Next value to probe, or `None` once the bracket is resolved or cannot
    /// be split further. An inverted bracket is treated as resolved.
    pub fn next_candidate(&mut self, resolution: Resolution) -> Option<u32> {
        let gap = self.high.saturating_sub(self.low);
        self.candidate = if gap <= 1 || resolution.is_resolved(self.low, self.high) {
            None
        } else {
            Some(midpoint(self.low, self.high))
        };
        self.candidate
    }

    /// Narrow the bracket with the outcome of the current candidate.
    pub fn record(&mut self, passed: bool) {
        if let Some(candidate) = self.candidate.take() {
            if passed {
                self.high = candidate;
            } else {
                self.low = candidate;
            }
        }
    }
}

/// Search phase a probe belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    RangeFinding,
    Refinement,
    Confirmation,
}

/// One backend probe and its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub time_scale_factor: u32,
    pub passed: bool,
    pub phase: Phase,
}

/// Calibration result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Smallest known-good timing value.
    pub value: u32,
    /// Every probe in order.
    pub probes: Vec<Probe>,
    /// How many of `probes` were range finding.
    pub phase1_probes: usize,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

struct ProbeLog<F> {
    probe: F,
    probes: Vec<Probe>,
    verify_monotone: bool,
}

impl<F> ProbeLog<F>
where
    F: FnMut(u32) -> Result<()>,
{
    fn run(&mut self, time_scale_factor: u32, phase: Phase) -> Result<bool> {
        info!(time_scale_factor, ?phase, "probing timing value");
        let passed = match (self.probe)(time_scale_factor) {
            Ok(()) => true,
            Err(err) if RankError::is_warning_threshold(&err) => false,
            Err(err) => return Err(err),
        };
        debug!(time_scale_factor, passed, "probe finished");

        if self.verify_monotone {
            self.check_monotone(time_scale_factor, passed)?;
        }
        self.probes.push(Probe {
            time_scale_factor,
            passed,
            phase,
        });
        Ok(passed)
    }

    fn check_monotone(&self, time_scale_factor: u32, passed: bool) -> Result<(), RankError> {
        let contradiction = self.probes.iter().find(|p| {
            if passed {
                !p.passed && p.time_scale_factor >= time_scale_factor
            } else {
                p.passed && p.time_scale_factor <= time_scale_factor
            }
        });
        match contradiction {
            Some(p) if passed => Err(RankError::NonMonotoneBackend {
                passed: time_scale_factor,
                failed: p.time_scale_factor,
            }),
            Some(p) => Err(RankError::NonMonotoneBackend {
                passed: p.time_scale_factor,
                failed: time_scale_factor,
            }),
            None => Ok(()),
        }
    }
}

/// Run the two-phase search with `probe` deciding pass/fail.
///
/// # Errors
///
/// Returns [`RankError::RangeNotFound`] when range finding exhausts its
/// budget or the final value fails confirmation,
/// [`RankError::LowerBoundPasses`] when `lower` turns out to be good,
/// [`RankError::NonMonotoneBackend`] on contradictory outcomes,
/// invalid-configuration errors, and any non-warning probe error unchanged.
/// [`RankError::WarningThresholdExceeded`] is never returned.
#[instrument(skip(config, probe), fields(lower = config.lower, upper = ?config.upper))]
pub fn calibrate<F>(config: &CalibrationConfig, probe: F) -> Result<CalibrationReport>
where
    F: FnMut(u32) -> Result<()>,
{
    let resolution = config.validate()?;
    let mut log = ProbeLog {
        probe,
        probes: Vec::new(),
        verify_monotone: config.verify_monotone,
    };

    let mut state = match config.upper {
        Some(upper) => CalibrationState::new(config.lower, upper),
        None => find_range(config, &mut log)?,
    };
    let phase1_probes = log.probes.len();

    while let Some(candidate) = state.next_candidate(resolution) {
        let passed = log.run(candidate, Phase::Refinement)?;
        state.record(passed);
    }

    if config.verify_monotone {
        if !log.run(state.high, Phase::Confirmation)? {
            return Err(RankError::RangeNotFound {
                lower: config.lower,
                last_tested: state.high,
                attempts: u32::try_from(log.probes.len()).unwrap_or(u32::MAX),
            }
            .into());
        }
        if log.probes.iter().all(|p| p.passed) && log.run(config.lower, Phase::Confirmation)? {
            return Err(RankError::LowerBoundPasses {
                lower: config.lower,
            }
            .into());
        }
    }

    info!(
        time_scale_factor = state.high,
        probes = log.probes.len(),
        "==> RESULT: time_scale_factor={}",
        state.high
    );
    Ok(CalibrationReport {
        value: state.high,
        probes: log.probes,
        phase1_probes,
    })
}

fn find_range<F>(config: &CalibrationConfig, log: &mut ProbeLog<F>) -> Result<CalibrationState>
where
    F: FnMut(u32) -> Result<()>,
{
    let mut low = config.lower;
    let mut last_tested = config.lower;

    for i in 0..config.max_doublings {
        let offset = 1_u32
            .checked_shl(i)
            .and_then(|scale| config.base_step.checked_mul(scale))
            .unwrap_or(u32::MAX);
        let candidate = config.lower.saturating_add(offset);
        last_tested = candidate;

        if log.run(candidate, Phase::RangeFinding)? {
            return Ok(CalibrationState::new(low, candidate));
        }
        low = candidate;
        if candidate == u32::MAX {
            break;
        }
    }

    Err(RankError::RangeNotFound {
        lower: config.lower,
        last_tested,
        attempts: u32::try_from(log.probes.len()).unwrap_or(u32::MAX),
    }
    .into())
}

/// Calibrate against a real backend: every probe is a full simulation
/// lifecycle with `fail_on_warning` forced on and verification skipped.
///
/// # Errors
///
/// See [`calibrate`].
pub fn calibrate_backend<B: ExecutionBackend>(
    backend: &mut B,
    simulation: &PageRankSimulation,
    config: &CalibrationConfig,
) -> Result<CalibrationReport> {
    calibrate_backend_with(backend, simulation, config, VerifyMode::Skip, None)
}

/// [`calibrate_backend`] with verification on every probe, and optionally a
/// hook that sees the backend paused after each clean run.
///
/// Verification only reports; a probe still passes or fails on warnings
/// alone.
///
/// # Errors
///
/// See [`calibrate`]. Reference errors raised while verifying abort the
/// search.
pub fn calibrate_backend_with<B: ExecutionBackend>(
    backend: &mut B,
    simulation: &PageRankSimulation,
    config: &CalibrationConfig,
    verify: VerifyMode,
    mut on_pause: Option<&mut dyn FnMut(&B) -> Result<()>>,
) -> Result<CalibrationReport> {
    let simulation = simulation.failing_on_warning();
    calibrate(config, |time_scale_factor| {
        let probe = simulation.with_time_scale_factor(time_scale_factor);
        match on_pause.as_deref_mut() {
            Some(hook) => probe.run_pausing(&mut *backend, verify, hook),
            None => probe.run(&mut *backend, verify),
        }
        .map(|_| ())
    })
}
