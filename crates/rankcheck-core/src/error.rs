use std::fmt;

use crate::fixed::FixedPointError;

/// Machine-readable error codes, one per failure class.
///
/// The class decides the retry policy: structure and range errors are never
/// retried, non-convergence is retried by regenerating the input graph, and
/// warning-threshold failures are absorbed by the timing calibrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Structure,
    Range,
    NoConvergence,
    WarningThresholdExceeded,
    RangeNotFound,
    NonMonotone,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Structure => "E1001",
            Self::Range => "E1002",
            Self::NoConvergence => "E2001",
            Self::WarningThresholdExceeded => "E3001",
            Self::RangeNotFound => "E3002",
            Self::NonMonotone => "E3003",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Structure => "Malformed graph structure",
            Self::Range => "Parameter outside valid range",
            Self::NoConvergence => "Reference PageRank did not converge",
            Self::WarningThresholdExceeded => "Backend run produced data-loss warnings",
            Self::RangeNotFound => "No working timing value found",
            Self::NonMonotone => "Backend outcome is not monotone in timing value",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::Structure => Some("Remove duplicate edges and make labels match the edge list."),
            Self::Range => Some("Use damping in [0, 1), valid sizes and a failing lower bound."),
            Self::NoConvergence => Some("Regenerate the graph or raise max_iter."),
            Self::WarningThresholdExceeded => Some("Raise time_scale_factor."),
            Self::RangeNotFound => {
                Some("Raise max_doublings or base_step, or lengthen the backend timeout.")
            }
            Self::NonMonotone => Some("Rerun calibration on an idle backend."),
        }
    }

    /// Whether the harness may recover by regenerating the input graph.
    #[must_use]
    pub const fn is_regenerable(self) -> bool {
        matches!(self, Self::NoConvergence)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Typed failures raised by validation, the reference engine and the
/// calibration/campaign drivers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RankError {
    #[error("graph structure error - {count} duplicate edge(s) found")]
    DuplicateEdges { count: usize },

    #[error("graph structure error - label list contains {count} duplicate(s)")]
    DuplicateLabels { count: usize },

    #[error(
        "#labels don't match #edges: {declared} declared, {referenced} referenced \
         (dangling={dangling:?}, missing={missing:?})"
    )]
    LabelMismatch {
        declared: usize,
        referenced: usize,
        dangling: Vec<String>,
        missing: Vec<String>,
    },

    #[error("graph structure error - graph has no edges")]
    EmptyGraph,

    #[error("damping factor {damping} not in valid range [0,1)")]
    DampingOutOfRange { damping: f64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    FixedPoint(#[from] FixedPointError),

    #[error("rank vector length mismatch: computed {computed}, expected {expected}")]
    LengthMismatch { computed: usize, expected: usize },

    #[error("PageRank did not converge within {max_iter} iterations")]
    NoConvergence { max_iter: usize },

    #[error("backend run produced provenance warnings")]
    WarningThresholdExceeded,

    #[error(
        "no working timing value found above {lower} after {attempts} attempts \
         (last tested {last_tested})"
    )]
    RangeNotFound {
        lower: u32,
        last_tested: u32,
        attempts: u32,
    },

    #[error("backend outcome not monotone: {passed} passed but {failed} failed")]
    NonMonotoneBackend { passed: u32, failed: u32 },

    #[error("calibration lower bound {lower} already passes")]
    LowerBoundPasses { lower: u32 },
}

impl RankError {
    /// Failure class of this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateEdges { .. }
            | Self::DuplicateLabels { .. }
            | Self::LabelMismatch { .. }
            | Self::EmptyGraph
            | Self::LengthMismatch { .. } => ErrorCode::Structure,
            Self::DampingOutOfRange { .. }
            | Self::InvalidParameter(_)
            | Self::FixedPoint(_)
            | Self::LowerBoundPasses { .. } => ErrorCode::Range,
            Self::NoConvergence { .. } => ErrorCode::NoConvergence,
            Self::WarningThresholdExceeded => ErrorCode::WarningThresholdExceeded,
            Self::RangeNotFound { .. } => ErrorCode::RangeNotFound,
            Self::NonMonotoneBackend { .. } => ErrorCode::NonMonotone,
        }
    }

    /// Find a [`RankError`] anywhere in an `anyhow` error chain.
    #[must_use]
    pub fn find(err: &anyhow::Error) -> Option<&Self> {
        err.chain().find_map(|cause| cause.downcast_ref::<Self>())
    }

    /// True when `err` carries a reference non-convergence.
    #[must_use]
    pub fn is_no_convergence(err: &anyhow::Error) -> bool {
        Self::find(err).is_some_and(|e| e.code() == ErrorCode::NoConvergence)
    }

    /// True when `err` carries a backend warning-threshold failure.
    #[must_use]
    pub fn is_warning_threshold(err: &anyhow::Error) -> bool {
        Self::find(err).is_some_and(|e| e.code() == ErrorCode::WarningThresholdExceeded)
    }
}
