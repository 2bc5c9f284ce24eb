//! rankcheck-core library.
//!
//! Fixed-point arithmetic, graph validation and the reference PageRank the
//! hardware results are checked against.
//!
//! # Conventions
//!
//! - **Errors**: typed [`error::RankError`] values from this crate; callers
//!   that talk to a backend wrap them in `anyhow::Error`.
//! - **Logging**: Use `tracing` macros (`debug!`, `trace!`).

pub mod compare;
pub mod error;
pub mod fixed;
pub mod graph;
pub mod rank;
pub mod reference;

pub use compare::{Comparison, compare_ranks};
pub use error::{ErrorCode, RankError};
pub use fixed::{FixedPoint, FixedPointError};
pub use graph::{Graph, ValidatedGraph, validate};
pub use rank::{RankHistory, RankVector};
pub use reference::{
    DampingTerms, ReferenceConfig, ReferenceEngine, ReferenceResult, reference_pagerank,
};
