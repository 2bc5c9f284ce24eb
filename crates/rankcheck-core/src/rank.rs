//! Fixed-point rank vectors and their iteration histories.
//!
//! A [`RankVector`] holds one Q1.30 rank per node id. Two vectors are
//! compared by the L1 distance of their raw bits, and a run has converged
//! once that distance drops below `node_count * tolerance`
//! ([`convergence_threshold_bits`]). [`RankHistory::settle`] applies the same
//! rule to a backend's recorded series and freezes it at the first
//! converged row.

use serde::{Deserialize, Serialize};

use crate::fixed::FixedPoint;

/// One iteration's rank state, indexed by node id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankVector(Vec<FixedPoint>);

impl RankVector {
    #[must_use]
    pub const fn new(values: Vec<FixedPoint>) -> Self {
        Self(values)
    }

    /// Every node set to `value`.
    #[must_use]
    pub fn uniform(len: usize, value: FixedPoint) -> Self {
        Self(vec![value; len])
    }

    /// Convert float ranks, rounding each to fixed point.
    ///
    /// # Errors
    ///
    /// Fails if any value is out of the fixed-point range.
    pub fn from_f64s(values: &[f64]) -> Result<Self, crate::fixed::FixedPointError> {
        values
            .iter()
            .map(|&v| FixedPoint::from_f64(v))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FixedPoint> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[FixedPoint] {
        &self.0
    }

    /// Saturating fixed-point sum of all entries.
    #[must_use]
    pub fn sum(&self) -> FixedPoint {
        self.0.iter().sum()
    }

    #[must_use]
    pub fn to_f64(&self) -> Vec<f64> {
        self.0.iter().map(|v| v.to_f64()).collect()
    }

    /// L1 distance to `other` in raw units.
    ///
    /// Accumulated in 64 bits so large graphs cannot overflow the sum.
    #[must_use]
    pub fn l1_distance_bits(&self, other: &Self) -> u64 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.abs_diff_bits(*b))
            .sum()
    }
}

impl std::ops::Index<usize> for RankVector {
    type Output = FixedPoint;

    fn index(&self, id: usize) -> &FixedPoint {
        &self.0[id]
    }
}

impl<'a> IntoIterator for &'a RankVector {
    type Item = &'a FixedPoint;
    type IntoIter = std::slice::Iter<'a, FixedPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<FixedPoint> for RankVector {
    fn from_iter<I: IntoIterator<Item = FixedPoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Convergence threshold for `node_count` nodes: `node_count * tolerance`,
/// in raw units.
#[must_use]
pub fn convergence_threshold_bits(node_count: usize, tolerance: FixedPoint) -> u64 {
    let n = u64::try_from(node_count).unwrap_or(u64::MAX);
    let tol = u64::try_from(tolerance.to_bits()).unwrap_or(0);
    n.saturating_mul(tol)
}

/// Iteration time series as observed by a backend.
///
/// Row 0 is the initial state; row `i` is the state after `i` iterations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankHistory {
    rows: Vec<RankVector>,
}

impl RankHistory {
    #[must_use]
    pub const fn new(rows: Vec<RankVector>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[RankVector] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Final row.
    #[must_use]
    pub fn last(&self) -> Option<&RankVector> {
        self.rows.last()
    }

    /// Find the first converged row and freeze the series there.
    ///
    /// Row `i` has converged when its L1 distance to row `i - 1` is below
    /// `node_count * tolerance`. Every later row is overwritten with row `i`
    /// and `i` is returned. If no row converges the history is left as is
    /// and its length is returned.
    pub fn settle(&mut self, tolerance: FixedPoint) -> usize {
        let Some(first) = self.rows.first() else {
            return 0;
        };
        let threshold = convergence_threshold_bits(first.len(), tolerance);

        let converged_at = self
            .rows
            .windows(2)
            .position(|pair| pair[1].l1_distance_bits(&pair[0]) < threshold)
            .map(|i| i + 1);

        let Some(index) = converged_at else {
            return self.rows.len();
        };

        let settled = self.rows[index].clone();
        for row in &mut self.rows[index + 1..] {
            row.clone_from(&settled);
        }
        index
    }
}

impl From<Vec<RankVector>> for RankHistory {
    fn from(rows: Vec<RankVector>) -> Self {
        Self::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[f64]) -> RankVector {
        RankVector::from_f64s(values).expect("in range")
    }

    #[test]
    fn l1_distance_sums_absolute_differences() {
        let a = RankVector::new(vec![FixedPoint::from_bits(10), FixedPoint::from_bits(-5)]);
        let b = RankVector::new(vec![FixedPoint::from_bits(3), FixedPoint::from_bits(5)]);
        assert_eq!(a.l1_distance_bits(&b), 17);
    }

    #[test]
    fn threshold_scales_with_node_count() {
        assert_eq!(convergence_threshold_bits(4, FixedPoint::from_bits(10)), 40);
        assert_eq!(convergence_threshold_bits(4, FixedPoint::from_bits(-1)), 0);
    }

    #[test]
    fn settle_freezes_rows_after_convergence() {
        let mut history = RankHistory::new(vec![
            row(&[0.5, 0.5]),
            row(&[0.3, 0.7]),
            row(&[0.3, 0.7]),
            row(&[0.31, 0.69]),
        ]);
        let tol = FixedPoint::from_f64(1e-5).expect("tol");
        assert_eq!(history.settle(tol), 2);
        assert_eq!(history.rows()[3], row(&[0.3, 0.7]));
    }

    #[test]
    fn settle_reports_length_without_convergence() {
        let mut history = RankHistory::new(vec![row(&[0.5, 0.5]), row(&[0.4, 0.6])]);
        let tol = FixedPoint::from_f64(1e-5).expect("tol");
        assert_eq!(history.settle(tol), 2);
        assert_eq!(history.last(), Some(&row(&[0.4, 0.6])));
    }

    #[test]
    fn settle_on_empty_history_is_zero() {
        assert_eq!(RankHistory::default().settle(FixedPoint::ONE), 0);
    }
}
