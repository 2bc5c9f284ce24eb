//! Fixed-point reference engine against a floating-point PageRank.
//!
//! # Test Strategy
//!
//! 1. Generate seeded random graphs in which every node has an outgoing edge.
//! 2. Run the fixed-point reference to convergence.
//! 3. Run the same power iteration in `f64` to a much tighter tolerance.
//! 4. Assert the two agree within the comparison tolerance.
//!
//! # Epsilon
//!
//! Truncating every packet to the payload width biases each node low by a
//! few units of `2^-30` per incoming edge, and the stopping rule leaves a
//! residual of order `N * tolerance`. The parity runs therefore converge the
//! reference at `1e-7` and compare at `5e-5`.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rankcheck_core::compare::compare_ranks;
use rankcheck_core::fixed::FixedPoint;
use rankcheck_core::graph::{Graph, validate};
use rankcheck_core::reference::{ReferenceConfig, ReferenceEngine, reference_pagerank};
use rankcheck_core::{ErrorCode, RankError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const PARITY_TOLERANCE: f64 = 1e-7;
const PARITY_EPSILON: f64 = 5e-5;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Plain `f64` power iteration with the same update rule and no truncation.
fn float_pagerank(n: usize, edges: &[(usize, usize)], damping: f64) -> Vec<f64> {
    let mut out_degree = vec![0_usize; n];
    for &(s, _) in edges {
        out_degree[s] += 1;
    }

    let mut ranks = vec![1.0 / n as f64; n];
    for _ in 0..100_000 {
        let mut acc = vec![0.0; n];
        for &(s, t) in edges {
            acc[t] += ranks[s] / out_degree[s] as f64;
        }
        let next: Vec<f64> = acc
            .iter()
            .map(|a| (1.0 - damping) / n as f64 + damping * a)
            .collect();
        let err: f64 = next.iter().zip(&ranks).map(|(a, b)| (a - b).abs()).sum();
        ranks = next;
        if err < 1e-14 {
            break;
        }
    }
    ranks
}

/// Random graph where every node has at least one outgoing edge.
fn random_edges(seed: u64, n: usize, m: usize) -> Vec<(usize, usize)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::new();
    let mut edges = Vec::with_capacity(m);

    for s in 0..n {
        let t = rng.gen_range(0..n);
        seen.insert((s, t));
        edges.push((s, t));
    }
    while edges.len() < m {
        let e = (rng.gen_range(0..n), rng.gen_range(0..n));
        if seen.insert(e) {
            edges.push(e);
        }
    }
    edges
}

fn labelled(edges: &[(usize, usize)]) -> Graph {
    Graph::new(
        edges
            .iter()
            .map(|(s, t)| (format!("#{s}"), format!("#{t}")))
            .collect(),
    )
}

fn four_node_example() -> Graph {
    Graph::from_pairs(&[
        ("A", "B"),
        ("A", "C"),
        ("B", "D"),
        ("C", "A"),
        ("C", "B"),
        ("C", "D"),
        ("D", "C"),
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn four_node_example_matches_float_pagerank() {
    let damping = 1.0 - 1e-10;
    let graph = validate(&four_node_example(), damping).expect("valid");
    let config = ReferenceConfig {
        damping,
        ..ReferenceConfig::default()
    };
    let result = reference_pagerank(&graph, &config).expect("converges");
    assert!(result.iterations <= config.max_iter);

    let computed = result.ranks.to_f64();
    let expected = float_pagerank(4, graph.edges(), damping);
    // Stationary distribution of the undamped chain.
    for (e, want) in expected.iter().zip([0.125, 0.1875, 0.375, 0.3125]) {
        assert!((e - want).abs() < 1e-6, "float {e} vs {want}");
    }

    let cmp = compare_ranks(&computed, &expected, config.tolerance).expect("same length");
    assert!(cmp.is_correct, "computed {computed:?} vs expected {expected:?}");
}

#[test]
fn sink_node_leaks_rank() {
    // B has no outgoing edge, so the mass it receives never re-enters.
    let graph = validate(&Graph::from_pairs(&[("A", "B")]), 0.85).expect("valid");
    let result = reference_pagerank(&graph, &ReferenceConfig::default()).expect("converges");
    let ranks = result.ranks.to_f64();

    let teleport = 0.15 / 2.0;
    let expected = [teleport, teleport + 0.85 * teleport];
    let cmp = compare_ranks(&ranks, &expected, 1e-5).expect("same length");
    assert!(cmp.is_correct, "ranks {ranks:?} vs {expected:?}");

    let total: f64 = ranks.iter().sum();
    assert!((1.0 - total - 0.786_25).abs() < 1e-5, "total {total}");
}

#[test]
fn random_graphs_match_float_pagerank() {
    for seed in 0..20_u64 {
        let n = 10 + (seed as usize % 5) * 10;
        let edges = random_edges(seed, n, n * 3);
        let graph = validate(&labelled(&edges), 0.85).expect("valid");

        let config = ReferenceConfig {
            tolerance: PARITY_TOLERANCE,
            max_iter: 1000,
            ..ReferenceConfig::default()
        };
        let result = reference_pagerank(&graph, &config).expect("converges");
        let expected = float_pagerank(n, graph.edges(), 0.85);

        let cmp = compare_ranks(&result.ranks.to_f64(), &expected, PARITY_EPSILON)
            .expect("same length");
        assert!(
            cmp.is_correct,
            "seed {seed}: mismatched nodes {:?}",
            cmp.mismatched
        );
    }
}

#[test]
fn generated_graph_ranks_sum_to_one() {
    for seed in 100..110_u64 {
        let edges = random_edges(seed, 50, 200);
        let graph = validate(&labelled(&edges), 0.85).expect("valid");
        let result = reference_pagerank(&graph, &ReferenceConfig::default()).expect("converges");
        let total = result.ranks.sum().to_f64();
        assert!((total - 1.0).abs() < 1e-4, "seed {seed}: sum {total}");
    }
}

#[test]
fn small_budget_reports_no_convergence() {
    let graph = validate(&four_node_example(), 0.85).expect("valid");
    let config = ReferenceConfig {
        max_iter: 2,
        ..ReferenceConfig::default()
    };
    let err = reference_pagerank(&graph, &config).expect_err("budget too small");
    assert_eq!(err, RankError::NoConvergence { max_iter: 2 });
    assert!(err.code().is_regenerable());
    assert_eq!(err.code(), ErrorCode::NoConvergence);
}

#[test]
fn every_step_output_has_clear_payload_bits_before_damping() {
    // With damping factor 1 and no teleport, the next vector is exactly the
    // sum of truncated packets, so the low header bits are always zero.
    let edges = random_edges(7, 12, 30);
    let engine = ReferenceEngine::from_edges(
        12,
        &edges,
        rankcheck_core::DampingTerms {
            factor: FixedPoint::ONE,
            sum: FixedPoint::ZERO,
        },
    );
    let mut ranks = engine.initial_ranks();
    for _ in 0..5 {
        ranks = engine.step(&ranks);
        assert!(ranks.iter().all(|r| r.to_bits() & 0b11 == 0));
    }
}

#[test]
fn history_settles_at_converged_iteration() {
    let graph = validate(&four_node_example(), 0.85).expect("valid");
    let engine = ReferenceEngine::new(&graph, 0.85).expect("engine");
    let result = engine.converge(1e-5, 100).expect("converges");

    let mut history = rankcheck_core::RankHistory::new(engine.history(result.iterations + 5));
    let tol = FixedPoint::from_f64(1e-5).expect("tol");
    assert_eq!(history.settle(tol), result.iterations);
    assert_eq!(history.last(), Some(&result.ranks));
}
