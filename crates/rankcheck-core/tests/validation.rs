use proptest::collection::vec;
use proptest::prelude::*;
use rankcheck_core::graph::{Graph, validate};
use rankcheck_core::{ErrorCode, RankError};

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

fn edges(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    Graph::from_pairs(pairs).edges
}

#[test]
fn rejects_duplicate_edges() {
    let g = Graph::from_pairs(&[("A", "B"), ("B", "A"), ("A", "B")]);
    let err = validate(&g, 0.85).expect_err("duplicate edge");
    assert_eq!(err, RankError::DuplicateEdges { count: 1 });
    assert_eq!(err.code(), ErrorCode::Structure);
}

#[test]
fn self_loop_and_reverse_edge_are_not_duplicates() {
    let g = Graph::from_pairs(&[("A", "A"), ("A", "B"), ("B", "A")]);
    assert!(validate(&g, 0.85).is_ok());
}

#[test]
fn rejects_dangling_label() {
    let g = Graph::with_labels(edges(&[("A", "B"), ("B", "A")]), labels(&["A", "B", "C"]));
    match validate(&g, 0.85).expect_err("dangling label") {
        RankError::LabelMismatch {
            declared,
            referenced,
            dangling,
            missing,
        } => {
            assert_eq!((declared, referenced), (3, 2));
            assert_eq!(dangling, vec!["C"]);
            assert!(missing.is_empty());
        }
        other => panic!("expected label mismatch, got {other:?}"),
    }
}

#[test]
fn same_size_but_different_label_set_is_rejected() {
    let g = Graph::with_labels(edges(&[("A", "B"), ("B", "A")]), labels(&["A", "Z"]));
    assert!(matches!(
        validate(&g, 0.85),
        Err(RankError::LabelMismatch { .. })
    ));
}

#[test]
fn structure_errors_come_before_range_errors() {
    let g = Graph::from_pairs(&[("A", "B"), ("A", "B")]);
    assert_eq!(
        validate(&g, 2.0).expect_err("invalid").code(),
        ErrorCode::Structure
    );
}

#[test]
fn damping_out_of_range_is_a_range_error() {
    let g = Graph::from_pairs(&[("A", "B"), ("B", "A")]);
    let err = validate(&g, 1.5).expect_err("damping too large");
    assert_eq!(err.code(), ErrorCode::Range);
    assert!(err.to_string().contains("[0,1)"));
}

fn arb_graph() -> impl Strategy<Value = Graph> {
    vec((0_u8..12, 0_u8..12), 1..40).prop_map(|pairs| {
        let mut seen = std::collections::HashSet::new();
        Graph::new(
            pairs
                .into_iter()
                .filter(|p| seen.insert(*p))
                .map(|(s, t)| (format!("#{s}"), format!("#{t}")))
                .collect(),
        )
    })
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(500))]

    #[test]
    fn validation_is_idempotent(g in arb_graph(), damping in 0.0_f64..1.0) {
        let before = g.clone();
        let first = validate(&g, damping).expect("valid");
        prop_assert_eq!(&g, &before);

        let again = Graph::with_labels(g.edges.clone(), first.labels().to_vec());
        let second = validate(&again, damping).expect("still valid");
        prop_assert_eq!(first.labels(), second.labels());
        prop_assert_eq!(first.edges(), second.edges());
    }

    #[test]
    fn degrees_account_for_every_edge(g in arb_graph()) {
        let v = validate(&g, 0.85).expect("valid");
        let out: usize = v.node_ids().into_iter().map(|id| v.out_degree(id)).sum();
        let inc: usize = v.node_ids().into_iter().map(|id| v.in_degree(id)).sum();
        prop_assert_eq!(out, g.edges.len());
        prop_assert_eq!(inc, g.edges.len());
    }
}
