//! Property tests for the coupling engine and the graph heuristics.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use chronoscope_core::{Revision, SourceNode, StructuralEdit};
use chronoscope_coupling::{
    find_anti_blob, find_blobs, Edge, Graph, HistoryAnalyzer, Node, TemporalContext,
};
use proptest::prelude::*;

const FILES: [&str; 3] = ["a.rs", "b.rs", "c.rs"];

#[derive(Debug, Clone)]
enum Op {
    Add(usize),
    Edit(usize),
    Remove(usize),
}

fn entity(i: usize) -> String {
    format!("{}#f{}()", FILES[i % FILES.len()], i / FILES.len())
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => (0..9usize).prop_map(Op::Add),
        6 => (0..9usize).prop_map(Op::Edit),
        1 => (0..9usize).prop_map(Op::Remove),
    ]
}

fn history() -> impl Strategy<Value = Vec<Vec<Op>>> {
    prop::collection::vec(prop::collection::vec(op(), 0..6), 0..25)
}

fn to_revision(n: usize, ops: &[Op]) -> Revision {
    let edits = ops
        .iter()
        .map(|op| match *op {
            Op::Add(i) => {
                let id = entity(i);
                let signature = id.split_once('#').map_or("", |(_, s)| s).to_string();
                StructuralEdit::AddNode {
                    id: id.parse().unwrap(),
                    node: SourceNode::function(&signature),
                }
            }
            Op::Edit(i) => StructuralEdit::EditEntity { id: entity(i).parse().unwrap() },
            Op::Remove(i) => StructuralEdit::RemoveNode { id: entity(i).parse().unwrap() },
        })
        .collect();
    Revision {
        id: format!("r{n}"),
        date: Utc::now(),
        author: "prop".into(),
        edits,
    }
}

fn analyze(ops: &[Vec<Op>], max_change_set: usize) -> TemporalContext {
    let revisions = ops.iter().enumerate().map(|(n, ops)| to_revision(n, ops));
    HistoryAnalyzer::new(max_change_set, 1, 0.0)
        .unwrap()
        .analyze(revisions)
        .unwrap()
}

fn graph() -> impl Strategy<Value = Graph> {
    (1..14usize)
        .prop_flat_map(|n| {
            let edges = prop::collection::vec((0..n, 0..n, 0.0..=1.0f64), 0..40);
            (Just(n), edges)
        })
        .prop_map(|(n, raw)| {
            let label = |i: usize| format!("n{i:02}");
            let mut edges = BTreeMap::new();
            for (a, b, coupling) in raw {
                if a != b {
                    edges.insert((a.min(b), a.max(b)), coupling);
                }
            }
            Graph {
                label: "g".into(),
                nodes: (0..n)
                    .map(|i| Node { label: label(i), revisions: 1 })
                    .collect(),
                edges: edges
                    .into_iter()
                    .map(|((a, b), coupling)| Edge {
                        source: label(a),
                        target: label(b),
                        revisions: 1,
                        coupling,
                    })
                    .collect(),
            }
        })
}

proptest! {
    /// Property: coupling is symmetric and within [0, 1].
    #[test]
    fn prop_coupling_symmetric_and_bounded(ops in history(), max_change_set in 1..4usize) {
        let ctx = analyze(&ops, max_change_set);
        for (a, b, coupling) in ctx.cells() {
            prop_assert_eq!(coupling, ctx.coupling(b, a));
            prop_assert!((0.0..=1.0).contains(&coupling));
            let joint = ctx.joint_change_count(a, b);
            prop_assert!(joint <= ctx.change_count(a).min(ctx.change_count(b)));
        }
    }

    /// Property: filtering twice with the same thresholds is a no-op.
    #[test]
    fn prop_filter_idempotent(
        ops in history(),
        min_revisions in 1..4u32,
        min_coupling in 0.0..=1.0f64,
    ) {
        let once = analyze(&ops, 100).filter(min_revisions, min_coupling);
        let twice = once.filter(min_revisions, min_coupling);
        prop_assert_eq!(once.entity_ids(), twice.entity_ids());
        prop_assert_eq!(once.coupled_pairs(None), twice.coupled_pairs(None));
        for id in once.entity_ids() {
            prop_assert!(once.change_count(id) >= min_revisions);
        }
    }

    /// Property: change counts never decrease, except for removed entities.
    #[test]
    fn prop_change_counts_monotonic(ops in history()) {
        let mut analyzer = HistoryAnalyzer::new(100, 1, 0.0).unwrap();
        for (n, revision_ops) in ops.iter().enumerate() {
            let before: Vec<u32> = (0..9).map(|i| analyzer.change_count(&entity(i))).collect();
            analyzer.process(&to_revision(n, revision_ops)).unwrap();
            for (i, &count) in before.iter().enumerate() {
                let removed = revision_ops.iter().any(|op| matches!(op, Op::Remove(r) if *r == i));
                if !removed {
                    prop_assert!(analyzer.change_count(&entity(i)) >= count);
                }
            }
        }
    }

    /// Property: blobs are disjoint and at least as dense as required.
    #[test]
    fn prop_blobs_dense_and_disjoint(g in graph(), min_density in 0.0..3.0f64) {
        let blobs = find_blobs(&g, min_density).unwrap();
        let mut seen = BTreeSet::new();
        for blob in &blobs {
            prop_assert!(blob.density >= min_density);
            prop_assert!(!blob.nodes.is_empty());
            for node in &blob.nodes {
                prop_assert!(seen.insert(node.clone()), "{} in two blobs", node);
            }
        }
    }

    /// Property: the anti-blob is large enough and only holds weak nodes.
    #[test]
    fn prop_anti_blob_respects_thresholds(
        g in graph(),
        max_coupling in 0.0..2.0f64,
        min_size in 1..6usize,
    ) {
        let degrees = g.degrees();
        if let Some(anti) = find_anti_blob(&g, max_coupling, min_size).unwrap() {
            prop_assert!(anti.size() >= min_size);
            for node in &anti.nodes {
                prop_assert!(degrees[node.as_str()] <= max_coupling);
            }
        }
    }
}
