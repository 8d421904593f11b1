//! Integration test: persisted history → analyzer → graphs → smell reports.

use std::io::Write;

use chrono::{TimeZone, Utc};
use chronoscope_core::{
    load_history, write_history, ChronoscopeError, DivergentChangeConfig, FeatureEnvyConfig,
    HistoryReader, Revision, SourceNode, StructuralEdit,
};
use chronoscope_coupling::{
    aggregate_graphs, find_feature_envy, DivergentChangeAnalysis, FeatureEnvyAnalysis,
    HistoryAnalyzer,
};

fn revision(n: u32, edits: Vec<StructuralEdit>) -> Revision {
    Revision {
        id: format!("r{n}"),
        date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, n).unwrap(),
        author: "alice".into(),
        edits,
    }
}

fn edit(id: &str) -> StructuralEdit {
    StructuralEdit::EditEntity { id: id.parse().unwrap() }
}

fn add(id: &str) -> StructuralEdit {
    let (_, signature) = id.split_once('#').unwrap();
    StructuralEdit::AddNode {
        id: id.parse().unwrap(),
        node: SourceNode::function(signature),
    }
}

fn analyzer() -> HistoryAnalyzer {
    HistoryAnalyzer::new(100, 1, 0.0).unwrap()
}

#[test]
fn basic_coupling() {
    let history = vec![
        revision(1, vec![add("src/a.rs#A()"), add("src/a.rs#B()")]),
        revision(2, vec![edit("src/a.rs#A()"), edit("src/a.rs#B()")]),
        revision(3, vec![edit("src/a.rs#A()")]),
    ];
    let ctx = analyzer().analyze(history).unwrap();
    assert_eq!(ctx.change_count("src/a.rs#A()"), 3);
    assert_eq!(ctx.change_count("src/a.rs#B()"), 2);
    assert_eq!(ctx.joint_change_count("src/a.rs#A()", "src/a.rs#B()"), 2);
    let coupling = ctx.coupling("src/a.rs#A()", "src/a.rs#B()");
    assert!((coupling - 2.0 / 3.0).abs() < 1e-9, "coupling = {coupling}");
}

#[test]
fn bulk_revision_contributes_no_joint_changes() {
    let mut bulk: Vec<StructuralEdit> = (0..198)
        .map(|i| edit(&format!("gen/f{i}.rs#run()")))
        .collect();
    bulk.push(edit("a.rs#A()"));
    bulk.push(edit("b.rs#B()"));

    let history = vec![
        revision(1, vec![add("a.rs#A()"), add("b.rs#B()")]),
        revision(2, bulk),
        revision(3, vec![edit("a.rs#A()"), edit("b.rs#B()")]),
        revision(4, vec![edit("a.rs#A()")]),
    ];
    let ctx = analyzer().analyze(history).unwrap();
    assert_eq!(ctx.change_count("a.rs#A()"), 4);
    assert_eq!(ctx.change_count("b.rs#B()"), 3);
    assert_eq!(ctx.joint_change_count("a.rs#A()", "b.rs#B()"), 2);
    assert_eq!(ctx.change_count("gen/f0.rs#run()"), 1);
    assert_eq!(ctx.coupling("gen/f0.rs#run()", "a.rs#A()"), 0.0);
}

#[test]
fn removal_clears_history() {
    let history = vec![
        revision(1, vec![add("a.rs#A()")]),
        revision(2, vec![add("a.rs#B()")]),
        revision(3, vec![edit("a.rs#A()"), edit("a.rs#B()")]),
        revision(4, vec![StructuralEdit::RemoveNode { id: "a.rs#A()".parse().unwrap() }]),
    ];
    let ctx = analyzer().analyze(history).unwrap();
    assert_eq!(ctx.change_count("a.rs#A()"), 0);
    assert_eq!(ctx.joint_change_count("a.rs#A()", "a.rs#B()"), 0);
    assert!(!ctx.contains("a.rs#A()"));
}

#[test]
fn feature_envy_of_foreign_file() {
    // coupling(F, G) = 1/5 inside x.rs, coupling(F, H) = 4/5 with y.rs.
    let mut history = vec![revision(1, vec![edit("x.rs#F()"), edit("x.rs#G()"), edit("y.rs#H()")])];
    for n in 2..5 {
        history.push(revision(n, vec![edit("x.rs#F()"), edit("y.rs#H()")]));
    }
    history.push(revision(5, vec![edit("x.rs#F()")]));
    let ctx = analyzer().analyze(history).unwrap();
    assert!((ctx.coupling("x.rs#F()", "x.rs#G()") - 0.2).abs() < 1e-12);
    assert!((ctx.coupling("x.rs#F()", "y.rs#H()") - 0.8).abs() < 1e-12);

    let envy = find_feature_envy(&ctx, 1.0, 1).unwrap();
    let f = envy.iter().find(|e| e.function == "x.rs#F()").unwrap();
    assert_eq!(f.envied_file, "y.rs");
    assert!((f.self_coupling - 0.2).abs() < 1e-12);
    assert!((f.envied_coupling - 0.8).abs() < 1e-12);
}

#[test]
fn jsonl_history_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.jsonl");

    let mut history = vec![revision(
        0,
        vec![StructuralEdit::AddNode {
            id: "src/shop.rs".parse().unwrap(),
            node: SourceNode::File {
                path: "src/shop.rs".into(),
                entities: vec![
                    SourceNode::type_with(
                        "Cart",
                        vec![SourceNode::function("add(Item)"), SourceNode::function("total()")],
                    ),
                    SourceNode::function("render()"),
                    SourceNode::function("style()"),
                ],
            },
        }],
    )];
    for n in 1..=3 {
        history.push(revision(
            n,
            vec![edit("src/shop.rs:Cart#add(Item)"), edit("src/shop.rs:Cart#total()")],
        ));
        history.push(revision(
            n + 10,
            vec![edit("src/shop.rs#render()"), edit("src/shop.rs#style()")],
        ));
    }
    let file = std::fs::File::create(&path).unwrap();
    write_history(file, &history).unwrap();

    let ctx = HistoryAnalyzer::new(100, 2, 0.1)
        .unwrap()
        .analyze_history(load_history(&path).unwrap())
        .unwrap();
    assert_eq!(ctx.len(), 4);
    assert_eq!(ctx.pairs().count(), 2);

    let graphs = aggregate_graphs(&ctx);
    assert_eq!(graphs.len(), 1);
    assert_eq!(graphs[0].label, "src/shop.rs");
    assert_eq!(graphs[0].edges.len(), 2);

    let config = DivergentChangeConfig {
        min_blob_density: 1.0,
        ..DivergentChangeConfig::default()
    };
    let report = DivergentChangeAnalysis::new(config)
        .unwrap()
        .analyze(&ctx)
        .unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].responsibilities, 2);
    let json = serde_json::to_value(&report.files).unwrap();
    assert_eq!(json[0]["category"], "SOLID Breakers");
    assert_eq!(json[0]["value"], 2);

    let envy = FeatureEnvyAnalysis::new(FeatureEnvyConfig::default())
        .unwrap()
        .analyze(&ctx)
        .unwrap();
    assert!(envy.files.is_empty());
}

#[test]
fn history_errors_stop_the_analysis() {
    let mut input = Vec::new();
    writeln!(
        input,
        r#"{{"id":"r1","date":"2024-01-01T00:00:00Z","author":"a","edits":[{{"type":"editEntity","id":"a.rs#f()"}}]}}"#
    )
    .unwrap();
    writeln!(input, "{{ broken").unwrap();

    let err = analyzer()
        .analyze_history(HistoryReader::new(input.as_slice()))
        .unwrap_err();
    assert!(matches!(err, ChronoscopeError::History { line: 2, .. }));
}
