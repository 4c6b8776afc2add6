use super::*;
use crate::chunk::{ChunkId, ChunkInput, ChunkKind, SourceLocation};
use crate::config::PipelineConfig;
use crate::embedding::mock::{FixedEmbedder, FnCrossEncoder, UnavailableCrossEncoder};
use crate::embedding::{BertEmbedder, CrossEncoder, Embedder};
use crate::selector::mock::FixedSelector;
use crate::selector::{SelectionOutcome, Selector, TopRankSelector};
use crate::store::{ChunkStore, IndexPolicy};

fn function(symbol: &str, path: &str) -> ChunkInput {
    ChunkInput {
        id: ChunkId::new(symbol),
        text: format!("pub fn {symbol}() {{}}"),
        kind: ChunkKind::Function {
            symbol: symbol.to_string(),
            signature: format!("pub fn {symbol}()"),
        },
        doc: None,
        location: SourceLocation::new(path, 1, 1),
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        use_query_expansion: false,
        use_file_summary_chunks: false,
        rerank_workers: 2,
        eval_workers: 3,
        ..PipelineConfig::default()
    }
}

fn overlap_encoder() -> Arc<dyn CrossEncoder> {
    Arc::new(FnCrossEncoder::new(|query: &str, text: &str| {
        query
            .split_whitespace()
            .filter(|word| text.contains(*word))
            .count() as f32
    }))
}

fn pipeline_with(
    encoder: Arc<dyn CrossEncoder>,
    selector: Arc<dyn Selector>,
) -> Arc<RetrievalPipeline> {
    let config = config();
    let embedder: Arc<dyn Embedder> = Arc::new(BertEmbedder::stub(16).unwrap());
    let store = ChunkStore::build(
        vec![
            function("create_user", "src/users.rs"),
            function("delete_user", "src/users.rs"),
            function("send_email", "src/mail.rs"),
            function("render_page", "src/web.rs"),
        ],
        embedder.as_ref(),
        IndexPolicy::from(&config),
    )
    .unwrap();
    Arc::new(RetrievalPipeline::new(config, store, embedder, encoder, selector).unwrap())
}

fn pipeline() -> Arc<RetrievalPipeline> {
    pipeline_with(overlap_encoder(), Arc::new(FixedSelector::default()))
}

fn record(truth: GroundTruth, ranked: &[&str], selection: SelectionOutcome) -> EvaluationRecord {
    EvaluationRecord {
        index: 0,
        query: "q".to_string(),
        truth,
        ranked: ranked.iter().map(|id| ChunkId::new(*id)).collect(),
        trace: StageTrace::default(),
        selection,
        pipeline_error: None,
        latency_ms: 10,
    }
}

fn truth(id: &str) -> GroundTruth {
    GroundTruth::Chunk(ChunkId::new(id))
}

#[test]
fn test_parse_dataset_reads_both_question_kinds() {
    let cases = parse_dataset(
        r#"{ "questions": [
            { "query": "where are users created?", "chunk_id": "create_user" },
            { "question": "where is billing?", "exists": false, "chunk_id": "billing" },
            { "question": "where is the removed helper?", "deleted": true, "chunk_id": "helper" },
            { "query": "where is auditing?" },
            { "query": "blank id", "chunk_id": "  " }
        ] }"#,
    )
    .unwrap();

    assert_eq!(cases.len(), 5);
    assert_eq!(cases[0], EvaluationCase::answerable("where are users created?", "create_user"));
    assert!(cases[1..].iter().all(|c| c.truth.is_no_answer()));
    assert_eq!(cases[1].query, "where is billing?");
}

#[test]
fn test_parse_dataset_rejects_empty_query() {
    let err = parse_dataset(r#"{ "questions": [ { "query": "ok" }, { "query": "  " } ] }"#)
        .unwrap_err();
    assert!(matches!(err, EvalError::EmptyQuery { index: 1 }));
}

#[test]
fn test_parse_dataset_rejects_malformed_json() {
    assert!(matches!(
        parse_dataset(r#"{ "items": [] }"#).unwrap_err(),
        EvalError::Parse(_)
    ));
}

#[test]
fn test_load_dataset_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_dataset(&dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, EvalError::ReadDataset { .. }));
}

#[test]
fn test_rank_at_k_for_truth_at_rank_three() {
    let r = record(truth("X"), &["A", "B", "X", "C"], SelectionOutcome::no_match());
    assert_eq!(r.rank_of_truth(), Some(3));
    assert!(!r.hit_at(1));
    assert!(r.hit_at(5));
    assert!((r.reciprocal_rank() - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_missing_truth_never_hits() {
    let r = record(truth("X"), &["A", "B"], SelectionOutcome::no_match());
    assert_eq!(r.rank_of_truth(), None);
    assert!(!r.hit_at(40));
    assert_eq!(r.reciprocal_rank(), 0.0);
}

#[test]
fn test_hallucination_flags() {
    let asserted = SelectionOutcome::chunk(0, ChunkId::new("A"));
    assert!(record(GroundTruth::NoAnswer, &["A"], asserted.clone()).is_hallucination());
    assert!(!record(truth("A"), &["A"], asserted).is_hallucination());

    let deep = SelectionOutcome::chunk(6, ChunkId::new("G"));
    assert!(record(truth("A"), &["A"], deep).is_hallucination());
    let shallow_wrong = SelectionOutcome::chunk(2, ChunkId::new("C"));
    assert!(!record(truth("A"), &["A"], shallow_wrong).is_hallucination());

    let refusal = record(GroundTruth::NoAnswer, &["A"], SelectionOutcome::no_match());
    assert!(!refusal.is_hallucination());
    assert!(refusal.is_correct_refusal());

    let failed = record(GroundTruth::NoAnswer, &["A"], SelectionOutcome::failed("timeout"));
    assert!(!failed.is_hallucination());
    assert!(!failed.is_correct_refusal());
    assert!(failed.is_selector_failure());
}

#[test]
fn test_metrics_keep_failures_out_of_denominators() {
    let records = vec![
        record(truth("A"), &["A", "B"], SelectionOutcome::chunk(0, ChunkId::new("A"))),
        record(truth("B"), &["A", "C", "B"], SelectionOutcome::chunk(0, ChunkId::new("A"))),
        record(GroundTruth::NoAnswer, &["A"], SelectionOutcome::chunk(0, ChunkId::new("A"))),
        record(GroundTruth::NoAnswer, &["A"], SelectionOutcome::no_match()),
        EvaluationRecord::failed(4, "q", truth("A"), "re-ranker unavailable", 5),
    ];
    let m = Metrics::compute(&records);

    assert_eq!(m.total, 5);
    assert_eq!(m.answerable, 2);
    assert_eq!(m.unanswerable, 2);
    assert_eq!(m.rank_at_k(1), Some(0.5));
    assert_eq!(m.rank_at_k(5), Some(1.0));
    assert_eq!(m.rank_at_k(2), None);
    assert!((m.mrr - (1.0 + 1.0 / 3.0) / 2.0).abs() < 1e-12);
    assert_eq!(m.selection_accuracy, 0.5);
    assert_eq!(m.hallucination_rate, 0.5);
    assert_eq!(m.correct_refusal_rate, 0.5);
    assert_eq!(m.hallucinations, 1);
    assert_eq!(m.pipeline_failures, 1);
    assert_eq!(m.selector_failures, 0);
    assert!((m.mean_latency_ms - 9.0).abs() < 1e-12);
}

#[test]
fn test_metrics_of_nothing_are_zero() {
    let m = Metrics::compute(&[]);
    assert_eq!(m.total, 0);
    assert_eq!(m.mrr, 0.0);
    assert_eq!(m.hallucination_rate, 0.0);
    assert_eq!(m.rank_at_k(1), Some(0.0));
}

#[tokio::test]
async fn test_run_scores_every_question_in_dataset_order() {
    let evaluator = Evaluator::new(pipeline());
    assert_eq!(evaluator.workers(), 3);

    let cases = vec![
        EvaluationCase::answerable("create_user", "create_user"),
        EvaluationCase::answerable("send_email", "send_email"),
        EvaluationCase::unanswerable("billing invoices"),
        EvaluationCase::answerable("render_page", "render_page"),
    ];
    let report = evaluator.run(&cases, &CancellationToken::new()).await.unwrap();

    let indices: Vec<_> = report.records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(report.metrics.rank_at_k(1), Some(1.0));
    assert_eq!(report.metrics.selection_accuracy, 1.0);
    // The fixed selector always asserts rank 1.
    assert_eq!(report.metrics.hallucination_rate, 1.0);
    assert_eq!(report.selector, "fixed");

    let first = &report.records[0];
    assert_eq!(first.trace.final_rank, Some(1));
    assert_eq!(first.trace.file_rank, Some(1));
    assert!(first.trace.fused_rank.is_some());
    assert!(first.trace.boost_applied);
}

#[tokio::test]
async fn test_run_is_repeatable() {
    let evaluator = Evaluator::new(pipeline()).with_workers(2);
    let cases = vec![
        EvaluationCase::answerable("delete user", "delete_user"),
        EvaluationCase::answerable("email", "send_email"),
        EvaluationCase::unanswerable("payments"),
    ];
    let cancel = CancellationToken::new();
    let a = evaluator.run(&cases, &cancel).await.unwrap();
    let b = evaluator.run(&cases, &cancel).await.unwrap();

    assert_eq!(a.metrics.rank_at, b.metrics.rank_at);
    assert_eq!(a.metrics.mrr, b.metrics.mrr);
    assert_eq!(a.metrics.hallucination_rate, b.metrics.hallucination_rate);
    let ranked = |r: &EvaluationReport| r.records.iter().map(|x| x.ranked.clone()).collect::<Vec<_>>();
    assert_eq!(ranked(&a), ranked(&b));
    assert_ne!(a.run_id, b.run_id);
}

#[tokio::test]
async fn test_per_question_failures_do_not_abort_the_run() {
    let evaluator = Evaluator::new(pipeline_with(
        Arc::new(UnavailableCrossEncoder),
        Arc::new(TopRankSelector),
    ));
    let cases = vec![
        EvaluationCase::answerable("create_user", "create_user"),
        EvaluationCase::unanswerable("billing"),
    ];
    let report = evaluator.run(&cases, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.metrics.pipeline_failures, 2);
    assert_eq!(report.metrics.answerable, 0);
    assert!(report.records.iter().all(|r| r.is_pipeline_failure()));
    assert!(report.records.iter().all(|r| r.selection.is_failure()));
}

#[tokio::test]
async fn test_preflight_failure_aborts_before_any_question() {
    let config = config();
    let honest = FixedEmbedder::new(4).with_default(vec![0.0, 1.0, 0.0, 0.0]);
    let store = ChunkStore::build(
        vec![function("create_user", "src/users.rs")],
        &honest,
        IndexPolicy::from(&config),
    )
    .unwrap();
    let broken = FixedEmbedder::new(4).with_default(vec![1.0]);
    let pipeline = Arc::new(
        RetrievalPipeline::new(
            config,
            store,
            Arc::new(broken),
            overlap_encoder(),
            Arc::new(TopRankSelector),
        )
        .unwrap(),
    );

    let err = Evaluator::new(pipeline)
        .run(
            &[EvaluationCase::answerable("create_user", "create_user")],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Preflight(e) if e.is_fatal()));
}

#[tokio::test]
async fn test_cancelled_run_reports_cancellation() {
    let evaluator = Evaluator::new(pipeline());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = evaluator
        .run(&[EvaluationCase::unanswerable("anything")], &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Cancelled));
}

#[tokio::test]
async fn test_report_round_trips_through_disk() {
    let report = Evaluator::new(pipeline())
        .run(
            &[EvaluationCase::answerable("send_email", "send_email")],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports/run.json");
    report.write(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["run_id"], report.run_id.as_str());
    assert_eq!(json["metrics"]["total"], 1);
    assert_eq!(json["records"][0]["truth"]["kind"], "chunk");
    assert_eq!(json["records"][0]["selection"]["selection"]["outcome"], "chunk");
}

#[tokio::test]
async fn test_trace_reads_the_index_the_answer_used() {
    let pipeline = pipeline();
    let evaluator = Evaluator::new(Arc::clone(&pipeline));
    let case = EvaluationCase::answerable("send_email", "send_email");
    let answer = pipeline
        .answer(&case.query, &CancellationToken::new())
        .await
        .unwrap();

    pipeline
        .reindex(vec![function("render_page", "src/web.rs")])
        .await
        .unwrap();

    let record = evaluator.record(0, &case, answer, 5);
    assert_eq!(record.trace.final_rank, Some(1));
    assert_eq!(record.trace.file_rank, Some(1));
}
