use super::*;
use crate::chunk::{ChunkInput, ChunkKind, SourceLocation};
use crate::embedding::BertEmbedder;
use crate::store::IndexPolicy;

fn function(id: &str, symbol: &str) -> ChunkInput {
    ChunkInput {
        id: ChunkId::new(id),
        text: format!("fn {symbol}() {{}}"),
        kind: ChunkKind::Function {
            symbol: symbol.to_string(),
            signature: format!("fn {symbol}()"),
        },
        doc: None,
        location: SourceLocation::new("src/lib.rs", 1, 1),
    }
}

fn summary(id: &str, file: &str) -> ChunkInput {
    ChunkInput {
        id: ChunkId::new(id),
        text: format!("File: {file}"),
        kind: ChunkKind::FileSummary {
            file: file.to_string(),
        },
        doc: None,
        location: SourceLocation::new(file, 1, 1),
    }
}

fn store(inputs: Vec<ChunkInput>) -> ChunkStore {
    ChunkStore::build(
        inputs,
        &BertEmbedder::stub(8).unwrap(),
        IndexPolicy {
            index_type_chunks: true,
            use_file_summary_chunks: true,
        },
    )
    .unwrap()
}

fn plain_store(symbols: &[(&str, &str)]) -> ChunkStore {
    ChunkStore::build(
        symbols.iter().map(|(id, s)| function(id, s)).collect(),
        &BertEmbedder::stub(8).unwrap(),
        IndexPolicy {
            index_type_chunks: true,
            use_file_summary_chunks: false,
        },
    )
    .unwrap()
}

fn scores(pairs: &[(&str, f32)]) -> Vec<ScoredCandidate> {
    pairs
        .iter()
        .map(|(id, s)| ScoredCandidate::new(ChunkId::new(*id), *s))
        .collect()
}

fn variant(query: &str, vector: &[(&str, f32)], lexical: &[(&str, f32)]) -> VariantScores {
    VariantScores {
        query: query.to_string(),
        vector: scores(vector),
        lexical: scores(lexical),
    }
}

fn config(alpha: f32, pool_size: usize, name_boost: Option<f32>) -> FusionConfig {
    FusionConfig {
        alpha,
        pool_size,
        name_boost,
    }
}

fn ids(pool: &[FusedCandidate]) -> Vec<&str> {
    pool.iter().map(|c| c.id.as_str()).collect()
}

#[test]
fn test_min_max_normalize() {
    assert_eq!(min_max_normalize(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
    assert_eq!(min_max_normalize(&[]), Vec::<f32>::new());
}

#[test]
fn test_min_max_constant_signal_is_zero() {
    assert_eq!(min_max_normalize(&[0.7, 0.7, 0.7]), vec![0.0, 0.0, 0.0]);
    assert_eq!(min_max_normalize(&[5.0]), vec![0.0]);
}

#[test]
fn test_min_max_ignores_non_finite() {
    assert_eq!(
        min_max_normalize(&[1.0, f32::NAN, 3.0]),
        vec![0.0, 0.0, 1.0]
    );
}

#[test]
fn test_fused_score_is_weighted_combination() {
    let store = plain_store(&[("a", "alpha"), ("b", "beta"), ("c", "gamma")]);
    let v = variant(
        "query",
        &[("a", 1.0), ("b", 0.0), ("c", 0.5)],
        &[("a", 0.0), ("b", 4.0), ("c", 2.0)],
    );

    let pool = fuse(&[v], &store, &config(0.25, 40, None));
    let by_id: HashMap<_, _> = pool.iter().map(|c| (c.id.as_str(), c)).collect();

    assert!((by_id["a"].fused_score - 0.25).abs() < 1e-6);
    assert!((by_id["b"].fused_score - 0.75).abs() < 1e-6);
    assert!((by_id["c"].fused_score - 0.5).abs() < 1e-6);
    assert_eq!(by_id["a"].vector_score, 1.0);
    assert_eq!(by_id["b"].lexical_score, 4.0);
    assert_eq!(ids(&pool), vec!["b", "c", "a"]);
}

#[test]
fn test_ties_break_by_ascending_id_and_ranks_are_dense() {
    let store = plain_store(&[("c", "x"), ("a", "y"), ("b", "z")]);
    let v = variant(
        "q",
        &[("c", 0.5), ("a", 0.5), ("b", 0.5)],
        &[("c", 0.0), ("a", 0.0), ("b", 0.0)],
    );

    let pool = fuse(&[v], &store, &config(0.5, 40, None));
    assert_eq!(ids(&pool), vec!["a", "b", "c"]);
    let ranks: Vec<_> = pool.iter().map(|c| c.fused_rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[test]
fn test_pool_is_truncated() {
    let names: Vec<(String, String)> = (0..10)
        .map(|i| (format!("c{i:02}"), format!("f{i}")))
        .collect();
    let refs: Vec<(&str, &str)> = names.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let store = plain_store(&refs);
    let v = VariantScores {
        query: "q".into(),
        vector: store
            .ids()
            .enumerate()
            .map(|(i, id)| ScoredCandidate::new(id.clone(), i as f32))
            .collect(),
        lexical: Vec::new(),
    };

    let pool = fuse(std::slice::from_ref(&v), &store, &config(0.5, 4, None));
    assert_eq!(ids(&pool), vec!["c09", "c08", "c07", "c06"]);

    let all = fuse(&[v], &store, &config(0.5, 40, None));
    assert_eq!(all.len(), 10);
}

#[test]
fn test_name_boost_marks_and_raises_symbol_match() {
    let store = plain_store(&[("a", "computeTotal"), ("b", "render")]);
    let v = variant(
        "where is computeTotal",
        &[("a", 0.1), ("b", 0.9)],
        &[("a", 0.0), ("b", 0.0)],
    );

    let boosted = fuse(std::slice::from_ref(&v), &store, &config(0.5, 40, Some(1.0)));
    let plain = fuse(&[v], &store, &config(0.5, 40, None));

    assert_eq!(boosted[0].id.as_str(), "a");
    assert!(boosted[0].boost_applied);
    assert!(!boosted[1].boost_applied);

    let unboosted_a = plain.iter().find(|c| c.id.as_str() == "a").unwrap();
    assert!(!unboosted_a.boost_applied);
    assert!(boosted[0].fused_score > unboosted_a.fused_score);
}

#[test]
fn test_zero_boost_is_not_reported_as_applied() {
    let store = plain_store(&[("a", "computeTotal"), ("b", "render")]);
    let v = variant(
        "computeTotal",
        &[("a", 0.2), ("b", 0.4)],
        &[("a", 1.0), ("b", 0.0)],
    );

    let zero = fuse(std::slice::from_ref(&v), &store, &config(0.5, 40, Some(0.0)));
    let off = fuse(&[v], &store, &config(0.5, 40, None));

    assert!(zero.iter().all(|c| !c.boost_applied));
    assert_eq!(zero, off);
}

#[test]
fn test_name_boost_requires_whole_token() {
    let store = plain_store(&[("a", "hash")]);
    let v = variant("hashing passwords", &[("a", 0.0)], &[("a", 0.0)]);
    let pool = fuse(&[v], &store, &config(0.5, 40, Some(1.0)));
    assert!(!pool[0].boost_applied);
}

#[test]
fn test_file_summaries_are_never_boosted() {
    let store = store(vec![function("a", "lib"), summary("file:lib", "lib")]);
    let v = VariantScores {
        query: "lib".into(),
        vector: Vec::new(),
        lexical: Vec::new(),
    };
    let pool = fuse(&[v], &store, &config(0.5, 40, Some(1.0)));
    for candidate in &pool {
        let is_function = candidate.id.as_str() == "a";
        assert_eq!(candidate.boost_applied, is_function, "{}", candidate.id);
    }
}

#[test]
fn test_variants_merge_by_max_per_chunk() {
    let store = plain_store(&[("a", "x"), ("b", "y"), ("c", "z")]);
    let original = variant(
        "q",
        &[("a", 1.0), ("b", 0.0), ("c", 0.0)],
        &[("a", 1.0), ("b", 0.0), ("c", 0.0)],
    );
    let paraphrase = variant(
        "implement q",
        &[("a", 0.0), ("b", 1.0), ("c", 0.5)],
        &[("a", 0.0), ("b", 1.0), ("c", 0.5)],
    );

    let pool = fuse(&[original, paraphrase], &store, &config(0.5, 40, None));
    let by_id: HashMap<_, _> = pool.iter().map(|c| (c.id.as_str(), c)).collect();

    assert_eq!(by_id["a"].fused_score, 1.0);
    assert_eq!(by_id["a"].variant, 0);
    assert_eq!(by_id["b"].fused_score, 1.0);
    assert_eq!(by_id["b"].variant, 1);
    assert_eq!(by_id["c"].variant, 1);
    assert_eq!(ids(&pool), vec!["a", "b", "c"]);
}

#[test]
fn test_missing_scores_count_as_minimum() {
    let store = plain_store(&[("a", "x"), ("b", "y")]);
    let v = variant("q", &[("b", 0.3)], &[]);
    let pool = fuse(&[v], &store, &config(1.0, 40, None));
    assert_eq!(ids(&pool), vec!["a", "b"]);
    assert!(pool.iter().all(|c| c.fused_score == 0.0));
}

#[test]
fn test_empty_store_yields_empty_pool() {
    let store = plain_store(&[]);
    let v = variant("anything", &[], &[]);
    assert!(fuse(&[v], &store, &FusionConfig::default()).is_empty());
}

#[test]
fn test_fusion_is_deterministic() {
    let store = plain_store(&[("a", "x"), ("b", "y"), ("c", "z"), ("d", "w")]);
    let v = variant(
        "q",
        &[("a", 0.3), ("b", 0.3), ("c", 0.9), ("d", 0.1)],
        &[("a", 1.0), ("b", 1.0), ("c", 0.0), ("d", 2.0)],
    );
    let first = fuse(std::slice::from_ref(&v), &store, &FusionConfig::default());
    for _ in 0..5 {
        assert_eq!(fuse(std::slice::from_ref(&v), &store, &FusionConfig::default()), first);
    }
}

#[test]
fn test_config_from_pipeline_config() {
    let mut pipeline = PipelineConfig::default();
    pipeline.fusion_alpha = 0.3;
    pipeline.candidate_pool_size = 7;
    pipeline.use_function_name_boosting = false;

    let fusion = FusionConfig::from(&pipeline);
    assert_eq!(fusion.alpha, 0.3);
    assert_eq!(fusion.pool_size, 7);
    assert!(fusion.name_boost.is_none());

    pipeline.use_function_name_boosting = true;
    pipeline.name_boost = 2.5;
    assert_eq!(FusionConfig::from(&pipeline).name_boost, Some(2.5));
}

#[test]
fn test_template_expander_variants() {
    let request = QueryRequest::expanded("hash a password", Some(&TemplateExpander));
    assert_eq!(
        request.variants(),
        vec![
            "hash a password",
            "implement hash a password",
            "function that hash a password"
        ]
    );
    assert_eq!(QueryRequest::new("x").variants(), vec!["x"]);
}

#[test]
fn test_duplicate_expansions_are_dropped() {
    let request = QueryRequest {
        text: "q".into(),
        expansions: vec!["q".into(), "r".into(), "r".into()],
    };
    assert_eq!(request.variants(), vec!["q", "r"]);
}
