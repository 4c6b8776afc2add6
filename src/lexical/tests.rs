use super::*;

fn index(docs: &[(&str, &str)]) -> Bm25Index {
    Bm25Index::from_documents(
        docs.iter()
            .map(|(id, text)| (ChunkId::new(*id), text.to_string())),
        Bm25Params::default(),
    )
}

fn score_of(scores: &[ScoredCandidate], id: &str) -> f32 {
    scores
        .iter()
        .find(|s| s.id.as_str() == id)
        .map(|s| s.score)
        .unwrap()
}

#[test]
fn test_tokenize_lowercases_word_runs() {
    assert_eq!(
        tokenize("Hash_Password(user): -> Result<()>"),
        vec!["hash_password", "user", "result"]
    );
    assert!(tokenize("  ::  ").is_empty());
}

#[test]
fn test_tokenize_keeps_unicode_letters() {
    assert_eq!(tokenize("größe über"), vec!["größe", "über"]);
}

#[test]
fn test_default_params() {
    let params = Bm25Params::default();
    assert_eq!(params.k1, 1.5);
    assert_eq!(params.b, 0.75);
    assert_eq!(params.epsilon, 0.25);
}

#[test]
fn test_score_matches_okapi_formula() {
    let idx = index(&[("a", "alpha beta"), ("b", "beta gamma"), ("c", "delta")]);
    let scores = idx.score("alpha");

    let idf = (2.5f32 / 1.5).ln();
    let avgdl = 5.0f32 / 3.0;
    let expected = idf * 2.5 / (1.0 + 1.5 * (0.25 + 0.75 * 2.0 / avgdl));

    assert!((score_of(&scores, "a") - expected).abs() < 1e-5);
    assert_eq!(score_of(&scores, "b"), 0.0);
    assert_eq!(score_of(&scores, "c"), 0.0);
}

#[test]
fn test_scores_cover_every_chunk_in_order() {
    let idx = index(&[("z", "one"), ("y", "two"), ("x", "three")]);
    let ids: Vec<_> = idx.score("two").into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![ChunkId::new("z"), ChunkId::new("y"), ChunkId::new("x")]);
}

#[test]
fn test_common_terms_never_score_negative() {
    let idx = index(&[
        ("a", "fn parse config"),
        ("b", "fn render page"),
        ("c", "fn hash password"),
    ]);
    assert!(idx.idf("fn").unwrap() >= 0.0);
    for s in idx.score("fn fn fn") {
        assert!(s.score >= 0.0, "{} scored {}", s.id, s.score);
    }
}

#[test]
fn test_empty_query_scores_zero() {
    let idx = index(&[("a", "alpha"), ("b", "beta")]);
    assert!(idx.score("").iter().all(|s| s.score == 0.0));
    assert!(idx.score("?!").iter().all(|s| s.score == 0.0));
}

#[test]
fn test_unknown_terms_score_zero() {
    let idx = index(&[("a", "alpha"), ("b", "beta")]);
    assert!(idx.score("omega").iter().all(|s| s.score == 0.0));
}

#[test]
fn test_empty_index() {
    let idx = index(&[]);
    assert!(idx.is_empty());
    assert!(idx.score("anything").is_empty());
}

#[test]
fn test_repeated_query_terms_accumulate() {
    let idx = index(&[("a", "alpha beta"), ("b", "gamma"), ("c", "delta")]);
    let once = score_of(&idx.score("alpha"), "a");
    let twice = score_of(&idx.score("alpha alpha"), "a");
    assert!((twice - 2.0 * once).abs() < 1e-5);
}

#[test]
fn test_shorter_documents_win_on_equal_tf() {
    let idx = index(&[
        ("short", "token"),
        ("long", "token and many other filler words here"),
        ("other", "unrelated"),
    ]);
    let scores = idx.score("token");
    assert!(score_of(&scores, "short") > score_of(&scores, "long"));
}

#[test]
fn test_repeated_builds_score_bit_identically() {
    let docs: Vec<(String, String)> = (0..40)
        .map(|i| {
            (
                format!("src/mod_{}.rs::f{i}", i % 7),
                format!("fn handler_{i} request response {} common shared term", i % 5),
            )
        })
        .collect();
    let build = || {
        Bm25Index::from_documents(
            docs.iter()
                .map(|(id, text)| (ChunkId::new(id.as_str()), text.clone())),
            Bm25Params::default(),
        )
    };

    let bits = |idx: &Bm25Index| -> Vec<u32> {
        idx.score("common request handler_3 fn")
            .iter()
            .map(|s| s.score.to_bits())
            .collect()
    };
    let first = build();
    let expected = bits(&first);
    assert!(first.idf("common").unwrap() > 0.0);

    for _ in 0..50 {
        let again = build();
        assert_eq!(bits(&again), expected);
        assert_eq!(
            again.idf("shared").map(f32::to_bits),
            first.idf("shared").map(f32::to_bits)
        );
    }
}
