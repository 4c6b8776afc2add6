//! Coderank command-line entrypoint.
//!
//! ```text
//! coderank index  <chunks.json>
//! coderank search <query...>
//! coderank files  <query...>
//! coderank eval   <questions.json> [report.json]
//! ```
//!
//! Paths and models come from `CODERANK_*` environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use mimalloc::MiMalloc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use coderank::config::{Config, PipelineConfig};
use coderank::embedding::{
    BertCrossEncoder, BertEmbedder, CachedEmbedder, CrossEncoder, CrossEncoderConfig, Embedder,
    EncoderConfig,
};
use coderank::eval::{Evaluator, load_dataset};
use coderank::selector::{self, GenaiModel};
use coderank::store::{ChunkStore, IndexPolicy};
use coderank::{ChunkInput, RetrievalPipeline};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const USAGE: &str = "usage: coderank index <chunks.json> | search <query...> | files <query...> | eval <questions.json> [report.json]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let pipeline_config = PipelineConfig::from_env()?;
    pipeline_config.validate()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.split_first() {
        Some((cmd, rest)) if cmd == "index" && rest.len() == 1 => {
            index(&config, &pipeline_config, Path::new(&rest[0])).await
        }
        Some((cmd, rest)) if cmd == "search" && !rest.is_empty() => {
            search(&config, pipeline_config, &rest.join(" ")).await
        }
        Some((cmd, rest)) if cmd == "files" && !rest.is_empty() => {
            files(&config, pipeline_config, &rest.join(" ")).await
        }
        Some((cmd, rest)) if cmd == "eval" && matches!(rest.len(), 1 | 2) => {
            let report_path = rest.get(1).map(PathBuf::from);
            eval(&config, pipeline_config, Path::new(&rest[0]), report_path).await
        }
        _ => bail!(USAGE),
    }
}

async fn index(config: &Config, pipeline: &PipelineConfig, chunks_path: &Path) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(chunks_path)
        .with_context(|| format!("reading {}", chunks_path.display()))?;
    let inputs: Vec<ChunkInput> = serde_json::from_str(&json)
        .with_context(|| format!("parsing {}", chunks_path.display()))?;

    let embedder = load_embedder(config)?;
    let policy = IndexPolicy::from(pipeline);
    let store = tokio::task::spawn_blocking(move || {
        ChunkStore::build(inputs, embedder.as_ref(), policy)
    })
    .await??;

    let path = config.snapshot_path();
    store.save(&path)?;
    tracing::info!(
        chunks = store.len(),
        path = %path.display(),
        "Index written"
    );
    Ok(())
}

async fn search(config: &Config, pipeline_config: PipelineConfig, query: &str) -> anyhow::Result<()> {
    let pipeline = open_pipeline(config, pipeline_config)?;
    let cancel = cancel_on_ctrl_c();

    let answer = pipeline.answer(query, &cancel).await?;
    let store = answer.index.store();
    for result in answer.retrieval.results.iter().take(10) {
        let location = store
            .lookup(result.id())
            .map(|chunk| chunk.location().to_string())
            .unwrap_or_default();
        println!(
            "{:>3}. {:<48} {:>8.3}  {}",
            result.rank,
            result.id(),
            result.rerank_score,
            location
        );
    }
    match answer.selection.selected_id() {
        Some(id) => println!("\nselected: {id}"),
        None if answer.selection.is_failure() => println!(
            "\nselected: none (selector failed: {})",
            answer.selection.error.as_deref().unwrap_or("unknown")
        ),
        None => println!("\nselected: none"),
    }
    Ok(())
}

async fn files(config: &Config, pipeline_config: PipelineConfig, query: &str) -> anyhow::Result<()> {
    let top_k = pipeline_config.file_retrieval_top_k;
    let two_stage = pipeline_config.use_two_stage_file_retrieval;
    let pipeline = open_pipeline(config, pipeline_config)?;
    let cancel = cancel_on_ctrl_c();

    for (i, file) in pipeline
        .retrieve_files(query, top_k, &cancel)
        .await?
        .iter()
        .enumerate()
    {
        println!("{:>3}. {:<48} {:>8.3}", i + 1, file.path, file.score);
    }
    if two_stage {
        println!();
        for result in pipeline.retrieve_two_stage(query, 10, &cancel).await? {
            println!("{:>3}. {:<48} {:>8.3}", result.rank, result.id(), result.rerank_score);
        }
    }
    Ok(())
}

async fn eval(
    config: &Config,
    pipeline_config: PipelineConfig,
    dataset_path: &Path,
    report_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let cases = load_dataset(dataset_path)?;
    let pipeline = Arc::new(open_pipeline(config, pipeline_config)?);
    let cancel = cancel_on_ctrl_c();

    let report = Evaluator::new(pipeline).run(&cases, &cancel).await?;
    match report_path {
        Some(path) => {
            report.write(&path)?;
            tracing::info!(path = %path.display(), run_id = %report.run_id, "Report written");
        }
        None => println!("{}", serde_json::to_string_pretty(&report.metrics)?),
    }
    Ok(())
}

fn open_pipeline(config: &Config, pipeline_config: PipelineConfig) -> anyhow::Result<RetrievalPipeline> {
    let embedder = load_embedder(config)?;
    let store = ChunkStore::load(&config.snapshot_path())?;
    let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::with_capacity(
        embedder,
        config.query_cache_capacity,
    ));

    let encoder: Arc<dyn CrossEncoder> =
        match config.cross_encoder_dir(pipeline_config.use_finetuned)? {
            Some(dir) => Arc::new(BertCrossEncoder::load_or_unavailable(
                CrossEncoderConfig::new(dir),
            )),
            None => {
                tracing::warn!("No CODERANK_CROSS_ENCODER_PATH configured, using stub re-ranker");
                Arc::new(BertCrossEncoder::stub())
            }
        };

    let model = Arc::new(GenaiModel::new(pipeline_config.selector_model()));
    let selector = selector::from_config(&pipeline_config, model);

    Ok(RetrievalPipeline::new(
        pipeline_config,
        store,
        embedder,
        encoder,
        selector,
    )?)
}

fn load_embedder(config: &Config) -> anyhow::Result<Arc<BertEmbedder>> {
    let encoder_config = match &config.embedder_path {
        Some(path) => EncoderConfig::new(path.clone()),
        None => {
            tracing::warn!("No CODERANK_EMBEDDER_PATH configured, running embedder in stub mode");
            EncoderConfig::stub()
        }
    };
    let embedder = BertEmbedder::load(encoder_config)?;
    if embedder.embedding_dim() == 0 {
        bail!("embedder reported a zero embedding dimension");
    }
    Ok(Arc::new(embedder))
}

/// Token cancelled on the first Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, cancelling");
            token.cancel();
        }
    });
    cancel
}
