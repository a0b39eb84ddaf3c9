//! Index-mutating commands: `srag ingest` and `srag clear`.

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::DisabledProvider;
use crate::ingest::{ingest_corpus, ingest_file, prepare_chunks, IngestReport};
use crate::store::VectorStore;

/// Ingest the configured corpus, or a single file when `file` is given.
///
/// With `dry_run`, files are extracted and chunked but nothing is embedded
/// or written.
pub async fn run_ingest(config: &Config, file: Option<&Path>, dry_run: bool) -> Result<()> {
    let Some(corpus) = config.corpus.as_ref() else {
        bail!("No [corpus] section in config. Set [corpus].root to the letters directory.");
    };

    if dry_run {
        let (_, report) = prepare_chunks(corpus, &config.chunking)?;
        println!("ingest (dry-run)");
        print_report(&report);
        return Ok(());
    }

    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let mut store = VectorStore::open_configured(config).await?;
    let report = match file {
        Some(path) => ingest_file(&mut store, path, corpus, &config.chunking).await?,
        None => ingest_corpus(&mut store, corpus, &config.chunking).await?,
    };

    println!("ingest");
    print_report(&report);
    println!("  total records: {}", report.total_records);
    println!("  snapshot: {}", store.snapshot_path().display());
    Ok(())
}

fn print_report(report: &IngestReport) {
    println!("  files scanned: {}", report.files_seen);
    println!("  files skipped: {}", report.files_skipped);
    println!("  chunks: {}", report.chunks);
}

/// Empty the index and delete the snapshot file.
pub async fn run_clear(config: &Config) -> Result<()> {
    let mut store = VectorStore::from_config(Arc::new(DisabledProvider), config).await;
    let removed = store.len();
    store.clear_index().await?;
    println!("clear");
    println!("  records removed: {}", removed);
    Ok(())
}
