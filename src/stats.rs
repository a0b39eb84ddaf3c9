//! Index statistics for `srag stats`.
//!
//! Reads the snapshot without contacting an embedding provider and prints
//! record counts, dimensionality, and a per-year breakdown.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::DisabledProvider;
use crate::store::VectorStore;

/// Run the stats command: load the snapshot and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = VectorStore::from_config(Arc::new(DisabledProvider), config).await;
    let stats = store.stats();
    let path = store.snapshot_path();

    println!("Vector Store Stats");
    println!("==================");
    println!();
    println!("  Snapshot:    {}", path.display());
    match snapshot_info(path) {
        Some((size, modified)) => {
            println!("  Size:        {}", format_bytes(size));
            println!("  Modified:    {}", modified);
        }
        None => println!("  Size:        (no snapshot)"),
    }
    println!();
    println!("  Records:     {}", stats.records);
    println!(
        "  Dimensions:  {}",
        stats
            .dims
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  Sources:     {}", stats.sources);

    if !stats.by_year.is_empty() {
        println!();
        println!("  By year:");
        println!("  {:<8} {:>8}", "YEAR", "CHUNKS");
        println!("  {}", "-".repeat(17));
        for (year, count) in &stats.by_year {
            println!("  {:<8} {:>8}", year, count);
        }
    }

    println!();
    Ok(())
}

fn snapshot_info(path: &Path) -> Option<(u64, String)> {
    let meta = std::fs::metadata(path).ok()?;
    let modified = meta
        .modified()
        .ok()
        .map(|t| {
            chrono::DateTime::<chrono::Utc>::from(t)
                .format("%Y-%m-%d %H:%M UTC")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_string());
    Some((meta.len(), modified))
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
