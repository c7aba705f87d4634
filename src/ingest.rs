//! The `ingest` command: load configured datasets into a fresh store and
//! write a snapshot.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::store::RetrievalStore;

/// Build a store from the configured datasets and persist it.
///
/// When `only` is given, just that dataset is ingested. A dataset that
/// fails to load is reported and skipped; the remaining datasets still
/// ingest and the snapshot is still written.
pub async fn run_ingest(config: &Config, only: Option<&str>) -> Result<()> {
    let datasets: Vec<_> = match only {
        Some(name) => {
            let matched: Vec<_> = config
                .datasets
                .iter()
                .filter(|d| d.name == name)
                .cloned()
                .collect();
            if matched.is_empty() {
                bail!("No dataset named '{}' in configuration", name);
            }
            matched
        }
        None => config.datasets.clone(),
    };

    if datasets.is_empty() {
        bail!("No datasets configured; add [[datasets]] entries to the config file");
    }

    let mut store = RetrievalStore::new(config)?;
    let mut failures = 0usize;

    for dataset in &datasets {
        if !dataset.path.exists() {
            println!(
                "  warning: dataset '{}' not found at {}, skipping",
                dataset.name,
                dataset.path.display()
            );
            failures += 1;
            continue;
        }

        println!("Ingesting '{}' from {}", dataset.name, dataset.path.display());
        match store.ingest_dataset(dataset).await {
            Ok(report) => {
                let mode = if report.aggregated {
                    "aggregated"
                } else {
                    "row-level"
                };
                println!(
                    "  {} rows read, {} indexed ({}), {} skipped, {} chunks",
                    report.records_read,
                    report.records_indexed,
                    mode,
                    report.records_skipped,
                    report.chunks_added
                );
            }
            Err(e) => {
                println!("  error: failed to ingest '{}': {:#}", dataset.name, e);
                failures += 1;
            }
        }
    }

    if store.is_empty() {
        bail!("Nothing was ingested; not writing a snapshot");
    }

    store.save(&config.store.snapshot)?;
    println!(
        "Saved {} documents to {} ({} dataset(s) failed)",
        store.len(),
        config.store.snapshot.display(),
        failures
    );
    Ok(())
}
