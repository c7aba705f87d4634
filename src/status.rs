//! The `status` command: snapshot health at a glance.

use anyhow::Result;

use crate::config::Config;
use crate::store::RetrievalStore;

pub fn run_status(config: &Config) -> Result<()> {
    if !RetrievalStore::snapshot_exists(&config.store.snapshot) {
        println!(
            "No snapshot at {}; run `eco ingest` to build one.",
            config.store.snapshot.display()
        );
        return Ok(());
    }

    let store = RetrievalStore::load(&config.store.snapshot, config)?;
    let status = store.status();

    println!("Snapshot: {}", config.store.snapshot.display());
    println!("Documents: {}", status.documents);
    println!("Dimension: {}", status.dimension);
    println!("Model: {}", status.embedding_model);
    if status.datasets.is_empty() {
        println!("Datasets: none");
    } else {
        println!("Datasets:");
        for (name, count) in &status.datasets {
            println!("  {name}: {count} documents");
        }
    }
    Ok(())
}
