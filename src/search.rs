//! The `search` and `context` commands.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::models::{FieldValue, MetadataFilter};
use crate::store::RetrievalStore;

/// Query parameters for a one-off search from the command line.
pub struct SearchArgs {
    pub query: String,
    pub k: Option<usize>,
    pub lesson: Option<String>,
    pub person: Option<String>,
    pub dataset: Option<String>,
    pub filters: Vec<(String, String)>,
}

fn load_store(config: &Config) -> Result<RetrievalStore> {
    if !RetrievalStore::snapshot_exists(&config.store.snapshot) {
        bail!(
            "No snapshot at {}; run `eco ingest` first",
            config.store.snapshot.display()
        );
    }
    RetrievalStore::load(&config.store.snapshot, config)
}

pub async fn run_search(config: &Config, args: SearchArgs) -> Result<()> {
    let store = load_store(config)?;

    let mut filter = MetadataFilter {
        dataset_name: args.dataset,
        lesson_id: args.lesson,
        person_id: args.person,
        ..Default::default()
    };
    for (key, value) in args.filters {
        filter.extra.insert(key, FieldValue::Str(value));
    }

    let k = args.k.unwrap_or(config.retrieval.default_k);
    let results = store.retrieve(&args.query, k, &filter).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in results.iter().enumerate() {
        println!(
            "{}. [distance {:.4}] dataset={} lesson={} person={}",
            i + 1,
            hit.distance,
            hit.metadata.dataset_name,
            hit.metadata.lesson_id.as_deref().unwrap_or("-"),
            hit.metadata.person_id
        );
        println!("   {}", hit.text);
    }
    Ok(())
}

pub async fn run_context(
    config: &Config,
    lesson_id: &str,
    person: Option<&str>,
    dataset: Option<&str>,
    query: Option<&str>,
    k: Option<usize>,
) -> Result<()> {
    let store = load_store(config)?;
    let k = k.unwrap_or(config.retrieval.default_k);

    let context = store
        .get_context_for_lesson(lesson_id, person, dataset, query, k)
        .await?;
    if context.is_empty() {
        println!("No context found for lesson '{}'.", lesson_id);
    } else {
        println!("{context}");
    }
    Ok(())
}
