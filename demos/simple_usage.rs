/// Reliquary API Demo
///
/// Demonstrates the store's surface:
/// - Insert with scoring and RecordStored notifications
/// - Lookup and listing
/// - Aggregate metrics
/// - Manual and scheduled persistence, then reload
///
/// Storage location and timing come from RELIQUARY_* environment variables;
/// without them the demo works in a temporary directory.

use reliquary::core::config::{Config, ENV_STORAGE_PATH};
use reliquary::core::store::Store;
use reliquary::core::types::{Metadata, NewRecord, RecordContent};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let scratch = tempfile::TempDir::new()?;
    let config = if std::env::var(ENV_STORAGE_PATH).is_ok() {
        Config::from_env()?
    } else {
        Config {
            persist_interval_secs: 1,
            ..Config::at_dir(scratch.path())
        }
    };
    println!("Storage: {}", config.storage_path.display());

    // Step 1: open (loads any previous state, starts auto-persist)
    let store = Store::open(config.clone())?;
    println!("Opened with {} existing records\n", store.len());

    // Step 2: subscribe before inserting
    let mut events = store.subscribe();
    let listener = tokio::spawn(async move {
        let mut seen = 0;
        while let Ok(event) = events.recv().await {
            println!("  [event] stored {} from {}", event.id, event.source);
            seen += 1;
            if seen == 3 {
                break;
            }
        }
    });

    // Step 3: insert generated artifacts
    println!("Inserting records...");
    let samples = [
        (0.9, "A lighthouse that remembers every ship it guided.", 3, "Rocky coast at dusk, fog rolling in."),
        (0.4, "Static.", 0, ""),
        (0.7, "A library whose shelves rearrange to match the reader's mood.", 5, "Vaulted hall, amber lamps."),
    ];
    for (level, description, effects, environment) in samples {
        let content = RecordContent::new()
            .with_level(level)
            .with_description(description)
            .with_effects((0..effects).map(|i| json!({ "effect": i })).collect())
            .with_environment(environment)
            .with_kind("vision");
        let mut metadata = Metadata::new();
        metadata.insert("prompt_version".to_string(), json!(2));

        let record = store.insert(
            NewRecord::new(uuid::Uuid::new_v4().to_string(), content),
            "demo-generator",
            metadata,
        )?;
        println!("  {} -> score {:.3}", record.id, record.quality_score);
    }
    listener.await?;

    // Step 4: metrics
    let metrics = store.metrics();
    println!("\nMetrics:");
    println!("  total:   {}", metrics.total);
    println!("  bands:   high={} medium={} low={}",
        metrics.band_counts.high, metrics.band_counts.medium, metrics.band_counts.low);
    println!("  average: {:.3}", metrics.average_score);
    for entry in &metrics.top_rated {
        println!("  top:     {} {:.3} {:?}", entry.id, entry.score, entry.kind);
    }

    // Step 5: let the scheduler write once, then force a save
    if store.is_persistence_enabled() {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        println!("\nScheduled saves so far: {}", store.metrics().persistence.successful_persists);

        store.persist_now_async().await?;
        println!("Last saved: {:?}", store.metrics().last_saved);

        // Step 6: reopen from disk
        store.shutdown();
        drop(store);
        let reopened = Store::open(config)?;
        println!("Reopened with {} records", reopened.len());
        reopened.shutdown();
    }

    Ok(())
}
