use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::events::{EventBus, RecordStored};
use crate::core::stats::{PersistenceStatus, QualityMetrics, StoreMetrics};
use crate::core::types::{Metadata, NewRecord, Record};
use crate::index::record_index::RecordIndex;
use crate::scoring::scorer::{QualityAssessor, Scorer};
use crate::search::ranking::RankingEngine;
use crate::storage::layout::StorageLayout;
use crate::storage::persistence::PersistenceManager;
use crate::storage::snapshot::PersistedState;
use crate::writer::scheduler::{AutoPersistScheduler, PersistTarget};

/// Index and the metrics derived from it, mutated together under one lock.
struct StoreState {
    index: RecordIndex,
    metrics: QualityMetrics,
}

struct Shared {
    state: RwLock<StoreState>,
    ranking: RankingEngine,
    scorer: Arc<dyn Scorer>,
    persistence: Option<PersistenceManager>,
    events: EventBus,
}

impl Shared {
    /// One consistent image of index + metrics.
    fn snapshot(&self) -> PersistedState {
        let state = self.state.read();
        PersistedState::new(state.index.all(), state.metrics.clone())
    }
}

impl PersistTarget for Shared {
    fn persist_now(&self) -> Result<()> {
        match &self.persistence {
            Some(manager) => manager.persist(|| self.snapshot()).map(|_| ()),
            None => {
                tracing::debug!("persistence disabled, skipping persist");
                Ok(())
            }
        }
    }
}

/// Durable store of scored records.
///
/// Reads always serve the live in-memory state; disk problems only show up
/// in `metrics().persistence`.
pub struct Store {
    config: Config,
    shared: Arc<Shared>,
    scheduler: Mutex<Option<AutoPersistScheduler>>,
}

impl Store {
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_scorer(config, Arc::new(QualityAssessor::new()))
    }

    /// Open with a custom scorer. With persistence enabled this loads the
    /// primary file and starts the auto-persist timer, which needs a tokio
    /// runtime.
    pub fn open_with_scorer(config: Config, scorer: Arc<dyn Scorer>) -> Result<Self> {
        config.validate()?;
        let ranking = RankingEngine::default();

        let (index, persistence) = if config.persistence_enabled {
            let manager = PersistenceManager::new(StorageLayout::from_config(&config)?, config.backup_every);
            let loaded = manager.load_on_startup();

            let mut index = RecordIndex::new();
            let rejected = index.replace_all(loaded.records);
            if !rejected.is_empty() {
                tracing::warn!(skipped = rejected.len(), "persisted records without an id were skipped");
            }
            (index, Some(manager))
        } else {
            tracing::info!("persistence disabled, store is memory-only");
            (RecordIndex::new(), None)
        };

        let metrics = ranking.recompute(index.iter());
        let shared = Arc::new(Shared {
            state: RwLock::new(StoreState { index, metrics }),
            ranking,
            scorer,
            persistence,
            events: EventBus::new(config.event_capacity),
        });

        let scheduler = if config.persistence_enabled {
            let target: Arc<dyn PersistTarget> = shared.clone();
            let mut scheduler = AutoPersistScheduler::new(target, config.persist_interval());
            scheduler.start()?;
            Some(scheduler)
        } else {
            None
        };

        Ok(Store {
            config,
            shared,
            scheduler: Mutex::new(scheduler),
        })
    }

    /// Score and store a record, then notify subscribers.
    pub fn insert(
        &self,
        new_record: NewRecord,
        source: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Record> {
        if new_record.id.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidRecord,
                "record id must be a non-empty string".to_string(),
            ));
        }

        let quality_score = self.shared.scorer.score(&new_record.content);
        let record = Record {
            id: new_record.id,
            content: new_record.content,
            quality_score,
            source: source.into(),
            metadata,
            stored_at: Utc::now(),
        };

        {
            let mut state = self.shared.state.write();
            state.index.put(record.clone())?;
            let metrics = self.shared.ranking.recompute(state.index.iter());
            state.metrics = metrics;
            // Publishing before the lock drops keeps event order equal to apply order.
            self.shared.events.publish(RecordStored::from_record(&record));
        }

        tracing::debug!(id = %record.id, score = record.quality_score, "record stored");
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Option<Record> {
        self.shared.state.read().index.get(id).cloned()
    }

    /// All records in insertion order.
    pub fn all(&self) -> Vec<Record> {
        self.shared.state.read().index.all()
    }

    pub fn len(&self) -> usize {
        self.shared.state.read().index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn quality_metrics(&self) -> QualityMetrics {
        self.shared.state.read().metrics.clone()
    }

    pub fn metrics(&self) -> StoreMetrics {
        StoreMetrics::new(self.quality_metrics(), self.persistence_status())
    }

    pub fn persistence_status(&self) -> PersistenceStatus {
        self.shared
            .persistence
            .as_ref()
            .map(|p| p.status())
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordStored> {
        self.shared.events.subscribe()
    }

    /// Write the current state to disk now, on the calling thread. A no-op
    /// when persistence is disabled.
    pub fn persist_now(&self) -> Result<()> {
        self.shared.persist_now()
    }

    /// Like `persist_now`, but runs the disk work on tokio's blocking pool.
    pub async fn persist_now_async(&self) -> Result<()> {
        let shared = self.shared.clone();
        tokio::task::spawn_blocking(move || shared.persist_now())
            .await
            .map_err(|e| Error::new(ErrorKind::PersistFailure, format!("persist task failed: {}", e)))?
    }

    /// Restart the auto-persist timer with a new period.
    pub fn set_persist_interval(&self, interval: Duration) -> Result<()> {
        match self.scheduler.lock().as_mut() {
            Some(scheduler) => scheduler.reconfigure(interval),
            None => Err(Error::new(
                ErrorKind::InvalidState,
                "persistence is disabled for this store".to_string(),
            )),
        }
    }

    pub fn persist_interval(&self) -> Option<Duration> {
        self.scheduler.lock().as_ref().map(|s| s.interval())
    }

    pub fn is_auto_persisting(&self) -> bool {
        self.scheduler
            .lock()
            .as_ref()
            .map(|s| s.is_running())
            .unwrap_or(false)
    }

    /// Cancel the auto-persist timer. An in-flight persist still completes.
    pub fn shutdown(&self) {
        if let Some(scheduler) = self.scheduler.lock().as_mut() {
            scheduler.stop();
        }
    }

    /// The snapshot retained after the most recent failed durable write.
    pub fn fallback_snapshot(&self) -> Option<Arc<PersistedState>> {
        self.shared
            .persistence
            .as_ref()
            .and_then(|p| p.fallback_snapshot())
    }

    pub fn is_persistence_enabled(&self) -> bool {
        self.shared.persistence.is_some()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("records", &self.len())
            .field("scorer", &self.shared.scorer.name())
            .field("persistence", &self.shared.persistence)
            .finish()
    }
}
