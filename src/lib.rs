pub mod core;
pub mod storage;
pub mod index;
pub mod scoring;
pub mod search;
pub mod writer;

/*
┌──────────────────────────────────────────────────────────────────────────────┐
│                          RELIQUARY STRUCT ARCHITECTURE                       │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── CORE ────────────────────────────────────┐
│  struct Store                                                                │
│  ┌────────────────────────────────────────────────────────────────────────┐  │
│  │ config: Config                          // paths, interval, enabled    │  │
│  │ shared: Arc<Shared>                                                    │  │
│  │   state: RwLock<StoreState>             // index + metrics, one lock   │  │
│  │   ranking: RankingEngine                // full rescan per insert      │  │
│  │   scorer: Arc<dyn Scorer>               // QualityAssessor             │  │
│  │   persistence: Option<PersistenceManager>                              │  │
│  │   events: EventBus                      // broadcast RecordStored      │  │
│  │ scheduler: Mutex<Option<AutoPersistScheduler>>                         │  │
│  └────────────────────────────────────────────────────────────────────────┘  │
└──────────────────────────────────────────────────────────────────────────────┘

 insert(NewRecord, source, metadata)
   │
   ├─► Scorer::score(content)              scoring/scorer.rs
   ├─► RecordIndex::put(record)            index/record_index.rs
   ├─► RankingEngine::recompute(index)     search/ranking.rs
   └─► EventBus::publish(RecordStored)     core/events.rs

 AutoPersistScheduler (tokio interval)     writer/scheduler.rs
   └─► spawn_blocking(PersistTarget::persist_now)
         └─► PersistenceManager::persist   storage/persistence.rs
               Serializing ─► WritingTemp ─► Renaming ─► Idle
                                   └──────► Failed ───► Idle (fallback slot)
               every Nth success ─► backup copy

 Store::open ─► PersistenceManager::load_on_startup ─► RecordIndex::replace_all
               (missing / corrupt file ─► warn, start empty)

 On disk:  <dir>/records.json          { records, metrics, lastSaved }
           <dir>/.records.json.lock     flock held per persist cycle
           <dir>/.records.json.*.tmp    transient, renamed over records.json
*/
