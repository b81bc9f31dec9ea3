use serde::{Serialize, Deserialize};
use tokio::sync::broadcast;
use crate::core::types::{Metadata, Record};

/// Emitted after every successful insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordStored {
    pub id: String,
    pub source: String,
    pub metadata: Metadata,
}

impl RecordStored {
    pub fn from_record(record: &Record) -> Self {
        RecordStored {
            id: record.id.clone(),
            source: record.source.clone(),
            metadata: record.metadata.clone(),
        }
    }
}

/// Fan-out of store events to any number of subscribers.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<RecordStored>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        EventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordStored> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send synchronously. Having no subscribers is not an error.
    pub fn publish(&self, event: RecordStored) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}
