use std::collections::HashMap;
use crate::core::types::Record;
use crate::core::error::{Error, ErrorKind, Result};

/// Authoritative `id -> Record` mapping.
///
/// Records are kept in insertion order; the position doubles as the
/// insertion sequence used to break ranking ties. Overwriting an id keeps
/// the slot of the record it replaces.
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    records: Vec<Record>,
    positions: HashMap<String, usize>,
}

impl RecordIndex {
    pub fn new() -> Self {
        RecordIndex::default()
    }

    /// Insert or overwrite. Returns the previous record stored under the id.
    pub fn put(&mut self, record: Record) -> Result<Option<Record>> {
        validate_id(&record.id)?;

        match self.positions.get(&record.id) {
            Some(&pos) => Ok(Some(std::mem::replace(&mut self.records[pos], record))),
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                Ok(None)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Copy of every record in insertion order.
    pub fn all(&self) -> Vec<Record> {
        self.records.clone()
    }

    /// Borrowing view in insertion order, for in-lock consumers.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.positions.clear();
    }

    /// Rebuild from an ordered sequence. Records failing validation are
    /// returned to the caller instead of being inserted.
    pub fn replace_all(&mut self, records: Vec<Record>) -> Vec<Record> {
        self.clear();
        let mut rejected = Vec::new();
        for record in records {
            if validate_id(&record.id).is_err() {
                rejected.push(record);
                continue;
            }
            // put() cannot fail past validation
            let _ = self.put(record);
        }
        rejected
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidRecord,
            "record id must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}
