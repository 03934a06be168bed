use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::dns::RecordId;

/// Maps a challenge FQDN to the identifier of the record created for it.
///
/// Entries live as long as the owning solver. A later Present for the same
/// FQDN overwrites the previous identifier.
#[derive(Debug, Default)]
pub struct RecordCache {
    ids: Mutex<HashMap<String, RecordId>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, fqdn: &str, id: RecordId) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fqdn.to_string(), id);
    }

    pub fn lookup(&self, fqdn: &str) -> Option<RecordId> {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(fqdn)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
