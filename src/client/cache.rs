//! Bounded, persisted history of notification-worthy events.
//!
//! The cache is a newest-first sequence stored as one JSON array under
//! [`NOTIFICATIONS_KEY`]. Every mutation is a read-modify-write of that
//! array, serialized by an internal mutex.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::client::storage::{ClientStorage, NOTIFICATIONS_KEY};
use crate::domain::{Envelope, ReceivedEnvelope};
use crate::error::StorageError;

/// Default maximum number of cached entries.
pub const DEFAULT_CAPACITY: usize = 100;

/// Newest-first ring buffer persisted in [`ClientStorage`].
#[derive(Debug)]
pub struct NotificationCache {
    storage: Arc<dyn ClientStorage>,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl NotificationCache {
    /// Creates a cache over `storage` holding at most `capacity` entries.
    #[must_use]
    pub fn new(storage: Arc<dyn ClientStorage>, capacity: usize) -> Self {
        Self {
            storage,
            capacity: capacity.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Maximum number of entries kept.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stamps `envelope` with a fresh id, the receipt time and `read: false`,
    /// prepends it, drops whatever falls beyond capacity, and persists.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the updated sequence cannot be written.
    /// An unreadable existing sequence is treated as empty.
    pub fn store(&self, envelope: &Envelope) -> Result<ReceivedEnvelope, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Stamped under the lock so receipt order matches insertion order.
        let received = ReceivedEnvelope::stamp(envelope.clone());

        let mut entries = self.get_all();
        entries.insert(0, received.clone());
        entries.truncate(self.capacity);
        self.persist(&entries)?;
        Ok(received)
    }

    /// Full persisted sequence, newest first. A storage failure or an
    /// unreadable document yields an empty sequence; single entries that no
    /// longer decode are skipped.
    #[must_use]
    pub fn get_all(&self) -> Vec<ReceivedEnvelope> {
        match self.storage.get(NOTIFICATIONS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Value>>(&raw) {
                Ok(entries) => decode_entries(entries),
                Err(e) => {
                    tracing::warn!(error = %e, "notification cache is corrupt, ignoring");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read notification cache");
                Vec::new()
            }
        }
    }

    /// Marks one entry as read. Returns `Ok(false)` if no entry has that id.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the updated sequence cannot be written.
    pub fn mark_read(&self, id: &str) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.get_all();
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };
        if entry.read {
            return Ok(true);
        }
        entry.read = true;
        self.persist(&entries)?;
        Ok(true)
    }

    /// Marks every entry as read, returning how many changed.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the updated sequence cannot be written.
    pub fn mark_all_read(&self) -> Result<usize, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.get_all();
        let mut changed = 0;
        for entry in entries.iter_mut().filter(|e| !e.read) {
            entry.read = true;
            changed += 1;
        }
        if changed > 0 {
            self.persist(&entries)?;
        }
        Ok(changed)
    }

    /// Number of unread entries (badge count).
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.get_all().iter().filter(|e| !e.read).count()
    }

    /// Deletes the persisted sequence.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the storage cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.storage.remove(NOTIFICATIONS_KEY)
    }

    fn persist(&self, entries: &[ReceivedEnvelope]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(entries)?;
        self.storage.set(NOTIFICATIONS_KEY, &raw)
    }
}

fn decode_entries(entries: Vec<Value>) -> Vec<ReceivedEnvelope> {
    let total = entries.len();
    let decoded: Vec<ReceivedEnvelope> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(received) => Some(received),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable cached notification");
                None
            }
        })
        .collect();
    if decoded.len() < total {
        tracing::debug!(kept = decoded.len(), total, "notification cache partially readable");
    }
    decoded
}
