use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use super::mode::ReportMode;
use crate::llm::Credential;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// In-memory map with a fixed time-to-live and an entry cap.
///
/// Entries are inserted whole under the write lock. When full, expired entries are
/// purged first and then the oldest entry is evicted.
pub struct TtlCache<V> {
    ttl: Duration,
    capacity: usize,
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: String, value: V) {
        let Ok(mut entries) = self.entries.write() else {
            tracing::warn!("cache lock poisoned, skipping insert");
            return;
        };

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

            if entries.len() >= self.capacity
                && let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Digest of everything that determines a report. The credential enters only as its
/// fingerprint.
pub fn report_key(
    mode: ReportMode,
    clamped_context: &str,
    credential: &Credential,
    explicit_model: Option<&str>,
) -> String {
    let fingerprint = credential.fingerprint();
    let mut hasher = Sha256::new();
    for part in [
        mode.as_str(),
        clamped_context,
        fingerprint.as_str(),
        explicit_model.unwrap_or(""),
    ] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}
