//! Record cache with concurrent TTL decay
//!
//! This module provides a thread-safe, TTL-aware cache of resolved answers.
//! Records are kept in insertion order and age out through a background decay
//! thread rather than through per-lookup expiry checks.
//!
//! # Cache behavior
//!
//! * Insertion appends; duplicates for the same `(name, type)` accumulate
//! * Lookup returns the first valid record in storage order and never mutates
//! * Once per second the decay thread decrements every dynamic TTL, evicts
//!   records that reached zero and renumbers the survivors densely
//! * Static records are exempt from expiry and always report an absent TTL
//!
//! All public operations and the decay tick serialize on one exclusive lock,
//! so no caller can observe a partially decremented or partially evicted
//! table.
//!
//! # Usage
//!
//! ```rust,no_run
//! # use rrcache::dns::cache::RecordCache;
//! let cache = RecordCache::new();
//! cache.run().unwrap();
//!
//! cache.insert("example.com", "A", "93.184.216.34", Some(300), false).unwrap();
//!
//! if let Some(record) = cache.lookup("example.com", "A") {
//!     // Use cached result
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{sleep, Builder};
use std::time::Duration;

use derive_more::{Display, Error, From};
use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Display, From, Error)]
pub enum CacheError {
    Io(std::io::Error),
    PoisonedLock,
}

type Result<T> = std::result::Result<T, CacheError>;

/// Period of the background decay sweep.
const DECAY_INTERVAL: Duration = Duration::from_secs(1);

/// One cached answer.
///
/// `record_number` is a dense display ordering, reassigned whenever the table
/// shrinks; it is not a stable identity. An absent `ttl` means the record
/// never expires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub record_number: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub qtype: String,
    pub value: String,
    pub ttl: Option<u32>,
    pub is_static: bool,
}

impl Record {
    /// A record answers lookups while it is static or still holds TTL.
    pub fn is_valid(&self) -> bool {
        self.is_static || matches!(self.ttl, Some(ttl) if ttl > 0)
    }
}

/// The unsynchronized record table. All shared access goes through
/// `RecordCache`; this type is public so deterministic tests can drive the
/// decay tick directly.
#[derive(Default)]
pub struct RecordStore {
    records: Vec<Record>,
    next_record_number: usize,
}

impl RecordStore {
    pub fn new() -> RecordStore {
        RecordStore {
            records: Vec::new(),
            next_record_number: 0,
        }
    }

    /// Appends a record numbered with the running counter. No dedup: an entry
    /// for an already cached `(name, type)` accumulates alongside the old one.
    /// A static record stores no TTL regardless of what was passed.
    pub fn insert(&mut self, name: &str, qtype: &str, value: &str, ttl: Option<u32>, is_static: bool) {
        self.records.push(Record {
            record_number: self.next_record_number,
            name: name.to_string(),
            qtype: qtype.to_string(),
            value: value.to_string(),
            ttl: if is_static { None } else { ttl },
            is_static,
        });
        self.next_record_number += 1;
    }

    /// First valid match in storage order. Expired entries that the decay
    /// sweep has not removed yet are skipped but left in place.
    pub fn lookup(&self, name: &str, qtype: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|rec| rec.name == name && rec.qtype == qtype && rec.is_valid())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// One decay sweep: decrement every dynamic TTL still above zero, evict
    /// dynamic records whose TTL is spent, then renumber the survivors
    /// densely and reset the insert counter to the surviving count.
    ///
    /// A dynamic record with an absent TTL is left untouched; it ages like a
    /// static one.
    pub fn tick(&mut self) {
        for rec in &mut self.records {
            if !rec.is_static {
                if let Some(ttl) = rec.ttl {
                    if ttl > 0 {
                        rec.ttl = Some(ttl - 1);
                    }
                }
            }
        }

        self.remove_expired();
    }

    fn remove_expired(&mut self) {
        let before = self.records.len();
        self.records
            .retain(|rec| rec.is_static || !matches!(rec.ttl, Some(0)));

        let evicted = before - self.records.len();
        if evicted > 0 {
            log::info!("evicted {} expired record(s)", evicted);
        }

        for (position, rec) in self.records.iter_mut().enumerate() {
            rec.record_number = position;
        }
        self.next_record_number = self.records.len();
    }
}

/// The synchronized cache handed out to the rest of the client. Owns the
/// background decay thread; every public operation and every decay tick
/// appears atomic with respect to the others.
pub struct RecordCache {
    store: Arc<Mutex<RecordStore>>,
    running: Arc<AtomicBool>,
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCache {
    pub fn new() -> RecordCache {
        RecordCache {
            store: Arc::new(Mutex::new(RecordStore::new())),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Launches the decay thread. Until this is called no record ever ages or
    /// expires. The thread runs for the lifetime of the cache and exits after
    /// its current tick once the cache is dropped.
    pub fn run(&self) -> Result<()> {
        let store = self.store.clone();
        let running = self.running.clone();

        Builder::new()
            .name("record-cache-decay".into())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    sleep(DECAY_INTERVAL);
                    if !running.load(Ordering::Acquire) {
                        break;
                    }

                    match store.lock() {
                        Ok(mut store) => store.tick(),
                        // A writer panicked while holding the lock; stop
                        // sweeping rather than spin on the poisoned table.
                        Err(_) => break,
                    }
                }
            })?;

        Ok(())
    }

    pub fn insert(
        &self,
        name: &str,
        qtype: &str,
        value: &str,
        ttl: Option<u32>,
        is_static: bool,
    ) -> Result<()> {
        let mut store = self.store.lock().map_err(|_| CacheError::PoisonedLock)?;

        store.insert(name, qtype, value, ttl, is_static);

        Ok(())
    }

    pub fn lookup(&self, name: &str, qtype: &str) -> Option<Record> {
        let store = match self.store.lock() {
            Ok(x) => x,
            Err(_) => return None,
        };

        store.lookup(name, qtype).cloned()
    }

    /// Consistent point-in-time copy of the whole table, in storage order.
    /// Entries that expired but have not been swept yet are included.
    pub fn snapshot(&self) -> Result<Vec<Record>> {
        let store = self.store.lock().map_err(|_| CacheError::PoisonedLock)?;

        Ok(store.records().to_vec())
    }
}

impl Drop for RecordCache {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_lookup_validity() {
        let mut store = RecordStore::new();

        // Verify that no data is returned when nothing is present
        assert!(store.lookup("www.google.com", "A").is_none());

        store.insert("www.google.com", "A", "127.0.0.1", Some(60), false);
        store.insert("www.google.com", "NS", "ns1.google.com", None, true);
        store.insert("www.yahoo.com", "A", "127.0.0.2", Some(0), false);
        store.insert("www.bing.com", "A", "127.0.0.3", None, false);

        // Dynamic record with remaining TTL
        let rec = store.lookup("www.google.com", "A").unwrap();
        assert_eq!("127.0.0.1", rec.value);

        // Static record, TTL reported absent
        let rec = store.lookup("www.google.com", "NS").unwrap();
        assert!(rec.is_static);
        assert_eq!(None, rec.ttl);

        // Spent TTL is not valid even before the sweep runs
        assert!(store.lookup("www.yahoo.com", "A").is_none());

        // Dynamic record without a TTL never answers lookups
        assert!(store.lookup("www.bing.com", "A").is_none());

        // Same name, different type, is a miss
        assert!(store.lookup("www.google.com", "AAAA").is_none());
    }

    #[test]
    fn test_duplicates_first_valid_wins() {
        let mut store = RecordStore::new();

        store.insert("multi.com", "A", "1.1.1.1", Some(0), false);
        store.insert("multi.com", "A", "2.2.2.2", Some(30), false);
        store.insert("multi.com", "A", "3.3.3.3", Some(30), false);

        // The first entry is expired, so the second answers
        let rec = store.lookup("multi.com", "A").unwrap();
        assert_eq!("2.2.2.2", rec.value);

        // All three stay in storage until a sweep
        assert_eq!(3, store.records().len());
    }

    #[test]
    fn test_insert_numbers_from_running_counter() {
        let mut store = RecordStore::new();

        store.insert("a.com", "A", "1.1.1.1", Some(5), false);
        store.insert("b.com", "A", "2.2.2.2", Some(5), false);

        assert_eq!(0, store.records()[0].record_number);
        assert_eq!(1, store.records()[1].record_number);
    }

    #[test]
    fn test_static_insert_drops_ttl() {
        let mut store = RecordStore::new();

        store.insert("b.com", "NS", "ns1.b.com", Some(120), true);

        assert_eq!(None, store.records()[0].ttl);
        assert!(store.records()[0].is_valid());
    }

    #[test]
    fn test_synchronized_ops() {
        let cache = RecordCache::new();

        cache
            .insert("example.com", "A", "93.184.216.34", Some(300), false)
            .unwrap();

        let rec = cache.lookup("example.com", "A").unwrap();
        assert_eq!("93.184.216.34", rec.value);

        assert!(cache.lookup("example.com", "CNAME").is_none());

        let snapshot = cache.snapshot().unwrap();
        assert_eq!(1, snapshot.len());
        assert_eq!(Some(300), snapshot[0].ttl);
    }
}
