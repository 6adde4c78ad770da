//! Keyed state for last-observed counter samples.
//!
//! The store replaces the ambient previous-value variables a collector
//! would otherwise keep: every delta-normalized counter gets a disjoint
//! [`SampleKey`] and the scheduler thread owns the single [`SampleStore`]
//! instance, passed by reference into the normalizer. Nothing here is
//! persisted; the store starts empty on every process start.

use std::collections::HashMap;

/// Stable identifier for one normalized counter.
///
/// Keys are plain strings like `"resume_latency/buckets"` or
/// `"zram/huge_pages_since_boot"`; unrelated counters must use disjoint
/// keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleKey(String);

impl SampleKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SampleKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SampleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last known raw values for a key, plus the shape fingerprint used to
/// detect structural resets. Scalars are stored as a one-element vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub values: Vec<i64>,
    /// Shape fingerprint, captured explicitly rather than inferred from
    /// `values.len()` at comparison time.
    pub fingerprint: usize,
}

impl SampleRecord {
    pub fn new(values: Vec<i64>) -> Self {
        let fingerprint = values.len();
        Self {
            values,
            fingerprint,
        }
    }
}

/// Mapping from [`SampleKey`] to [`SampleRecord`].
///
/// Created on first observation, overwritten on every subsequent
/// observation, removed only on explicit structural reset.
#[derive(Debug, Default)]
pub struct SampleStore {
    records: HashMap<SampleKey, SampleRecord>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SampleKey) -> Option<&SampleRecord> {
        self.records.get(key)
    }

    /// Store `values` as the new record for `key`, overwriting any prior.
    pub fn put(&mut self, key: SampleKey, values: Vec<i64>) {
        self.records.insert(key, SampleRecord::new(values));
    }

    pub fn remove(&mut self, key: &SampleKey) -> Option<SampleRecord> {
        self.records.remove(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
