//! The formula cache: source text to built executor.
//!
//! A bounded map protected by a mutex. Lookups refresh recency; when an
//! insert pushes the entry count past the configured maximum, least-recently
//! used entries are dropped until only the reduction size remains, so a burst
//! of distinct expressions does not thrash the cache one eviction at a time.

use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::error::Result;
use crate::eval::Formula;

#[derive(Debug)]
pub struct FormulaCache {
    entries: Mutex<LruCache<String, Arc<Formula>>>,
    maximum_size: usize,
    reduction_size: usize,
}

impl FormulaCache {
    /// Creates a cache that trims from `maximum_size` down to
    /// `reduction_size`. Sizes are validated by the evaluator builder.
    pub fn new(maximum_size: usize, reduction_size: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            maximum_size,
            reduction_size,
        }
    }

    /// Returns the cached formula for an expression, refreshing its recency.
    pub fn get(&self, key: &str) -> Option<Arc<Formula>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Returns the cached formula or builds and inserts one.
    ///
    /// The build runs outside the lock so a slow build never blocks readers
    /// of other keys. If two threads race on the same key, the first insert
    /// wins and the later builder discards its own result in favor of the
    /// winner's, which keeps get-or-build linearizable per key.
    pub fn get_or_build<F>(&self, key: &str, build: F) -> Result<Arc<Formula>>
    where
        F: FnOnce() -> Result<Formula>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let built = Arc::new(build()?);

        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(key) {
            return Ok(Arc::clone(existing));
        }
        entries.put(key.to_string(), Arc::clone(&built));
        if entries.len() > self.maximum_size {
            let before = entries.len();
            while entries.len() > self.reduction_size {
                if entries.pop_lru().is_none() {
                    break;
                }
            }
            tracing::trace!(
                evicted = before - entries.len(),
                remaining = entries.len(),
                "trimmed formula cache"
            );
        }
        Ok(built)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}
