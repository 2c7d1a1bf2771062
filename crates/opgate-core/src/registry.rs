//! Lazily populated, per-scope instance maps.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Maps a scope key (`Service.Operation`) to a shared instance, creating it on
/// first access.
///
/// Lookups take a read lock; only the first access to a scope takes the write
/// lock, and re-checks before inserting so concurrent first accesses agree on
/// a single instance.
pub struct Registry<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the instance for `scope`, building it with `make` if absent.
    pub fn get_or_insert_with<F>(&self, scope: &str, make: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get(scope) {
            return existing;
        }

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            entries
                .entry(scope.to_string())
                .or_insert_with(|| Arc::new(make())),
        )
    }

    /// Returns the instance for `scope` without creating one.
    pub fn get(&self, scope: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .cloned()
    }

    /// Scopes seen so far.
    pub fn scopes(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("scopes", &self.scopes())
            .finish()
    }
}
