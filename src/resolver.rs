//! Identifier to display-name resolution with process-lifetime memoization
//!
//! Names are cached without expiry: display names rarely change within a
//! session, and a stale name is preferable to re-querying the backend for
//! every message of every page.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::directory::ContactDirectory;
use crate::errors::AppResult;

/// Returned for an empty identifier; never cached
pub const UNKNOWN_NAME: &str = "Unknown";

/// Memoizing identifier resolver
///
/// Concurrent misses for the same key may each query the directory; the first
/// stored value wins and every caller converges on it.
#[derive(Debug)]
pub struct NameResolver<D> {
    directory: D,
    cache: RwLock<HashMap<String, String>>,
}

impl<D: ContactDirectory> NameResolver<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            cache: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Resolve `identifier` to a display name
    ///
    /// On a miss the first search hit's title is cached; an empty search result
    /// caches the identifier itself so the failed lookup is not repeated.
    ///
    /// # Errors
    ///
    /// Propagates directory failures. Failed lookups are not cached.
    pub async fn resolve(&self, identifier: &str) -> AppResult<String> {
        if identifier.is_empty() {
            return Ok(UNKNOWN_NAME.to_owned());
        }
        if let Some(name) = self.cached(identifier) {
            return Ok(name);
        }

        let contacts = self.directory.search_contacts(identifier).await?;
        let name = contacts
            .into_iter()
            .next()
            .and_then(|c| c.title)
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| identifier.to_owned());
        debug!(identifier, %name, "resolved identifier");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(identifier.to_owned()).or_insert(name).clone())
    }

    /// Cached name for `identifier`, without querying the directory
    pub fn cached(&self, identifier: &str) -> Option<String> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
