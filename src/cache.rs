//! Metadata cache.
//!
//! Schema documents are fetched rarely and parsed once. Entries are keyed by
//! endpoint and never mutated; eviction only removes them.
//!
//! The async path is single-flight: while no entry exists, concurrent callers
//! queue on one process-wide gate so the factory runs at most once per miss.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CacheError;
use crate::metadata::Metadata;
use crate::model::SchemaModel;
use crate::naming::NameMatcher;

#[cfg(feature = "remote")]
use crate::error::ModelError;

#[cfg(feature = "remote")]
const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

lazy_static! {
    static ref GLOBAL_CACHE: MetadataCache = MetadataCache::new();
}

/// A schema document and the adapter built from it.
#[derive(Debug)]
pub struct MetadataCacheEntry {
    key: String,
    document: String,
    adapter: Arc<dyn Metadata>,
}

impl MetadataCacheEntry {
    /// # Errors
    ///
    /// `EmptyKey` or `EmptyDocument` when either is blank.
    pub fn new(
        key: impl Into<String>,
        document: impl Into<String>,
        adapter: Arc<dyn Metadata>,
    ) -> Result<Self, CacheError> {
        let key = key.into();
        let document = document.into();
        if key.trim().is_empty() {
            return Err(CacheError::EmptyKey);
        }
        if document.trim().is_empty() {
            return Err(CacheError::EmptyDocument { key });
        }
        Ok(Self {
            key,
            document,
            adapter,
        })
    }

    /// Parse a JSON model document into a [`SchemaModel`] adapter.
    pub fn from_model_document(
        key: impl Into<String>,
        document: impl Into<String>,
        matcher: Arc<dyn NameMatcher>,
    ) -> Result<Self, CacheError> {
        let key = key.into();
        let document = document.into();
        if key.trim().is_empty() {
            return Err(CacheError::EmptyKey);
        }
        if document.trim().is_empty() {
            return Err(CacheError::EmptyDocument { key });
        }

        let model = SchemaModel::from_json(&document)?.with_name_matcher(matcher);
        Self::new(key, document, Arc::new(model))
    }

    /// Download the model document at `url` and build an entry keyed by it.
    ///
    /// Blocking; pass it to [`MetadataCache::get_or_add`] from synchronous code.
    ///
    /// # Errors
    ///
    /// `ModelError::NetworkError` when the request fails or the server
    /// answers with an error status.
    #[cfg(feature = "remote")]
    pub fn fetch(url: &str, matcher: Arc<dyn NameMatcher>) -> Result<Self, CacheError> {
        let network = |source| ModelError::NetworkError {
            url: url.to_string(),
            source,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(network)?;
        let document = client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(network)?;

        debug!(url, bytes = document.len(), "fetched model document");
        Self::from_model_document(url, document, matcher)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn adapter(&self) -> Arc<dyn Metadata> {
        self.adapter.clone()
    }
}

/// Endpoint-keyed store of metadata entries.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<String, Arc<MetadataCacheEntry>>>,
    gate: Mutex<()>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> &'static MetadataCache {
        &GLOBAL_CACHE
    }

    pub fn get(&self, key: &str) -> Option<Arc<MetadataCacheEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
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

    /// Entry for `key`, produced by `factory` on a miss.
    ///
    /// Not single-flight: racing callers may each run the factory, and the
    /// first entry stored wins.
    pub fn get_or_add<F, E>(&self, key: &str, factory: F) -> Result<Arc<MetadataCacheEntry>, E>
    where
        F: FnOnce(&str) -> Result<MetadataCacheEntry, E>,
    {
        if let Some(entry) = self.get(key) {
            return Ok(entry);
        }
        debug!(key, "metadata cache miss");
        let entry = factory(key)?;
        Ok(self.store(key, entry))
    }

    /// Entry for `key`, produced by `factory` on a miss, at most once at a time.
    ///
    /// The gate is released whether or not the factory succeeds; a failed
    /// fetch leaves the cache unchanged.
    pub async fn get_or_add_async<F, Fut, E>(
        &self,
        key: &str,
        factory: F,
    ) -> Result<Arc<MetadataCacheEntry>, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<MetadataCacheEntry, E>>,
    {
        if let Some(entry) = self.get(key) {
            return Ok(entry);
        }

        let _gate = self.gate.lock().await;
        if let Some(entry) = self.get(key) {
            return Ok(entry);
        }

        debug!(key, "metadata cache miss, fetching");
        let entry = factory(key.to_string()).await?;
        Ok(self.store(key, entry))
    }

    fn store(&self, key: &str, entry: MetadataCacheEntry) -> Arc<MetadataCacheEntry> {
        let stored = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(entry))
            .clone();
        debug!(key, "metadata cache filled");
        stored
    }

    /// Evict every entry. In-flight fetches are not cancelled.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn clear_key(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
