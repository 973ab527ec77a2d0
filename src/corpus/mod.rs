//! Corpus store
//!
//! Append-only, ordered collection of categorized text entries. Writers are
//! serialized by a lock; readers get a [`CorpusSnapshot`] that is never mutated
//! in place, so an in-flight index build keeps a stable view while new batches
//! keep arriving.

mod loader;

pub use loader::{load_file, RawRecord};

use crate::config::DEFAULT_CATEGORY;
use crate::error::{Result, TextsimError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, RwLock};

/// Opaque, process-unique handle of a corpus entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable corpus entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEntry {
    pub id: EntryId,
    pub text: String,
    pub category: String,
}

/// Entry as submitted by a caller, before an id is assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewEntry {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: Some(category.into()),
        }
    }

    pub fn uncategorized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: None,
        }
    }
}

/// Point-in-time view of the corpus in insertion order
///
/// Cloning is cheap; later appends never show up in an existing snapshot.
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    entries: Arc<Vec<TextEntry>>,
}

impl Deref for CorpusSnapshot {
    type Target = [TextEntry];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

#[derive(Debug, Default)]
struct CorpusInner {
    entries: Arc<Vec<TextEntry>>,
    counts: BTreeMap<String, usize>,
    next_id: u64,
}

/// Thread-safe, append-only corpus
#[derive(Debug)]
pub struct CorpusStore {
    inner: RwLock<CorpusInner>,
    default_category: String,
}

impl Default for CorpusStore {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORY)
    }
}

impl CorpusStore {
    /// Create an empty store; entries without a category get `default_category`
    pub fn new(default_category: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(CorpusInner::default()),
            default_category: default_category.into(),
        }
    }

    /// Append entries in input order, returning how many were added
    ///
    /// The batch is validated as a whole: one blank text rejects every entry
    /// and leaves the corpus untouched.
    pub fn append(&self, entries: Vec<NewEntry>) -> Result<usize> {
        if let Some(pos) = entries.iter().position(|e| e.text.trim().is_empty()) {
            return Err(TextsimError::invalid(format!(
                "entry {} of batch has empty text",
                pos
            )));
        }

        if entries.is_empty() {
            return Ok(0);
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| TextsimError::poisoned("corpus"))?;
        let inner = &mut *inner;

        // Copies the vector only while a snapshot still shares it
        let list = Arc::make_mut(&mut inner.entries);
        list.reserve(entries.len());

        let appended = entries.len();
        for entry in entries {
            let category = self.normalize_category(entry.category);
            *inner.counts.entry(category.clone()).or_insert(0) += 1;

            list.push(TextEntry {
                id: EntryId(inner.next_id),
                text: entry.text,
                category,
            });
            inner.next_id += 1;
        }

        tracing::debug!("Appended {} entries (total {})", appended, list.len());

        Ok(appended)
    }

    /// Immutable view of the current corpus
    pub fn snapshot(&self) -> Result<CorpusSnapshot> {
        let inner = self
            .inner
            .read()
            .map_err(|_| TextsimError::poisoned("corpus"))?;
        Ok(CorpusSnapshot {
            entries: Arc::clone(&inner.entries),
        })
    }

    /// Number of entries per category, maintained incrementally
    pub fn category_counts(&self) -> Result<BTreeMap<String, usize>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| TextsimError::poisoned("corpus"))?;
        Ok(inner.counts.clone())
    }

    /// Total entries and per-category counts read under the same lock
    pub fn statistics(&self) -> Result<(usize, BTreeMap<String, usize>)> {
        let inner = self
            .inner
            .read()
            .map_err(|_| TextsimError::poisoned("corpus"))?;
        Ok((inner.entries.len(), inner.counts.clone()))
    }

    pub fn total(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|_| TextsimError::poisoned("corpus"))?;
        Ok(inner.entries.len())
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    fn normalize_category(&self, category: Option<String>) -> String {
        match category {
            Some(c) if !c.trim().is_empty() => c.trim().to_string(),
            _ => self.default_category.clone(),
        }
    }
}
