//! Search coordinator
//!
//! Owns the corpus and the published `(VectorSpace, SimilarityIndex)` pair.
//! Builds are lazy and single-flight: the first caller that finds the index
//! missing (or stale) builds it while concurrent callers wait on the build lock
//! and then reuse what it published. Queries only clone the published `Arc`,
//! so an abandoned query never holds shared state.

use crate::config::{Config, SearchConfig};
use crate::corpus::{CorpusSnapshot, CorpusStore, EntryId, NewEntry};
use crate::error::{Result, TextsimError};
use crate::index::{IndexHit, SimilarityIndex};
use crate::vectorizer::{similarity_percent, SparseVector, VectorSpace, Vectorizer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::{debug, info};

/// Lifecycle of the search subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Vector space, index and the corpus snapshot they were built from
///
/// Published as one unit; a query sees either all of the old triple or all
/// of the new one.
#[derive(Debug)]
pub struct PublishedIndex {
    pub space: VectorSpace,
    pub index: SimilarityIndex,
    pub snapshot: CorpusSnapshot,
    pub built_at: DateTime<Utc>,
    pub build_ms: u64,
}

impl PublishedIndex {
    /// Corpus size at build time
    pub fn corpus_len(&self) -> usize {
        self.snapshot.len()
    }
}

/// One ranked match with its display fields resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarHit {
    pub entry_id: EntryId,
    pub text: String,
    pub category: String,
    pub similarity: f32,
    pub similarity_percent: f64,
}

/// Query answer plus the query text echoed back for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub hits: Vec<SimilarHit>,
    /// Corpus size covered by the index that answered
    pub indexed: usize,
    pub elapsed_ms: u64,
}

pub struct SearchCoordinator {
    corpus: CorpusStore,
    vectorizer: Vectorizer,
    settings: SearchConfig,
    published: RwLock<Option<Arc<PublishedIndex>>>,
    build_lock: Mutex<()>,
    building: AtomicBool,
    builds: AtomicU64,
}

impl SearchCoordinator {
    /// Create a coordinator with an empty corpus
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_parts(
            CorpusStore::new(config.corpus.default_category.clone()),
            Vectorizer::new(&config.vectorizer)?,
            config.search.clone(),
        ))
    }

    pub fn with_parts(corpus: CorpusStore, vectorizer: Vectorizer, settings: SearchConfig) -> Self {
        Self {
            corpus,
            vectorizer,
            settings,
            published: RwLock::new(None),
            build_lock: Mutex::new(()),
            building: AtomicBool::new(false),
            builds: AtomicU64::new(0),
        }
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    pub fn settings(&self) -> &SearchConfig {
        &self.settings
    }

    pub fn state(&self) -> Result<SearchState> {
        if self.published()?.is_some() {
            Ok(SearchState::Ready)
        } else if self.building.load(Ordering::SeqCst) {
            Ok(SearchState::Initializing)
        } else {
            Ok(SearchState::Uninitialized)
        }
    }

    /// Number of completed index builds
    pub fn builds_completed(&self) -> u64 {
        self.builds.load(Ordering::SeqCst)
    }

    /// Currently published index, if any
    pub fn published(&self) -> Result<Option<Arc<PublishedIndex>>> {
        let guard = self
            .published
            .read()
            .map_err(|_| TextsimError::poisoned("published index"))?;
        Ok(guard.clone())
    }

    /// True when the corpus has outgrown the published index
    pub fn is_stale(&self) -> Result<bool> {
        let total = self.corpus.total()?;
        Ok(match self.published()? {
            Some(published) => self.outgrown(&published, total),
            None => false,
        })
    }

    /// Build the index if none exists yet; a no-op once `Ready`
    pub fn initialize(&self) -> Result<Arc<PublishedIndex>> {
        self.ensure(|published, _| published.is_none())
    }

    /// Append entries; the index is left stale until the next query
    pub fn extend_corpus(&self, entries: Vec<NewEntry>) -> Result<usize> {
        let appended = self.corpus.append(entries)?;

        if appended > 0 && self.is_stale()? {
            debug!("Index marked stale after appending {} entries", appended);
        }

        Ok(appended)
    }

    /// Rank corpus entries by similarity to `text`
    ///
    /// A missing or stale index is rebuilt synchronously first.
    pub fn query(&self, text: &str, top_n: usize) -> Result<QueryOutcome> {
        if text.trim().is_empty() {
            return Err(TextsimError::invalid("query text cannot be empty"));
        }
        if top_n == 0 {
            return Err(TextsimError::invalid("top_n must be greater than 0"));
        }

        let start = Instant::now();
        let published = self.ensure(|published, total| match published {
            Some(p) => self.outgrown(p, total),
            None => true,
        })?;

        let query_vector = self.vectorizer.transform(&published.space, text);
        let hits = if self.settings.collapse_duplicates {
            self.ranked_unique(&published, &query_vector, top_n)?
        } else {
            published.index.query(&query_vector, top_n)?
        };

        let hits: Vec<SimilarHit> = hits
            .into_iter()
            .map(|hit| self.resolve(&published, hit))
            .collect::<Result<_>>()?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Query '{}' matched {} hits over {} entries in {}ms",
            preview(text),
            hits.len(),
            published.corpus_len(),
            elapsed_ms
        );

        Ok(QueryOutcome {
            query: text.to_string(),
            hits,
            indexed: published.corpus_len(),
            elapsed_ms,
        })
    }

    /// Single-flight build guarded by `build_lock`
    ///
    /// `needs_build` is checked once without the lock and again after
    /// acquiring it, so callers that queued behind a build reuse its result.
    fn ensure<F>(&self, needs_build: F) -> Result<Arc<PublishedIndex>>
    where
        F: Fn(Option<&PublishedIndex>, usize) -> bool,
    {
        if let Some(current) = self.fresh(&needs_build)? {
            return Ok(current);
        }

        let _guard = self
            .build_lock
            .lock()
            .map_err(|_| TextsimError::poisoned("build"))?;

        if let Some(current) = self.fresh(&needs_build)? {
            return Ok(current);
        }

        self.building.store(true, Ordering::SeqCst);
        let result = self.build_and_publish();
        self.building.store(false, Ordering::SeqCst);
        result
    }

    fn fresh<F>(&self, needs_build: &F) -> Result<Option<Arc<PublishedIndex>>>
    where
        F: Fn(Option<&PublishedIndex>, usize) -> bool,
    {
        let total = self.corpus.total()?;
        let current = self.published()?;
        if needs_build(current.as_deref(), total) {
            Ok(None)
        } else {
            Ok(current)
        }
    }

    fn build_and_publish(&self) -> Result<Arc<PublishedIndex>> {
        let start = Instant::now();
        let snapshot = self.corpus.snapshot()?;

        info!("Building similarity index over {} entries", snapshot.len());

        let space = self.vectorizer.fit(&snapshot)?;
        let index = SimilarityIndex::build(&self.vectorizer, &space, &snapshot)?;

        let build_ms = start.elapsed().as_millis() as u64;
        let published = Arc::new(PublishedIndex {
            space,
            index,
            snapshot,
            built_at: Utc::now(),
            build_ms,
        });

        {
            let mut slot = self
                .published
                .write()
                .map_err(|_| TextsimError::poisoned("published index"))?;
            *slot = Some(Arc::clone(&published));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);

        info!(
            "Similarity index ready: {} entries, {} features, {}ms",
            published.corpus_len(),
            published.space.dimension(),
            build_ms
        );

        Ok(published)
    }

    fn outgrown(&self, published: &PublishedIndex, total: usize) -> bool {
        total.saturating_sub(published.corpus_len()) >= self.settings.stale_threshold
    }

    /// Ranked hits with repeated texts dropped, widening the window until
    /// `top_n` unique texts are found or the index is exhausted
    fn ranked_unique(
        &self,
        published: &PublishedIndex,
        query_vector: &SparseVector,
        top_n: usize,
    ) -> Result<Vec<IndexHit>> {
        let total = published.index.len();
        let mut window = top_n.saturating_mul(2).min(total.max(1));

        loop {
            let candidates = published.index.query(query_vector, window)?;
            let mut seen: HashSet<&str> = HashSet::new();
            let unique: Vec<IndexHit> = candidates
                .into_iter()
                .filter(|hit| {
                    published
                        .snapshot
                        .get(hit.position)
                        .map(|e| seen.insert(e.text.as_str()))
                        .unwrap_or(false)
                })
                .take(top_n)
                .collect();

            if unique.len() >= top_n || window >= total {
                return Ok(unique);
            }
            window = window.saturating_mul(2).min(total);
        }
    }

    fn resolve(&self, published: &PublishedIndex, hit: IndexHit) -> Result<SimilarHit> {
        let entry = published.snapshot.get(hit.position).ok_or_else(|| {
            TextsimError::ConcurrencyFault(format!(
                "hit position {} outside snapshot of {}",
                hit.position,
                published.corpus_len()
            ))
        })?;

        if entry.id != hit.entry_id {
            return Err(TextsimError::ConcurrencyFault(format!(
                "index entry {} does not match snapshot entry {}",
                hit.entry_id, entry.id
            )));
        }

        Ok(SimilarHit {
            entry_id: entry.id,
            text: entry.text.clone(),
            category: entry.category.clone(),
            similarity: hit.similarity,
            similarity_percent: similarity_percent(hit.similarity, self.settings.percent_decimals),
        })
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> SearchCoordinator {
        SearchCoordinator::new(&Config::default()).unwrap()
    }

    fn seed(c: &SearchCoordinator) {
        c.extend_corpus(vec![
            NewEntry::new("Nunca te rindas", "motivacional"),
            NewEntry::new("El amor todo lo puede", "amor"),
            NewEntry::new("Ríe y sonríe", "humor"),
        ])
        .unwrap();
    }

    #[test]
    fn test_lifecycle_states() {
        let c = coordinator();
        assert_eq!(c.state().unwrap(), SearchState::Uninitialized);

        seed(&c);
        let published = c.initialize().unwrap();
        assert_eq!(published.corpus_len(), 3);
        assert_eq!(c.state().unwrap(), SearchState::Ready);
    }

    #[test]
    fn test_state_is_initializing_during_build() {
        let c = Arc::new(coordinator());
        let entries: Vec<NewEntry> = (0..20_000)
            .map(|i| {
                NewEntry::new(
                    format!("frase {} palabra{} texto{} variante{}", i, i * 7, i * 13, i * 31),
                    "carga",
                )
            })
            .collect();
        c.extend_corpus(entries).unwrap();

        let builder = {
            let c = Arc::clone(&c);
            std::thread::spawn(move || c.initialize().map(|p| p.corpus_len()))
        };

        let mut observed = Vec::new();
        while c.builds_completed() == 0 && !builder.is_finished() {
            let state = c.state().unwrap();
            if observed.last() != Some(&state) {
                observed.push(state);
            }
            std::thread::yield_now();
        }

        assert_eq!(builder.join().unwrap().unwrap(), 20_000);
        assert!(
            observed.contains(&SearchState::Initializing),
            "states seen while building: {:?}",
            observed
        );
        assert_eq!(c.state().unwrap(), SearchState::Ready);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let c = coordinator();
        seed(&c);

        let first = c.initialize().unwrap();
        let second = c.initialize().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(c.builds_completed(), 1);
    }

    #[test]
    fn test_initialize_does_not_rebuild_stale_index() {
        let c = coordinator();
        seed(&c);
        c.initialize().unwrap();

        c.extend_corpus(vec![NewEntry::new("otra frase", "humor")])
            .unwrap();
        assert!(c.is_stale().unwrap());

        c.initialize().unwrap();
        assert_eq!(c.builds_completed(), 1);
    }

    #[test]
    fn test_query_rebuilds_when_stale() {
        let c = coordinator();
        seed(&c);
        c.initialize().unwrap();

        c.extend_corpus(vec![NewEntry::new("Sigue adelante sin rendirte", "motivacional")])
            .unwrap();

        let outcome = c.query("rendirte", 1).unwrap();
        assert_eq!(outcome.indexed, 4);
        assert_eq!(outcome.hits[0].text, "Sigue adelante sin rendirte");
        assert_eq!(c.builds_completed(), 2);
        assert!(!c.is_stale().unwrap());
    }

    #[test]
    fn test_stale_threshold_defers_rebuild() {
        let config = Config {
            search: SearchConfig {
                stale_threshold: 3,
                ..SearchConfig::default()
            },
            ..Config::default()
        };
        let c = SearchCoordinator::new(&config).unwrap();
        seed(&c);
        c.query("amor", 1).unwrap();

        c.extend_corpus(vec![NewEntry::new("nuevo", "a"), NewEntry::new("otro", "b")])
            .unwrap();
        assert_eq!(c.query("amor", 1).unwrap().indexed, 3);

        c.extend_corpus(vec![NewEntry::new("tercero", "c")]).unwrap();
        assert_eq!(c.query("amor", 1).unwrap().indexed, 6);
    }

    #[test]
    fn test_blank_query_rejected_before_build() {
        let c = coordinator();
        seed(&c);

        let err = c.query("   ", 5).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(c.builds_completed(), 0);

        let err = c.query("amor", 0).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(c.state().unwrap(), SearchState::Uninitialized);
    }

    #[test]
    fn test_empty_corpus_is_ready_and_empty() {
        let c = coordinator();
        let published = c.initialize().unwrap();
        assert_eq!(published.corpus_len(), 0);

        let outcome = c.query("hola", 5).unwrap();
        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.query, "hola");
    }

    #[test]
    fn test_collapse_duplicates() {
        let config = Config {
            search: SearchConfig {
                collapse_duplicates: true,
                ..SearchConfig::default()
            },
            ..Config::default()
        };
        let c = SearchCoordinator::new(&config).unwrap();
        c.extend_corpus(vec![
            NewEntry::new("Nunca te rindas", "motivacional"),
            NewEntry::new("Nunca te rindas", "motivacional"),
            NewEntry::new("Nunca te rindas", "otros"),
            NewEntry::new("El amor todo lo puede", "amor"),
        ])
        .unwrap();

        let outcome = c.query("Nunca te rindas", 2).unwrap();
        let texts: Vec<&str> = outcome.hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["Nunca te rindas", "El amor todo lo puede"]);
        assert_eq!(outcome.hits[0].entry_id.as_u64(), 0);
    }
}
