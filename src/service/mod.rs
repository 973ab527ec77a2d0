//! Request/response contracts consumed by the boundary layer
//!
//! `SearchService` is the only thing the IPC server and the CLI talk to. It
//! applies boundary defaults (top-N, category fallback) and rejects malformed
//! input before any indexing work starts.

use crate::config::Config;
use crate::corpus::NewEntry;
use crate::error::{Result, TextsimError};
use crate::search::{QueryOutcome, SearchCoordinator, SearchState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeSearchResponse {
    pub texts_loaded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilaritySearchRequest {
    pub query: String,
    /// Signed so the boundary can reject non-positive values explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarText {
    pub text: String,
    pub category: String,
    pub similarity_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilaritySearchResponse {
    pub query: String,
    pub results: Vec<SimilarText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendCorpusRequest {
    pub entries: Vec<NewEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendCorpusResponse {
    pub appended: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStatistics {
    pub total: usize,
    pub per_category: BTreeMap<String, usize>,
}

/// Subsystem status, reported by the daemon's `status` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub state: SearchState,
    pub corpus_size: usize,
    pub indexed: usize,
    pub stale: bool,
    pub builds: u64,
}

/// Shared entry point for every boundary call
#[derive(Clone)]
pub struct SearchService {
    coordinator: Arc<SearchCoordinator>,
    default_top_n: usize,
}

impl SearchService {
    pub fn new(config: &Config) -> Result<Self> {
        let coordinator = Arc::new(SearchCoordinator::new(config)?);
        Ok(Self::from_coordinator(coordinator))
    }

    pub fn from_coordinator(coordinator: Arc<SearchCoordinator>) -> Self {
        let default_top_n = coordinator.settings().default_top_n;
        Self {
            coordinator,
            default_top_n,
        }
    }

    pub fn coordinator(&self) -> &Arc<SearchCoordinator> {
        &self.coordinator
    }

    /// Build the index if needed and report how many texts it covers
    pub fn initialize_search(&self) -> Result<InitializeSearchResponse> {
        let published = self.coordinator.initialize()?;
        Ok(InitializeSearchResponse {
            texts_loaded: published.corpus_len(),
        })
    }

    pub fn similarity_search(
        &self,
        request: &SimilaritySearchRequest,
    ) -> Result<SimilaritySearchResponse> {
        if request.query.trim().is_empty() {
            tracing::warn!("Rejected similarity search with empty query");
            return Err(TextsimError::invalid("query text cannot be empty"));
        }

        let top_n = match request.top_n {
            None => self.default_top_n,
            Some(n) if n <= 0 => {
                tracing::warn!("Rejected similarity search with top_n = {}", n);
                return Err(TextsimError::invalid(format!(
                    "top_n must be positive, got {}",
                    n
                )));
            }
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };

        let outcome = self.coordinator.query(&request.query, top_n)?;
        Ok(outcome.into())
    }

    pub fn extend_corpus(&self, request: ExtendCorpusRequest) -> Result<ExtendCorpusResponse> {
        let appended = self.coordinator.extend_corpus(request.entries)?;
        let total = self.coordinator.corpus().total()?;

        tracing::info!("Corpus extended by {} entries (total {})", appended, total);

        Ok(ExtendCorpusResponse { appended, total })
    }

    pub fn corpus_statistics(&self) -> Result<CorpusStatistics> {
        let (total, per_category) = self.coordinator.corpus().statistics()?;
        Ok(CorpusStatistics {
            total,
            per_category,
        })
    }

    pub fn status(&self) -> Result<ServiceStatus> {
        let published = self.coordinator.published()?;
        Ok(ServiceStatus {
            state: self.coordinator.state()?,
            corpus_size: self.coordinator.corpus().total()?,
            indexed: published.map(|p| p.corpus_len()).unwrap_or(0),
            stale: self.coordinator.is_stale()?,
            builds: self.coordinator.builds_completed(),
        })
    }
}

impl From<QueryOutcome> for SimilaritySearchResponse {
    fn from(outcome: QueryOutcome) -> Self {
        Self {
            query: outcome.query,
            results: outcome
                .hits
                .into_iter()
                .map(|hit| SimilarText {
                    text: hit.text,
                    category: hit.category,
                    similarity_percent: hit.similarity_percent,
                })
                .collect(),
        }
    }
}
