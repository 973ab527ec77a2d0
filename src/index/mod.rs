/// Exact cosine-similarity index over a corpus snapshot
use crate::corpus::{EntryId, TextEntry};
use crate::error::{Result, TextsimError};
use crate::vectorizer::{SparseVector, VectorSpace, Vectorizer};
use std::cmp::Ordering;

/// Vectorized corpus entry; `position` is its insertion rank in the snapshot
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub entry_id: EntryId,
    pub position: usize,
    pub vector: SparseVector,
}

/// Ranked query match
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub entry_id: EntryId,
    pub position: usize,
    /// Cosine similarity in [-1, 1]
    pub similarity: f32,
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    position: u32,
    weight: f32,
}

/// Immutable similarity index
///
/// Vectors are unit length, so cosine similarity is the dot product. Scores are
/// accumulated through per-feature posting lists; entries sharing no feature
/// with the query score 0 and are only materialized to pad short result lists.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    entries: Vec<IndexEntry>,
    postings: Vec<Vec<Posting>>,
    dimension: usize,
}

impl SimilarityIndex {
    /// Vectorize every snapshot entry into `space`
    pub fn build(vectorizer: &Vectorizer, space: &VectorSpace, snapshot: &[TextEntry]) -> Result<Self> {
        if snapshot.len() > u32::MAX as usize {
            return Err(TextsimError::BuildFailure(format!(
                "corpus of {} entries exceeds index capacity",
                snapshot.len()
            )));
        }

        let dimension = space.dimension();
        let mut postings: Vec<Vec<Posting>> = vec![Vec::new(); dimension];
        let mut entries = Vec::with_capacity(snapshot.len());

        for (position, entry) in snapshot.iter().enumerate() {
            let vector = vectorizer.transform(space, &entry.text);

            if vector.min_dimension() > dimension {
                return Err(TextsimError::BuildFailure(format!(
                    "entry {} produced a vector of dimension {} in a space of {}",
                    entry.id,
                    vector.min_dimension(),
                    dimension
                )));
            }

            for (feature, weight) in vector.iter() {
                postings[feature as usize].push(Posting {
                    position: position as u32,
                    weight,
                });
            }

            entries.push(IndexEntry {
                entry_id: entry.id,
                position,
                vector,
            });
        }

        Ok(Self {
            entries,
            postings,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn entry(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    /// Top `top_n` entries by similarity, ties broken by insertion order
    ///
    /// Returns exactly `min(top_n, len)` hits; an empty index yields no hits.
    pub fn query(&self, query: &SparseVector, top_n: usize) -> Result<Vec<IndexHit>> {
        if top_n == 0 {
            return Err(TextsimError::invalid("top_n must be greater than 0"));
        }

        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        if query.min_dimension() > self.dimension {
            return Err(TextsimError::invalid(format!(
                "query vector has dimension {}, index has {}",
                query.min_dimension(),
                self.dimension
            )));
        }

        let mut scores = vec![0.0f32; self.entries.len()];
        let mut touched: Vec<u32> = Vec::new();
        let mut seen = vec![false; self.entries.len()];

        for (feature, query_weight) in query.iter() {
            for posting in &self.postings[feature as usize] {
                let p = posting.position as usize;
                scores[p] += query_weight * posting.weight;
                if !seen[p] {
                    seen[p] = true;
                    touched.push(posting.position);
                }
            }
        }

        let mut ranked: Vec<(usize, f32)> = touched
            .into_iter()
            .map(|p| (p as usize, scores[p as usize].clamp(-1.0, 1.0)))
            .filter(|(_, s)| *s != 0.0)
            .collect();
        ranked.sort_by(rank_order);

        let split = ranked.partition_point(|(_, s)| *s > 0.0);
        let (positive, negative) = ranked.split_at(split);

        let limit = top_n.min(self.entries.len());
        let mut hits: Vec<(usize, f32)> = Vec::with_capacity(limit);
        hits.extend(positive.iter().take(limit).copied());

        // Entries with no shared feature tie at zero and keep insertion order
        if hits.len() < limit {
            let missing = limit - hits.len();
            hits.extend(
                scores
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| **s == 0.0)
                    .map(|(p, _)| (p, 0.0))
                    .take(missing),
            );
        }

        if hits.len() < limit {
            let missing = limit - hits.len();
            hits.extend(negative.iter().take(missing).copied());
        }

        Ok(hits
            .into_iter()
            .map(|(position, similarity)| IndexHit {
                entry_id: self.entries[position].entry_id,
                position,
                similarity,
            })
            .collect())
    }
}

/// Similarity descending, then position ascending
fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}
