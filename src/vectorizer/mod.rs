//! TF-IDF vectorizer
//!
//! `fit` derives a [`VectorSpace`] (vocabulary + IDF weights) from a corpus
//! snapshot; `transform` maps any text into that space. Feature ids follow the
//! lexicographic order of the vocabulary, so two fits over the same snapshot
//! produce identical spaces and identical scores.

mod sparse;
mod tokenizer;

pub use sparse::{cosine_similarity, similarity_percent, SparseVector};
pub use tokenizer::{normalize, Tokenizer};

use crate::config::VectorizerConfig;
use crate::corpus::TextEntry;
use crate::error::{Result, TextsimError};
use ahash::{AHashMap, AHashSet};

/// Vocabulary and IDF weights derived from one corpus snapshot
#[derive(Debug, Clone, Default)]
pub struct VectorSpace {
    vocabulary: AHashMap<String, u32>,
    idf: Vec<f32>,
    documents: usize,
}

impl VectorSpace {
    /// Number of features (vector dimensionality)
    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    /// Number of documents the space was fitted on
    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    pub fn feature_id(&self, feature: &str) -> Option<u32> {
        self.vocabulary.get(feature).copied()
    }

    pub fn idf(&self, feature_id: u32) -> Option<f32> {
        self.idf.get(feature_id as usize).copied()
    }
}

/// Stateless text-to-vector mapper; all state lives in the [`VectorSpace`]
#[derive(Debug, Clone)]
pub struct Vectorizer {
    tokenizer: Tokenizer,
    sublinear_tf: bool,
}

impl Vectorizer {
    pub fn new(config: &VectorizerConfig) -> Result<Self> {
        Ok(Self {
            tokenizer: Tokenizer::new(config)?,
            sublinear_tf: config.sublinear_tf,
        })
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Derive a vector space from a corpus snapshot
    ///
    /// An empty snapshot yields an empty space, which is valid: every text
    /// then maps to the zero vector.
    pub fn fit(&self, entries: &[TextEntry]) -> Result<VectorSpace> {
        let mut doc_freq: AHashMap<String, usize> = AHashMap::new();

        for entry in entries {
            let unique: AHashSet<String> = self.tokenizer.features(&entry.text).into_iter().collect();
            for feature in unique {
                *doc_freq.entry(feature).or_insert(0) += 1;
            }
        }

        if doc_freq.len() > u32::MAX as usize {
            return Err(TextsimError::BuildFailure(format!(
                "vocabulary of {} features exceeds the addressable dimension",
                doc_freq.len()
            )));
        }

        let mut terms: Vec<(String, usize)> = doc_freq.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        // Smoothed IDF: ln((1 + N) / (1 + df)) + 1, always positive
        let n = entries.len() as f32;
        let mut vocabulary = AHashMap::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());

        for (id, (term, df)) in terms.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + df as f32)).ln() + 1.0);
            vocabulary.insert(term, id as u32);
        }

        Ok(VectorSpace {
            vocabulary,
            idf,
            documents: entries.len(),
        })
    }

    /// Map text into `space`; unknown features contribute nothing
    pub fn transform(&self, space: &VectorSpace, text: &str) -> SparseVector {
        if space.is_empty() {
            return SparseVector::default();
        }

        let mut tf: AHashMap<u32, u32> = AHashMap::new();
        for feature in self.tokenizer.features(text) {
            if let Some(id) = space.feature_id(&feature) {
                *tf.entry(id).or_insert(0) += 1;
            }
        }

        let pairs: Vec<(u32, f32)> = tf
            .into_iter()
            .map(|(id, count)| {
                let tf = if self.sublinear_tf {
                    1.0 + (count as f32).ln()
                } else {
                    count as f32
                };
                (id, tf * space.idf[id as usize])
            })
            .collect();

        let mut vector = SparseVector::from_pairs(pairs);
        vector.normalize();
        vector
    }
}
