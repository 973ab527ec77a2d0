/// Sparse feature vectors and cosine similarity
use serde::{Deserialize, Serialize};

/// Sparse vector with strictly increasing feature indices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVector {
    /// Build from (index, value) pairs; duplicate indices are summed
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.sort_by_key(|(i, _)| *i);

        let mut indices: Vec<u32> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f32> = Vec::with_capacity(pairs.len());

        for (i, v) in pairs {
            match indices.last() {
                Some(&last) if last == i => {
                    if let Some(slot) = values.last_mut() {
                        *slot += v;
                    }
                }
                _ => {
                    indices.push(i);
                    values.push(v);
                }
            }
        }

        Self { indices, values }
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Scale to unit length in place; the zero vector stays zero
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }

    /// Dot product via merge over the sorted index lists
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut a, mut b) = (0usize, 0usize);
        let mut sum = 0.0f32;

        while a < self.indices.len() && b < other.indices.len() {
            match self.indices[a].cmp(&other.indices[b]) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[a] * other.values[b];
                    a += 1;
                    b += 1;
                }
            }
        }

        sum
    }

    /// Largest feature index + 1, or 0 for an empty vector
    pub fn min_dimension(&self) -> usize {
        self.indices.last().map(|i| *i as usize + 1).unwrap_or(0)
    }
}

/// Cosine similarity in [-1, 1]; 0 when either vector is zero
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f32 {
    let norm_a = a.norm();
    let norm_b = b.norm();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (a.dot(b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Percentage shown to callers: `max(0, similarity) * 100` rounded to `decimals`
pub fn similarity_percent(similarity: f32, decimals: u32) -> f64 {
    let clipped = f64::from(similarity.clamp(0.0, 1.0));
    let scale = 10f64.powi(decimals as i32);
    ((clipped * 100.0) * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_sorts_and_merges() {
        let v = SparseVector::from_pairs(vec![(3, 1.0), (1, 2.0), (3, 0.5)]);
        let pairs: Vec<_> = v.iter().collect();
        assert_eq!(pairs, vec![(1, 2.0), (3, 1.5)]);
        assert_eq!(v.min_dimension(), 4);
    }

    #[test]
    fn test_dot_and_cosine() {
        let a = SparseVector::from_pairs(vec![(0, 1.0), (2, 1.0)]);
        let b = SparseVector::from_pairs(vec![(2, 1.0), (5, 1.0)]);

        assert_eq!(a.dot(&b), 1.0);
        assert!((cosine_similarity(&a, &b) - 0.5).abs() < 1e-6);
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_similarity() {
        let a = SparseVector::default();
        let b = SparseVector::from_pairs(vec![(1, 1.0)]);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert!(a.is_zero());
    }

    #[test]
    fn test_normalize() {
        let mut v = SparseVector::from_pairs(vec![(0, 3.0), (1, 4.0)]);
        v.normalize();
        assert!((v.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_percent_never_negative() {
        assert_eq!(similarity_percent(-0.4, 2), 0.0);
        assert_eq!(similarity_percent(0.0, 2), 0.0);
        assert_eq!(similarity_percent(0.123456, 2), 12.35);
        assert_eq!(similarity_percent(0.99999994, 2), 100.0);
        assert_eq!(similarity_percent(1.0, 0), 100.0);
    }
}
