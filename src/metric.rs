//! Similarity metrics over dense vectors.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// The similarity metric used to score and order search results.
///
/// Cosine and dot-product scores are similarities (higher is better);
/// Euclidean scores are distances (lower is better). [`Metric::cmp_scores`]
/// encapsulates the direction so callers can sort uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity: dot product of L2-normalized vectors.
    #[default]
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Raw dot product.
    Dot,
}

impl Metric {
    /// Compute the score between two vectors under this metric.
    ///
    /// For [`Metric::Cosine`], returns 0.0 if either vector has zero
    /// magnitude. Both slices must have the same length; the shorter length
    /// is used if they differ (indexes validate lengths before calling this).
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => {
                let dot = dot(a, b);
                let norm_a = norm(a);
                let norm_b = norm(b);
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 0.0;
                }
                dot / (norm_a * norm_b)
            }
            Metric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Metric::Dot => dot(a, b),
        }
    }

    /// Order two scores so that the better one compares as `Less`.
    ///
    /// Sorting with this comparator puts the best result first regardless of
    /// whether the metric is a distance or a similarity.
    pub fn cmp_scores(&self, a: f32, b: f32) -> Ordering {
        match self {
            Metric::Euclidean => a.total_cmp(&b),
            Metric::Cosine | Metric::Dot => b.total_cmp(&a),
        }
    }

    /// Convert a score into a distance where smaller is always better.
    ///
    /// Graph traversal works internally in distance space; similarities are
    /// negated.
    pub(crate) fn to_distance(&self, score: f32) -> f32 {
        match self {
            Metric::Euclidean => score,
            Metric::Cosine | Metric::Dot => -score,
        }
    }
}

/// Dot product of two equal-length vectors.
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 norm of a vector.
pub(crate) fn norm(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, 0.4, 0.5];
        let score = Metric::Cosine.score(&v, &v);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(Metric::Cosine.score(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 2.0];
        assert_eq!(Metric::Cosine.score(&a, &b), 0.0);
    }

    #[test]
    fn euclidean_distance() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((Metric::Euclidean.score(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn dot_product() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![4.0, 5.0, 6.0];
        assert!((Metric::Dot.score(&a, &b) - 32.0).abs() < 1e-6);
    }

    #[test]
    fn ordering_direction_per_metric() {
        // Smaller euclidean distance is better
        assert_eq!(Metric::Euclidean.cmp_scores(0.5, 1.0), Ordering::Less);
        // Larger cosine similarity is better
        assert_eq!(Metric::Cosine.cmp_scores(0.9, 0.2), Ordering::Less);
        assert_eq!(Metric::Dot.cmp_scores(0.1, 0.8), Ordering::Greater);
    }

    #[test]
    fn serde_round_trip_lowercase() {
        let json = serde_json::to_string(&Metric::Cosine).unwrap();
        assert_eq!(json, "\"cosine\"");
        let parsed: Metric = serde_json::from_str("\"euclidean\"").unwrap();
        assert_eq!(parsed, Metric::Euclidean);
    }
}
