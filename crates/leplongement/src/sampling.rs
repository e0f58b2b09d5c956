// Negative sampling table
//
// Smoothed unigram distribution over compact ids. Frequencies are raised to a
// smoothing exponent and renormalized, which under-samples dominant categories
// relative to their raw frequency. Draws use a cumulative distribution with a
// binary search per sample, so batches of thousands of negatives stay cheap
// for tens of thousands of categories.

use crate::error::{EmbeddingError, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Default smoothing exponent applied to destination frequencies
///
/// Skip-gram implementations commonly use 0.75; 0.6 flattens the
/// distribution further.
pub const DEFAULT_SAMPLING_EXPONENT: f64 = 0.6;

/// Weighted sampler over compact ids
#[derive(Debug, Clone)]
pub struct SamplingTable {
    ids: Vec<usize>,
    probabilities: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl SamplingTable {
    /// Build from `(compact id, probability)` pairs
    ///
    /// Pairs are sorted by id so that ids and probabilities stay aligned
    /// regardless of input order. Probabilities are renormalized to sum to 1.
    pub fn from_probabilities<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut pairs: Vec<(usize, f64)> = pairs.into_iter().collect();
        if pairs.is_empty() {
            return Err(EmbeddingError::InvalidDistribution(
                "no categories to sample from".to_string(),
            ));
        }
        pairs.sort_by_key(|(id, _)| *id);
        if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(EmbeddingError::InvalidDistribution(
                "duplicate compact id".to_string(),
            ));
        }
        if let Some((id, p)) = pairs.iter().find(|(_, p)| !p.is_finite() || *p < 0.0) {
            return Err(EmbeddingError::InvalidDistribution(format!(
                "probability {p} for id {id} is not a finite non-negative number"
            )));
        }

        let total: f64 = pairs.iter().map(|(_, p)| p).sum();
        if total <= 0.0 {
            return Err(EmbeddingError::InvalidDistribution(
                "total probability mass is zero".to_string(),
            ));
        }

        let (ids, probabilities): (Vec<usize>, Vec<f64>) =
            pairs.into_iter().map(|(id, p)| (id, p / total)).unzip();
        let index = WeightedIndex::new(&probabilities)
            .map_err(|e| EmbeddingError::InvalidDistribution(e.to_string()))?;

        Ok(Self {
            ids,
            probabilities,
            index,
        })
    }

    /// Build from raw `(compact id, count)` frequencies
    ///
    /// Each frequency is raised to `exponent` before renormalization.
    pub fn from_counts<I>(counts: I, exponent: f64) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, u64)>,
    {
        if !exponent.is_finite() || exponent < 0.0 {
            return Err(EmbeddingError::InvalidDistribution(format!(
                "smoothing exponent {exponent} must be finite and non-negative"
            )));
        }
        let counts: Vec<(usize, u64)> = counts.into_iter().collect();
        let total: u64 = counts.iter().map(|(_, c)| c).sum();
        if total == 0 {
            return Err(EmbeddingError::InvalidDistribution(
                "no observed frequencies".to_string(),
            ));
        }

        Self::from_probabilities(counts.into_iter().map(|(id, c)| {
            let freq = c as f64 / total as f64;
            // 0^0 would resurrect unseen ids
            let weight = if c == 0 { 0.0 } else { freq.powf(exponent) };
            (id, weight)
        }))
    }

    /// Draw `count` ids independently with replacement
    pub fn draw<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<usize> {
        (0..count)
            .map(|_| self.ids[self.index.sample(rng)])
            .collect()
    }

    /// Ids in ascending order
    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    /// Probabilities aligned with `ids()`
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// Probability of drawing `id`
    pub fn probability(&self, id: usize) -> Option<f64> {
        self.ids
            .binary_search(&id)
            .ok()
            .map(|pos| self.probabilities[pos])
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if the table has no categories
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
