// Element embedding store
//
// Owns one embedding row per distinct destination value. A source id (graph
// node) can have several destinations; a positive lookup picks one of them
// uniformly. Negative ids come from the smoothed frequency distribution.

use crate::compact::CompactIndex;
use crate::error::{EmbeddingError, Result};
use crate::gather::{gather_rows, index_tensor};
use crate::param::ParamStore;
use crate::sampling::{SamplingTable, DEFAULT_SAMPLING_EXPONENT};
use candle_core::backprop::GradStore;
use candle_core::Tensor;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

/// Name of the element table parameter
pub const ELEMENT_TABLE_PARAM: &str = "elements.embedding";

/// Element store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ElementConfig {
    /// Width of every element embedding
    pub emb_size: usize,
    /// Exponent applied to destination frequencies for negative sampling
    pub sampling_exponent: f64,
}

impl Default for ElementConfig {
    fn default() -> Self {
        Self {
            emb_size: 100,
            sampling_exponent: DEFAULT_SAMPLING_EXPONENT,
        }
    }
}

/// Chosen compact ids and their embedding rows
#[derive(Debug, Clone)]
pub struct ElementRows {
    /// Compact ids, one per requested source
    pub ids: Vec<usize>,
    /// Embedding rows aligned with `ids`, still attached to the table
    pub embeddings: Tensor,
}

/// Embedding table over destination categories
#[derive(Debug, Clone)]
pub struct ElementEmbedder<D: Ord + Hash + Clone> {
    elem2id: CompactIndex<D>,
    element_lookup: HashMap<usize, Vec<usize>>,
    sources: Vec<usize>,
    table: Tensor,
    emb_size: usize,
    sampler: SamplingTable,
}

impl<D: Ord + Hash + Clone> ElementEmbedder<D> {
    /// Build the store from `(source id, destination value)` records
    ///
    /// Records are grouped by source in a single pass. Each group keeps its
    /// destinations in record order; groups are listed in first-seen order.
    /// The table is registered in `params` as [`ELEMENT_TABLE_PARAM`].
    pub fn new<R: Rng + ?Sized>(
        records: &[(usize, D)],
        config: &ElementConfig,
        params: &ParamStore,
        rng: &mut R,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(EmbeddingError::EmptyElements);
        }

        let elem2id = CompactIndex::from_values(records.iter().map(|(_, dst)| dst.clone()));
        let mut counts = vec![0u64; elem2id.len()];
        let mut element_lookup: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut sources = Vec::new();

        for (src, dst) in records {
            // every destination was compacted above
            let Some(id) = elem2id.id(dst) else {
                continue;
            };
            counts[id] += 1;
            match element_lookup.entry(*src) {
                Entry::Occupied(mut e) => e.get_mut().push(id),
                Entry::Vacant(e) => {
                    sources.push(*src);
                    e.insert(vec![id]);
                }
            }
        }

        let sampler = SamplingTable::from_counts(
            counts.into_iter().enumerate(),
            config.sampling_exponent,
        )?;

        let bound = 1.0 / (config.emb_size.max(1) as f32).sqrt();
        let table = params.uniform(
            ELEMENT_TABLE_PARAM,
            (elem2id.len(), config.emb_size),
            bound,
            rng,
        )?;

        debug!(
            sources = sources.len(),
            elements = elem2id.len(),
            records = records.len(),
            "Built element embedding store"
        );

        Ok(Self {
            elem2id,
            element_lookup,
            sources,
            table,
            emb_size: config.emb_size,
            sampler,
        })
    }

    /// Pick one compact id per source id, uniformly among its destinations
    pub fn sample_positive<R: Rng + ?Sized>(
        &self,
        source_ids: &[usize],
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        source_ids
            .iter()
            .map(|src| {
                self.element_lookup
                    .get(src)
                    .and_then(|ids| ids.choose(rng).copied())
                    .ok_or(EmbeddingError::UnknownSource(*src))
            })
            .collect()
    }

    /// Pick one destination per source and return its embedding rows
    pub fn lookup<R: Rng + ?Sized>(&self, source_ids: &[usize], rng: &mut R) -> Result<ElementRows> {
        let ids = self.sample_positive(source_ids, rng)?;
        let embeddings = self.embed(&ids)?;
        Ok(ElementRows { ids, embeddings })
    }

    /// Embedding rows for explicit compact ids
    pub fn embed(&self, compact_ids: &[usize]) -> Result<Tensor> {
        gather_rows(&self.table, compact_ids)
    }

    /// Draw `count` negative compact ids with replacement
    pub fn sample_negative<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<usize> {
        self.sampler.draw(count, rng)
    }

    /// Scatter-add gradient rows into the table's entry of `grads`
    ///
    /// Row `i` of `row_grads` is added to table row `compact_ids[i]`;
    /// repeated ids add up. Backpropagating through [`Self::embed`] does the
    /// same; this is for gradients computed outside the autograd graph.
    pub fn accumulate_gradient(
        &self,
        grads: &mut GradStore,
        compact_ids: &[usize],
        row_grads: &Tensor,
    ) -> Result<()> {
        let rows = row_grads.dim(0)?;
        if rows != compact_ids.len() {
            return Err(EmbeddingError::LengthMismatch {
                expected: compact_ids.len(),
                got: rows,
            });
        }
        if let Some(&index) = compact_ids.iter().find(|&&id| id >= self.n_elements()) {
            return Err(EmbeddingError::IndexOutOfRange {
                index,
                len: self.n_elements(),
            });
        }
        let current = match grads.remove(&self.table) {
            Some(grad) => grad,
            None => self.table.zeros_like()?,
        };
        let ids = index_tensor(compact_ids, self.table.device())?;
        let updated = current.index_add(&ids, row_grads, 0)?;
        grads.insert(&self.table, updated);
        Ok(())
    }

    /// Number of distinct source ids
    pub fn len(&self) -> usize {
        self.element_lookup.len()
    }

    /// True if no source ids are known
    pub fn is_empty(&self) -> bool {
        self.element_lookup.is_empty()
    }

    /// Number of distinct destination values
    pub fn n_elements(&self) -> usize {
        self.elem2id.len()
    }

    /// Embedding width
    pub fn emb_size(&self) -> usize {
        self.emb_size
    }

    /// Destination value -> compact id table
    pub fn elem2id(&self) -> &CompactIndex<D> {
        &self.elem2id
    }

    /// Compact ids recorded for `source`, in record order
    pub fn element_lookup(&self, source: usize) -> Option<&[usize]> {
        self.element_lookup.get(&source).map(Vec::as_slice)
    }

    /// True if `source` has at least one destination
    pub fn contains_source(&self, source: usize) -> bool {
        self.element_lookup.contains_key(&source)
    }

    /// Source ids in first-seen order
    pub fn sources(&self) -> &[usize] {
        &self.sources
    }

    /// Negative sampling table
    pub fn sampler(&self) -> &SamplingTable {
        &self.sampler
    }

    /// Current embedding table
    pub fn table(&self) -> &Tensor {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> ElementConfig {
        ElementConfig {
            emb_size: 5,
            ..ElementConfig::default()
        }
    }

    fn store() -> ElementEmbedder<u64> {
        let records = vec![(0, 6), (1, 11), (2, 12), (3, 11), (4, 14), (4, 15), (5, 16)];
        ElementEmbedder::new(
            &records,
            &config(),
            &ParamStore::default(),
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap()
    }

    fn rows(t: &Tensor) -> Vec<Vec<f32>> {
        t.to_vec2::<f32>().unwrap()
    }

    #[test]
    fn test_grouping_and_sizes() {
        let ee = store();
        assert_eq!(ee.len(), 6);
        assert_eq!(ee.n_elements(), 6);
        assert_eq!(ee.emb_size(), 5);
        assert_eq!(ee.element_lookup(4), Some(&[3, 4][..]));
        assert_eq!(ee.sources(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(ee.table().dims(), &[6, 5]);
    }

    #[test]
    fn test_table_is_registered() {
        let params = ParamStore::default();
        let records = vec![(0, "a"), (1, "b")];
        let ee = ElementEmbedder::new(&records, &config(), &params, &mut StdRng::seed_from_u64(0))
            .unwrap();
        let registered = params.get(ELEMENT_TABLE_PARAM).unwrap();
        assert_eq!(rows(&registered), rows(ee.table()));
        let bound = 1.0 / 5f32.sqrt();
        assert!(rows(ee.table()).iter().flatten().all(|v| v.abs() <= bound));
    }

    #[test]
    fn test_single_destination_lookup_is_deterministic() {
        let ee = store();
        let mut rng = StdRng::seed_from_u64(11);
        let first = ee.lookup(&[1], &mut rng).unwrap();
        for _ in 0..20 {
            let again = ee.lookup(&[1], &mut rng).unwrap();
            assert_eq!(again.ids, vec![1]);
            assert_eq!(rows(&again.embeddings), rows(&first.embeddings));
        }
    }

    #[test]
    fn test_multi_destination_lookup_covers_all_choices() {
        let ee = store();
        let mut rng = StdRng::seed_from_u64(5);
        let ids = ee.sample_positive(&[4; 200], &mut rng).unwrap();
        assert!(ids.contains(&3));
        assert!(ids.contains(&4));
        assert!(ids.iter().all(|id| *id == 3 || *id == 4));
    }

    #[test]
    fn test_unknown_source_is_an_error() {
        let ee = store();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            ee.lookup(&[0, 99], &mut rng),
            Err(EmbeddingError::UnknownSource(99))
        ));
    }

    #[test]
    fn test_embed_matches_table_rows() {
        let ee = store();
        let table = rows(ee.table());
        let picked = rows(&ee.embed(&[2, 2, 0]).unwrap());
        assert_eq!(picked[0], table[2]);
        assert_eq!(picked[1], table[2]);
        assert_eq!(picked[2], table[0]);
        assert!(ee.embed(&[6]).is_err());
    }

    #[test]
    fn test_negative_samples_in_range() {
        let ee = store();
        let mut rng = StdRng::seed_from_u64(9);
        let neg = ee.sample_negative(500, &mut rng);
        assert_eq!(neg.len(), 500);
        assert!(neg.iter().all(|id| *id < ee.n_elements()));
    }

    #[test]
    fn test_gradient_reaches_only_looked_up_rows() {
        let ee = store();
        let loss = ee.embed(&[1, 1]).unwrap().sum_all().unwrap();
        let grads = loss.backward().unwrap();
        let grad = rows(grads.get(ee.table()).unwrap());
        assert_eq!(grad[1], vec![2.0; 5]);
        assert_eq!(grad[0], vec![0.0; 5]);
    }

    #[test]
    fn test_accumulate_gradient_adds_to_existing_rows() {
        let ee = store();
        let loss = ee.embed(&[1]).unwrap().sum_all().unwrap();
        let mut grads = loss.backward().unwrap();

        let extra = Tensor::ones((2, 5), candle_core::DType::F32, ee.table().device()).unwrap();
        ee.accumulate_gradient(&mut grads, &[0, 0], &extra).unwrap();
        ee.accumulate_gradient(&mut grads, &[1], &extra.narrow(0, 0, 1).unwrap())
            .unwrap();

        let grad = rows(grads.get(ee.table()).unwrap());
        assert_eq!(grad[0], vec![2.0; 5]);
        assert_eq!(grad[1], vec![2.0; 5]);
        assert_eq!(grad[2], vec![0.0; 5]);
        assert!(ee.accumulate_gradient(&mut grads, &[0], &extra).is_err());
        assert!(ee
            .accumulate_gradient(&mut grads, &[6, 0], &extra)
            .is_err());
    }

    #[test]
    fn test_empty_records_rejected() {
        let records: Vec<(usize, u64)> = Vec::new();
        assert!(matches!(
            ElementEmbedder::new(
                &records,
                &config(),
                &ParamStore::default(),
                &mut StdRng::seed_from_u64(0)
            ),
            Err(EmbeddingError::EmptyElements)
        ));
    }
}
