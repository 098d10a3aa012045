//! In-memory vector store for few-shot examples and document chunks
//!
//! Items are embedded once at build time and kept in insertion order.
//! Selection ranks by exact distance with ties broken by insertion order, so
//! results are deterministic for a given provider. An HNSW graph can be
//! enabled to narrow the candidate set on large stores; candidates are still
//! re-ranked exactly.

mod distance;
mod persist;

pub use distance::{cosine_distance, l2_distance, DistanceMetric};
pub use persist::{read_manifest, IndexManifest, Trust, FORMAT_VERSION};

use crate::config::DocumentsConfig;
use crate::embedding::{EmbeddingError, EmbeddingProvider, VectorIndex};
use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form string metadata attached to an item, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An embedded item; immutable once stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    /// BLAKE3 hash of the text (not unique: equal texts share an id)
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

/// A selected item with its distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    /// Insertion position in the store
    pub position: usize,
    pub text: String,
    pub metadata: Metadata,
    pub distance: f32,
}

impl ScoredItem {
    /// First `max_chars` characters of the text, with `...` when truncated
    pub fn preview(&self, max_chars: usize) -> String {
        match self.text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.text[..cut]),
            None => self.text.clone(),
        }
    }
}

/// HNSW construction and search parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    /// Candidates gathered per requested result before exact re-ranking
    pub oversample: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            oversample: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum IndexKind {
    /// Exhaustive exact search
    #[default]
    Flat,
    Hnsw(HnswParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StoreOptions {
    pub metric: DistanceMetric,
    pub index: IndexKind,
}

impl StoreOptions {
    pub fn flat(metric: DistanceMetric) -> Self {
        Self {
            metric,
            index: IndexKind::Flat,
        }
    }

    pub fn from_documents(config: &DocumentsConfig) -> Result<Self> {
        let metric = config.metric.parse()?;
        let index = match config.index.as_str() {
            "hnsw" => IndexKind::Hnsw(HnswParams {
                m: config.hnsw_m,
                ef_construction: config.hnsw_ef_construction,
                ef_search: config.hnsw_ef_search,
                ..HnswParams::default()
            }),
            _ => IndexKind::Flat,
        };
        Ok(Self { metric, index })
    }
}

/// Ordered collection of embedded items
pub struct Store {
    items: Vec<StoredItem>,
    dimension: usize,
    embedding_model: String,
    options: StoreOptions,
    ann: Option<VectorIndex>,
}

impl Store {
    /// Embed every entry (one batch call) and store them in order
    pub fn build(
        provider: &dyn EmbeddingProvider,
        entries: Vec<(String, Metadata)>,
        options: StoreOptions,
    ) -> Result<Self> {
        let texts: Vec<String> = entries.iter().map(|(text, _)| text.clone()).collect();
        let vectors = provider.embed_batch(&texts)?;

        if vectors.len() != entries.len() {
            return Err(EmbeddingError::GenerationError(format!(
                "Expected {} embeddings, got {}",
                entries.len(),
                vectors.len()
            ))
            .into());
        }

        let items = entries
            .into_iter()
            .zip(vectors)
            .map(|((text, metadata), vector)| StoredItem {
                id: content_id(&text),
                text,
                vector,
                metadata,
            })
            .collect();

        let store = Self::from_items(items, provider.model_name(), options)?;
        tracing::info!(
            "Indexed {} items ({}D, {}, model {})",
            store.len(),
            store.dimension,
            store.options.metric,
            store.embedding_model
        );
        Ok(store)
    }

    /// Assemble a store from already embedded items
    pub fn from_items(
        items: Vec<StoredItem>,
        embedding_model: &str,
        options: StoreOptions,
    ) -> Result<Self> {
        let dimension = items.first().map(|i| i.vector.len()).unwrap_or(0);
        for item in &items {
            if item.vector.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimension,
                    actual: item.vector.len(),
                }
                .into());
            }
        }

        let ann = match options.index {
            IndexKind::Hnsw(params) if !items.is_empty() => build_ann(&items, dimension, &options, params),
            _ => None,
        };

        Ok(Self {
            items,
            dimension,
            embedding_model: embedding_model.to_string(),
            options,
            ann,
        })
    }

    /// At most `k` items closest to `query`, nearest first
    ///
    /// `k == 0` or an empty store return an empty list without calling the
    /// provider.
    pub fn select(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredItem>> {
        if k == 0 || self.items.is_empty() {
            return Ok(Vec::new());
        }
        let vector = provider.embed(query)?;
        self.select_by_vector(&vector, k)
    }

    /// Same as [`Store::select`] for a caller that already holds the embedding
    pub fn select_by_vector(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredItem>> {
        if k == 0 || self.items.is_empty() {
            return Ok(Vec::new());
        }
        if vector.len() != self.dimension {
            return Err(QueryError::Embedding(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            }));
        }

        let k = k.min(self.items.len());
        let candidates = self.candidates(vector, k)?;

        let mut ranked: Vec<(usize, f32)> = candidates
            .into_iter()
            .map(|position| {
                let distance = self
                    .options
                    .metric
                    .distance(vector, &self.items[position].vector);
                (position, distance)
            })
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(position, distance)| {
                let item = &self.items[position];
                ScoredItem {
                    position,
                    text: item.text.clone(),
                    metadata: item.metadata.clone(),
                    distance,
                }
            })
            .collect())
    }

    /// Positions to rank exactly: every item, or an HNSW shortlist
    fn candidates(&self, vector: &[f32], k: usize) -> Result<Vec<usize>> {
        let all = || (0..self.items.len()).collect::<Vec<_>>();

        let (ann, params) = match (&self.ann, self.options.index) {
            (Some(ann), IndexKind::Hnsw(params)) => (ann, params),
            _ => return Ok(all()),
        };

        let wanted = k.saturating_mul(params.oversample.max(1)).min(self.items.len());
        let mut positions: Vec<usize> = ann.search(vector, wanted)?.into_iter().map(|r| r.id).collect();
        positions.sort_unstable();
        positions.dedup();

        // Approximate search can come back short; fall back to exhaustive.
        if positions.len() < k {
            tracing::debug!(
                "HNSW returned {} of {} candidates, ranking all items",
                positions.len(),
                k
            );
            return Ok(all());
        }
        Ok(positions)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.options.metric
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn items(&self) -> &[StoredItem] {
        &self.items
    }
}

fn build_ann(
    items: &[StoredItem],
    dimension: usize,
    options: &StoreOptions,
    params: HnswParams,
) -> Option<VectorIndex> {
    let result = VectorIndex::new(
        options.metric,
        dimension,
        items.len(),
        params.m,
        params.ef_construction,
        params.ef_search,
    )
    .and_then(|index| {
        index.insert_all(items.iter().map(|item| item.vector.as_slice()))?;
        Ok(index)
    });

    match result {
        Ok(index) => Some(index),
        Err(e) => {
            tracing::warn!("HNSW index unavailable, using exact search: {}", e);
            None
        }
    }
}

/// Short BLAKE3 content id
pub fn content_id(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::KeywordEmbedder;

    fn entries(texts: &[&str]) -> Vec<(String, Metadata)> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), Metadata::new().with("row", i.to_string())))
            .collect()
    }

    fn store(texts: &[&str]) -> Store {
        Store::build(&KeywordEmbedder::default(), entries(texts), StoreOptions::default()).unwrap()
    }

    #[test]
    fn test_select_orders_by_distance() {
        let store = store(&[
            "discount on nike shirts",
            "how many adidas shirts in stock",
            "adidas white shirts stock",
        ]);
        let results = store
            .select(&KeywordEmbedder::default(), "adidas stock", 2)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].distance <= results[1].distance);
        assert!(results.iter().all(|r| r.text.contains("adidas")));
    }

    #[test]
    fn test_k_larger_than_store_returns_each_item_once() {
        let store = store(&["alpha", "beta", "gamma"]);
        let results = store.select(&KeywordEmbedder::default(), "beta", 10).unwrap();

        let mut positions: Vec<usize> = results.iter().map(|r| r.position).collect();
        positions.sort();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(results[0].text, "beta");
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let store = store(&["same words", "same words", "same words"]);
        let results = store.select(&KeywordEmbedder::default(), "same words", 3).unwrap();
        let positions: Vec<usize> = results.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_zero_k_and_empty_store() {
        let store = store(&["alpha"]);
        assert!(store.select(&KeywordEmbedder::default(), "alpha", 0).unwrap().is_empty());

        let empty = Store::build(&KeywordEmbedder::default(), Vec::new(), StoreOptions::default()).unwrap();
        assert!(empty.is_empty());
        assert!(empty.select(&KeywordEmbedder::default(), "alpha", 3).unwrap().is_empty());
    }

    #[test]
    fn test_metadata_survives_selection() {
        let store = store(&["alpha", "beta"]);
        let results = store.select(&KeywordEmbedder::default(), "beta", 1).unwrap();
        assert_eq!(results[0].metadata.get("row"), Some("1"));
    }

    #[test]
    fn test_query_dimension_checked() {
        let store = store(&["alpha"]);
        let result = store.select_by_vector(&[1.0, 2.0], 1);
        assert!(matches!(
            result,
            Err(QueryError::Embedding(EmbeddingError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_hnsw_matches_flat_ranking() {
        let texts: Vec<String> = (0..40)
            .map(|i| format!("shirt{} color{} size{}", i % 7, i % 5, i % 3))
            .collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embedder = KeywordEmbedder::default();

        let flat = Store::build(&embedder, entries(&refs), StoreOptions::default()).unwrap();
        let hnsw = Store::build(
            &embedder,
            entries(&refs),
            StoreOptions {
                metric: DistanceMetric::Cosine,
                index: IndexKind::Hnsw(HnswParams {
                    oversample: 40,
                    ..HnswParams::default()
                }),
            },
        )
        .unwrap();
        assert!(flat.ann.is_none());
        assert_eq!(hnsw.ann.as_ref().map(VectorIndex::len), Some(40));

        let a = flat.select(&embedder, "shirt3 color2", 4).unwrap();
        let b = hnsw.select(&embedder, "shirt3 color2", 4).unwrap();
        let positions = |r: &[ScoredItem]| r.iter().map(|s| s.position).collect::<Vec<_>>();
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let item = ScoredItem {
            position: 0,
            text: "héllo world".to_string(),
            metadata: Metadata::new(),
            distance: 0.0,
        };
        assert_eq!(item.preview(5), "héllo...");
        assert_eq!(item.preview(50), "héllo world");
    }
}
