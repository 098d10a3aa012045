//! HNSW vector index for approximate candidate generation

use crate::store::DistanceMetric;
use hnsw_rs::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Upper bound on graph layers accepted by hnsw_rs
const MAX_LAYERS: usize = 16;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// Search hit with the position of the vector in insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: usize,
    /// Distance reported by the graph (approximate, metric dependent)
    pub distance: f32,
}

enum Graph {
    Cosine(Hnsw<'static, f32, DistCosine>),
    L2(Hnsw<'static, f32, DistL2>),
}

/// HNSW graph over a fixed set of vectors
///
/// Results are approximate; callers that need exact ordering re-rank the
/// returned candidates themselves.
pub struct VectorIndex {
    graph: Graph,
    dimension: usize,
    ef_search: usize,
    count: AtomicUsize,
}

impl VectorIndex {
    /// Create an empty index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `capacity` - Expected number of vectors
    /// * `m` - Number of connections per layer
    /// * `ef_construction` - Build-time candidate list size
    /// * `ef_search` - Query-time candidate list size
    pub fn new(
        metric: DistanceMetric,
        dimension: usize,
        capacity: usize,
        m: usize,
        ef_construction: usize,
        ef_search: usize,
    ) -> Result<Self, VectorIndexError> {
        if dimension == 0 {
            return Err(VectorIndexError::InitializationError(
                "dimension must be greater than 0".to_string(),
            ));
        }
        if m == 0 || ef_construction == 0 {
            return Err(VectorIndexError::InitializationError(
                "m and ef_construction must be greater than 0".to_string(),
            ));
        }

        let capacity = capacity.max(1);
        let graph = match metric {
            DistanceMetric::Cosine => Graph::Cosine(Hnsw::new(
                m,
                capacity,
                MAX_LAYERS,
                ef_construction,
                DistCosine,
            )),
            DistanceMetric::L2 => Graph::L2(Hnsw::new(
                m,
                capacity,
                MAX_LAYERS,
                ef_construction,
                DistL2,
            )),
        };

        Ok(Self {
            graph,
            dimension,
            ef_search: ef_search.max(1),
            count: AtomicUsize::new(0),
        })
    }

    /// Insert a vector under `id`
    pub fn insert(&self, id: usize, vector: &[f32]) -> Result<(), VectorIndexError> {
        self.check_dimension(vector)?;
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(VectorIndexError::InsertError(format!(
                "vector {} contains non-finite values",
                id
            )));
        }

        match &self.graph {
            Graph::Cosine(hnsw) => hnsw.insert((vector, id)),
            Graph::L2(hnsw) => hnsw.insert((vector, id)),
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Insert vectors using their position as id
    pub fn insert_all<'a, I>(&self, vectors: I) -> Result<(), VectorIndexError>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        for (id, vector) in vectors.into_iter().enumerate() {
            self.insert(id, vector)?;
        }
        Ok(())
    }

    /// Approximate k nearest neighbours, nearest first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, VectorIndexError> {
        self.check_dimension(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let ef = self.ef_search.max(k);
        let neighbours = match &self.graph {
            Graph::Cosine(hnsw) => hnsw.search(query, k, ef),
            Graph::L2(hnsw) => hnsw.search(query, k, ef),
        };

        Ok(neighbours
            .into_iter()
            .map(|n| SearchResult {
                id: n.d_id,
                distance: n.distance,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}
