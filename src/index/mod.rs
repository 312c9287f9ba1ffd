
use std::cmp::Ordering;

use tracing::debug;

use crate::{RagError, Result};

/// A single search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row_id: usize,
    /// Squared euclidean distance to the query
    pub distance: f32,
}

/// Exact nearest-neighbor index over fixed-dimension vectors
///
/// Vectors are stored row-major in one contiguous buffer. Row ids are
/// assigned in insertion order starting at 0 and never change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
    len: usize,
}

impl VectorIndex {
    /// Create an empty index whose dimension is fixed by the first `add`
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index with a preset dimension
    #[inline]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            data: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Check that `vector` could be added without modifying the index
    #[inline]
    pub fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != vector.len() => Err(RagError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            // Zero-length vectors never establish or match a dimension
            _ if vector.is_empty() => Err(RagError::DimensionMismatch {
                expected: self.dimension.unwrap_or(1).max(1),
                actual: 0,
            }),
            _ => Ok(()),
        }
    }

    /// Append a vector and return its row id
    #[inline]
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector)?;

        if self.dimension.is_none() {
            debug!("Index dimension established at {}", vector.len());
            self.dimension = Some(vector.len());
        }

        self.data.extend_from_slice(vector);
        let row_id = self.len;
        self.len += 1;
        Ok(row_id)
    }

    /// The stored vector for `row_id`, if it exists
    #[inline]
    pub fn vector(&self, row_id: usize) -> Option<&[f32]> {
        let dimension = self.dimension?;
        if row_id >= self.len {
            return None;
        }
        let start = row_id * dimension;
        self.data.get(start..start + dimension)
    }

    /// Iterate over stored vectors in row order
    #[inline]
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f32]> {
        let dimension = self.dimension.unwrap_or(1).max(1);
        self.data.chunks_exact(dimension).take(self.len)
    }

    /// Return the `k` rows closest to `query`, nearest first
    ///
    /// Distances are squared L2. Equal distances are ordered by ascending
    /// row id. Asking for more rows than the index holds returns every row.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let mut neighbors: Vec<Neighbor> = self
            .rows()
            .enumerate()
            .map(|(row_id, row)| Neighbor {
                row_id,
                distance: squared_l2(query, row),
            })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, compare_neighbors);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(compare_neighbors);

        Ok(neighbors)
    }

    /// Run `search` for each query, preserving query order
    #[inline]
    pub fn search_batch(&self, queries: &[Vec<f32>], k: usize) -> Result<Vec<Vec<Neighbor>>> {
        queries.iter().map(|query| self.search(query, k)).collect()
    }
}

/// Squared euclidean distance between two equal-length vectors
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.row_id.cmp(&b.row_id))
}
