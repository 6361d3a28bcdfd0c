//! Flat exact-search index over squared Euclidean distance
//!
//! Vectors live in one contiguous row-major buffer. Search compares the
//! query against every row, so results are exact.

use ndarray::{ArrayView1, ArrayView2};
use pagelens_core::{PageLensError, Result};
use std::cmp::Ordering;

/// Exact L2 index with positional rows
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// Create an empty index for `dimension`-sized vectors
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Rebuild an index from a raw row-major buffer
    pub(crate) fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(PageLensError::CorruptStore(format!(
                "index buffer of {} values does not hold rows of dimension {dimension}",
                data.len()
            )));
        }
        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append one row
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        self.check_dimension(vector)?;
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Append several rows, validating all of them first
    pub fn add_rows<'a, I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a [f32]>,
        I::IntoIter: Clone,
    {
        let rows = rows.into_iter();
        for row in rows.clone() {
            self.check_dimension(row)?;
        }
        for row in rows {
            self.data.extend_from_slice(row);
        }
        Ok(())
    }

    /// Recover the vector stored at `row`
    pub fn reconstruct(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Find the `k` rows closest to `query`
    ///
    /// Returns `(row, squared_distance)` pairs, nearest first. Equal distances
    /// keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dimension(query)?;

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = ArrayView2::from_shape((self.len(), self.dimension), &self.data)
            .map_err(|e| PageLensError::CorruptStore(format!("index shape: {e}")))?;
        let query = ArrayView1::from(query);

        let mut scored: Vec<(usize, f32)> = rows
            .outer_iter()
            .enumerate()
            .map(|(row, vector)| {
                let diff = &vector - &query;
                (row, diff.dot(&diff))
            })
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, nearest_first);
            scored.truncate(k);
        }
        scored.sort_by(nearest_first);

        Ok(scored)
    }

    /// Raw row-major buffer
    pub(crate) fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(PageLensError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn nearest_first(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_search() {
        let mut index = FlatL2Index::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[0.0, 1.0]).unwrap();
        index.add(&[1.0, 1.0]).unwrap();

        assert_eq!(index.len(), 3);

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results, vec![(0, 0.0), (2, 1.0)]);

        let all = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(all, vec![(0, 0.0), (2, 1.0), (1, 2.0)]);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = FlatL2Index::new(1);
        for value in [2.0, -1.0, 1.0, -2.0, 1.0] {
            index.add(&[value]).unwrap();
        }

        let results = index.search(&[0.0], 4).unwrap();
        let rows: Vec<usize> = results.iter().map(|(row, _)| *row).collect();
        assert_eq!(rows, vec![1, 2, 4, 0]);
    }

    #[test]
    fn test_zero_k() {
        let mut index = FlatL2Index::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_add_rows_is_all_or_nothing() {
        let mut index = FlatL2Index::new(2);
        let good = [1.0, 2.0];
        let bad = [1.0];
        assert!(index.add_rows([&good[..], &bad[..]]).is_err());
        assert!(index.is_empty());

        index.add_rows([&good[..], &good[..]]).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_reconstruct() {
        let mut index = FlatL2Index::new(3);
        index.add(&[1.0, 2.0, 3.0]).unwrap();
        index.add(&[4.0, 5.0, 6.0]).unwrap();

        assert_eq!(index.reconstruct(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(index.reconstruct(2), None);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatL2Index::new(3);
        assert!(matches!(
            index.add(&[1.0, 0.0]),
            Err(PageLensError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));

        index.add(&[1.0, 0.0, 0.0]).unwrap();
        assert!(index.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_from_raw_rejects_ragged_buffer() {
        assert!(FlatL2Index::from_raw(3, vec![0.0; 7]).is_err());
        assert!(FlatL2Index::from_raw(0, Vec::new()).is_err());
        assert_eq!(FlatL2Index::from_raw(2, vec![0.0; 6]).unwrap().len(), 3);
    }
}
