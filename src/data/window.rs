/*!
The sliding window of normalized timesteps fed to the network
*/
use super::scale::NormalizationStats;
use crate::fixed::{Fixed, Format};
use crate::{CpuFloat, Error, Result};
use std::collections::VecDeque;

/// A fixed-length FIFO window of normalized fixed-point rows, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceBuffer<Q: Format> {
    rows: VecDeque<Vec<Fixed<Q>>>,
    width: usize,
}

impl<Q: Format> SequenceBuffer<Q> {
    /// Build a window from fixed-point rows, which must be non-empty and all of the same width
    pub fn new(rows: Vec<Vec<Fixed<Q>>>) -> Result<SequenceBuffer<Q>> {
        let width = match rows.first() {
            Some(row) => row.len(),
            None => {
                return Err(Error::InsufficientRows {
                    expected: 1,
                    actual: 0,
                })
            }
        };
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(Error::dimension_mismatch("window row", width, row.len()));
        }
        Ok(SequenceBuffer {
            rows: rows.into(),
            width,
        })
    }

    /// Normalize raw rows and convert them to fixed point
    pub fn from_raw_rows(rows: &[Vec<CpuFloat>], stats: &NormalizationStats) -> Result<SequenceBuffer<Q>> {
        if let Some(row) = rows.iter().find(|row| row.len() != stats.features()) {
            return Err(Error::dimension_mismatch("window row", stats.features(), row.len()));
        }
        Self::new(rows.iter().map(|row| to_fixed(&stats.normalize(row))).collect())
    }

    /// The number of timesteps in the window. Constant over the window's lifetime.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false: a window holds at least one row
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The number of features per timestep
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Iterate over the rows, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &[Fixed<Q>]> + '_ {
        self.rows.iter().map(|row| &row[..])
    }

    /// The oldest row
    #[inline]
    pub fn oldest(&self) -> &[Fixed<Q>] {
        &self.rows[0]
    }

    /// The newest row
    #[inline]
    pub fn newest(&self) -> &[Fixed<Q>] {
        &self.rows[self.rows.len() - 1]
    }

    /// Append a row as the newest timestep and evict the oldest, which is returned
    pub fn push(&mut self, row: Vec<Fixed<Q>>) -> Vec<Fixed<Q>> {
        debug_assert_eq!(row.len(), self.width, "Pushing a row of the wrong width");
        self.rows.push_back(row);
        // A window is never empty, so there is always a row to evict
        self.rows.pop_front().unwrap_or_default()
    }

    /// Flatten the window row-major into raw bit patterns, e.g. to hand to an external executor
    pub fn to_raw(&self) -> Vec<i64> {
        self.rows.iter().flatten().map(|x| x.raw()).collect()
    }

    /// The window as floats, oldest first
    pub fn to_f64_rows(&self) -> Vec<Vec<CpuFloat>> {
        self.rows.iter().map(|row| to_f64(row)).collect()
    }
}

/// Convert a slice of floats to fixed point
pub fn to_fixed<Q: Format>(values: &[CpuFloat]) -> Vec<Fixed<Q>> {
    values.iter().map(|&x| Fixed::from_f64(x)).collect()
}

/// Convert a slice of fixed-point values to floats
pub fn to_f64<Q: Format>(values: &[Fixed<Q>]) -> Vec<CpuFloat> {
    values.iter().map(|x| x.to_f64()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::I16F16;

    fn row(x: f64) -> Vec<Fixed<I16F16>> {
        to_fixed(&[x, -x])
    }

    #[test]
    fn fifo_eviction() {
        let mut window = SequenceBuffer::new(vec![row(1.0), row(2.0), row(3.0)]).unwrap();
        let evicted = window.push(row(4.0));
        assert_eq!(evicted, row(1.0));
        assert_eq!(window.len(), 3);
        assert_eq!(window.oldest(), &row(2.0)[..]);
        assert_eq!(window.newest(), &row(4.0)[..]);
        assert_eq!(window.to_f64_rows(), vec![vec![2.0, -2.0], vec![3.0, -3.0], vec![4.0, -4.0]]);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(SequenceBuffer::<I16F16>::new(vec![]).is_err());
        let ragged = vec![row(1.0), to_fixed(&[1.0])];
        assert!(matches!(
            SequenceBuffer::new(ragged),
            Err(Error::DimensionMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn normalizes_raw_rows() {
        let raw: Vec<Vec<f64>> = vec![vec![1.0, 10.0], vec![3.0, 30.0]];
        let stats = NormalizationStats::compute(&raw).unwrap();
        let window = SequenceBuffer::<I16F16>::from_raw_rows(&raw, &stats).unwrap();
        assert_eq!(window.to_f64_rows(), vec![vec![-1.0, -1.0], vec![1.0, 1.0]]);
        assert_eq!(window.to_raw(), vec![-65536, -65536, 65536, 65536]);
        assert!(SequenceBuffer::<I16F16>::from_raw_rows(&[vec![1.0]], &stats).is_err());
    }
}
