/*!
Input data scaling: per-feature standardization
*/
use crate::{CpuFloat, Error, Result};
use num::{Float, NumCast};
use serde::{Deserialize, Serialize};

/// Per-feature mean and population standard deviation of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats<F = CpuFloat> {
    /// The mean of each feature
    pub means: Vec<F>,
    /// The population standard deviation of each feature. Never zero.
    pub std_devs: Vec<F>,
}

impl<F> NormalizationStats<F>
where
    F: Float,
{
    /// Compute feature statistics over every row of a dataset, with one pass for the means and one for the deviations.
    ///
    /// Fails on an empty dataset, on rows of differing width, on NaN or infinite values, and on any constant feature.
    pub fn compute(rows: &[Vec<F>]) -> Result<NormalizationStats<F>> {
        let features = rows.first().ok_or(Error::EmptyDataset)?.len();
        if features == 0 {
            return Err(Error::EmptyDataset);
        }
        let samples: F = NumCast::from(rows.len()).ok_or_else(|| Error::invalid_config("too many rows"))?;

        let mut means = vec![F::zero(); features];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != features {
                return Err(Error::dimension_mismatch("dataset row", features, row.len()));
            }
            for (feature, (mean, &x)) in means.iter_mut().zip(row).enumerate() {
                if !x.is_finite() {
                    return Err(Error::NonFinite { row: i, feature });
                }
                *mean = *mean + x;
            }
        }
        for mean in means.iter_mut() {
            *mean = *mean / samples;
        }

        let mut std_devs = vec![F::zero(); features];
        for row in rows {
            for ((dev, &x), &mean) in std_devs.iter_mut().zip(row).zip(&means) {
                let diff = x - mean;
                *dev = *dev + diff * diff;
            }
        }
        for (feature, dev) in std_devs.iter_mut().enumerate() {
            *dev = (*dev / samples).sqrt();
            if dev.is_nan() || *dev <= F::zero() {
                return Err(Error::ZeroDeviation { feature });
            }
        }

        Ok(NormalizationStats { means, std_devs })
    }

    /// The number of features these statistics describe
    #[inline]
    pub fn features(&self) -> usize {
        self.means.len()
    }

    /// Standardize a row: `(x - mean) / std`. A row narrower than `features()` is standardized by its leading features.
    pub fn normalize(&self, row: &[F]) -> Vec<F> {
        debug_assert!(row.len() <= self.features(), "Normalizing a row wider than the statistics");
        row.iter()
            .zip(self.means.iter().zip(&self.std_devs))
            .map(|(&x, (&mean, &std))| (x - mean) / std)
            .collect()
    }

    /// Undo standardization: `x * std + mean`.
    ///
    /// Only the leading `features()` positions of `values` are transformed and returned, so a wider state vector can
    /// be passed directly.
    pub fn denormalize(&self, values: &[F]) -> Vec<F> {
        values
            .iter()
            .zip(self.means.iter().zip(&self.std_devs))
            .map(|(&x, (&mean, &std))| x * std + mean)
            .collect()
    }
}
