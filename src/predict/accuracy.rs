/*!
Forecast accuracy: per-feature mean percent error of predictions against realized values
*/
use crate::{CpuFloat, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// The feature labels of a market bar row
pub const BAR_LABELS: [&str; 5] = ["Open", "Close", "High", "Low", "Volume"];

/// The accuracy of a single feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAccuracy {
    /// The feature's name
    pub label: String,
    /// Mean percent accuracy, i.e. `100 - error` averaged over every day
    pub accuracy: CpuFloat,
    /// Mean percent error
    pub error: CpuFloat,
}

/// Accuracy of a whole forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// Per-feature accuracy
    pub features: Vec<FeatureAccuracy>,
    /// Mean percent accuracy over every feature and day
    pub overall_accuracy: CpuFloat,
    /// Mean percent error over every feature and day
    pub overall_error: CpuFloat,
}

impl AccuracyReport {
    /// Compare predicted rows against realized rows, day by day.
    ///
    /// A day whose realized value is zero contributes nothing to that feature's sums but still counts towards the
    /// number of days averaged over. Features without a label in `labels` are named by index.
    pub fn evaluate(real: &[Vec<CpuFloat>], predicted: &[Vec<CpuFloat>], labels: &[&str]) -> Result<AccuracyReport> {
        let features = real.first().ok_or(Error::EmptyDataset)?.len();
        if predicted.len() != real.len() {
            return Err(Error::dimension_mismatch("prediction rows", real.len(), predicted.len()));
        }
        let mut accuracy = vec![0.0; features];
        let mut error = vec![0.0; features];
        for (real_row, predicted_row) in real.iter().zip(predicted) {
            if real_row.len() != features {
                return Err(Error::dimension_mismatch("realized row", features, real_row.len()));
            }
            if predicted_row.len() < features {
                return Err(Error::dimension_mismatch("predicted row", features, predicted_row.len()));
            }
            for (i, (&actual, &guess)) in real_row.iter().zip(predicted_row).enumerate() {
                if actual == 0.0 {
                    continue;
                }
                let percent_error = (actual - guess).abs() / actual.abs() * 100.0;
                accuracy[i] += 100.0 - percent_error;
                error[i] += percent_error;
            }
        }
        let days = real.len() as CpuFloat;
        let overall_accuracy = accuracy.iter().sum::<CpuFloat>() / (days * features as CpuFloat);
        let overall_error = error.iter().sum::<CpuFloat>() / (days * features as CpuFloat);
        let features = accuracy
            .into_iter()
            .zip(error)
            .enumerate()
            .map(|(i, (accuracy, error))| FeatureAccuracy {
                label: labels.get(i).map(|label| label.to_string()).unwrap_or_else(|| format!("f{}", i)),
                accuracy: accuracy / days,
                error: error / days,
            })
            .collect();
        Ok(AccuracyReport {
            features,
            overall_accuracy,
            overall_error,
        })
    }
}

impl Display for AccuracyReport {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        for feature in &self.features {
            writeln!(
                fmt,
                "{} - Percent Accuracy: {:.2}%, Percent Error: {:.2}%",
                feature.label, feature.accuracy, feature.error
            )?;
        }
        writeln!(fmt, "Overall Accuracy: {:.2}%", self.overall_accuracy)?;
        writeln!(fmt, "Overall Error: {:.2}%", self.overall_error)
    }
}
