/*!
Data processing and IO functions
*/
use crate::*;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ta::{Close, High, Low, Open, Volume};

pub mod dataset;
pub mod scale;
pub mod window;

/// A dataset of raw feature rows, together with the number of days to forecast
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// The number of days to predict
    pub horizon: usize,
    /// Raw (unnormalized) feature rows, oldest first
    pub rows: Vec<Vec<CpuFloat>>,
    /// The date of each row, where the file provides one. Always the same length as `rows`.
    pub dates: Vec<Option<NaiveDate>>,
}

/// Which end of a dataset the initial window is taken from
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowAnchor {
    /// The first `seq_length` rows
    Head,
    /// The last `seq_length` rows, i.e. forecast past the end of the data
    Tail,
}

impl Default for WindowAnchor {
    fn default() -> WindowAnchor {
        WindowAnchor::Head
    }
}

impl Dataset {
    /// Create a dataset without dates
    pub fn new(horizon: usize, rows: Vec<Vec<CpuFloat>>) -> Dataset {
        let dates = vec![None; rows.len()];
        Dataset {
            horizon,
            rows,
            dates,
        }
    }
    /// Check that every row has exactly `features` entries
    pub fn check_width(&self, features: usize) -> Result<()> {
        if self.rows.is_empty() {
            return Err(Error::EmptyDataset);
        }
        match self.rows.iter().find(|row| row.len() != features) {
            Some(row) => Err(Error::dimension_mismatch("dataset row", features, row.len())),
            None => Ok(()),
        }
    }
    /// Get the rows of the initial window
    pub fn window_rows(&self, seq_length: usize, anchor: WindowAnchor) -> Result<&[Vec<CpuFloat>]> {
        let rows = self.rows.len();
        if rows < seq_length {
            return Err(Error::InsufficientRows {
                expected: seq_length,
                actual: rows,
            });
        }
        Ok(match anchor {
            WindowAnchor::Head => &self.rows[..seq_length],
            WindowAnchor::Tail => &self.rows[rows - seq_length..],
        })
    }
    /// The date of the last row in a window, if known
    pub fn window_end(&self, seq_length: usize, anchor: WindowAnchor) -> Option<NaiveDate> {
        let index = match anchor {
            WindowAnchor::Head => seq_length.checked_sub(1)?,
            WindowAnchor::Tail => self.dates.len().checked_sub(1)?,
        };
        self.dates.get(index).copied().flatten()
    }
}

/// A daily market bar, in the column order of the datasets: open, close, high, low, volume
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar<F = CpuFloat> {
    /// The opening price
    pub open: F,
    /// The closing price
    pub close: F,
    /// The high price
    pub high: F,
    /// The low price
    pub low: F,
    /// The volume traded
    pub volume: F,
}

impl Bar {
    /// The number of features a bar occupies in a row
    pub const FIELDS: usize = 5; // (open, close, high, low, volume)
}

impl<F: Copy> Bar<F> {
    /// Read a bar from the leading entries of a row, if it is wide enough
    pub fn from_row(row: &[F]) -> Option<Bar<F>> {
        match *row {
            [open, close, high, low, volume, ..] => Some(Bar {
                open,
                close,
                high,
                low,
                volume,
            }),
            _ => None,
        }
    }
    /// Push a bar's data points to a row. Guaranteed to write `FIELDS` data points
    pub fn push_bar(&self, row: &mut Vec<F>) {
        row.push(self.open);
        row.push(self.close);
        row.push(self.high);
        row.push(self.low);
        row.push(self.volume);
    }
}

impl<F> Open for Bar<F>
where
    F: Copy + Into<f64>,
{
    #[inline]
    fn open(&self) -> f64 {
        self.open.into()
    }
}

impl<F> High for Bar<F>
where
    F: Copy + Into<f64>,
{
    #[inline]
    fn high(&self) -> f64 {
        self.high.into()
    }
}

impl<F> Low for Bar<F>
where
    F: Copy + Into<f64>,
{
    #[inline]
    fn low(&self) -> f64 {
        self.low.into()
    }
}

impl<F> Close for Bar<F>
where
    F: Copy + Into<f64>,
{
    #[inline]
    fn close(&self) -> f64 {
        self.close.into()
    }
}

impl<F> Volume for Bar<F>
where
    F: Copy + Into<f64>,
{
    #[inline]
    fn volume(&self) -> f64 {
        self.volume.into()
    }
}
