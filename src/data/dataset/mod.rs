/*!
Dataset file formats.

Every dataset file starts with a line holding the number of days to forecast. What follows depends on the layout:
- [`Layout::Yahoo`]: a Yahoo Finance CSV export, i.e. three descriptive lines (field names, tickers and a `Date` line)
  followed by comma separated rows whose first column is the date
- [`Layout::Plain`]: bare rows of comma or whitespace separated numbers
*/
use super::Dataset;
use crate::{CpuFloat, Error, Result};
use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;

/// The Yahoo Finance date format
pub const YAHOO_DATE: &str = "%Y-%m-%d";

/// The number of descriptive lines between the horizon and the data in a Yahoo Finance export
pub const YAHOO_PREAMBLE: usize = 3;

/// The layout of a dataset file
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Yahoo Finance CSV export with a date column
    Yahoo,
    /// Bare numeric rows
    Plain,
}

impl Default for Layout {
    fn default() -> Layout {
        Layout::Yahoo
    }
}

impl FromStr for Layout {
    type Err = Error;
    fn from_str(s: &str) -> Result<Layout> {
        match s {
            "yahoo" => Ok(Layout::Yahoo),
            "plain" => Ok(Layout::Plain),
            other => Err(Error::invalid_config(format!("unknown dataset layout {:?}", other))),
        }
    }
}

/// Read a dataset from a reader
pub fn read_dataset<R: Read>(mut rdr: R, layout: Layout) -> Result<Dataset> {
    let mut text = String::new();
    rdr.read_to_string(&mut text)?;
    let skip = match layout {
        Layout::Yahoo => YAHOO_PREAMBLE,
        Layout::Plain => 0,
    };
    let mut sections: Vec<&str> = text.splitn(skip + 2, '\n').collect();
    let body = if sections.len() == skip + 2 {
        sections.pop().unwrap_or("")
    } else {
        ""
    };
    let first = sections.first().map(|line| line.trim()).unwrap_or("");
    let horizon = usize::from_str(first)
        .map_err(|err| Error::parse(1, format!("invalid prediction horizon {:?}: {}", first, err)))?;
    let offset = skip + 1;
    let (rows, dates) = match layout {
        Layout::Yahoo => read_yahoo_rows(body, offset)?,
        Layout::Plain => {
            let rows = read_plain_rows(body, offset)?;
            let dates = vec![None; rows.len()];
            (rows, dates)
        }
    };
    Ok(Dataset {
        horizon,
        rows,
        dates,
    })
}

fn parse_value(field: &str, line: usize) -> Result<CpuFloat> {
    CpuFloat::from_str(field).map_err(|err| Error::parse(line, format!("invalid number {:?}: {}", field, err)))
}

/// Read Yahoo Finance rows, where `offset` lines precede `body` in the file
fn read_yahoo_rows(body: &str, offset: usize) -> Result<(Vec<Vec<CpuFloat>>, Vec<Option<NaiveDate>>)> {
    let mut rows = Vec::new();
    let mut dates = Vec::new();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    for record in rdr.records() {
        let record = record?;
        let line = offset + record.position().map(|pos| pos.line() as usize).unwrap_or(0);
        let mut fields = record.iter();
        let date = fields
            .next()
            .and_then(|field| NaiveDate::parse_from_str(field, YAHOO_DATE).ok());
        let row = fields
            .filter(|field| !field.is_empty())
            .map(|field| parse_value(field, line))
            .collect::<Result<Vec<_>>>()?;
        if !row.is_empty() {
            rows.push(row);
            dates.push(date);
        }
    }
    Ok((rows, dates))
}

/// Read bare numeric rows, where `offset` lines precede `body` in the file
fn read_plain_rows(body: &str, offset: usize) -> Result<Vec<Vec<CpuFloat>>> {
    let mut rows = Vec::new();
    for (i, line) in body.lines().enumerate() {
        let row = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .map(|field| parse_value(field, offset + i + 1))
            .collect::<Result<Vec<_>>>()?;
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Write a dataset to a writer in a given layout
pub fn write_dataset<W: Write>(mut wtr: W, dataset: &Dataset, layout: Layout) -> Result<()> {
    writeln!(wtr, "{}", dataset.horizon)?;
    match layout {
        Layout::Yahoo => {
            let features = dataset.rows.first().map(|row| row.len()).unwrap_or(0);
            writeln!(wtr, "Price,{}", (0..features).map(|i| format!("f{}", i)).join(","))?;
            writeln!(wtr, "Ticker{}", ",".repeat(features))?;
            writeln!(wtr, "Date{}", ",".repeat(features))?;
            let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(wtr);
            for (row, date) in dataset.rows.iter().zip(&dataset.dates) {
                let date = date.map(|date| date.format(YAHOO_DATE).to_string()).unwrap_or_default();
                wtr.write_record(std::iter::once(date).chain(row.iter().map(|x| x.to_string())))?;
            }
            wtr.flush()?;
        }
        Layout::Plain => {
            for row in &dataset.rows {
                writeln!(wtr, "{}", row.iter().join(" "))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAHOO: &str = "\
3
Price,Open,Close,High,Low,Volume
Ticker,SPY,SPY,SPY,SPY,SPY
Date,,,,,
2020-01-02,323.54,324.87,324.89,322.53,59151200
2020-01-03,321.16,322.41,323.64,321.10,77709700

2020-01-06,320.49,323.64,323.73,320.36,55653900
";

    #[test]
    fn reads_yahoo_exports() {
        let data = read_dataset(YAHOO.as_bytes(), Layout::Yahoo).unwrap();
        assert_eq!(data.horizon, 3);
        assert_eq!(data.rows.len(), 3);
        assert_eq!(data.rows[1], vec![321.16, 322.41, 323.64, 321.10, 77709700.0]);
        assert_eq!(data.dates[2], Some(NaiveDate::from_ymd(2020, 1, 6)));
    }

    #[test]
    fn reads_plain_rows() {
        let text = "2\n1 2 3\n4,5,6\n\n7, 8\t9\n";
        let data = read_dataset(text.as_bytes(), Layout::Plain).unwrap();
        assert_eq!(data.horizon, 2);
        assert_eq!(data.rows, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]]);
        assert_eq!(data.dates, vec![None; 3]);
    }

    #[test]
    fn reports_bad_lines() {
        assert!(matches!(
            read_dataset("ten\n1 2\n".as_bytes(), Layout::Plain),
            Err(Error::Parse { line: 1, .. })
        ));
        assert!(matches!(
            read_dataset("1\n1 2\n3 x\n".as_bytes(), Layout::Plain),
            Err(Error::Parse { line: 3, .. })
        ));
        assert!(read_dataset("".as_bytes(), Layout::Yahoo).is_err());
    }

    #[test]
    fn write_then_read() {
        let mut data = read_dataset(YAHOO.as_bytes(), Layout::Yahoo).unwrap();
        for layout in [Layout::Yahoo, Layout::Plain].iter().copied() {
            let mut buf = Vec::new();
            write_dataset(&mut buf, &data, layout).unwrap();
            let read = read_dataset(&buf[..], layout).unwrap();
            if layout == Layout::Plain {
                data.dates = vec![None; data.rows.len()];
            }
            assert_eq!(read, data);
        }
    }

    #[test]
    fn layout_names() {
        assert_eq!("plain".parse::<Layout>().unwrap(), Layout::Plain);
        assert!("excel".parse::<Layout>().is_err());
    }
}
