/*!
Prediction and diagnostic output files.

A prediction file holds one `Day N: v1 v2 ...` line per day. A debug file holds, per day, a `Day N Debug Information:`
line followed by the hidden state, the cell state for cells which have one, and one `<Name> Gate:` line per gate
activation vector of the day's last timestep.
*/
use super::DayPrediction;
use crate::util::{join_values, parse_values};
use crate::{Error, Result};
use std::io::{BufRead, Write};
use std::str::FromStr;

/// Write a single prediction line
pub fn write_prediction<W: Write>(wtr: &mut W, prediction: &DayPrediction) -> Result<()> {
    writeln!(wtr, "Day {}: {}", prediction.day, join_values(&prediction.values))?;
    Ok(())
}

/// Write a prediction file
pub fn write_predictions<W: Write>(mut wtr: W, predictions: &[DayPrediction]) -> Result<()> {
    for prediction in predictions {
        write_prediction(&mut wtr, prediction)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the debug record of a single prediction, if it has one
pub fn write_day_debug<W: Write>(wtr: &mut W, prediction: &DayPrediction) -> Result<()> {
    if let Some(debug) = &prediction.debug {
        writeln!(wtr, "Day {} Debug Information:", prediction.day)?;
        writeln!(wtr, "Hidden States (h): {}", join_values(&debug.h))?;
        if let Some(c) = &debug.c {
            writeln!(wtr, "Cell States (c): {}", join_values(c))?;
        }
        for (name, values) in &debug.gates {
            writeln!(wtr, "{} Gate: {}", capitalize(name), join_values(values))?;
        }
    }
    Ok(())
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Write a debug file. Predictions made without diagnostics are skipped.
pub fn write_debug<W: Write>(mut wtr: W, predictions: &[DayPrediction]) -> Result<()> {
    for prediction in predictions {
        write_day_debug(&mut wtr, prediction)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a prediction file back. Blank lines are skipped and trailing whitespace is ignored.
pub fn read_predictions<R: BufRead>(rdr: R) -> Result<Vec<DayPrediction>> {
    let mut predictions = Vec::new();
    for (i, line) in rdr.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let bad_line = |reason: String| Error::parse(i + 1, reason);
        let rest = line
            .strip_prefix("Day ")
            .ok_or_else(|| bad_line(format!("expected a \"Day N:\" line, got {:?}", line)))?;
        let colon = rest
            .find(':')
            .ok_or_else(|| bad_line("missing ':' after the day number".to_string()))?;
        let day = usize::from_str(rest[..colon].trim())
            .map_err(|err| bad_line(format!("invalid day number {:?}: {}", &rest[..colon], err)))?;
        let values = parse_values(&rest[colon + 1..])
            .map_err(|err| bad_line(format!("invalid prediction value: {}", err)))?;
        predictions.push(DayPrediction {
            day,
            values,
            debug: None,
        });
    }
    Ok(predictions)
}
