/*!
Compare forecasts against realized values
*/
use anyhow::format_err;
use clap::{App, Arg};
use fixburn::predict::accuracy::{AccuracyReport, BAR_LABELS};
use fixburn::predict::report::read_predictions;
use fixburn::util::parse_values;
use fixburn::CpuFloat;
use std::fs::{self, File};
use std::io::{BufWriter, Write};

/// Load rows from either a prediction file or a file of bare comma or whitespace separated rows
pub fn load_rows(path: &str) -> anyhow::Result<Vec<Vec<CpuFloat>>> {
    let text = fs::read_to_string(path)?;
    let is_predictions = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim_start().starts_with("Day "))
        .unwrap_or(false);
    if is_predictions {
        return Ok(read_predictions(text.as_bytes())?
            .into_iter()
            .map(|prediction| prediction.values)
            .collect());
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            parse_values(line).map_err(|err| format_err!("{}, line {}: {}", path, i + 1, err))
        })
        .collect()
}

pub fn main() -> anyhow::Result<()> {
    let matches = App::new("Fixburn Accuracy")
        .version("1.0")
        .author("Jad Elkhaleq Ghalayini <jad.ghalayini@mail.utoronto.ca>")
        .about("Computes the per-feature percent accuracy and error of forecasts against realized values")
        .arg(
            Arg::with_name("REAL")
                .help("Realized values, one day per line")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("PREDICTIONS")
                .help("Forecasts to evaluate, in prediction file format or as bare rows")
                .required(true)
                .multiple(true)
                .index(2),
        )
        .arg(
            Arg::with_name("out")
                .short("o")
                .long("out")
                .help("Write the metrics to this file instead of stdout")
                .takes_value(true),
        )
        .get_matches();

    let real_path = matches.value_of("REAL").ok_or_else(|| format_err!("Missing realized values"))?;
    let real = load_rows(real_path)?;
    let mut out: Box<dyn Write> = match matches.value_of("out") {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    for (i, path) in matches.values_of("PREDICTIONS").into_iter().flatten().enumerate() {
        let predicted = load_rows(path)?;
        if predicted.len() != real.len() {
            return Err(format_err!(
                "{} has {} days but {} has {}",
                path,
                predicted.len(),
                real_path,
                real.len()
            ));
        }
        let report = AccuracyReport::evaluate(&real, &predicted, &BAR_LABELS)?;
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{}:", path)?;
        write!(out, "{}", report)?;
    }
    out.flush()?;
    Ok(())
}
