/*!
Forecast stock prices with a fixed-point LSTM
*/
use anyhow::format_err;
use chrono::Duration;
use clap::{App, Arg};
use fixburn::data::dataset::{read_dataset, Layout};
use fixburn::data::Dataset;
use fixburn::fixed::{Format, I16F16, I32F32};
use fixburn::lstm::rnn::RnnCell;
use fixburn::lstm::{LstmCell, Recurrent};
use fixburn::predict::{report, run_forecast, ForecastConfig};
use fixburn::util::{join_values, to_s};
use indicatif::{ProgressBar, ProgressStyle};
use io_enum::*;
use std::fs::File;
use std::io::{stdin, BufWriter, Stdin};
use std::path::Path;
use std::time::Instant;
use tracing::Level;

#[derive(Debug, Read)]
pub enum IoSources {
    Stdin(Stdin),
    File(File),
}

/// Where forecast output goes
pub struct Outputs<'a> {
    predictions: &'a str,
    debug: Option<&'a str>,
}

pub fn forecast<Q, C>(
    verbosity: usize,
    config: &ForecastConfig,
    dataset: &Dataset,
    outputs: &Outputs,
) -> anyhow::Result<()>
where
    Q: Format,
    C: Recurrent<Q>,
{
    let progress = ProgressBar::new(dataset.horizon as u64);
    progress.set_style(ProgressStyle::default_bar().template("Forecasting: {wide_bar} {pos}/{len}: {msg:20}"));

    let start = Instant::now();
    let forecast = run_forecast::<Q, C, _>(config, dataset, |prediction| {
        if let Some(bar) = prediction.bar() {
            progress.set_message(&format!("close = {:.2}", bar.close));
        }
        if verbosity >= 2 {
            progress.println(format!("Day {}: {}", prediction.day, join_values(&prediction.values)));
        }
        progress.inc(1);
    })?;
    progress.finish_and_clear();
    let elapsed = Duration::from_std(start.elapsed())?;

    report::write_predictions(BufWriter::new(File::create(outputs.predictions)?), &forecast.predictions)?;
    if let Some(debug) = outputs.debug {
        report::write_debug(BufWriter::new(File::create(debug)?), &forecast.predictions)?;
    }
    if verbosity >= 1 {
        eprintln!(
            "Forecast {} days in {:.3}s, predictions written to {}",
            forecast.predictions.len(),
            to_s(elapsed),
            outputs.predictions
        );
    }
    Ok(())
}

pub fn main() -> anyhow::Result<()> {
    // Initialization, argument parsing
    let matches = App::new("Fixburn Forecast")
        .version("1.0")
        .author("Jad Elkhaleq Ghalayini <jad.ghalayini@mail.utoronto.ca>")
        .about("Forecasts daily stock bars with a fixed-point recurrent network, feeding each prediction back as input")
        .arg(
            Arg::with_name("DATASET")
                .help("Dataset file: the number of days to forecast, then feature rows. Reads stdin if absent")
                .index(1),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("weights")
                .short("w")
                .long("weights")
                .help("Weight file, created if missing or invalid. Defaults to weights_<cell><bits>.dat")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("layout")
                .short("l")
                .long("layout")
                .help("Dataset layout: yahoo, plain. Defaults to yahoo")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("cell")
                .long("cell")
                .help("Recurrent cell: lstm, rnn. Defaults to lstm")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("precision")
                .short("p")
                .long("precision")
                .help("Fixed point width in bits: 64 (32 fractional), 32 (16 fractional). Defaults to 64")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("out")
                .short("o")
                .long("out")
                .help("Prediction output file. Defaults to out.dat")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("debug")
                .short("d")
                .long("debug")
                .help("Write per-day network state to this file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Sets the level of verbosity")
                .takes_value(true),
        )
        .get_matches();

    let verbosity = matches
        .value_of("verbose")
        .map(|v| usize::from_str_radix(v, 10))
        .unwrap_or(Ok(0))?;
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match matches.value_of("config") {
        Some(path) => ForecastConfig::from_json(path)?,
        None => ForecastConfig::default(),
    };
    if let Some(weights) = matches.value_of("weights") {
        config.weights_path = Some(weights.into());
    }
    if let Some(layout) = matches.value_of("layout") {
        config.format = layout.parse::<Layout>()?;
    }
    config.debug = config.debug || matches.is_present("debug");
    let outputs = Outputs {
        predictions: matches.value_of("out").unwrap_or("out.dat"),
        debug: matches.value_of("debug"),
    };

    let reader = if let Some(path) = matches.value_of("DATASET") {
        IoSources::File(File::open(Path::new(path))?)
    } else {
        IoSources::Stdin(stdin())
    };
    let dataset = read_dataset(reader, config.format)?;
    if verbosity >= 1 {
        eprintln!("Read {} rows, forecasting {} days", dataset.rows.len(), dataset.horizon);
    }

    match (
        matches.value_of("cell").unwrap_or("lstm"),
        matches.value_of("precision").unwrap_or("64"),
    ) {
        ("lstm", "64") => forecast::<I32F32, LstmCell<I32F32>>(verbosity, &config, &dataset, &outputs),
        ("lstm", "32") => forecast::<I16F16, LstmCell<I16F16>>(verbosity, &config, &dataset, &outputs),
        ("rnn", "64") => forecast::<I32F32, RnnCell<I32F32>>(verbosity, &config, &dataset, &outputs),
        ("rnn", "32") => forecast::<I16F16, RnnCell<I16F16>>(verbosity, &config, &dataset, &outputs),
        (cell, precision) => Err(format_err!(
            "Invalid cell/precision combination: {:?} at {:?} bits",
            cell,
            precision
        )),
    }
}
