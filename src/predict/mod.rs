/*!
Closed-loop forecasting: each day's prediction is fed back into the window as the newest timestep.
*/
use crate::data::dataset::Layout;
use crate::data::scale::NormalizationStats;
use crate::data::window::{to_f64, to_fixed, SequenceBuffer};
use crate::data::{Bar, Dataset};
use crate::fixed::Format;
use crate::lstm::weights::{self, WeightSet};
use crate::lstm::{Engine, GateValues, NetworkDesc, Projection, Recurrent, RecurrentState, Truncate};
use crate::{CpuFloat, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

pub mod accuracy;
pub mod report;

/// The network state and gate activations after a day's sequence run, as floats
#[derive(Debug, Clone, PartialEq)]
pub struct DayDebug {
    /// The hidden state
    pub h: Vec<CpuFloat>,
    /// The cell state, for cells which have one
    pub c: Option<Vec<CpuFloat>>,
    /// The named gate activations of the last timestep
    pub gates: Vec<(&'static str, Vec<CpuFloat>)>,
}

/// A single day's forecast
#[derive(Debug, Clone, PartialEq)]
pub struct DayPrediction {
    /// The 1-based day number
    pub day: usize,
    /// The denormalized predicted features
    pub values: Vec<CpuFloat>,
    /// Diagnostics, if requested
    pub debug: Option<DayDebug>,
}

impl DayPrediction {
    /// View the prediction as a market bar, if it has enough features
    pub fn bar(&self) -> Option<Bar> {
        Bar::from_row(&self.values)
    }
}

/// Drives an engine over a sliding window, one prediction per day
pub struct Forecaster<Q: Format, C: Recurrent<Q>, P = Truncate> {
    engine: Engine<Q, C, P>,
    stats: NormalizationStats,
    window: SequenceBuffer<Q>,
    debug: bool,
}

impl<Q, C, P> Forecaster<Q, C, P>
where
    Q: Format,
    C: Recurrent<Q>,
    P: Projection<Q>,
{
    /// Create a new forecaster. The window must have one column per normalized feature.
    pub fn new(
        engine: Engine<Q, C, P>,
        stats: NormalizationStats,
        window: SequenceBuffer<Q>,
    ) -> Result<Forecaster<Q, C, P>> {
        if window.width() != stats.features() {
            return Err(Error::dimension_mismatch("window width", stats.features(), window.width()));
        }
        Ok(Forecaster {
            engine,
            stats,
            window,
            debug: false,
        })
    }

    /// Record the network state with every prediction
    pub fn with_debug(mut self, debug: bool) -> Forecaster<Q, C, P> {
        self.debug = debug;
        self
    }

    /// Predict the next day, then slide the prediction into the window
    pub fn step(&mut self, day: usize) -> DayPrediction {
        let run = self.engine.run_sequence(&self.window);
        let values = self.stats.denormalize(&to_f64(&run.output));
        trace!("Day {}: {:?}", day, values);
        let debug = if self.debug {
            Some(DayDebug {
                h: to_f64(run.state.hidden()),
                c: run.state.cell().map(to_f64),
                gates: run
                    .gates
                    .as_ref()
                    .map(|gates| {
                        gates
                            .named()
                            .into_iter()
                            .map(|(name, values)| (name, to_f64(values)))
                            .collect()
                    })
                    .unwrap_or_default(),
            })
        } else {
            None
        };
        let normalized = to_fixed(&self.stats.normalize(&values));
        let row = if normalized.len() == self.window.width() {
            normalized
        } else {
            // Features the projection does not predict are carried over from the newest row
            let mut row = self.window.newest().to_vec();
            row[..normalized.len()].copy_from_slice(&normalized);
            row
        };
        self.window.push(row);
        DayPrediction {
            day: day + 1,
            values,
            debug,
        }
    }

    /// Forecast `days` days, calling `on_day` as each prediction is made
    pub fn run<F>(&mut self, days: usize, mut on_day: F) -> Vec<DayPrediction>
    where
        F: FnMut(&DayPrediction),
    {
        let mut predictions = Vec::with_capacity(days);
        for day in 0..days {
            let prediction = self.step(day);
            on_day(&prediction);
            predictions.push(prediction);
        }
        predictions
    }

    /// The current window
    pub fn window(&self) -> &SequenceBuffer<Q> {
        &self.window
    }

    /// The normalization statistics
    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }
}

/// Everything needed to run a forecast from files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// The network shape and run policy
    pub network: NetworkDesc,
    /// Where weights are loaded from, and saved to. Defaults to a file named after the cell and precision, so that
    /// differently shaped networks never overwrite each other's weights.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights_path: Option<PathBuf>,
    /// The dataset layout
    pub format: Layout,
    /// Whether to record per-day diagnostics
    pub debug: bool,
}

impl Default for ForecastConfig {
    fn default() -> ForecastConfig {
        ForecastConfig {
            network: NetworkDesc::default(),
            weights_path: None,
            format: Layout::Yahoo,
            debug: false,
        }
    }
}

impl ForecastConfig {
    /// Load a configuration from a JSON file. Missing fields take their default values.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<ForecastConfig> {
        let rdr = BufReader::new(File::open(path)?);
        let config: ForecastConfig = serde_json::from_reader(rdr)?;
        config.network.validate()?;
        Ok(config)
    }

    /// The weight file for a cell at a precision: the configured path, or `weights_<cell><bits>.dat`
    pub fn weights_file<Q: Format, C: Recurrent<Q>>(&self) -> PathBuf {
        match &self.weights_path {
            Some(path) => path.clone(),
            None => PathBuf::from(format!("weights_{}{}.dat", C::NAME, Q::TOTAL_BITS)),
        }
    }
}

/// The outcome of a forecast run
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// The normalization statistics of the dataset
    pub stats: NormalizationStats,
    /// One prediction per day, in order
    pub predictions: Vec<DayPrediction>,
}

/// Set up a forecaster for a dataset: validate it, load or initialize weights, normalize and build the initial window.
pub fn prepare<Q, C>(config: &ForecastConfig, dataset: &Dataset) -> Result<Forecaster<Q, C>>
where
    Q: Format,
    C: Recurrent<Q>,
{
    let desc = &config.network;
    desc.validate()?;
    dataset.check_width(desc.input_size)?;
    let stats = NormalizationStats::compute(&dataset.rows)?;
    let rows = dataset.window_rows(desc.seq_length, desc.anchor)?;
    let window = SequenceBuffer::from_raw_rows(rows, &stats)?;
    if let Some(date) = dataset.window_end(desc.seq_length, desc.anchor) {
        info!("Forecasting {} days after {}", dataset.horizon, date);
    }
    let weights = weights::load_or_init::<Q, C::Weights, _>(config.weights_file::<Q, C>(), desc)?;
    debug!(
        "Built {}-gate network: {} inputs, {} hidden units, {} parameters, {:?} state",
        <C::Weights as WeightSet<Q>>::GATES.len(),
        desc.input_size,
        desc.hidden_size,
        <C::Weights as WeightSet<Q>>::param_count(desc.input_size, desc.hidden_size),
        desc.state_policy
    );
    Ok(Forecaster::new(desc.build::<Q, C>(weights), stats, window)?.with_debug(config.debug))
}

/// Run a complete forecast over a dataset's horizon, calling `on_day` as each prediction is made.
/// The weights are saved back to [`ForecastConfig::weights_file`] afterwards.
pub fn run_forecast<Q, C, F>(config: &ForecastConfig, dataset: &Dataset, on_day: F) -> Result<Forecast>
where
    Q: Format,
    C: Recurrent<Q>,
    F: FnMut(&DayPrediction),
{
    let mut forecaster = prepare::<Q, C>(config, dataset)?;
    let predictions = forecaster.run(dataset.horizon, on_day);
    let Forecaster { engine, stats, .. } = forecaster;
    weights::save::<Q, _, _>(engine.cell().weights(), config.weights_file::<Q, C>())?;
    info!("Forecast {} days", predictions.len());
    Ok(Forecast { stats, predictions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{Fixed, I16F16, I32F32};
    use crate::lstm::rnn::RnnCell;
    use crate::lstm::weights::BiasInit;
    use crate::lstm::{LstmCell, LstmWeights};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn desc() -> NetworkDesc {
        NetworkDesc {
            input_size: 2,
            hidden_size: 4,
            seq_length: 3,
            seed: Some(3),
            ..NetworkDesc::default()
        }
    }

    fn dataset(horizon: usize) -> Dataset {
        Dataset::new(
            horizon,
            (0..6).map(|i| vec![10.0 + i as f64, 100.0 - 3.0 * (i * i) as f64]).collect(),
        )
    }

    fn forecaster(debug: bool) -> Forecaster<I32F32, LstmCell<I32F32>> {
        let desc = desc();
        let data = dataset(4);
        let weights: LstmWeights<I32F32> =
            weights::xavier_init(&mut StdRng::seed_from_u64(9), 2, 4, 12.0, BiasInit::Xavier);
        let stats = NormalizationStats::compute(&data.rows).unwrap();
        let window = SequenceBuffer::from_raw_rows(&data.rows[..3], &stats).unwrap();
        Forecaster::new(desc.build::<I32F32, LstmCell<I32F32>>(weights), stats, window)
            .unwrap()
            .with_debug(debug)
    }

    #[test]
    fn sliding_window() {
        let mut forecaster = forecaster(false);
        let mut previous = forecaster.window().clone();
        for day in 0..5 {
            let prediction = forecaster.step(day);
            assert_eq!(prediction.day, day + 1);
            assert_eq!(prediction.values.len(), 2);
            assert!(prediction.debug.is_none());

            let window = forecaster.window();
            assert_eq!(window.len(), 3);
            let fed_back: Vec<Fixed<I32F32>> = to_fixed(&forecaster.stats().normalize(&prediction.values));
            assert_eq!(window.newest(), &fed_back[..]);
            let kept: Vec<_> = previous.iter().skip(1).collect();
            let now: Vec<_> = window.iter().take(2).collect();
            assert_eq!(kept, now);
            previous = window.clone();
        }
    }

    #[test]
    fn horizon_and_callbacks() {
        let mut forecaster = forecaster(true);
        let mut seen = Vec::new();
        let predictions = forecaster.run(4, |prediction| seen.push(prediction.day));
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(predictions.len(), 4);
        let debug = predictions[3].debug.as_ref().unwrap();
        assert_eq!(debug.h.len(), 4);
        assert_eq!(debug.c.as_ref().map(|c| c.len()), Some(4));
        let names: Vec<_> = debug.gates.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["input", "forget", "candidate", "output"]);
        assert!(self::forecaster(false).run(0, |_| panic!("no days to forecast")).is_empty());
    }

    #[test]
    fn mismatched_window() {
        let data = dataset(1);
        let stats = NormalizationStats::compute(&data.rows).unwrap();
        let narrow = SequenceBuffer::new(vec![to_fixed(&[0.0]); 3]).unwrap();
        let weights: LstmWeights<I32F32> = WeightSet::zeros(2, 4);
        assert!(matches!(
            Forecaster::new(desc().build::<I32F32, LstmCell<I32F32>>(weights), stats, narrow),
            Err(Error::DimensionMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn pipeline_persists_weights() {
        let dir = tempdir().unwrap();
        let config = ForecastConfig {
            network: desc(),
            weights_path: Some(dir.path().join("weights.dat")),
            ..ForecastConfig::default()
        };
        let data = dataset(3);
        let first = run_forecast::<I32F32, LstmCell<I32F32>, _>(&config, &data, |_| {}).unwrap();
        assert_eq!(first.predictions.len(), 3);
        assert!(config.weights_file::<I32F32, LstmCell<I32F32>>().exists());
        let again = run_forecast::<I32F32, LstmCell<I32F32>, _>(&config, &data, |_| {}).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn pipeline_setup_errors() {
        let dir = tempdir().unwrap();
        let config = ForecastConfig {
            network: desc(),
            weights_path: Some(dir.path().join("weights.dat")),
            ..ForecastConfig::default()
        };
        let short = Dataset::new(2, dataset(2).rows[..2].to_vec());
        assert!(matches!(
            run_forecast::<I32F32, LstmCell<I32F32>, _>(&config, &short, |_| {}),
            Err(Error::InsufficientRows { expected: 3, actual: 2 })
        ));
        let wide = Dataset::new(2, vec![vec![1.0, 2.0, 3.0]; 4]);
        assert!(matches!(
            run_forecast::<I32F32, LstmCell<I32F32>, _>(&config, &wide, |_| {}),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(!config.weights_file::<I32F32, LstmCell<I32F32>>().exists());
    }

    #[test]
    fn weight_files_per_cell_and_precision() {
        let config = ForecastConfig::default();
        assert_eq!(
            config.weights_file::<I32F32, LstmCell<I32F32>>(),
            PathBuf::from("weights_lstm64.dat")
        );
        assert_eq!(
            config.weights_file::<I16F16, LstmCell<I16F16>>(),
            PathBuf::from("weights_lstm32.dat")
        );
        assert_eq!(config.weights_file::<I32F32, RnnCell<I32F32>>(), PathBuf::from("weights_rnn64.dat"));
        assert_eq!(config.weights_file::<I16F16, RnnCell<I16F16>>(), PathBuf::from("weights_rnn32.dat"));
        let pinned = ForecastConfig {
            weights_path: Some(PathBuf::from("mine.dat")),
            ..ForecastConfig::default()
        };
        assert_eq!(pinned.weights_file::<I16F16, RnnCell<I16F16>>(), PathBuf::from("mine.dat"));
    }

    #[test]
    fn config_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"network": {"hidden_size": 8, "anchor": "tail"}, "format": "plain", "debug": true}"#,
        )
        .unwrap();
        let config = ForecastConfig::from_json(&path).unwrap();
        assert_eq!(config.network.hidden_size, 8);
        assert_eq!(config.network.input_size, 5);
        assert_eq!(config.format, Layout::Plain);
        assert!(config.debug);
        assert_eq!(config.weights_path, None);

        std::fs::write(&path, r#"{"network": {"hidden_size": 2}}"#).unwrap();
        assert!(matches!(ForecastConfig::from_json(&path), Err(Error::InvalidConfig { .. })));
    }
}
