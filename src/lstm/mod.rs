/*!
The recurrent cells, the sequence driver and the engine which owns network state.

Each cell step reads the previous state and returns a fresh one, so the computation of every hidden unit is
independent of every other within a step.
*/
use crate::data::window::SequenceBuffer;
use crate::data::WindowAnchor;
use crate::fixed::{Fixed, Format};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;

pub mod rnn;
pub mod weights;

use weights::{BiasInit, GateWeights, WeightSet};

/// The recurrent state of a cell
pub trait RecurrentState<Q: Format>: Clone + Debug {
    /// The hidden state `h`
    fn hidden(&self) -> &[Fixed<Q>];
    /// The cell state `c`, for cells which have one
    fn cell(&self) -> Option<&[Fixed<Q>]> {
        None
    }
}

/// Per-step gate activations, exposed for diagnostics
pub trait GateValues<Q: Format>: Clone + Debug {
    /// Each gate's activation vector with its name
    fn named(&self) -> Vec<(&'static str, &[Fixed<Q>])>;
}

impl<Q: Format> GateValues<Q> for () {
    fn named(&self) -> Vec<(&'static str, &[Fixed<Q>])> {
        Vec::new()
    }
}

/// The result of folding a cell over a window
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceOutput<S, G> {
    /// The state after the last timestep
    pub state: S,
    /// The gate activations of the last timestep, if there was one
    pub gates: Option<G>,
}

/// A recurrent cell: a single-timestep transition function over a state
pub trait Recurrent<Q: Format> {
    /// A short name for the kind of cell, used to tell weight files apart
    const NAME: &'static str;
    /// The recurrent state
    type State: RecurrentState<Q>;
    /// The gate activations of a step
    type Gates: GateValues<Q>;
    /// The parameters of this cell
    type Weights: WeightSet<Q>;

    /// Build a cell from its parameters
    fn new(weights: Self::Weights, desc: &NetworkDesc) -> Self
    where
        Self: Sized;
    /// This cell's parameters
    fn weights(&self) -> &Self::Weights;
    /// The all-zero state
    fn zero_state(&self) -> Self::State;
    /// Advance one timestep
    fn step(&self, x: &[Fixed<Q>], state: &Self::State) -> (Self::State, Self::Gates);
    /// Fold the cell over every row of a window, in order, starting from `state`
    fn seq_init(&self, window: &SequenceBuffer<Q>, state: &Self::State) -> SequenceOutput<Self::State, Self::Gates> {
        let mut state = state.clone();
        let mut gates = None;
        for x in window.iter() {
            let (next, step_gates) = self.step(x, &state);
            state = next;
            gates = Some(step_gates);
        }
        SequenceOutput { state, gates }
    }
    /// Fold the cell over a window starting from the zero state
    fn seq(&self, window: &SequenceBuffer<Q>) -> SequenceOutput<Self::State, Self::Gates> {
        self.seq_init(window, &self.zero_state())
    }
}

/// The LSTM's recurrent memory: hidden state `h` and cell state `c`
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState<Q: Format> {
    /// Hidden state
    pub h: Vec<Fixed<Q>>,
    /// Cell state
    pub c: Vec<Fixed<Q>>,
}

impl<Q: Format> ModelState<Q> {
    /// The zero state
    pub fn zeros(hidden_size: usize) -> ModelState<Q> {
        ModelState {
            h: vec![Fixed::ZERO; hidden_size],
            c: vec![Fixed::ZERO; hidden_size],
        }
    }
}

impl<Q: Format> RecurrentState<Q> for ModelState<Q> {
    fn hidden(&self) -> &[Fixed<Q>] {
        &self.h
    }
    fn cell(&self) -> Option<&[Fixed<Q>]> {
        Some(&self.c)
    }
}

/// The four gate activation vectors of an LSTM step
#[derive(Debug, Clone, PartialEq)]
pub struct LstmGates<Q: Format> {
    /// Input gate
    pub input: Vec<Fixed<Q>>,
    /// Forget gate
    pub forget: Vec<Fixed<Q>>,
    /// Candidate (cell input)
    pub candidate: Vec<Fixed<Q>>,
    /// Output gate
    pub output: Vec<Fixed<Q>>,
}

impl<Q: Format> GateValues<Q> for LstmGates<Q> {
    fn named(&self) -> Vec<(&'static str, &[Fixed<Q>])> {
        vec![
            ("input", &self.input[..]),
            ("forget", &self.forget[..]),
            ("candidate", &self.candidate[..]),
            ("output", &self.output[..]),
        ]
    }
}

/// The parameters of an LSTM
#[derive(Debug, Clone, PartialEq)]
pub struct LstmWeights<Q: Format> {
    /// Input gate parameters
    pub input: GateWeights<Q>,
    /// Forget gate parameters
    pub forget: GateWeights<Q>,
    /// Candidate parameters
    pub candidate: GateWeights<Q>,
    /// Output gate parameters
    pub output: GateWeights<Q>,
}

impl<Q: Format> WeightSet<Q> for LstmWeights<Q> {
    const GATES: &'static [&'static str] = &["input", "forget", "candidate", "output"];
    fn zeros(input_size: usize, hidden_size: usize) -> Self {
        LstmWeights {
            input: GateWeights::zeros(input_size, hidden_size),
            forget: GateWeights::zeros(input_size, hidden_size),
            candidate: GateWeights::zeros(input_size, hidden_size),
            output: GateWeights::zeros(input_size, hidden_size),
        }
    }
    fn gates(&self) -> Vec<&GateWeights<Q>> {
        vec![&self.input, &self.forget, &self.candidate, &self.output]
    }
    fn gates_mut(&mut self) -> Vec<&mut GateWeights<Q>> {
        vec![
            &mut self.input,
            &mut self.forget,
            &mut self.candidate,
            &mut self.output,
        ]
    }
}

/// Bounds applied to the LSTM cell state
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellClip {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
}

impl Default for CellClip {
    fn default() -> CellClip {
        CellClip {
            min: -50.0,
            max: 50.0,
        }
    }
}

/// A fixed-point LSTM cell
#[derive(Debug, Clone, PartialEq)]
pub struct LstmCell<Q: Format> {
    weights: LstmWeights<Q>,
    clip: Option<(Fixed<Q>, Fixed<Q>)>,
}

/// Everything one hidden unit produces in a step
struct Unit<Q: Format> {
    input: Fixed<Q>,
    forget: Fixed<Q>,
    candidate: Fixed<Q>,
    output: Fixed<Q>,
    c: Fixed<Q>,
    h: Fixed<Q>,
}

impl<Q: Format> LstmCell<Q> {
    /// Build a cell with explicit cell state bounds, or none
    pub fn with_clip(weights: LstmWeights<Q>, clip: Option<CellClip>) -> LstmCell<Q> {
        LstmCell {
            weights,
            clip: clip.map(|clip| (Fixed::from_f64(clip.min), Fixed::from_f64(clip.max))),
        }
    }

    /// Compute hidden unit `i`. Reads only the previous state and the weights.
    #[inline]
    fn unit(&self, i: usize, x: &[Fixed<Q>], prev: &ModelState<Q>) -> Unit<Q> {
        let w = &self.weights;
        let input = w.input.pre_activation(i, x, &prev.h).sigmoid();
        let forget = w.forget.pre_activation(i, x, &prev.h).sigmoid();
        let candidate = w.candidate.pre_activation(i, x, &prev.h).tanh();
        let output = w.output.pre_activation(i, x, &prev.h).sigmoid();
        let mut c = forget * prev.c[i] + input * candidate;
        if let Some((min, max)) = self.clip {
            c = c.clip(min, max);
        }
        let h = output * c.tanh();
        Unit {
            input,
            forget,
            candidate,
            output,
            c,
            h,
        }
    }
}

impl<Q: Format> Recurrent<Q> for LstmCell<Q> {
    const NAME: &'static str = "lstm";
    type State = ModelState<Q>;
    type Gates = LstmGates<Q>;
    type Weights = LstmWeights<Q>;

    fn new(weights: LstmWeights<Q>, desc: &NetworkDesc) -> Self {
        LstmCell::with_clip(weights, desc.cell_clip)
    }
    fn weights(&self) -> &LstmWeights<Q> {
        &self.weights
    }
    fn zero_state(&self) -> ModelState<Q> {
        ModelState::zeros(self.weights.input.hidden_size())
    }
    fn step(&self, x: &[Fixed<Q>], state: &ModelState<Q>) -> (ModelState<Q>, LstmGates<Q>) {
        debug_assert_eq!(x.len(), self.weights.input.input_size(), "Input of the wrong width");
        let hidden = self.weights.input.hidden_size();
        let mut next = ModelState {
            h: Vec::with_capacity(hidden),
            c: Vec::with_capacity(hidden),
        };
        let mut gates = LstmGates {
            input: Vec::with_capacity(hidden),
            forget: Vec::with_capacity(hidden),
            candidate: Vec::with_capacity(hidden),
            output: Vec::with_capacity(hidden),
        };
        for unit in (0..hidden).map(|i| self.unit(i, x, state)) {
            gates.input.push(unit.input);
            gates.forget.push(unit.forget);
            gates.candidate.push(unit.candidate);
            gates.output.push(unit.output);
            next.c.push(unit.c);
            next.h.push(unit.h);
        }
        (next, gates)
    }
}

/// Maps a final hidden state to an output vector
pub trait Projection<Q: Format> {
    /// Project a hidden state
    fn project(&self, hidden: &[Fixed<Q>]) -> Vec<Fixed<Q>>;
}

/// Projection by truncation: the output is the leading `width` entries of the hidden state
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Truncate {
    /// The number of entries to keep
    pub width: usize,
}

impl<Q: Format> Projection<Q> for Truncate {
    fn project(&self, hidden: &[Fixed<Q>]) -> Vec<Fixed<Q>> {
        hidden[..self.width.min(hidden.len())].to_vec()
    }
}

/// Whether the engine's state survives from one sequence run to the next
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatePolicy {
    /// Each run starts where the last one left off
    Carry,
    /// Each run starts from the zero state
    Reset,
}

impl Default for StatePolicy {
    fn default() -> StatePolicy {
        StatePolicy::Carry
    }
}

/// The result of one sequence run
#[derive(Debug, Clone, PartialEq)]
pub struct Projected<Q: Format, S, G> {
    /// The projected output, still normalized
    pub output: Vec<Fixed<Q>>,
    /// The state after the run
    pub state: S,
    /// The gate activations of the last timestep
    pub gates: Option<G>,
}

/// An inference engine: a cell, its current state, and a projection
pub struct Engine<Q: Format, C: Recurrent<Q>, P = Truncate> {
    cell: C,
    projection: P,
    state: C::State,
    policy: StatePolicy,
    format: PhantomData<Q>,
}

impl<Q, C, P> Engine<Q, C, P>
where
    Q: Format,
    C: Recurrent<Q>,
    P: Projection<Q>,
{
    /// Create an engine starting from the zero state
    pub fn new(cell: C, projection: P, policy: StatePolicy) -> Engine<Q, C, P> {
        let state = cell.zero_state();
        Engine {
            cell,
            projection,
            state,
            policy,
            format: PhantomData,
        }
    }
    /// Run the cell over a window and project the final hidden state
    pub fn run_sequence(&mut self, window: &SequenceBuffer<Q>) -> Projected<Q, C::State, C::Gates> {
        if self.policy == StatePolicy::Reset {
            self.reset();
        }
        let SequenceOutput { state, gates } = self.cell.seq_init(window, &self.state);
        self.state = state.clone();
        Projected {
            output: self.projection.project(state.hidden()),
            state,
            gates,
        }
    }
    /// Zero the state
    pub fn reset(&mut self) {
        self.state = self.cell.zero_state();
    }
    /// The current state
    pub fn state(&self) -> &C::State {
        &self.state
    }
    /// The cell
    pub fn cell(&self) -> &C {
        &self.cell
    }
}

/// A descriptor for a network and how it is run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkDesc {
    /// The number of features per timestep
    pub input_size: usize,
    /// The size of the hidden state. At least `input_size`, since outputs are truncated hidden states.
    pub hidden_size: usize,
    /// The number of timesteps in a window
    pub seq_length: usize,
    /// The Xavier gain `k` in `sqrt(k / (fan_in + fan_out))`
    pub xavier_gain: f64,
    /// How biases are initialized
    pub bias_init: BiasInit,
    /// LSTM cell state bounds, if any
    pub cell_clip: Option<CellClip>,
    /// Whether state is carried across sequence runs
    pub state_policy: StatePolicy,
    /// Which rows of the dataset form the initial window
    pub anchor: WindowAnchor,
    /// Seed for weight initialization; drawn from entropy if absent
    pub seed: Option<u64>,
}

impl Default for NetworkDesc {
    fn default() -> NetworkDesc {
        NetworkDesc {
            input_size: 5,
            hidden_size: 16,
            seq_length: 60,
            xavier_gain: 12.0,
            bias_init: BiasInit::Zero,
            cell_clip: Some(CellClip::default()),
            state_policy: StatePolicy::Carry,
            anchor: WindowAnchor::Head,
            seed: None,
        }
    }
}

impl NetworkDesc {
    /// Check that this descriptor describes a runnable network
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.seq_length == 0 {
            return Err(Error::invalid_config("input size and sequence length must be positive"));
        }
        if self.hidden_size < self.input_size {
            return Err(Error::invalid_config(format!(
                "hidden size {} is smaller than input size {}",
                self.hidden_size, self.input_size
            )));
        }
        if !(self.xavier_gain.is_finite() && self.xavier_gain > 0.0) {
            return Err(Error::invalid_config(format!(
                "xavier gain must be positive, got {}",
                self.xavier_gain
            )));
        }
        if let Some(clip) = self.cell_clip {
            if !(clip.min <= clip.max) {
                return Err(Error::invalid_config(format!(
                    "empty cell clip range [{}, {}]",
                    clip.min, clip.max
                )));
            }
        }
        Ok(())
    }
    /// The random number generator used for weight initialization
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
    /// Build an engine around a set of weights
    pub fn build<Q: Format, C: Recurrent<Q>>(&self, weights: C::Weights) -> Engine<Q, C> {
        Engine::new(
            C::new(weights, self),
            Truncate {
                width: self.input_size,
            },
            self.state_policy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::window::to_fixed;
    use crate::fixed::{I16F16, I32F32};

    type Fx = Fixed<I32F32>;

    fn desc(input_size: usize, hidden_size: usize) -> NetworkDesc {
        NetworkDesc {
            input_size,
            hidden_size,
            seq_length: 2,
            ..NetworkDesc::default()
        }
    }

    fn window<Q: Format>(rows: Vec<Vec<f64>>) -> SequenceBuffer<Q> {
        SequenceBuffer::new(rows.iter().map(|row| to_fixed(row)).collect()).unwrap()
    }

    #[test]
    fn zero_weights_are_an_equilibrium() {
        let cell: LstmCell<I32F32> = LstmCell::new(LstmWeights::zeros(3, 4), &desc(3, 4));
        let x = to_fixed(&[0.7, -1.2, 3.0]);
        let (state, gates) = cell.step(&x, &cell.zero_state());
        assert_eq!(state, ModelState::zeros(4));
        assert_eq!(gates.input, vec![Fx::HALF; 4]);
        assert_eq!(gates.forget, vec![Fx::HALF; 4]);
        assert_eq!(gates.candidate, vec![Fx::ZERO; 4]);
        assert_eq!(gates.output, vec![Fx::HALF; 4]);
    }

    #[test]
    fn worked_scenario() {
        let mut weights: LstmWeights<I32F32> = LstmWeights::zeros(1, 1);
        for gate in weights.gates_mut() {
            gate.w.set(0, 0, Fx::ONE);
        }
        let mut engine = desc(1, 1).build::<I32F32, LstmCell<I32F32>>(weights);
        let zeros = window(vec![vec![0.0], vec![0.0]]);
        for _ in 0..2 {
            let run = engine.run_sequence(&zeros);
            assert_eq!(run.output, vec![Fx::ZERO]);
            assert_eq!(run.state, ModelState::zeros(1));
            let gates = run.gates.unwrap();
            assert_eq!(gates.input, vec![Fx::HALF]);
            assert_eq!(gates.forget, vec![Fx::HALF]);
            assert_eq!(gates.candidate, vec![Fx::ZERO]);
            assert_eq!(gates.output, vec![Fx::HALF]);
        }
    }

    #[test]
    fn single_step_matches_float_reference() {
        let mut weights: LstmWeights<I32F32> = LstmWeights::zeros(1, 1);
        weights.input.w.set(0, 0, Fx::from_f64(0.5));
        weights.forget.b[0] = Fx::from_f64(1.0);
        weights.candidate.w.set(0, 0, Fx::from_f64(-1.0));
        weights.output.u.set(0, 0, Fx::from_f64(2.0));
        let cell = LstmCell::with_clip(weights, None);
        let prev = ModelState {
            h: vec![Fx::from_f64(0.25)],
            c: vec![Fx::from_f64(0.5)],
        };
        let (next, _) = cell.step(&to_fixed(&[2.0]), &prev);

        let sigmoid = |x: f64| 1.0 / (1.0 + (-x).exp());
        let i = sigmoid(1.0);
        let f = sigmoid(1.0);
        let g = (-2.0f64).tanh();
        let o = sigmoid(0.5);
        let c = f * 0.5 + i * g;
        let h = o * c.tanh();
        assert!((next.c[0].to_f64() - c).abs() < 1e-6);
        assert!((next.h[0].to_f64() - h).abs() < 1e-6);
    }

    #[test]
    fn cell_state_saturates() {
        let mut weights: LstmWeights<I16F16> = LstmWeights::zeros(2, 2);
        for gate in weights.gates_mut() {
            for x in gate.w.as_mut_slice() {
                *x = Fixed::from_f64(100.0);
            }
        }
        // Recurrent forget weights keep the forget gate open so c accumulates
        for x in weights.forget.u.as_mut_slice() {
            *x = Fixed::from_f64(100.0);
        }
        let cell: LstmCell<I16F16> = LstmCell::new(weights, &desc(2, 2));
        let huge = window::<I16F16>(vec![vec![1e4, 1e4]; 200]);
        let out = cell.seq(&huge);
        let limit = Fixed::from_f64(50.0);
        assert!(out.state.c.iter().all(|c| c.abs() <= limit));
        assert!(out.state.h.iter().all(|h| h.abs() <= Fixed::ONE));

        let negative = window::<I16F16>(vec![vec![-1e4, -1e4]; 200]);
        let out = cell.seq(&negative);
        assert!(out.state.c.iter().all(|c| c.abs() <= limit));
    }

    #[test]
    fn state_policies() {
        let weights: LstmWeights<I32F32> = weights::xavier_init(
            &mut StdRng::seed_from_u64(1),
            2,
            3,
            6.0,
            BiasInit::Xavier,
        );
        let rows = window::<I32F32>(vec![vec![0.5, -0.5], vec![1.0, 0.25]]);

        let carry = NetworkDesc {
            state_policy: StatePolicy::Carry,
            ..desc(2, 3)
        };
        let mut engine = carry.build::<I32F32, LstmCell<I32F32>>(weights.clone());
        let first = engine.run_sequence(&rows);
        let second = engine.run_sequence(&rows);
        assert_ne!(first.state, second.state);
        assert_eq!(engine.state(), &second.state);
        engine.reset();
        assert_eq!(engine.run_sequence(&rows), first);

        let reset = NetworkDesc {
            state_policy: StatePolicy::Reset,
            ..desc(2, 3)
        };
        let mut engine = reset.build::<I32F32, LstmCell<I32F32>>(weights);
        assert_eq!(engine.run_sequence(&rows), first);
        assert_eq!(engine.run_sequence(&rows), first);
    }

    #[test]
    fn truncating_projection() {
        let h = to_fixed::<I16F16>(&[1.0, 2.0, 3.0]);
        assert_eq!(Truncate { width: 2 }.project(&h), to_fixed::<I16F16>(&[1.0, 2.0]));
        assert_eq!(Truncate { width: 5 }.project(&h), h);
    }

    #[test]
    fn descriptor_validation() {
        assert!(NetworkDesc::default().validate().is_ok());
        assert!(desc(4, 3).validate().is_err());
        let bad_gain = NetworkDesc {
            xavier_gain: -1.0,
            ..NetworkDesc::default()
        };
        assert!(bad_gain.validate().is_err());
        let bad_clip = NetworkDesc {
            cell_clip: Some(CellClip { min: 1.0, max: -1.0 }),
            ..NetworkDesc::default()
        };
        assert!(bad_clip.validate().is_err());
    }

    #[test]
    fn descriptor_from_json() {
        let desc: NetworkDesc =
            serde_json::from_str(r#"{"hidden_size": 8, "xavier_gain": 6.0, "state_policy": "reset"}"#).unwrap();
        assert_eq!(desc.hidden_size, 8);
        assert_eq!(desc.xavier_gain, 6.0);
        assert_eq!(desc.state_policy, StatePolicy::Reset);
        assert_eq!(desc.input_size, 5);
        assert_eq!(desc.cell_clip, Some(CellClip::default()));
    }
}
