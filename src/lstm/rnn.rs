/*!
A plain tanh recurrent cell, a lighter alternative to the LSTM which runs on the same driver
*/
use super::weights::{GateWeights, WeightSet};
use super::{NetworkDesc, Recurrent, RecurrentState};
use crate::fixed::{Fixed, Format};

/// The parameters of a plain RNN: a single gate group
#[derive(Debug, Clone, PartialEq)]
pub struct RnnWeights<Q: Format> {
    /// The hidden transition
    pub hidden: GateWeights<Q>,
}

impl<Q: Format> WeightSet<Q> for RnnWeights<Q> {
    const GATES: &'static [&'static str] = &["hidden"];
    fn zeros(input_size: usize, hidden_size: usize) -> Self {
        RnnWeights {
            hidden: GateWeights::zeros(input_size, hidden_size),
        }
    }
    fn gates(&self) -> Vec<&GateWeights<Q>> {
        vec![&self.hidden]
    }
    fn gates_mut(&mut self) -> Vec<&mut GateWeights<Q>> {
        vec![&mut self.hidden]
    }
}

/// The state of a plain RNN
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenState<Q: Format> {
    /// Hidden state
    pub h: Vec<Fixed<Q>>,
}

impl<Q: Format> RecurrentState<Q> for HiddenState<Q> {
    fn hidden(&self) -> &[Fixed<Q>] {
        &self.h
    }
}

/// A plain RNN cell: `h = tanh(b + W·x + U·h_prev)`
#[derive(Debug, Clone, PartialEq)]
pub struct RnnCell<Q: Format> {
    weights: RnnWeights<Q>,
}

impl<Q: Format> Recurrent<Q> for RnnCell<Q> {
    const NAME: &'static str = "rnn";
    type State = HiddenState<Q>;
    type Gates = ();
    type Weights = RnnWeights<Q>;

    fn new(weights: RnnWeights<Q>, _desc: &NetworkDesc) -> Self {
        RnnCell { weights }
    }
    fn weights(&self) -> &RnnWeights<Q> {
        &self.weights
    }
    fn zero_state(&self) -> HiddenState<Q> {
        HiddenState {
            h: vec![Fixed::ZERO; self.weights.hidden.hidden_size()],
        }
    }
    fn step(&self, x: &[Fixed<Q>], state: &HiddenState<Q>) -> (HiddenState<Q>, ()) {
        debug_assert_eq!(x.len(), self.weights.hidden.input_size(), "Input of the wrong width");
        let gate = &self.weights.hidden;
        let h = (0..gate.hidden_size())
            .map(|i| gate.pre_activation(i, x, &state.h).tanh())
            .collect();
        (HiddenState { h }, ())
    }
}
