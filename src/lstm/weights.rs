/*!
Gate parameters: storage, Xavier initialization and the raw binary weight file.

A weight file is every gate group's `W`, `U` and `b` arrays in order, each value as its raw fixed-point bit pattern
in little-endian `Q::BYTES` bytes, matrices row-major. There is no header: the reader must know the input and hidden
sizes.
*/
use super::NetworkDesc;
use crate::fixed::{dot, Fixed, Format};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// A dense row-major matrix of fixed-point values
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<Q: Format> {
    rows: usize,
    cols: usize,
    data: Vec<Fixed<Q>>,
}

impl<Q: Format> Matrix<Q> {
    /// A matrix of zeros
    pub fn zeros(rows: usize, cols: usize) -> Matrix<Q> {
        Matrix {
            rows,
            cols,
            data: vec![Fixed::ZERO; rows * cols],
        }
    }
    /// The number of rows
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }
    /// The number of columns
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }
    /// A row of this matrix
    #[inline]
    pub fn row(&self, i: usize) -> &[Fixed<Q>] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }
    /// The entry at row `i`, column `j`
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Fixed<Q> {
        self.data[i * self.cols + j]
    }
    /// Set the entry at row `i`, column `j`
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: Fixed<Q>) {
        self.data[i * self.cols + j] = value
    }
    /// All entries, row-major
    #[inline]
    pub fn as_slice(&self) -> &[Fixed<Q>] {
        &self.data
    }
    /// All entries, row-major, mutably
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Fixed<Q>] {
        &mut self.data
    }
}

/// The parameters of one gate: input weights `W` (hidden × input), recurrent weights `U` (hidden × hidden) and bias
/// `b` (hidden)
#[derive(Debug, Clone, PartialEq)]
pub struct GateWeights<Q: Format> {
    /// Input weights
    pub w: Matrix<Q>,
    /// Recurrent weights
    pub u: Matrix<Q>,
    /// Bias
    pub b: Vec<Fixed<Q>>,
}

impl<Q: Format> GateWeights<Q> {
    /// All-zero gate parameters
    pub fn zeros(input_size: usize, hidden_size: usize) -> GateWeights<Q> {
        GateWeights {
            w: Matrix::zeros(hidden_size, input_size),
            u: Matrix::zeros(hidden_size, hidden_size),
            b: vec![Fixed::ZERO; hidden_size],
        }
    }
    /// The pre-activation of hidden unit `i`: `b[i] + W[i]·x + U[i]·h_prev`
    #[inline]
    pub fn pre_activation(&self, i: usize, x: &[Fixed<Q>], h_prev: &[Fixed<Q>]) -> Fixed<Q> {
        self.b[i] + dot(self.w.row(i), x) + dot(self.u.row(i), h_prev)
    }
    /// The input size
    #[inline]
    pub fn input_size(&self) -> usize {
        self.w.cols()
    }
    /// The hidden size
    #[inline]
    pub fn hidden_size(&self) -> usize {
        self.b.len()
    }
    /// The arrays of this gate in file order
    pub fn arrays(&self) -> [&[Fixed<Q>]; 3] {
        [self.w.as_slice(), self.u.as_slice(), &self.b]
    }
    /// The arrays of this gate in file order, mutably
    pub fn arrays_mut(&mut self) -> [&mut [Fixed<Q>]; 3] {
        [self.w.as_mut_slice(), self.u.as_mut_slice(), &mut self.b]
    }
    /// The number of scalar parameters in a gate of the given shape
    #[inline]
    pub fn param_count(input_size: usize, hidden_size: usize) -> usize {
        hidden_size * (input_size + hidden_size + 1)
    }
}

/// A complete set of network parameters made of named gate groups
pub trait WeightSet<Q: Format>: Clone + Sized {
    /// The names of the gate groups, in file order
    const GATES: &'static [&'static str];
    /// All-zero parameters of the given shape
    fn zeros(input_size: usize, hidden_size: usize) -> Self;
    /// The gate groups, in file order
    fn gates(&self) -> Vec<&GateWeights<Q>>;
    /// The gate groups, in file order, mutably
    fn gates_mut(&mut self) -> Vec<&mut GateWeights<Q>>;
    /// The number of scalar parameters in a weight set of the given shape
    fn param_count(input_size: usize, hidden_size: usize) -> usize {
        Self::GATES.len() * GateWeights::<Q>::param_count(input_size, hidden_size)
    }
    /// The size of this weight set's file, in bytes
    fn file_size(input_size: usize, hidden_size: usize) -> u64 {
        (Self::param_count(input_size, hidden_size) * Q::BYTES) as u64
    }
}

/// How biases are initialized
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasInit {
    /// All biases start at zero
    Zero,
    /// Biases are drawn like weights with a fan-in of one
    Xavier,
}

impl Default for BiasInit {
    fn default() -> BiasInit {
        BiasInit::Zero
    }
}

/// Draw a value uniformly from `[-limit, limit]` where `limit = sqrt(gain / (fan_in + fan_out))`
pub fn xavier_uniform<R: Rng + ?Sized>(rng: &mut R, fan_in: usize, fan_out: usize, gain: f64) -> f64 {
    let limit = (gain / (fan_in + fan_out) as f64).sqrt();
    Uniform::new_inclusive(-limit, limit).sample(rng)
}

/// Xavier-initialize every gate group of a weight set
pub fn xavier_init<Q, W, R>(rng: &mut R, input_size: usize, hidden_size: usize, gain: f64, bias: BiasInit) -> W
where
    Q: Format,
    W: WeightSet<Q>,
    R: Rng + ?Sized,
{
    let mut weights = W::zeros(input_size, hidden_size);
    for gate in weights.gates_mut() {
        for x in gate.w.as_mut_slice() {
            *x = Fixed::from_f64(xavier_uniform(rng, input_size, hidden_size, gain));
        }
        for x in gate.u.as_mut_slice() {
            *x = Fixed::from_f64(xavier_uniform(rng, hidden_size, hidden_size, gain));
        }
        if bias == BiasInit::Xavier {
            for x in gate.b.iter_mut() {
                *x = Fixed::from_f64(xavier_uniform(rng, 1, hidden_size, gain));
            }
        }
    }
    weights
}

/// Write a weight set's raw bit patterns to a writer
pub fn write_weights<Q, W, Wr>(wtr: &mut Wr, weights: &W) -> io::Result<()>
where
    Q: Format,
    W: WeightSet<Q>,
    Wr: Write,
{
    for gate in weights.gates() {
        for array in gate.arrays().iter() {
            for x in array.iter() {
                wtr.write_int::<LittleEndian>(x.raw(), Q::BYTES)?;
            }
        }
    }
    Ok(())
}

/// Read a weight set of the given shape from a reader
pub fn read_weights<Q, W, R>(rdr: &mut R, input_size: usize, hidden_size: usize) -> io::Result<W>
where
    Q: Format,
    W: WeightSet<Q>,
    R: Read,
{
    let mut weights = W::zeros(input_size, hidden_size);
    for gate in weights.gates_mut() {
        for array in gate.arrays_mut().iter_mut() {
            for x in array.iter_mut() {
                *x = Fixed::from_raw(rdr.read_int::<LittleEndian>(Q::BYTES)?);
            }
        }
    }
    Ok(weights)
}

/// Save a weight set to a file
pub fn save<Q, W, P>(weights: &W, path: P) -> Result<()>
where
    Q: Format,
    W: WeightSet<Q>,
    P: AsRef<Path>,
{
    let mut wtr = BufWriter::new(File::create(path.as_ref())?);
    write_weights(&mut wtr, weights)?;
    wtr.flush()?;
    debug!("Saved weights to {:?}", path.as_ref());
    Ok(())
}

/// Load a weight set of the given shape from a file. Fails if the file is missing, unreadable or of the wrong size.
pub fn load<Q, W, P>(path: P, input_size: usize, hidden_size: usize) -> Result<W>
where
    Q: Format,
    W: WeightSet<Q>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    let expected = W::file_size(input_size, hidden_size);
    let actual = file.metadata()?.len();
    if actual != expected {
        return Err(Error::WeightFileSize {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(read_weights(&mut BufReader::new(file), input_size, hidden_size)?)
}

/// Load a weight set, or Xavier-initialize and immediately persist one if loading fails for any reason
pub fn load_or_init<Q, W, P>(path: P, desc: &NetworkDesc) -> Result<W>
where
    Q: Format,
    W: WeightSet<Q>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match load(path, desc.input_size, desc.hidden_size) {
        Ok(weights) => {
            info!("Loaded weights from {:?}", path);
            Ok(weights)
        }
        Err(err) => {
            warn!("Could not load weights from {:?} ({}), initializing new weights", path, err);
            let weights = xavier_init(
                &mut desc.rng(),
                desc.input_size,
                desc.hidden_size,
                desc.xavier_gain,
                desc.bias_init,
            );
            save(&weights, path)?;
            Ok(weights)
        }
    }
}
