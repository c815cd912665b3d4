/// Inference engine seam and the numeric types that flow through it.
///
/// The tokenizer, pooling and engine implementations live in submodules;
/// this module owns the shared `InferenceEngine` contract.
pub mod mock;
pub mod onnx;
pub mod pooling;
pub mod tokenizer;
pub mod vocab;

use thiserror::Error;

pub use tokenizer::{TokenizedInput, Tokenizer};
pub use vocab::Vocabulary;

/// Errors raised by an inference engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model load failed: {0}")]
    Load(String),

    #[error("inference failed: {0}")]
    Run(String),

    #[error("malformed engine output: {0}")]
    MalformedOutput(String),
}

/// Opaque numeric engine turning token tensors into per-token hidden states.
///
/// All implementations must be `Send + Sync` so one engine can be shared
/// behind `Arc` by concurrent classification calls. Implementations that
/// wrap a non-reentrant native session serialize access internally.
pub trait InferenceEngine: Send + Sync {
    /// Run the model over one `[1, L]` input, returning `[1, L, H]` hidden states.
    fn run(&self, input: &TokenizedInput) -> Result<HiddenStates, EngineError>;

    /// Hidden dimension `H` of every token vector this engine produces.
    fn hidden_size(&self) -> usize;
}

/// Row-major `[1, seq_len, hidden_size]` hidden-state tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenStates {
    data: Vec<f32>,
    seq_len: usize,
    hidden_size: usize,
}

impl HiddenStates {
    /// Wrap a flat buffer, checking it holds exactly `seq_len * hidden_size` values.
    pub fn from_flat(
        data: Vec<f32>,
        seq_len: usize,
        hidden_size: usize,
    ) -> Result<Self, EngineError> {
        if hidden_size == 0 {
            return Err(EngineError::MalformedOutput(
                "hidden size must be positive".to_string(),
            ));
        }
        if data.len() != seq_len * hidden_size {
            return Err(EngineError::MalformedOutput(format!(
                "expected {seq_len}x{hidden_size} = {} values, got {}",
                seq_len * hidden_size,
                data.len()
            )));
        }
        Ok(Self {
            data,
            seq_len,
            hidden_size,
        })
    }

    #[must_use]
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    #[must_use]
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Hidden vector of the token at `position`.
    #[must_use]
    pub fn token(&self, position: usize) -> &[f32] {
        let start = position * self.hidden_size;
        &self.data[start..start + self.hidden_size]
    }
}

/// Sentence vector produced by pooling. Unit length unless it is all zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    #[must_use]
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn zeros(dimensions: usize) -> Self {
        Self(vec![0.0; dimensions])
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean norm, accumulated in `f64`.
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.0
            .iter()
            .map(|&v| f64::from(v) * f64::from(v))
            .sum::<f64>()
            .sqrt()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}
