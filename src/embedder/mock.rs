/// Mock inference engine for testing purposes.
///
/// Each token id lights up one hidden dimension (`id mod hidden_size`), so
/// pooled embeddings are bag-of-token histograms: texts sharing tokens are
/// similar, texts sharing none are orthogonal.
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{EngineError, HiddenStates, InferenceEngine, TokenizedInput};

/// A deterministic engine producing one-hot hidden states.
#[derive(Debug)]
pub struct MockEngine {
    pub hidden_size: usize,
    calls: AtomicUsize,
}

impl MockEngine {
    /// Create a new `MockEngine` with the given hidden dimension.
    #[must_use]
    pub fn new(hidden_size: usize) -> Self {
        Self {
            hidden_size,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `run` invocations so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Hidden dimension a token id maps to. `hidden_size` must be non-zero.
    fn bucket(&self, token_id: i64) -> usize {
        token_id.rem_euclid(self.hidden_size as i64) as usize
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new(384)
    }
}

impl InferenceEngine for MockEngine {
    fn run(&self, input: &TokenizedInput) -> Result<HiddenStates, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.hidden_size == 0 {
            return Err(EngineError::MalformedOutput(
                "hidden size must be positive".to_string(),
            ));
        }

        let seq_len = input.input_ids.len();
        let mut data = vec![0.0f32; seq_len * self.hidden_size];
        for (t, &id) in input.input_ids.iter().enumerate() {
            data[t * self.hidden_size + self.bucket(id)] = 1.0;
        }

        HiddenStates::from_flat(data, seq_len, self.hidden_size)
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}
