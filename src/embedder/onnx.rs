/// ONNX Runtime inference engine using the `ort` crate.
///
/// Loads a BERT-style sentence encoder (all-MiniLM-L6-v2 by default) and
/// returns its `last_hidden_state`. Pooling happens outside the engine.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::{EngineError, HiddenStates, InferenceEngine, TokenizedInput};

/// ONNX-backed engine implementing the `InferenceEngine` trait.
pub struct OnnxEngine {
    session: Mutex<Session>,
    hidden_size: usize,
}

impl OnnxEngine {
    /// Load a model file and build a CPU session.
    pub fn new(
        model_path: &Path,
        hidden_size: usize,
        intra_threads: usize,
    ) -> Result<Self, EngineError> {
        if !model_path.exists() {
            return Err(EngineError::Load(format!(
                "model not found at {}",
                model_path.display()
            )));
        }

        info!("Initializing ONNX Runtime...");

        let session = Session::builder()
            .map_err(|e| EngineError::Load(format!("session builder error: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| EngineError::Load(format!("thread config error: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| EngineError::Load(format!("model load error: {e}")))?;

        info!("ONNX model loaded from {}", model_path.display());

        Ok(Self {
            session: Mutex::new(session),
            hidden_size,
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn run(&self, input: &TokenizedInput) -> Result<HiddenStates, EngineError> {
        let seq_len = input.input_ids.len();

        // (shape, data) tuple form avoids ndarray version coupling with ort
        let input_ids_val = Tensor::from_array(([1usize, seq_len], input.input_ids.clone()))
            .map_err(|e| EngineError::Run(format!("input_ids error: {e}")))?;
        let attention_mask_val =
            Tensor::from_array(([1usize, seq_len], input.attention_mask.clone()))
                .map_err(|e| EngineError::Run(format!("attention_mask error: {e}")))?;
        let token_type_ids_val =
            Tensor::from_array(([1usize, seq_len], input.token_type_ids.clone()))
                .map_err(|e| EngineError::Run(format!("token_type_ids error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EngineError::Run(format!("lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_val,
                "attention_mask" => attention_mask_val,
                "token_type_ids" => token_type_ids_val,
            ])
            .map_err(|e| EngineError::Run(format!("session run failed: {e}")))?;

        // Expected shape: [batch_size=1, seq_length, hidden_size]
        let (shape, hidden_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::MalformedOutput(format!("output extraction: {e}")))?;

        let dims: &[i64] = shape;
        if dims.len() != 3
            || dims[0] != 1
            || dims[1] != seq_len as i64
            || dims[2] != self.hidden_size as i64
        {
            return Err(EngineError::MalformedOutput(format!(
                "expected shape [1, {seq_len}, {}], got {dims:?}",
                self.hidden_size
            )));
        }

        HiddenStates::from_flat(hidden_data.to_vec(), seq_len, self.hidden_size)
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}
