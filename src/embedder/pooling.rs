/// Attention-masked mean pooling and L2 normalization.
use super::{Embedding, HiddenStates, TokenizedInput};

/// Pool per-token hidden states into one unit-length sentence embedding.
///
/// Returns the zero vector when no position is attended or the pooled
/// vector has zero norm.
#[must_use]
pub fn embed(tokenized: &TokenizedInput, hidden: &HiddenStates) -> Embedding {
    let pooled = mean_pooling(hidden, &tokenized.attention_mask);
    Embedding::new(l2_normalize(&pooled))
}

/// Mean pooling over hidden states weighted by attention mask.
fn mean_pooling(hidden: &HiddenStates, attention_mask: &[i64]) -> Vec<f32> {
    let hidden_size = hidden.hidden_size();
    let mut result = vec![0.0f32; hidden_size];
    let mut attended = 0usize;

    let positions = hidden.seq_len().min(attention_mask.len());
    for t in 0..positions {
        if attention_mask[t] != 1 {
            continue;
        }
        attended += 1;
        for (acc, &v) in result.iter_mut().zip(hidden.token(t)) {
            *acc += v;
        }
    }

    if attended == 0 {
        return vec![0.0; hidden_size];
    }

    let count = attended as f32;
    for v in &mut result {
        *v /= count;
    }
    result
}

/// L2-normalize a vector, returning the normalized copy.
fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm_sq: f64 = vec.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
    if norm_sq == 0.0 || !norm_sq.is_finite() {
        return vec![0.0; vec.len()];
    }

    let inv_norm = 1.0 / norm_sq.sqrt();
    vec.iter().map(|&v| (f64::from(v) * inv_norm) as f32).collect()
}
