/// Cosine ranking of a query embedding against category prototypes.
use std::sync::Arc;

use super::{CategoryPrototype, ClassificationError, ContentKind};
use crate::embedder::Embedding;

/// Winning category for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: String,
    /// `(similarity + 1) / 2`, clamped to `[0, 1]`.
    pub confidence: f64,
    /// Raw cosine similarity in `[-1, 1]`.
    pub similarity: f64,
}

/// Cosine similarity in `[-1, 1]`; zero when either vector has zero norm
/// or the dimensions differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Map a similarity in `[-1, 1]` onto a confidence in `[0, 1]`.
#[must_use]
pub fn confidence(similarity: f64) -> f64 {
    if similarity.is_nan() {
        return 0.0;
    }
    ((similarity + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Pick the most similar prototype of the requested kind.
///
/// Exact ties go to the prototype listed first.
pub fn classify(
    query: &Embedding,
    prototypes: &[Arc<CategoryPrototype>],
    want_image: bool,
) -> Result<Classification, ClassificationError> {
    let mut best: Option<(&CategoryPrototype, f64)> = None;

    for prototype in prototypes
        .iter()
        .filter(|p| p.definition.is_image_category == want_image)
    {
        let similarity = cosine_similarity(query.as_slice(), prototype.embedding.as_slice());
        match best {
            Some((_, top)) if similarity <= top => {}
            _ => best = Some((prototype.as_ref(), similarity)),
        }
    }

    let (winner, similarity) = best.ok_or(ClassificationError::EmptyCategorySet {
        kind: ContentKind::from_want_image(want_image),
    })?;

    Ok(Classification {
        category: winner.definition.name.clone(),
        confidence: confidence(similarity),
        similarity,
    })
}
