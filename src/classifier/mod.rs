/// Offline semantic classification: text → embedding → best category.
///
/// `Classifier` ties the tokenizer, an injected `InferenceEngine`, the
/// pooling step and the prototype cache together behind two calls,
/// [`Classifier::embed_text`] and [`Classifier::classify_text`].
pub mod matcher;
pub mod prototypes;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{CategoryDefinition, Config};
use crate::context::ContextBuilder;
use crate::embedder::onnx::OnnxEngine;
use crate::embedder::vocab::{Vocabulary, VocabularyError};
use crate::embedder::{Embedding, EngineError, InferenceEngine, Tokenizer, pooling};

pub use matcher::Classification;
pub use prototypes::{CategoryPrototype, PrototypeCache};

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vocabulary,
    ModelLoad,
    Inference,
    Prototypes,
    Matching,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Vocabulary => "vocabulary",
            Stage::ModelLoad => "model load",
            Stage::Inference => "inference",
            Stage::Prototypes => "category prototypes",
            Stage::Matching => "matching",
        };
        f.write_str(name)
    }
}

/// Which category family a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Image,
    Document,
}

impl ContentKind {
    #[must_use]
    pub fn from_want_image(want_image: bool) -> Self {
        if want_image {
            ContentKind::Image
        } else {
            ContentKind::Document
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Image => f.write_str("image"),
            ContentKind::Document => f.write_str("document"),
        }
    }
}

/// Errors surfaced to callers of the classifier.
///
/// None of these are retried internally; callers typically fall back to
/// extension-based categorization.
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("model unavailable ({stage}): {reason}")]
    ModelUnavailable { stage: Stage, reason: String },

    #[error("no {kind} categories available")]
    EmptyCategorySet { kind: ContentKind },

    #[error("unknown category {name:?}")]
    UnknownCategory { name: String },

    #[error("inference failed ({stage}): {reason}")]
    InferenceFailure { stage: Stage, reason: String },
}

impl ClassificationError {
    /// Stage of the pipeline that failed.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::ModelUnavailable { stage, .. } | Self::InferenceFailure { stage, .. } => *stage,
            Self::EmptyCategorySet { .. } => Stage::Matching,
            Self::UnknownCategory { .. } => Stage::Prototypes,
        }
    }

    /// Re-attribute an inference failure to `stage`.
    fn at_stage(self, stage: Stage) -> Self {
        match self {
            Self::InferenceFailure { reason, .. } => Self::InferenceFailure { stage, reason },
            other => other,
        }
    }
}

impl From<VocabularyError> for ClassificationError {
    fn from(e: VocabularyError) -> Self {
        Self::ModelUnavailable {
            stage: Stage::Vocabulary,
            reason: e.to_string(),
        }
    }
}

impl From<EngineError> for ClassificationError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Load(reason) => Self::ModelUnavailable {
                stage: Stage::ModelLoad,
                reason,
            },
            other => Self::InferenceFailure {
                stage: Stage::Inference,
                reason: other.to_string(),
            },
        }
    }
}

/// Semantic file classifier. Safe to share across threads behind `Arc`.
pub struct Classifier {
    tokenizer: Tokenizer,
    engine: Arc<dyn InferenceEngine>,
    prototypes: PrototypeCache,
    context: ContextBuilder,
    max_length: usize,
}

impl Classifier {
    /// Assemble a classifier from already-loaded parts.
    #[must_use]
    pub fn new(
        vocab: Arc<Vocabulary>,
        engine: Arc<dyn InferenceEngine>,
        categories: Vec<CategoryDefinition>,
        max_length: usize,
    ) -> Self {
        Self {
            tokenizer: Tokenizer::new(vocab),
            engine,
            prototypes: PrototypeCache::new(categories),
            context: ContextBuilder::default(),
            max_length,
        }
    }

    /// Replace the context builder used by the file-based entry points.
    #[must_use]
    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    /// Load the vocabulary and ONNX model described by `config`.
    ///
    /// The caller is expected to have checked [`crate::config::ModelConfig::missing_files`].
    pub fn from_config(config: &Config) -> Result<Self, ClassificationError> {
        let model = &config.model;
        let vocab = Vocabulary::load(&model.vocab_path())?;
        let engine = OnnxEngine::new(&model.model_path(), model.hidden_size, model.intra_threads)?;

        info!(
            "Classifier ready ({} categories, max_length {})",
            config.categories.len(),
            model.max_length
        );

        Ok(Self::new(
            Arc::new(vocab),
            Arc::new(engine),
            config.categories.clone(),
            model.max_length,
        )
        .with_context(ContextBuilder::new(config.context.max_document_chars)))
    }

    /// Embed `text` into a unit vector (zero vector if nothing was attended).
    pub fn embed_text(&self, text: &str) -> Result<Embedding, ClassificationError> {
        let tokens = self.tokenizer.tokenize(text, self.max_length);
        let hidden = self.engine.run(&tokens)?;

        if hidden.seq_len() != tokens.len() || hidden.hidden_size() != self.engine.hidden_size() {
            return Err(ClassificationError::InferenceFailure {
                stage: Stage::Inference,
                reason: format!(
                    "engine returned [{}, {}], expected [{}, {}]",
                    hidden.seq_len(),
                    hidden.hidden_size(),
                    tokens.len(),
                    self.engine.hidden_size()
                ),
            });
        }

        Ok(pooling::embed(&tokens, &hidden))
    }

    /// Pick the closest image (`want_image`) or document category for `text`.
    pub fn classify_text(
        &self,
        text: &str,
        want_image: bool,
    ) -> Result<Classification, ClassificationError> {
        let embed = |description: &str| self.embed_text(description);
        let prototypes = self.prototypes.matching(want_image, &embed)?;
        if prototypes.is_empty() {
            return Err(ClassificationError::EmptyCategorySet {
                kind: ContentKind::from_want_image(want_image),
            });
        }

        let query = self.embed_text(text)?;
        let result = matcher::classify(&query, &prototypes, want_image)?;

        debug!(
            "Classified as {} (confidence {:.3}, similarity {:.3})",
            result.category, result.confidence, result.similarity
        );
        Ok(result)
    }

    /// Classify an image file from its name and pixel dimensions.
    pub fn classify_image_file(&self, path: &Path) -> Result<Classification, ClassificationError> {
        let text = self.context.image_context_for_path(path);
        self.classify_text(&text, true)
    }

    /// Classify a document file from its name, extension and leading text.
    pub fn classify_document_file(
        &self,
        path: &Path,
    ) -> Result<Classification, ClassificationError> {
        let text = self.context.document_context_for_path(path);
        self.classify_text(&text, false)
    }

    /// Cached prototype for one configured category.
    pub fn prototype(
        &self,
        definition: &CategoryDefinition,
    ) -> Result<Arc<CategoryPrototype>, ClassificationError> {
        let embed = |description: &str| self.embed_text(description);
        self.prototypes.get_prototype(definition, &embed)
    }

    /// Every configured prototype, in configuration order.
    pub fn prototypes(&self) -> Result<Vec<Arc<CategoryPrototype>>, ClassificationError> {
        let embed = |description: &str| self.embed_text(description);
        self.prototypes.all_prototypes(&embed)
    }

    /// Populate the prototype cache up front; returns the number of prototypes.
    pub fn warm_up(&self) -> Result<usize, ClassificationError> {
        let count = self.prototypes()?.len();
        info!("Category prototypes ready ({count})");
        Ok(count)
    }
}
