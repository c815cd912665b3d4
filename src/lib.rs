//! # sortsense — Offline Semantic File Classifier
//!
//! Classifies dropped files into configured categories without network
//! access: context text is built from the file, tokenized with WordPiece,
//! encoded by a local ONNX sentence model, pooled into a unit vector and
//! matched against cached category prototypes by cosine similarity.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation and default categories
//! - **[`embedder`]** — Vocabulary, WordPiece tokenizer, inference engines, pooling
//! - **[`classifier`]** — Prototype cache, cosine matcher and the [`Classifier`] entry point
//! - **[`context`]** — Filename/metadata context text for images and documents

pub mod classifier;
pub mod config;
pub mod context;
pub mod embedder;

pub use classifier::{Classification, ClassificationError, Classifier, Stage};
pub use config::{CategoryDefinition, Config};
pub use embedder::{Embedding, InferenceEngine};
