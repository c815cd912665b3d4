/// Configuration module for the classifier.
///
/// Handles loading, validating, and providing default configuration values:
/// where the model lives, its tensor shape, the category set, and the
/// context-building budget.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_model_dir() -> PathBuf {
    PathBuf::from("models/all-MiniLM-L6-v2")
}

fn default_model_file() -> String {
    "model.onnx".to_string()
}

fn default_vocab_file() -> String {
    "vocab.txt".to_string()
}

fn default_hidden_size() -> usize {
    384
}

fn default_max_length() -> usize {
    128
}

fn default_intra_threads() -> usize {
    4
}

fn default_max_document_chars() -> usize {
    2000
}

fn default_categories() -> Vec<CategoryDefinition> {
    [
        (
            "Photos",
            "photo picture camera image of people, places, travel, nature, family and events",
            true,
        ),
        (
            "Screenshots",
            "screenshot screen capture of an application window, website, phone or desktop",
            true,
        ),
        (
            "Icons",
            "icon logo avatar profile picture small square graphic or emoji",
            true,
        ),
        (
            "Wallpapers",
            "wallpaper background wide landscape panorama high resolution scenery",
            true,
        ),
        (
            "Scans",
            "scanned document page receipt or paper photographed as an image",
            true,
        ),
        (
            "Invoices",
            "invoice receipt bill payment order purchase amount due tax total",
            false,
        ),
        (
            "Contracts",
            "contract agreement terms conditions legal signature parties clause",
            false,
        ),
        (
            "Reports",
            "report analysis summary findings results quarterly annual presentation",
            false,
        ),
        (
            "Resumes",
            "resume curriculum vitae cv work experience education skills job application",
            false,
        ),
        (
            "Notes",
            "notes personal memo meeting notes ideas todo list journal",
            false,
        ),
        (
            "Source Code",
            "source code program script function class module software",
            false,
        ),
        (
            "Spreadsheets",
            "spreadsheet table data columns rows numbers budget csv",
            false,
        ),
    ]
    .into_iter()
    .map(|(name, description, is_image)| CategoryDefinition::new(name, description, is_image))
    .collect()
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryDefinition>,

    #[serde(default)]
    pub context: ContextConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_model_file")]
    pub model_file: String,

    #[serde(default = "default_vocab_file")]
    pub vocab_file: String,

    /// Hidden dimension `H` of the encoder output.
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,

    /// Fixed sequence length `L` fed to the encoder.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContextConfig {
    /// Document text beyond this many chars is cut and marked with an ellipsis.
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
}

/// One category the classifier can answer with.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDefinition {
    pub name: String,
    /// Seed text for the category's prototype embedding.
    pub description: String,
    #[serde(default)]
    pub is_image_category: bool,
}

impl CategoryDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        is_image_category: bool,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            is_image_category,
        }
    }
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            categories: default_categories(),
            context: ContextConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
            model_file: default_model_file(),
            vocab_file: default_vocab_file(),
            hidden_size: default_hidden_size(),
            max_length: default_max_length(),
            intra_threads: default_intra_threads(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_document_chars: default_max_document_chars(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl ModelConfig {
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    #[must_use]
    pub fn vocab_path(&self) -> PathBuf {
        self.dir.join(&self.vocab_file)
    }

    /// Model artifacts that do not exist on disk.
    #[must_use]
    pub fn missing_files(&self) -> Vec<PathBuf> {
        [self.model_path(), self.vocab_path()]
            .into_iter()
            .filter(|p| !p.exists())
            .collect()
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the default configuration; so does invalid JSON,
    /// after a warning.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {}: {e}", path.display());
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!(
            "Loaded configuration from {} ({} categories)",
            path.display(),
            cfg.categories.len()
        );
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.model.hidden_size > 0,
            "model.hidden_size must be positive"
        );
        anyhow::ensure!(
            self.model.max_length >= 2,
            "model.max_length must leave room for [CLS] and [SEP]"
        );
        anyhow::ensure!(
            self.model.intra_threads > 0,
            "model.intra_threads must be positive"
        );
        anyhow::ensure!(
            !self.categories.is_empty(),
            "at least one category must be configured"
        );

        let mut seen = HashSet::new();
        for category in &self.categories {
            anyhow::ensure!(
                !category.name.trim().is_empty(),
                "category names must not be empty"
            );
            anyhow::ensure!(
                seen.insert((category.name.as_str(), category.is_image_category)),
                "duplicate category: {}",
                category.name
            );
        }
        Ok(())
    }

    /// Categories of one content kind, in configuration order.
    pub fn categories_for(&self, want_image: bool) -> impl Iterator<Item = &CategoryDefinition> {
        self.categories
            .iter()
            .filter(move |c| c.is_image_category == want_image)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.hidden_size, 384);
        assert_eq!(config.model.max_length, 128);
        assert_eq!(config.model.model_file, "model.onnx");
        assert_eq!(config.model.vocab_file, "vocab.txt");
        assert_eq!(config.context.max_document_chars, 2000);
        assert!(config.categories_for(true).count() > 0);
        assert!(config.categories_for(false).count() > 0);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{
            "model": {"dir": "/opt/models/minilm", "max_length": 64},
            "categories": [
                {"name": "Photos", "description": "photo image picture", "isImageCategory": true},
                {"name": "Receipts", "description": "receipt payment", "isImageCategory": false}
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.model.max_length, 64);
        assert_eq!(
            config.model.model_path(),
            PathBuf::from("/opt/models/minilm/model.onnx")
        );
        // Other fields should have defaults
        assert_eq!(config.model.hidden_size, 384);
        assert_eq!(config.categories.len(), 2);
        assert!(config.categories[0].is_image_category);
        assert_eq!(config.categories[1].name, "Receipts");
    }

    #[test]
    fn test_category_wire_names() {
        let def = CategoryDefinition::new("Icons", "icon logo", true);
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["isImageCategory"], serde_json::Value::Bool(true));
        assert_eq!(json["name"], "Icons");
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_max_length() {
        let mut config = Config::default();
        config.model.max_length = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_categories() {
        let mut config = Config::default();
        config.categories.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_category() {
        let mut config = Config::default();
        config
            .categories
            .push(CategoryDefinition::new("Photos", "again", true));
        assert!(config.validate().is_err());

        // Same name is fine across kinds.
        let mut config = Config::default();
        config
            .categories
            .push(CategoryDefinition::new("Photos", "photo documents", false));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.categories.len(), Config::default().categories.len());
    }

    #[test]
    fn test_load_invalid_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.model.max_length, 128);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("classifier.json");
        let mut config = Config::default();
        config.model.max_length = 96;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.model.max_length, 96);
        assert_eq!(loaded.categories, config.categories);
    }

    #[test]
    fn test_missing_files() {
        let dir = tempdir().unwrap();
        let model = ModelConfig {
            dir: dir.path().to_path_buf(),
            ..ModelConfig::default()
        };
        assert_eq!(model.missing_files().len(), 2);

        std::fs::write(dir.path().join("vocab.txt"), "[PAD]").unwrap();
        assert_eq!(model.missing_files(), vec![dir.path().join("model.onnx")]);
    }
}
