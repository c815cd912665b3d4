/// WordPiece vocabulary table loaded from a BERT-style `vocab.txt`.
///
/// One token per line; the 0-based line number is the token id.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 100;
pub const CLS_ID: u32 = 101;
pub const SEP_ID: u32 = 102;

const RESERVED: [(&str, u32); 4] = [
    (PAD_TOKEN, PAD_ID),
    (UNK_TOKEN, UNK_ID),
    (CLS_TOKEN, CLS_ID),
    (SEP_TOKEN, SEP_ID),
];

#[derive(Error, Debug)]
pub enum VocabularyError {
    #[error("failed to read vocabulary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reserved token {token} must have id {expected}, found {found:?}")]
    MissingReserved {
        token: &'static str,
        expected: u32,
        found: Option<u32>,
    },
}

/// Immutable token → id table.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    ids: HashMap<String, u32>,
    /// Length in chars of the longest entry; bounds WordPiece candidate pieces.
    longest_token: usize,
}

impl Vocabulary {
    /// Load `vocab.txt` from disk.
    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let data = std::fs::read_to_string(path).map_err(|source| VocabularyError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let vocab = Self::from_lines(&data)?;
        info!(
            "Vocabulary loaded from {} ({} tokens)",
            path.display(),
            vocab.len()
        );
        Ok(vocab)
    }

    /// Build from newline-delimited text, one token per line.
    pub fn from_lines(text: &str) -> Result<Self, VocabularyError> {
        Self::from_entries(
            text.lines()
                .enumerate()
                .map(|(i, line)| (line.trim_end_matches('\r').to_string(), i as u32)),
        )
    }

    /// Build from explicit `(token, id)` pairs. The first id seen for a token wins.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, VocabularyError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut ids = HashMap::new();
        let mut longest_token = 0;

        for (token, id) in entries {
            let token = token.into();
            if token.is_empty() {
                continue;
            }
            longest_token = longest_token.max(token.chars().count());
            ids.entry(token).or_insert(id);
        }

        for (token, expected) in RESERVED {
            let found = ids.get(token).copied();
            if found != Some(expected) {
                return Err(VocabularyError::MissingReserved {
                    token,
                    expected,
                    found,
                });
            }
        }

        Ok(Self { ids, longest_token })
    }

    #[must_use]
    pub fn id(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn longest_token(&self) -> usize {
        self.longest_token
    }
}

#[cfg(test)]
pub(crate) fn test_vocab_lines(extra: &[&str]) -> String {
    // Lines 0..=102 hold [PAD], filler, [UNK], [CLS], [SEP]; extras start at 103.
    let mut lines: Vec<String> = (0..103).map(|i| format!("[unused{i}]")).collect();
    lines[0] = PAD_TOKEN.to_string();
    lines[100] = UNK_TOKEN.to_string();
    lines[101] = CLS_TOKEN.to_string();
    lines[102] = SEP_TOKEN.to_string();
    lines.extend(extra.iter().map(|s| (*s).to_string()));
    lines.join("\n")
}
