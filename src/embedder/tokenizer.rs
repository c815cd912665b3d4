/// Greedy longest-match WordPiece tokenizer for BERT-style uncased models.
///
/// Produces fixed-length `[CLS] … [SEP] [PAD]*` sequences with an attention
/// mask and all-zero segment ids, ready for the inference engine.
use std::sync::Arc;

use super::vocab::{CLS_ID, PAD_ID, SEP_ID, UNK_ID, Vocabulary};

/// Shortest sequence that still fits both boundary tokens.
pub const MIN_SEQUENCE_LENGTH: usize = 2;

const CONTINUATION_PREFIX: &str = "##";

/// Output of a tokenization operation. All three sequences share one length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedInput {
    /// Token IDs (input_ids for the model).
    pub input_ids: Vec<i64>,
    /// Attention mask (1 for real tokens, 0 for padding).
    pub attention_mask: Vec<i64>,
    /// Segment ids; always zero for single-sequence input.
    pub token_type_ids: Vec<i64>,
}

impl TokenizedInput {
    /// Sequence length `L`, padding included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Number of real (non-padding) positions.
    #[must_use]
    pub fn attended(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }
}

/// WordPiece tokenizer over a shared, read-only vocabulary.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    vocab: Arc<Vocabulary>,
}

impl Tokenizer {
    #[must_use]
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self { vocab }
    }

    /// Tokenize `text` into exactly `max_length` positions.
    ///
    /// Never fails: unknown characters become `[UNK]` and empty input yields
    /// `[CLS] [SEP]` followed by padding. A `max_length` below
    /// [`MIN_SEQUENCE_LENGTH`] is raised to it.
    #[must_use]
    pub fn tokenize(&self, text: &str, max_length: usize) -> TokenizedInput {
        let max_length = max_length.max(MIN_SEQUENCE_LENGTH);
        // Room for the closing [SEP].
        let budget = max_length - 1;

        let mut input_ids: Vec<i64> = Vec::with_capacity(max_length);
        input_ids.push(i64::from(CLS_ID));

        let lower = text.to_lowercase();
        for word in split_words(&lower) {
            if input_ids.len() >= budget {
                break;
            }
            self.push_word(word, &mut input_ids, budget);
        }

        input_ids.push(i64::from(SEP_ID));
        let attended = input_ids.len();

        input_ids.resize(max_length, i64::from(PAD_ID));
        let mut attention_mask = vec![1i64; attended];
        attention_mask.resize(max_length, 0);

        TokenizedInput {
            input_ids,
            attention_mask,
            token_type_ids: vec![0i64; max_length],
        }
    }

    /// Append the ids for one coarse word, stopping once `budget` ids exist.
    fn push_word(&self, word: &str, ids: &mut Vec<i64>, budget: usize) {
        if let Some(id) = self.vocab.id(word) {
            ids.push(i64::from(id));
            return;
        }

        // Byte offset of every char boundary, so pieces can be sliced directly.
        let bounds: Vec<usize> = word
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(word.len()))
            .collect();
        let char_count = bounds.len() - 1;
        let longest = self.vocab.longest_token();

        let mut piece = String::with_capacity(word.len() + CONTINUATION_PREFIX.len());
        let mut start = 0;

        while start < char_count && ids.len() < budget {
            let continuation = start > 0;
            let max_piece = if continuation {
                longest.saturating_sub(CONTINUATION_PREFIX.len())
            } else {
                longest
            };

            let mut end = char_count.min(start + max_piece);
            let mut matched = None;
            while end > start {
                piece.clear();
                if continuation {
                    piece.push_str(CONTINUATION_PREFIX);
                }
                piece.push_str(&word[bounds[start]..bounds[end]]);

                if let Some(id) = self.vocab.id(&piece) {
                    matched = Some((id, end));
                    break;
                }
                end -= 1;
            }

            match matched {
                Some((id, end)) => {
                    ids.push(i64::from(id));
                    start = end;
                }
                None => {
                    ids.push(i64::from(UNK_ID));
                    start += 1;
                }
            }
        }
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || c.is_ascii_punctuation()
        || matches!(c, '‘' | '’' | '“' | '”' | '–' | '—' | '…' | '«' | '»' | '·')
}

/// Split lowercased text into coarse words on whitespace and punctuation.
fn split_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(is_separator).filter(|w| !w.is_empty())
}
