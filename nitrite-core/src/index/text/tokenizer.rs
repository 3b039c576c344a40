use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;

/// Splits text into index terms for full-text indexes.
///
/// The default `tokenize` lowercases, splits on anything that is not
/// alphanumeric and drops the provider's stop words. Override it for a
/// different policy.
pub trait TokenizerProvider: Send + Sync {
    fn language(&self) -> &str;

    fn stop_words(&self) -> &HashSet<&'static str>;

    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|term| !term.is_empty())
            .map(|term| term.to_lowercase())
            .filter(|term| !self.stop_words().contains(term.as_str()))
            .collect()
    }
}

#[derive(Clone)]
pub struct Tokenizer {
    inner: Arc<dyn TokenizerProvider>,
}

impl Tokenizer {
    pub fn new<T: TokenizerProvider + 'static>(inner: T) -> Self {
        Tokenizer {
            inner: Arc::new(inner),
        }
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer::new(EnglishTokenizer::new())
    }
}

impl Deref for Tokenizer {
    type Target = Arc<dyn TokenizerProvider>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

const ENGLISH_STOP_WORDS: [&str; 33] = [
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

pub struct EnglishTokenizer {
    stop_words: HashSet<&'static str>,
}

impl EnglishTokenizer {
    pub fn new() -> Self {
        EnglishTokenizer {
            stop_words: ENGLISH_STOP_WORDS.into_iter().collect(),
        }
    }
}

impl Default for EnglishTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenizerProvider for EnglishTokenizer {
    fn language(&self) -> &str {
        "english"
    }

    fn stop_words(&self) -> &HashSet<&'static str> {
        &self.stop_words
    }
}
