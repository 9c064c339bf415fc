use rustc_hash::FxHashSet;

/// Maximum token length kept by the analyzer.
/// Longer tokens are almost always encoded blobs rather than words.
const MAX_TOKEN_LENGTH: usize = 128;

/// Stopwords of the usual English analyzer configuration
pub const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Query-side lexical normalization.
///
/// Must match what was applied to the indexed documents: lowercasing, splitting
/// on anything that is not alphanumeric, and stopword removal.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    stopwords: FxHashSet<String>,
}

impl Analyzer {
    pub fn new<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stopwords: stopwords
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        }
    }

    /// Analyzer with the English stopword list
    pub fn english() -> Self {
        Self::new(ENGLISH_STOPWORDS.iter().copied())
    }

    pub fn stopword_count(&self) -> usize {
        self.stopwords.len()
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Split raw query text into zero or more index terms
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let mut terms = Vec::new();
        let mut current = String::new();

        for ch in text.chars() {
            if ch.is_alphanumeric() {
                current.extend(ch.to_lowercase());
            } else if !current.is_empty() {
                self.push_term(&mut terms, &current);
                current.clear();
            }
        }

        if !current.is_empty() {
            self.push_term(&mut terms, &current);
        }

        terms
    }

    fn push_term(&self, terms: &mut Vec<String>, token: &str) {
        if token.len() <= MAX_TOKEN_LENGTH && !self.is_stopword(token) {
            terms.push(token.to_string());
        }
    }
}
