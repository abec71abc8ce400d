//! TF-IDF keyword ranking.
//!
//! Without corpus context a term's weight is its raw frequency. With a
//! corpus of `N` prior documents the weight becomes
//! `tf * (1 + ln((N + 1) / (1 + df)))`, where `df` counts the documents
//! (the current one included) containing the term.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::KeywordScore;

/// Maximum number of keywords returned by [`rank_keywords`].
pub const MAX_KEYWORDS: usize = 10;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "however", "if", "in", "into", "is", "it", "its",
    "itself", "just", "let", "like", "may", "me", "might", "more", "most", "must", "my",
    "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "one", "only", "or",
    "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "us", "use", "used", "using", "very", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
    "yourself", "yourselves",
];

/// Split text into lower-cased terms, dropping stop words, one-character
/// tokens, and pure numbers.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() > 1)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Distinct terms of one document.
pub type TermSet = BTreeSet<String>;

/// Rank the most important terms of `text`.
///
/// `corpus` holds the term sets of previously seen documents. Output is
/// sorted by weight descending, ties broken by term ascending, capped at
/// [`MAX_KEYWORDS`] unique terms.
pub fn rank_keywords(text: &str, corpus: Option<&[Arc<TermSet>]>) -> Vec<KeywordScore> {
    let mut frequencies: HashMap<String, usize> = HashMap::new();
    for token in tokenize(text) {
        *frequencies.entry(token).or_default() += 1;
    }

    let mut scores: Vec<KeywordScore> = frequencies
        .into_iter()
        .map(|(term, tf)| {
            let weight = match corpus {
                Some(docs) => {
                    let df = 1 + docs.iter().filter(|d| d.contains(&term)).count();
                    let n = docs.len() + 1;
                    tf as f64 * (1.0 + (n as f64 / (1.0 + df as f64)).ln())
                }
                None => tf as f64,
            };
            KeywordScore { term, weight }
        })
        .collect();

    scores.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.term.cmp(&b.term))
    });
    scores.truncate(MAX_KEYWORDS);
    scores
}

/// Shared, append-only collection of document term sets.
///
/// Readers take a snapshot of `Arc`s; appending never touches existing
/// entries. Cloning shares the same underlying corpus.
#[derive(Debug, Clone, Default)]
pub struct KeywordCorpus {
    documents: Arc<RwLock<Vec<Arc<TermSet>>>>,
}

impl KeywordCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the documents seen so far.
    pub fn snapshot(&self) -> Vec<Arc<TermSet>> {
        self.read().clone()
    }

    /// Record the terms of a newly ingested document.
    pub fn append(&self, text: &str) {
        let terms: TermSet = tokenize(text).into_iter().collect();
        self.write().push(Arc::new(terms));
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rank `text` against the current snapshot. The corpus is not changed;
    /// call [`append`](Self::append) once the document is accepted.
    pub fn rank(&self, text: &str) -> Vec<KeywordScore> {
        let snapshot = self.snapshot();
        let corpus = (!snapshot.is_empty()).then_some(snapshot.as_slice());
        rank_keywords(text, corpus)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<TermSet>>> {
        self.documents.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Keyword corpus lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<TermSet>>> {
        self.documents.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Keyword corpus lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
