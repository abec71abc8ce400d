//! Multi-signal genre classification.
//!
//! Three independent voters look at a page: the DOM structure, the wording,
//! and the declared metadata. Each votes for one genre or abstains. The
//! genre with the most votes wins; ties go to the highest-priority voter
//! (structural, then lexical, then metadata) that voted for a tied genre.
//! When every voter abstains the page is a blog post.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{ExtractedContent, Genre, ParsedDocument};

/// A voter, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Voter {
    Structural,
    Lexical,
    Metadata,
}

/// One voter's ballot. `None` is an abstention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Vote {
    pub voter: Voter,
    pub genre: Option<Genre>,
}

/// Genre used when no voter has an opinion.
pub const DEFAULT_GENRE: Genre = Genre::BlogPost;

/// Classify a page. Deterministic, never abstains.
pub fn classify(document: &ParsedDocument, content: &ExtractedContent) -> Genre {
    resolve(&collect_votes(document, content))
}

/// Run every voter over the page.
pub fn collect_votes(document: &ParsedDocument, content: &ExtractedContent) -> Vec<Vote> {
    let text = format!("{}\n{}", content.title(), content.body_text());
    vec![
        Vote {
            voter: Voter::Structural,
            genre: structural_vote(document),
        },
        Vote {
            voter: Voter::Lexical,
            genre: lexical_vote(&text),
        },
        Vote {
            voter: Voter::Metadata,
            genre: metadata_vote(document),
        },
    ]
}

/// Plurality with default.
pub fn resolve(votes: &[Vote]) -> Genre {
    let mut tally = [0usize; Genre::ALL.len()];
    for genre in votes.iter().filter_map(|v| v.genre) {
        tally[genre_index(genre)] += 1;
    }

    let top = tally.iter().copied().max().unwrap_or(0);
    if top == 0 {
        return DEFAULT_GENRE;
    }

    let mut ordered: Vec<&Vote> = votes.iter().collect();
    ordered.sort_by_key(|v| v.voter);
    ordered
        .into_iter()
        .filter_map(|v| v.genre)
        .find(|g| tally[genre_index(*g)] == top)
        .unwrap_or(DEFAULT_GENRE)
}

fn genre_index(genre: Genre) -> usize {
    Genre::ALL.iter().position(|g| *g == genre).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Structural voter
// ---------------------------------------------------------------------------

pub fn structural_vote(document: &ParsedDocument) -> Option<Genre> {
    let s = &document.signals;
    if s.has_code_block {
        Some(Genre::CodeSnippet)
    } else if s.has_ordered_steps {
        Some(Genre::Tutorial)
    } else if s.has_citation_markers {
        Some(Genre::ResearchNote)
    } else if s.has_article_root {
        Some(Genre::BlogPost)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Lexical voter
// ---------------------------------------------------------------------------

static AFFILIATE_DISCLOSURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:affiliate|commissions?)\b").expect("valid regex"));

static COMMERCIAL_GROUPS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // comparison
        r"(?i)\b(?:reviews?|comparisons?|compared|vs\.?|versus)\b",
        // recommendation
        r"(?i)\b(?:best|top(?:\s+\d+)?|recommended)\s+(?:\w+\s+)?(?:products?|tools?|software|apps?|gadgets?|deals?|picks?)\b",
        // pricing
        r"(?i)(?:\b(?:price|prices|pricing|costs?)\b|\$\d)",
        // purchase
        r"(?i)\b(?:buy|buying|purchase|order now|add to cart|coupon|discount)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Indicator keywords per genre, in tally order.
const INDICATORS: &[(Genre, &[&str])] = &[
    (Genre::Tutorial, &["step", "guide", "how to", "tutorial", "learn"]),
    (
        Genre::CodeSnippet,
        &["function", "code", "class", "method", "implementation"],
    ),
    (
        Genre::ResearchNote,
        &["study", "research", "analysis", "findings", "methodology"],
    ),
    (Genre::BlogPost, &["blog", "article", "post", "opinion", "thoughts"]),
    (
        Genre::AffiliatePost,
        &["review", "comparison", "best", "top", "recommended", "price", "buy"],
    ),
];

/// True when the text carries a commercial intent: an affiliate disclosure,
/// or at least two distinct commercial signal groups (a lone "review" is not
/// enough).
pub fn has_commercial_intent(text: &str) -> bool {
    if AFFILIATE_DISCLOSURE.is_match(text) {
        return true;
    }
    COMMERCIAL_GROUPS.iter().filter(|re| re.is_match(text)).count() >= 2
}

pub fn lexical_vote(text: &str) -> Option<Genre> {
    if has_commercial_intent(text) {
        return Some(Genre::AffiliatePost);
    }

    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let mut best: Option<(Genre, usize)> = None;
    for (genre, keywords) in INDICATORS {
        let hits: usize = keywords
            .iter()
            .map(|kw| {
                if kw.contains(' ') {
                    lowered.matches(kw).count()
                } else {
                    tokens.iter().filter(|t| t.contains(kw)).count()
                }
            })
            .sum();
        if hits > 0 && best.is_none_or(|(_, n)| hits > n) {
            best = Some((*genre, hits));
        }
    }
    best.map(|(genre, _)| genre)
}

// ---------------------------------------------------------------------------
// Metadata voter
// ---------------------------------------------------------------------------

pub fn metadata_vote(document: &ParsedDocument) -> Option<Genre> {
    let meta = &document.metadata;
    let is_article = |v: &Option<String>| {
        v.as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("article"))
    };
    if is_article(&meta.og_type) || is_article(&meta.article_type) {
        return Some(Genre::BlogPost);
    }

    if let Some(schema) = meta.schema_type.as_deref() {
        const SCHEMA_TABLE: &[(&str, Genre)] = &[
            ("TechArticle", Genre::Tutorial),
            ("HowTo", Genre::Tutorial),
            ("ScholarlyArticle", Genre::ResearchNote),
            ("SoftwareSourceCode", Genre::CodeSnippet),
            ("Review", Genre::AffiliatePost),
            ("Product", Genre::AffiliatePost),
            ("BlogPosting", Genre::BlogPost),
        ];
        if let Some((_, genre)) = SCHEMA_TABLE.iter().find(|(k, _)| schema.contains(k)) {
            return Some(*genre);
        }
    }

    if document.body_classes.iter().any(|c| c.contains("post")) {
        return Some(Genre::BlogPost);
    }
    None
}
