//! Static template catalog and the template selector.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{Genre, KeywordScore, StructuralSignals};

/// Template used when no candidate scores a clear win.
pub const DEFAULT_TEMPLATE_ID: &str = "blog-post";

const CODE_FENCE_WEIGHT: u32 = 10;
const PATTERN_WEIGHT: u32 = 5;
const GENRE_MATCH_BONUS: u32 = 20;
const TAG_MATCH_BONUS: u32 = 10;
const HEADING_BONUS: u32 = 5;
const HEADING_THRESHOLD: usize = 5;

/// A template in the catalog.
#[derive(Debug, Serialize)]
pub struct TemplateCandidate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub default_tags: &'static [&'static str],
    /// Ordered `(pattern, weight)` rules applied to the Markdown body.
    #[serde(skip)]
    pub score_rules: Vec<(Regex, u32)>,
}

impl TemplateCandidate {
    fn new(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        default_tags: &'static [&'static str],
        patterns: &[&str],
    ) -> Self {
        let score_rules = patterns
            .iter()
            .map(|p| {
                let re = Regex::new(&format!("(?i){p}")).expect("valid template pattern");
                (re, PATTERN_WEIGHT)
            })
            .collect();
        Self {
            id,
            name,
            description,
            default_tags,
            score_rules,
        }
    }
}

static CATALOG: LazyLock<Vec<TemplateCandidate>> = LazyLock::new(|| {
    vec![
        TemplateCandidate::new(
            "blog-post",
            "Blog Post",
            "Standard blog post or article",
            &["blog", "article"],
            &[],
        ),
        TemplateCandidate::new(
            "research-note",
            "Research Note",
            "Academic or research content with citations",
            &["research", "notes"],
            &[
                r"study",
                r"research",
                r"analysis",
                r"findings",
                r"conclusion",
                r"methodology",
                r"cited",
                r"reference",
            ],
        ),
        TemplateCandidate::new(
            "code-snippet",
            "Code Snippet",
            "Code examples with explanation",
            &["code", "programming"],
            &[],
        ),
        TemplateCandidate::new(
            "tutorial",
            "Tutorial",
            "Step-by-step guide or tutorial",
            &["tutorial", "guide"],
            &[
                r"step\s+\d+",
                r"how\s+to",
                r"guide",
                r"tutorial",
                r"learn",
                r"follow\s+these\s+steps",
            ],
        ),
        TemplateCandidate::new(
            "affiliate-post",
            "Affiliate Post",
            "Product review or comparison with purchase links",
            &["review", "product"],
            &[
                r"review",
                r"price",
                r"\$",
                r"best\s+\w+",
                r"comparison",
                r"vs\.",
                r"affiliate",
                r"commission",
            ],
        ),
    ]
});

/// Tag and keyword aliases that point at a template.
const TAG_TEMPLATES: &[(&str, &str)] = &[
    ("code", "code-snippet"),
    ("tutorial", "tutorial"),
    ("guide", "tutorial"),
    ("research", "research-note"),
    ("study", "research-note"),
    ("review", "affiliate-post"),
    ("product", "affiliate-post"),
];

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\s\S]*?```").expect("valid regex"));

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("valid regex"));

/// The static template catalog.
pub fn load_candidates() -> &'static [TemplateCandidate] {
    &CATALOG
}

/// Look up a catalog entry by id.
pub fn find_candidate(id: &str) -> Option<&'static TemplateCandidate> {
    CATALOG.iter().find(|c| c.id == id)
}

/// Everything the selector looks at.
#[derive(Debug, Clone, Copy)]
pub struct TemplateInput<'a> {
    pub genre: Genre,
    pub keywords: &'a [KeywordScore],
    pub signals: &'a StructuralSignals,
    pub tags: &'a [String],
    /// Markdown rendition of the body.
    pub markdown: &'a str,
}

/// Score of one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateScore {
    pub id: &'static str,
    pub score: u32,
}

/// Score every catalog candidate, in catalog order.
pub fn score_templates(input: &TemplateInput<'_>) -> Vec<TemplateScore> {
    let fences = CODE_FENCE
        .find_iter(input.markdown)
        .count()
        .max(input.signals.code_block_count) as u32;
    let headings = MARKDOWN_HEADING.find_iter(input.markdown).count();
    let genre_id = input.genre.template_id();

    let mapped: BTreeSet<&str> = input
        .tags
        .iter()
        .map(String::as_str)
        .chain(input.keywords.iter().map(|k| k.term.as_str()))
        .map(str::to_lowercase)
        .filter_map(|t| {
            TAG_TEMPLATES
                .iter()
                .find(|(tag, _)| *tag == t)
                .map(|(_, id)| *id)
        })
        .collect();

    CATALOG
        .iter()
        .map(|candidate| {
            let mut score = candidate
                .score_rules
                .iter()
                .map(|(re, weight)| re.find_iter(input.markdown).count() as u32 * weight)
                .sum::<u32>();

            if candidate.id == "code-snippet" {
                score += fences * CODE_FENCE_WEIGHT;
            }
            if candidate.id == genre_id {
                score += GENRE_MATCH_BONUS;
            }
            if mapped.contains(candidate.id) {
                score += TAG_MATCH_BONUS;
            }
            if headings > HEADING_THRESHOLD
                && (candidate.id == "tutorial" || candidate.id == "affiliate-post")
            {
                score += HEADING_BONUS;
            }
            TemplateScore {
                id: candidate.id,
                score,
            }
        })
        .collect()
}

/// Pick the best template. Falls back to [`DEFAULT_TEMPLATE_ID`] when the top
/// score is zero or shared.
pub fn select_template(input: &TemplateInput<'_>) -> &'static str {
    let scores = score_templates(input);
    let top = scores.iter().map(|s| s.score).max().unwrap_or(0);
    let mut leaders = scores.iter().filter(|s| s.score == top);
    match (leaders.next(), leaders.next()) {
        (Some(leader), None) if top > 0 => {
            tracing::debug!(template = leader.id, score = top, "Template selected");
            leader.id
        }
        _ => DEFAULT_TEMPLATE_ID,
    }
}
