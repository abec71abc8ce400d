//! Rule-based enhancement of affiliate posts.
//!
//! The extracted Markdown is wrapped with an introduction, a comparison table
//! of the products the text mentions, a buying guide built from the top
//! keywords, a verdict, a call to action and the affiliate disclaimer. Nothing
//! here calls out to a model; output depends only on the inputs.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::models::KeywordScore;

const MAX_PRODUCTS: usize = 4;

/// Fixed cell values per comparison row, assigned by product column.
const COMPARISON_ROWS: [(&str, [&str; 4]); 4] = [
    ("Price Range", ["$29-$49", "$99-$149", "$199-$299", "$49-$99"]),
    ("Key Features", ["Easy to use", "Advanced features", "Best value", "Premium quality"]),
    ("Best For", ["Beginners", "Professionals", "Small business", "Enterprise"]),
    ("Rating", ["4/5", "4.5/5", "5/5", "3.5/5"]),
];

const LEADING_WORDS: [&str; 9] = ["The", "This", "That", "These", "It", "Our", "Each", "A", "An"];

const DISCLAIMER: &str = "*Disclaimer: As an affiliate, we may earn a commission from qualifying \
purchases. This helps support our research and testing at no extra cost to you.*";

static PRODUCT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b([A-Z][A-Za-z0-9]*(?:[ \t]+[A-Z0-9][A-Za-z0-9]*)*)\s+(?:is|are|has|features|costs|price)\b",
    )
    .expect("valid regex")
});
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("valid regex"));
static REVIEWS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:reviews?|ratings?|stars?)\b").expect("valid regex"));
static PRICING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\$|\b(?:price|cost)").expect("valid regex"));
static COMPARISONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:vs\.?|versus|compared?|better than)\b").expect("valid regex")
});

/// Shape of the original Markdown, recorded in the clip metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStructure {
    pub heading_count: usize,
    pub average_section_length: f64,
    pub has_product_reviews: bool,
    pub has_pricing: bool,
    pub has_comparisons: bool,
}

/// A retailer link supplied in the caller's `affiliateLinks` metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AffiliateLink {
    pub vendor: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Enhancement {
    pub markdown: String,
    pub structure: ContentStructure,
    pub products: Vec<String>,
    pub enhanced_at: DateTime<Utc>,
}

impl Enhancement {
    /// Add `enhanced`, `enhancementTimestamp` and `structure` to clip metadata.
    pub fn annotate(&self, metadata: &mut Value) {
        if let Some(fields) = metadata.as_object_mut() {
            fields.insert("enhanced".into(), json!(true));
            fields.insert("enhancementTimestamp".into(), json!(self.enhanced_at.to_rfc3339()));
            fields.insert("structure".into(), json!(self.structure));
        }
    }
}

/// Wrap `markdown` in the affiliate sections.
///
/// `metadata` may carry `affiliateLinks` (`[{vendor, url}]`) and
/// `lastUpdated`; both are optional.
pub fn enhance(
    markdown: &str,
    keywords: &[KeywordScore],
    metadata: &Value,
    now: DateTime<Utc>,
) -> Enhancement {
    let terms: Vec<&str> = keywords.iter().map(|k| k.term.as_str()).collect();
    let products = product_mentions(markdown);
    let links = affiliate_links(metadata);
    let as_of = metadata
        .get("lastUpdated")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| now.format("%Y-%m-%d").to_string());

    let mut sections = vec![
        introduction(&terms),
        format!("## Original Content\n\n{}", markdown.trim()),
    ];
    if let Some(table) = comparison_table(&products) {
        sections.push(table);
    }
    sections.push(buying_guide(&terms));
    sections.push(verdict(&terms));
    sections.push(call_to_action(&links, &as_of));
    sections.push(format!("---\n\n{DISCLAIMER}"));

    Enhancement {
        markdown: sections.join("\n\n"),
        structure: analyze_structure(markdown),
        products,
        enhanced_at: now,
    }
}

pub fn analyze_structure(markdown: &str) -> ContentStructure {
    let sections: Vec<&str> = HEADING.split(markdown).collect();
    let total: usize = sections.iter().map(|s| s.chars().count()).sum();
    ContentStructure {
        heading_count: sections.len() - 1,
        average_section_length: total as f64 / sections.len() as f64,
        has_product_reviews: REVIEWS.is_match(markdown),
        has_pricing: PRICING.is_match(markdown),
        has_comparisons: COMPARISONS.is_match(markdown),
    }
}

/// Capitalised names directly followed by "is", "costs", "features" and the
/// like, leading articles dropped, first occurrence order, at most four.
pub fn product_mentions(text: &str) -> Vec<String> {
    let mut products: Vec<String> = Vec::new();
    for caps in PRODUCT.captures_iter(text) {
        let words: Vec<&str> = caps[1]
            .split_whitespace()
            .skip_while(|w| LEADING_WORDS.contains(w))
            .collect();
        if words.is_empty() {
            continue;
        }
        let name = words.join(" ");
        if !products.contains(&name) {
            products.push(name);
        }
        if products.len() == MAX_PRODUCTS {
            break;
        }
    }
    products
}

fn affiliate_links(metadata: &Value) -> Vec<AffiliateLink> {
    metadata
        .get("affiliateLinks")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn introduction(terms: &[&str]) -> String {
    let topics = match terms.len() {
        0 => "the options available".to_string(),
        _ => terms.iter().take(3).copied().collect::<Vec<_>>().join(", "),
    };
    format!(
        "Looking for the best solution? You're in the right place.\n\n\
         In this guide we explore {topics} and help you make an informed decision.\n\n\
         ## Quick Summary\n\n\
         - Expert-tested and reviewed products\n\
         - Detailed comparisons and analysis\n\
         - Up-to-date pricing information\n\
         - Pros and cons for each option"
    )
}

/// Needs at least two products.
fn comparison_table(products: &[String]) -> Option<String> {
    if products.len() < 2 {
        return None;
    }
    let mut lines = vec![
        "## Product Comparison".to_string(),
        String::new(),
        format!("| Feature | {} |", products.join(" | ")),
        format!("|---|{}", "---|".repeat(products.len())),
    ];
    for (feature, options) in COMPARISON_ROWS {
        let cells: Vec<&str> = (0..products.len()).map(|i| options[i % options.len()]).collect();
        lines.push(format!("| {feature} | {} |", cells.join(" | ")));
    }
    Some(lines.join("\n"))
}

fn buying_guide(terms: &[&str]) -> String {
    let mut guide = String::from(
        "## Buying Guide\n\nWhen choosing the right solution, consider these key factors:\n",
    );
    if !terms.is_empty() {
        guide.push_str("\n### Key Features to Look For\n\n");
        let features: Vec<String> = terms
            .iter()
            .take(5)
            .map(|t| format!("- **{t}**: Important for optimal performance and reliability"))
            .collect();
        guide.push_str(&features.join("\n"));
        guide.push('\n');
    }
    guide.push_str(
        "\n### Price Considerations\n\n\
         - Entry-level options: Perfect for beginners\n\
         - Mid-range solutions: Best value for money\n\
         - Premium choices: For professional needs\n\n\
         ### User Experience\n\n\
         - Ease of setup and configuration\n\
         - Learning curve and documentation\n\
         - Customer support quality",
    );
    guide
}

fn verdict(terms: &[&str]) -> String {
    let finding = match terms.first() {
        Some(term) => format!("After thorough testing and analysis, we found that {term} is crucial for success."),
        None => "After thorough testing and analysis, the right choice depends on how you will use it.".to_string(),
    };
    format!(
        "## Final Verdict\n\n{finding} Consider your specific needs and budget when making a decision.\n\n\
         ### Top Recommendations\n\n\
         1. **Best Overall**: Perfect balance of features and value\n\
         2. **Budget Choice**: Great for those just starting\n\
         3. **Premium Pick**: When only the best will do"
    )
}

fn call_to_action(links: &[AffiliateLink], as_of: &str) -> String {
    let mut cta = String::from("## Ready to Get Started?\n\n");
    if links.is_empty() {
        cta.push_str("Check the retailer links in the original article for current prices and availability.");
    } else {
        cta.push_str("Click the links below to check current prices and availability:\n\n");
        let items: Vec<String> = links
            .iter()
            .map(|l| format!("- [Check Price on {}]({})", l.vendor, l.url))
            .collect();
        cta.push_str(&items.join("\n"));
    }
    cta.push_str(&format!("\n\n*Prices and availability are accurate as of {as_of}*"));
    cta
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn kw(terms: &[&str]) -> Vec<KeywordScore> {
        terms
            .iter()
            .map(|t| KeywordScore {
                term: t.to_string(),
                weight: 1.0,
            })
            .collect()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    const REVIEW: &str = "## Best blenders\n\nThe Acme Blender is fast and quiet. \
        Zenith Mixer costs less. It has a smaller jar.\n\n## Pricing\n\nBoth under $100.";

    #[test]
    fn test_product_mentions() {
        assert_eq!(product_mentions(REVIEW), vec!["Acme Blender", "Zenith Mixer"]);
        assert!(product_mentions("nothing capitalised here is relevant").is_empty());
    }

    #[test]
    fn test_product_mentions_capped() {
        let text = "Alpha is a. Beta is b. Gamma is c. Delta is d. Epsilon is e.";
        assert_eq!(product_mentions(text), vec!["Alpha", "Beta", "Gamma", "Delta"]);
    }

    #[test]
    fn test_analyze_structure() {
        let structure = analyze_structure(REVIEW);
        assert_eq!(structure.heading_count, 2);
        assert!(structure.has_pricing);
        assert!(!structure.has_product_reviews);
        assert!(!structure.has_comparisons);
        assert!(structure.average_section_length > 0.0);

        let compared = analyze_structure("Acme vs Zenith: five star reviews");
        assert_eq!(compared.heading_count, 0);
        assert!(compared.has_comparisons);
        assert!(compared.has_product_reviews);
    }

    #[test]
    fn test_enhance_sections_in_order() {
        let enhancement = enhance(REVIEW, &kw(&["blender", "jar", "motor"]), &json!({}), at());
        let md = &enhancement.markdown;

        let order = [
            "In this guide we explore blender, jar, motor",
            "## Original Content",
            "The Acme Blender is fast",
            "## Product Comparison",
            "| Feature | Acme Blender | Zenith Mixer |",
            "| Price Range | $29-$49 | $99-$149 |",
            "## Buying Guide",
            "- **blender**: Important",
            "## Final Verdict",
            "we found that blender is crucial",
            "## Ready to Get Started?",
            "accurate as of 2024-05-01",
            "*Disclaimer: As an affiliate",
        ];
        let mut last = 0;
        for needle in order {
            let pos = md[last..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing or out of order: {needle}"));
            last += pos + needle.len();
        }
        assert_eq!(enhancement.products.len(), 2);
    }

    #[test]
    fn test_enhance_is_deterministic() {
        let a = enhance(REVIEW, &kw(&["blender"]), &json!({}), at());
        let b = enhance(REVIEW, &kw(&["blender"]), &json!({}), at());
        assert_eq!(a.markdown, b.markdown);
    }

    #[test]
    fn test_single_product_has_no_table() {
        let enhancement = enhance("Acme Blender is great.", &[], &json!({}), at());
        assert!(!enhancement.markdown.contains("## Product Comparison"));
        assert!(!enhancement.markdown.contains("### Key Features"));
        assert!(enhancement.markdown.contains("the options available"));
    }

    #[test]
    fn test_affiliate_links_and_last_updated() {
        let metadata = json!({
            "lastUpdated": "March 2024",
            "affiliateLinks": [
                {"vendor": "ShopOne", "url": "https://shop.one/acme"},
                {"vendor": 5},
            ],
        });
        let enhancement = enhance(REVIEW, &kw(&["blender"]), &metadata, at());
        assert!(
            enhancement
                .markdown
                .contains("- [Check Price on ShopOne](https://shop.one/acme)")
        );
        assert!(enhancement.markdown.contains("accurate as of March 2024"));
        assert!(!enhancement.markdown.contains("{{"));
    }

    #[test]
    fn test_annotate_metadata() {
        let enhancement = enhance(REVIEW, &[], &json!({}), at());
        let mut metadata = json!({"title": "Blenders"});
        enhancement.annotate(&mut metadata);

        assert_eq!(metadata["enhanced"], true);
        assert_eq!(metadata["enhancementTimestamp"], "2024-05-01T12:00:00+00:00");
        assert_eq!(metadata["structure"]["headingCount"], 2);
        assert_eq!(metadata["structure"]["hasPricing"], true);
        assert_eq!(metadata["title"], "Blenders");
    }
}
