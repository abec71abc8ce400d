use std::sync::LazyLock;

use clipper_core::models::{ImageRef, PageMetadata, ParsedDocument, StructuralSignals};
use clipper_core::traits::DocumentParser;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static ARTICLE: LazyLock<Selector> = LazyLock::new(|| selector("article"));
static PRE: LazyLock<Selector> = LazyLock::new(|| selector("pre"));
static CODE: LazyLock<Selector> = LazyLock::new(|| selector("code"));
static ORDERED_STEP: LazyLock<Selector> = LazyLock::new(|| selector("ol li"));
static CITATION: LazyLock<Selector> = LazyLock::new(|| selector("cite, blockquote"));
static HEADING: LazyLock<Selector> = LazyLock::new(|| selector("h1, h2, h3, h4, h5, h6"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static META: LazyLock<Selector> = LazyLock::new(|| selector("meta[content]"));
static ITEMTYPE: LazyLock<Selector> = LazyLock::new(|| selector("[itemtype]"));
static JSON_LD: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"script[type="application/ld+json"]"#));
static BODY: LazyLock<Selector> = LazyLock::new(|| selector("body"));
static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img"));

/// Builds [`ParsedDocument`]s with the `scraper` HTML parser.
///
/// Every signal is read in one synchronous pass; the parsed tree never
/// outlives [`DocumentParser::parse`].
#[derive(Debug, Clone, Default)]
pub struct HtmlSignalExtractor;

impl HtmlSignalExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for HtmlSignalExtractor {
    fn parse(&self, markup: &str, base_url: Option<&str>) -> ParsedDocument {
        let html = Html::parse_document(markup);
        let headings: Vec<String> = html.select(&HEADING).map(element_text).collect();

        let code_block_count = html
            .select(&PRE)
            .filter(|pre| pre.select(&CODE).next().is_some())
            .count();
        let signals = StructuralSignals {
            has_article_root: html.select(&ARTICLE).next().is_some(),
            has_code_block: code_block_count > 0,
            has_ordered_steps: html.select(&ORDERED_STEP).next().is_some(),
            has_citation_markers: html.select(&CITATION).next().is_some(),
            code_block_count,
            heading_count: headings.len(),
        };

        let body_classes = html
            .select(&BODY)
            .next()
            .map(|body| body.value().classes().map(str::to_string).collect())
            .unwrap_or_default();

        let base = base_url.and_then(|u| Url::parse(u).ok());
        ParsedDocument {
            markup: markup.to_string(),
            base_url: base_url.map(str::to_string),
            signals,
            metadata: read_metadata(&html),
            headings,
            body_classes,
            images: read_images(&html, base.as_ref()),
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn read_metadata(html: &Html) -> PageMetadata {
    let mut meta = PageMetadata {
        title: html
            .select(&TITLE)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty()),
        ..Default::default()
    };

    for element in html.select(&META) {
        let el = element.value();
        let Some(content) = el.attr("content").map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };
        let key = el
            .attr("property")
            .or_else(|| el.attr("name"))
            .unwrap_or_default()
            .to_ascii_lowercase();
        let slot = match key.as_str() {
            "description" => &mut meta.description,
            "og:type" => &mut meta.og_type,
            "og:title" => &mut meta.og_title,
            "og:description" => &mut meta.og_description,
            "og:image" => &mut meta.og_image,
            "article:type" => &mut meta.article_type,
            "author" | "article:author" => &mut meta.author,
            "article:published_time" => &mut meta.published_time,
            "article:modified_time" => &mut meta.modified_time,
            "keywords" => {
                meta.keywords.extend(
                    content
                        .split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(str::to_string),
                );
                continue;
            }
            "article:tag" => {
                meta.tags.push(content.to_string());
                continue;
            }
            _ => continue,
        };
        // First occurrence wins.
        slot.get_or_insert_with(|| content.to_string());
    }

    meta.schema_type = html
        .select(&ITEMTYPE)
        .next()
        .and_then(|el| el.value().attr("itemtype"))
        .map(str::to_string)
        .or_else(|| {
            html.select(&JSON_LD).find_map(|script| {
                let raw: String = script.text().collect();
                serde_json::from_str::<Value>(&raw)
                    .ok()
                    .and_then(|value| json_ld_type(&value))
            })
        });

    meta
}

/// `@type` of a JSON-LD block: top-level object, first array entry, or first
/// `@graph` node.
fn json_ld_type(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(json_ld_type),
        Value::Object(map) => match map.get("@type") {
            Some(Value::String(t)) => Some(t.clone()),
            Some(Value::Array(types)) => types.iter().find_map(|t| t.as_str().map(str::to_string)),
            _ => map.get("@graph").and_then(json_ld_type),
        },
        _ => None,
    }
}

fn read_images(html: &Html, base: Option<&Url>) -> Vec<ImageRef> {
    html.select(&IMG)
        .filter_map(|img| {
            let el = img.value();
            let src = el
                .attr("src")
                .or_else(|| el.attr("data-src"))
                .map(str::trim)
                .filter(|s| !s.is_empty())?;
            let resolved = match base {
                Some(base) => base.join(src),
                None => Url::parse(src),
            };
            let url = match resolved {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!(%src, error = %e, "Skipping unresolvable image");
                    return None;
                }
            };
            Some(ImageRef {
                url: url.to_string(),
                alt: el.attr("alt").unwrap_or_default().to_string(),
                title: el.attr("title").unwrap_or_default().to_string(),
                original_src: src.to_string(),
            })
        })
        .collect()
}
