use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::ImageRef;
use crate::template::{find_candidate, load_candidates};

/// Body used for any template without a file of its own.
pub const DEFAULT_TEMPLATE_BODY: &str = "# {{title}}

**Source:** {{url}}
**Created:** {{created_at}}
**Tags:** {{tags}}

---

## Metadata
```json
{{metadata}}
```

---

## Content

{{content}}";

static EACH_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{#each\s+([^}]+)\}\}([\s\S]+?)\{\{/each\}\}").expect("valid regex")
});

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][\w.]*)\s*\}\}").expect("valid regex"));

static ITEM_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*this(?:\.(\w+))?\s*\}\}").expect("valid regex"));

/// Values available to a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderData {
    pub title: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub content: String,
    pub excerpt: String,
    pub genre: String,
    pub metadata: Value,
    pub images: Vec<ImageRef>,
}

/// Template bodies keyed by catalog id, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    bodies: Arc<HashMap<String, String>>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateStore {
    /// Every template uses [`DEFAULT_TEMPLATE_BODY`].
    pub fn builtin() -> Self {
        Self {
            bodies: Arc::new(HashMap::new()),
        }
    }

    /// Load `<dir>/<id>.md` for every catalog template. Missing files fall back
    /// to the default body; a missing directory means all defaults.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "Templates directory not found, using defaults");
            return Ok(Self::builtin());
        }

        let mut bodies = HashMap::new();
        for candidate in load_candidates() {
            let path = dir.join(format!("{}.md", candidate.id));
            if !path.exists() {
                tracing::debug!(template = candidate.id, "No template file, using default body");
                continue;
            }
            let body = std::fs::read_to_string(&path).map_err(|e| {
                AppError::TemplateError(format!(
                    "Failed to read template file {}: {e}",
                    path.display()
                ))
            })?;
            bodies.insert(candidate.id.to_string(), body);
        }
        tracing::info!(loaded = bodies.len(), dir = %dir.display(), "Templates loaded");

        Ok(Self {
            bodies: Arc::new(bodies),
        })
    }

    /// The body for a template id.
    pub fn body(&self, id: &str) -> &str {
        self.bodies
            .get(id)
            .map(String::as_str)
            .unwrap_or(DEFAULT_TEMPLATE_BODY)
    }

    /// Render a catalog template.
    pub fn render(&self, id: &str, data: &RenderData) -> Result<String, AppError> {
        if find_candidate(id).is_none() {
            return Err(AppError::TemplateError(format!("Unknown template: {id}")));
        }
        Ok(render_template(self.body(id), data))
    }
}

/// Fill a template body.
///
/// `{{#each path}} ... {{/each}}` blocks expand first, with `{{this.key}}`
/// bound to each array item. Simple placeholders are then replaced in a
/// single pass, so substituted values are never rescanned. Unknown
/// placeholders are left as written.
pub fn render_template(body: &str, data: &RenderData) -> String {
    let context = json!({
        "title": data.title,
        "url": data.url.as_deref().unwrap_or(""),
        "created_at": data.created_at.to_rfc3339(),
        "tags": data.tags,
        "excerpt": data.excerpt,
        "genre": data.genre,
        "metadata": data.metadata,
        "images": data.images,
    });

    let expanded = EACH_BLOCK.replace_all(body, |caps: &Captures<'_>| {
        let items = lookup(&context, caps[1].trim()).and_then(Value::as_array);
        match items {
            Some(items) => items
                .iter()
                .map(|item| render_item(&caps[2], item).trim().to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    });

    PLACEHOLDER
        .replace_all(&expanded, |caps: &Captures<'_>| {
            let name = &caps[1];
            match name {
                "title" => data.title.clone(),
                "url" => data
                    .url
                    .clone()
                    .unwrap_or_else(|| "No source URL".to_string()),
                "created_at" => data.created_at.to_rfc3339(),
                "tags" => format_tags(&data.tags),
                "content" => format!("{}{}", data.content, image_gallery(&data.images)),
                "metadata" => {
                    serde_json::to_string_pretty(&data.metadata).unwrap_or_else(|_| "{}".into())
                }
                _ => match lookup(&context, name) {
                    Some(value) => display_value(value),
                    None => caps[0].to_string(),
                },
            }
        })
        .into_owned()
}

/// `#tag` list, space separated.
pub fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!("#{}", t.trim().replace(char::is_whitespace, "-")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn image_gallery(images: &[ImageRef]) -> String {
    if images.is_empty() {
        return String::new();
    }
    let entries: Vec<String> = images
        .iter()
        .map(|img| format!("![{}]({})\n*Original: {}*", img.alt, img.url, img.original_src))
        .collect();
    format!("\n\n## Images\n\n{}", entries.join("\n\n"))
}

fn render_item(block: &str, item: &Value) -> String {
    ITEM_FIELD
        .replace_all(block, |caps: &Captures<'_>| match caps.get(1) {
            Some(key) => item
                .get(key.as_str())
                .map(display_value)
                .unwrap_or_default(),
            None => display_value(item),
        })
        .into_owned()
}

fn lookup<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(root, |value, key| value.get(key))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn data(metadata: Value, tags: &[&str], images: Vec<ImageRef>) -> RenderData {
        RenderData {
            title: "Hello World".into(),
            url: Some("https://example.com/post".into()),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            content: "Body text".into(),
            excerpt: "Body".into(),
            genre: "blog_post".into(),
            metadata,
            images,
        }
    }

    #[test]
    fn test_default_body_renders_all_sections() {
        let metadata = json!({"author": "Ada"});
        let out = render_template(
            DEFAULT_TEMPLATE_BODY,
            &data(metadata, &["rust", "web dev"], vec![]),
        );

        assert!(out.starts_with("# Hello World\n"));
        assert!(out.contains("**Source:** https://example.com/post"));
        assert!(out.contains("**Created:** 2024-05-01T12:00:00+00:00"));
        assert!(out.contains("**Tags:** #rust #web-dev"));
        assert!(out.contains("\"author\": \"Ada\""));
        assert!(out.ends_with("## Content\n\nBody text"));
    }

    #[test]
    fn test_each_block_expands_items() {
        let metadata = json!({
            "affiliateLinks": [
                {"vendor": "Shop A", "url": "https://a.example"},
                {"vendor": "Shop B", "url": "https://b.example"}
            ],
            "lastUpdated": "2024-05-01"
        });
        let body = "{{#each metadata.affiliateLinks}}\n- [{{this.vendor}}]({{this.url}})\n{{/each}}\nAs of {{metadata.lastUpdated}}";
        let out = render_template(body, &data(metadata, &[], vec![]));
        assert_eq!(
            out,
            "- [Shop A](https://a.example)\n- [Shop B](https://b.example)\nAs of 2024-05-01"
        );
    }

    #[test]
    fn test_each_over_missing_path_is_empty() {
        let metadata = json!({});
        let out = render_template("a{{#each metadata.nope}}x{{/each}}b", &data(metadata, &[], vec![]));
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_unknown_placeholder_is_kept() {
        let metadata = json!({});
        let out = render_template("{{title}} {{mystery}}", &data(metadata, &[], vec![]));
        assert_eq!(out, "Hello World {{mystery}}");
    }

    #[test]
    fn test_content_is_not_rescanned() {
        let metadata = json!({});
        let mut d = data(metadata, &[], vec![]);
        d.content = "literal {{title}}".into();
        assert_eq!(render_template("{{content}}", &d), "literal {{title}}");
    }

    #[test]
    fn test_images_are_appended_to_content() {
        let metadata = json!({});
        let images = vec![ImageRef {
            url: "https://example.com/a.png".into(),
            alt: "A".into(),
            title: String::new(),
            original_src: "/a.png".into(),
        }];
        let out = render_template("{{content}}", &data(metadata, &[], images));
        assert_eq!(
            out,
            "Body text\n\n## Images\n\n![A](https://example.com/a.png)\n*Original: /a.png*"
        );
    }

    #[test]
    fn test_store_loads_files_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tutorial.md"), "TUTORIAL {{title}}").unwrap();

        let store = TemplateStore::load(dir.path()).unwrap();
        assert_eq!(store.body("tutorial"), "TUTORIAL {{title}}");
        assert_eq!(store.body("blog-post"), DEFAULT_TEMPLATE_BODY);

        let metadata = json!({});
        let rendered = store.render("tutorial", &data(metadata, &[], vec![])).unwrap();
        assert_eq!(rendered, "TUTORIAL Hello World");
    }

    #[test]
    fn test_store_missing_dir_uses_builtin() {
        let store = TemplateStore::load("/definitely/not/here").unwrap();
        assert_eq!(store.body("code-snippet"), DEFAULT_TEMPLATE_BODY);
    }

    #[test]
    fn test_render_unknown_template_fails() {
        let metadata = json!({});
        let err = TemplateStore::builtin()
            .render("recipe", &data(metadata, &[], vec![]))
            .unwrap_err();
        assert!(matches!(err, AppError::TemplateError(_)));
    }
}
