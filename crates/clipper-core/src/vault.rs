//! Vault layout: where a clip lands and what it is called.

use crate::models::{Genre, KeywordScore};

const MAX_FILE_STEM_CHARS: usize = 200;

/// Folder for a clip: `<genre>/<first keyword>/<keywords 2-3 joined by '-'>`.
///
/// Missing keywords shorten the path; no keywords at all gives
/// `<genre>/uncategorized`.
pub fn folder_structure(genre: Genre, keywords: &[KeywordScore]) -> String {
    let mut parts = vec![genre.as_str().to_string()];
    let terms: Vec<String> = keywords
        .iter()
        .map(|k| sanitize_segment(&k.term))
        .filter(|t| !t.is_empty())
        .collect();

    match terms.split_first() {
        None => parts.push("uncategorized".to_string()),
        Some((first, rest)) => {
            parts.push(first.clone());
            let tail: Vec<&str> = rest.iter().take(2).map(String::as_str).collect();
            if !tail.is_empty() {
                parts.push(tail.join("-"));
            }
        }
    }
    parts.join("/")
}

/// Safe file name (without extension) from a title: lower-cased, stripped of
/// path and reserved characters, whitespace runs collapsed to `-`, at most
/// 200 characters.
pub fn file_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | '?' | '<' | '>' | ':' | '*' | '|' | '"'))
        .collect();
    let stem: String = cleaned
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .trim_matches('.')
        .chars()
        .take(MAX_FILE_STEM_CHARS)
        .collect();

    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}

fn sanitize_segment(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}
