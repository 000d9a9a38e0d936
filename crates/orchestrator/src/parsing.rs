//! Extraction of structured pieces from free-form model responses.
//!
//! Models answer in Markdown with fenced code blocks, or with a bare JSON
//! document. These helpers pull the useful parts out and never fail: a
//! response without the expected structure yields an empty result.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A fenced code block with its info-string language (lowercased, may be empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    pub lang: String,
    pub body: String,
}

pub fn fenced_blocks(text: &str) -> Vec<FencedBlock> {
    let Ok(pattern) = Regex::new(r"(?s)```([A-Za-z0-9_+\-]*)[^\n]*\n(.*?)```") else {
        return Vec::new();
    };

    pattern
        .captures_iter(text)
        .map(|caps| FencedBlock {
            lang: caps
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default(),
            body: caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        })
        .collect()
}

/// Bodies of all fenced blocks tagged with `lang`.
pub fn blocks_with_lang(text: &str, lang: &str) -> Vec<String> {
    fenced_blocks(text)
        .into_iter()
        .filter(|block| block.lang == lang)
        .map(|block| block.body)
        .collect()
}

/// Find a JSON object in a response.
///
/// Tried in order: the whole response, ```json blocks, untagged blocks, and
/// the widest `{ ... }` span of the text. Keys whose value is `null` are
/// dropped, so a model's `null` reads as "not provided".
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    if let Some(object) = parse_object(text) {
        return Some(object);
    }

    let blocks = fenced_blocks(text);
    for block in blocks.iter().filter(|b| b.lang == "json") {
        if let Some(object) = parse_object(&block.body) {
            return Some(object);
        }
    }
    for block in blocks.iter().filter(|b| b.lang.is_empty()) {
        if let Some(object) = parse_object(&block.body) {
            return Some(object);
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&text[start..=end])
}

/// First ```json block that parses to something other than `null`.
pub fn first_json_block(text: &str) -> Option<Value> {
    blocks_with_lang(text, "json")
        .iter()
        .filter_map(|body| serde_json::from_str::<Value>(body).ok())
        .find(|value| !value.is_null())
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(text.trim()) {
        Ok(Value::Object(mut object)) => {
            object.retain(|_, value| !value.is_null());
            Some(object)
        }
        _ => None,
    }
}

/// Target of the first `CREATE TABLE` statement, without quoting.
pub fn create_table_name(sql: &str) -> Option<String> {
    let pattern = Regex::new(
        r#"(?i)CREATE\s+(?:OR\s+REPLACE\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([`"\[]?[\w.]+[`"\]]?)"#,
    )
    .ok()?;

    let name = pattern.captures(sql)?.get(1)?.as_str();
    let name = name.trim_matches(|c| matches!(c, '`' | '"' | '[' | ']'));
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Split a Markdown document on `## ` headings into heading → body.
///
/// Text before the first heading is not part of any section.
pub fn markdown_sections(text: &str) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            if let Some((title, body)) = current.take() {
                sections.insert(title, body.join("\n").trim().to_string());
            }
            current = Some((heading.trim().to_string(), Vec::new()));
        } else if let Some((_, ref mut body)) = current {
            body.push(line);
        }
    }

    if let Some((title, body)) = current {
        sections.insert(title, body.join("\n").trim().to_string());
    }

    sections
}
