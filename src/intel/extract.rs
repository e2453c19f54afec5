// SPDX-License-Identifier: MIT

//! Best-effort extraction of structured values from free-form executor output
//!
//! Every function here has the same contract: the first well-formed match
//! wins, and absence of a match yields an explicit empty value (`None` or an
//! empty collection), never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("url pattern"));

static BELOW_THRESHOLD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(?:below threshold|threshold ceps|underperforming|attention|monitor)[\s\S]*$")
        .expect("below-threshold pattern")
});

static BULLET_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*\d.)\s]+").expect("bullet pattern"));

/// First URL whose path ends in one of the given extensions (case
/// insensitive, leading dot implied)
pub fn first_url_with_extension(text: &str, extensions: &[&str]) -> Option<String> {
    for candidate in URL_RE.find_iter(text) {
        let trimmed = candidate.as_str().trim_end_matches(['.', ',', ';', ':']);
        let Ok(parsed) = url::Url::parse(trimmed) else {
            continue;
        };
        let path = parsed.path().to_lowercase();
        if extensions.iter().any(|ext| path.ends_with(&format!(".{}", ext))) {
            return Some(trimmed.to_string());
        }
    }
    None
}

pub fn first_png_url(text: &str) -> Option<String> {
    first_url_with_extension(text, &["png"])
}

pub fn first_pdf_url(text: &str) -> Option<String> {
    first_url_with_extension(text, &["pdf"])
}

/// First presentation URL; falls back to the first URL of any kind, since
/// deck links are often extensionless download URLs
pub fn first_deck_url(text: &str) -> Option<String> {
    first_url_with_extension(text, &["pptx", "ppt"]).or_else(|| first_url(text))
}

/// First URL of any kind
pub fn first_url(text: &str) -> Option<String> {
    URL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
}

/// First well-formed JSON object embedded in the text
pub fn first_json_object(text: &str) -> Option<Value> {
    first_json_value(text, '{').filter(Value::is_object)
}

/// First well-formed JSON array embedded in the text
pub fn first_json_array(text: &str) -> Option<Value> {
    first_json_value(text, '[').filter(Value::is_array)
}

fn first_json_value(text: &str, opener: char) -> Option<Value> {
    for (index, ch) in text.char_indices() {
        if ch != opener {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[index..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Some(value);
        }
    }
    None
}

/// Contiguous markdown table blocks (runs of lines that start with `|`)
pub fn table_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim_start().starts_with('|') {
            current.push(line);
        } else if !current.is_empty() {
            blocks.push(current.join("\n"));
            current.clear();
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

/// First markdown table block
pub fn first_table_block(text: &str) -> Option<String> {
    table_blocks(text).into_iter().next()
}

/// All markdown table blocks joined, or "" when the text has none
pub fn joined_table_blocks(text: &str) -> String {
    table_blocks(text).join("\n\n")
}

/// Trailing below-threshold / needs-attention section of an analysis, if
/// the text marks one
pub fn below_threshold_section(text: &str) -> Option<String> {
    BELOW_THRESHOLD_RE
        .find(text)
        .map(|m| m.as_str().trim().to_string())
}

/// Parse up to four insight strings: a JSON string array when present,
/// otherwise bullet / numbered lines
pub fn parse_insights(text: &str) -> Vec<String> {
    if let Some(Value::Array(items)) = first_json_array(text) {
        let parsed: Vec<String> = items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect();
        if !parsed.is_empty() {
            return parsed.into_iter().take(4).collect();
        }
    }

    text.lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && (line.starts_with('-')
                    || line.starts_with('*')
                    || line.chars().next().is_some_and(|c| c.is_ascii_digit()))
        })
        .map(|line| BULLET_PREFIX_RE.replace(line, "").to_string())
        .filter(|line| !line.is_empty())
        .take(4)
        .collect()
}
