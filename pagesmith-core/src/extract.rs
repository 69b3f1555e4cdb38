//! Recovers the `{"files": {path: content}}` contract from free-form model output.
//!
//! Strategies run in order and the first structurally valid candidate wins:
//!
//! 1. fenced blocks labelled `json`, last block first;
//! 2. any fenced block, last to first;
//! 3. outermost balanced-brace substrings mentioning a `"files"` key, last to first;
//! 4. the whole trimmed text.
//!
//! A candidate is accepted only when it is a JSON object whose `files` member is a
//! non-empty object of string values. Anything else is skipped, never half-accepted.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;

const PREVIEW_CHARS: usize = 500;

/// Which strategy produced the accepted candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    LabelledFence,
    AnyFence,
    BraceScan,
    WholeText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub files: BTreeMap<String, String>,
    pub main_language: Option<String>,
    pub description: Option<String>,
    pub changes_summary: Option<String>,
    pub strategy: ExtractionStrategy,
}

/// Runs the fallback cascade over `raw`.
pub fn extract(raw: &str) -> Result<ExtractionResult, ExtractionError> {
    let blocks = fenced_blocks(raw);
    debug!(fenced_blocks = blocks.len(), "[EXTRACT] Scanned model output");

    let labelled = blocks
        .iter()
        .rev()
        .find(|b| b.label.eq_ignore_ascii_case("json"));
    if let Some(block) = labelled {
        if let Some(result) = accept(&block.body, ExtractionStrategy::LabelledFence) {
            return Ok(result);
        }
    }

    for block in blocks.iter().rev() {
        if let Some(result) = accept(&block.body, ExtractionStrategy::AnyFence) {
            return Ok(result);
        }
    }

    let trimmed = raw.trim();
    // pure JSON resolves from its top-level object only
    if serde_json::from_str::<Value>(trimmed).is_err() {
        for candidate in brace_candidates(trimmed).into_iter().rev() {
            if let Some(result) = accept(candidate, ExtractionStrategy::BraceScan) {
                return Ok(result);
            }
        }
    }

    if let Some(result) = accept(trimmed, ExtractionStrategy::WholeText) {
        return Ok(result);
    }

    let preview: String = raw.chars().take(PREVIEW_CHARS).collect();
    warn!(
        raw_len = raw.len(),
        "[EXTRACT] No strategy produced a valid files mapping"
    );
    Err(ExtractionError { preview })
}

fn accept(candidate: &str, strategy: ExtractionStrategy) -> Option<ExtractionResult> {
    let value: Value = match serde_json::from_str(candidate.trim()) {
        Ok(value) => value,
        Err(e) => {
            debug!(?strategy, error = %e, "[EXTRACT] Candidate is not valid JSON");
            return None;
        }
    };
    let result = validate(&value, strategy);
    match &result {
        Some(r) => info!(
            ?strategy,
            files = r.files.len(),
            "[EXTRACT] Accepted files mapping"
        ),
        None => debug!(?strategy, "[EXTRACT] Candidate parsed but has the wrong shape"),
    }
    result
}

fn validate(value: &Value, strategy: ExtractionStrategy) -> Option<ExtractionResult> {
    let object = value.as_object()?;
    let files_obj = object.get("files")?.as_object()?;
    if files_obj.is_empty() {
        return None;
    }
    let mut files = BTreeMap::new();
    for (path, content) in files_obj {
        if path.is_empty() {
            return None;
        }
        files.insert(path.clone(), content.as_str()?.to_string());
    }
    let text_field = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
    Some(ExtractionResult {
        files,
        main_language: text_field("main_language"),
        description: text_field("description"),
        changes_summary: text_field("changes_summary"),
        strategy,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FencedBlock {
    label: String,
    body: String,
}

fn fence_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*```\s*([A-Za-z0-9_+\-]*)\s*(.*)$").expect("fence regex is valid")
    })
}

/// Line-based fence scanner. JSON strings escape their newlines, so a line starting
/// with a fence is never inside a string of a well-formed payload. An unterminated
/// trailing block (truncated output) is still returned.
fn fenced_blocks(raw: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<FencedBlock> = None;

    for line in raw.lines() {
        match current.as_mut() {
            None => {
                if let Some(caps) = fence_open().captures(line) {
                    let label = caps.get(1).map_or("", |m| m.as_str()).to_string();
                    let rest = caps.get(2).map_or("", |m| m.as_str());
                    if let Some(inline) = rest.trim_end().strip_suffix("```") {
                        blocks.push(FencedBlock {
                            label,
                            body: inline.to_string(),
                        });
                    } else {
                        current = Some(FencedBlock {
                            label,
                            body: rest.to_string(),
                        });
                    }
                }
            }
            Some(block) => {
                let trimmed = line.trim_end();
                if let Some(before) = trimmed.strip_suffix("```") {
                    block.body.push('\n');
                    block.body.push_str(before);
                    if let Some(done) = current.take() {
                        blocks.push(done);
                    }
                } else {
                    block.body.push('\n');
                    block.body.push_str(line);
                }
            }
        }
    }
    if let Some(unterminated) = current {
        blocks.push(unterminated);
    }
    blocks
}

/// Outermost balanced `{...}` substrings that open like a JSON object and mention
/// `"files"`, ordered by start position. Braces inside string literals are ignored.
fn brace_candidates(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    while start < bytes.len() {
        if bytes[start] != b'{' || !opens_object(&bytes[start + 1..]) {
            start += 1;
            continue;
        }
        match matching_brace(&bytes[start..]) {
            Some(end) => {
                let candidate = &text[start..start + end + 1];
                if candidate.contains("\"files\"") {
                    out.push(candidate);
                }
                start += end + 1;
            }
            None => start += 1,
        }
    }
    out
}

fn opens_object(rest: &[u8]) -> bool {
    rest.iter()
        .find(|c| !c.is_ascii_whitespace())
        .is_some_and(|&c| c == b'"' || c == b'}')
}

/// Offset of the brace closing `bytes[0]`, tracking string literals and escapes.
fn matching_brace(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
