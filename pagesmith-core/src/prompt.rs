//! Prompt templating for the content-generation collaborator.
//!
//! Only formatting lives here. Attachments arrive as `data:` URIs: text-like payloads are
//! decoded and inlined in chunks, images are handed to the model as image references,
//! and everything else is summarised by type and size.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, warn};

use crate::model::{Attachment, TaskRequest, ENTRY_POINT};

const MAX_CHUNK_CHARS: usize = 4_000;
const MAX_INLINE_CHARS: usize = 16_000;
const FILE_PREVIEW_LIMIT: usize = 1_000;
const FILE_PREVIEW_EDGE: usize = 500;

/// Text plus image references (data URIs or URLs) for a multimodal request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub images: Vec<String>,
}

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Parses `data:<mime>[;params][;base64],<payload>`. Returns `None` for other URLs
    /// or undecodable payloads.
    pub fn parse(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        let mut parts = meta.split(';');
        let mime = match parts.next() {
            Some("") | None => "text/plain".to_string(),
            Some(m) => m.trim().to_ascii_lowercase(),
        };
        let is_base64 = parts.any(|p| p.eq_ignore_ascii_case("base64"));
        let bytes = if is_base64 {
            let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD.decode(cleaned).ok()?
        } else {
            percent_decode(payload)
        };
        Some(Self { mime, bytes })
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn is_text(&self) -> bool {
        self.mime.starts_with("text/")
            || matches!(
                self.mime.as_str(),
                "application/json"
                    | "application/xml"
                    | "application/javascript"
                    | "application/x-javascript"
                    | "application/csv"
                    | "application/x-yaml"
                    | "application/yaml"
            )
            || self.mime.ends_with("+json")
            || self.mime.ends_with("+xml")
    }
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Renders the attachment section and collects image references.
fn render_attachments(attachments: &[Attachment], images: &mut Vec<String>) -> String {
    if attachments.is_empty() {
        return String::new();
    }
    let mut out = String::from("ATTACHMENTS PROVIDED:\n");
    for att in attachments {
        match DataUri::parse(&att.url) {
            Some(data) if data.is_image() => {
                images.push(att.url.clone());
                let _ = writeln!(
                    out,
                    "- {} ({}, {} bytes): supplied as image #{}; embed it as a data URI for default content.",
                    att.name,
                    data.mime,
                    data.bytes.len(),
                    images.len()
                );
            }
            Some(data) if data.is_text() => {
                let text = String::from_utf8_lossy(&data.bytes);
                let total = text.chars().count();
                let inlined: String = text.chars().take(MAX_INLINE_CHARS).collect();
                let chunks = chunk(&inlined, MAX_CHUNK_CHARS);
                let _ = writeln!(out, "- {} ({}, {} chars):", att.name, data.mime, total);
                for (i, part) in chunks.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "--- {} part {}/{} ---\n{}",
                        att.name,
                        i + 1,
                        chunks.len(),
                        part
                    );
                }
                if total > MAX_INLINE_CHARS {
                    let _ = writeln!(
                        out,
                        "--- {} truncated: {} more chars not shown ---",
                        att.name,
                        total - MAX_INLINE_CHARS
                    );
                }
            }
            Some(data) => {
                let _ = writeln!(
                    out,
                    "- {} ({}, {} bytes): binary content, not embedded.",
                    att.name,
                    data.mime,
                    data.bytes.len()
                );
            }
            None if att.url.starts_with("data:") => {
                warn!(attachment = %att.name, "[PROMPT] Attachment data URI could not be decoded");
                let _ = writeln!(out, "- {}: undecodable data URI, not embedded.", att.name);
            }
            None => {
                let _ = writeln!(out, "- {}: {}", att.name, att.url);
            }
        }
    }
    out
}

fn chunk(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

fn numbered_checks(checks: &[String]) -> String {
    checks
        .iter()
        .enumerate()
        .map(|(i, check)| format!("{}. {}", i + 1, check))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Current file listing for a revision prompt; long files keep only their edges.
fn render_current_files(files: &BTreeMap<String, String>) -> String {
    files
        .iter()
        .map(|(name, content)| {
            let len = content.chars().count();
            if len > FILE_PREVIEW_LIMIT {
                let head: String = content.chars().take(FILE_PREVIEW_EDGE).collect();
                let tail: String = content.chars().skip(len - FILE_PREVIEW_EDGE).collect();
                format!(
                    "=== {name} ===\n{head}\n\n... [truncated {} chars] ...\n\n{tail}",
                    len - 2 * FILE_PREVIEW_EDGE
                )
            } else {
                format!("=== {name} ===\n{content}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

const OUTPUT_CONTRACT: &str = r##"OUTPUT FORMAT (CRITICAL - PURE JSON ONLY):
Return ONLY this JSON structure with no markdown, no code blocks, no explanations:

{
  "files": {
    "index.html": "<!DOCTYPE html>\n<html lang=\"en\">...</html>",
    "README.md": "# Project Title\n\n## Summary\n...\n## License\nMIT License...",
    ".gitignore": ".env\n.DS_Store"
  },
  "main_language": "javascript",
  "description": "Brief one-line description"
}"##;

/// Prompt for the first round: build the site from scratch.
pub fn initial_prompt(task: &TaskRequest) -> Prompt {
    let mut images = Vec::new();
    let attachments = render_attachments(&task.attachments, &mut images);
    let text = format!(
        "Generate a complete, working web application for static page hosting.\n\n\
TASK: {task_id}\n\
DESCRIPTION: {brief}\n\n\
REQUIREMENTS (ALL must be met):\n{checks}\n\n\
{attachments}\n\
DEPLOYMENT CONSTRAINTS:\n\
- Static site only, no backend servers or API endpoints\n\
- {entry} must be at the repository root\n\
- Client-side JavaScript only (vanilla JS or CDN libraries)\n\n\
SECURITY:\n\
- No API keys, secrets or tokens in code\n\n\
FILE REQUIREMENTS:\n\
1. {entry} - complete working app at the root\n\
2. Additional .js/.css files if needed\n\
3. README.md - summary, usage, URL parameters, MIT License\n\
4. .gitignore\n\n\
ATTACHMENTS:\n\
If attachments are provided, embed them as default sample data (data URI) \
or load them from a ?url=... query parameter.\n\n\
{contract}\n\n\
Generate the complete application now (JSON only):",
        task_id = task.task,
        brief = task.brief,
        checks = numbered_checks(&task.checks),
        entry = ENTRY_POINT,
        contract = OUTPUT_CONTRACT,
    );
    debug!(prompt_len = text.len(), images = images.len(), "[PROMPT] Built initial prompt");
    Prompt { text, images }
}

/// Prompt for a revision round: update the existing files to the new brief.
pub fn revision_prompt(task: &TaskRequest, current_files: &BTreeMap<String, String>) -> Prompt {
    let mut images = Vec::new();
    let attachments = render_attachments(&task.attachments, &mut images);
    let text = format!(
        "You are updating an existing static web application based on new requirements.\n\n\
TASK ID: {task_id}\n\
ROUND: {round} (update existing code)\n\n\
CURRENT APPLICATION FILES:\n{current}\n\n\
NEW REQUIREMENTS:\n{brief}\n\n\
{attachments}\n\
EVALUATION CRITERIA (ALL must pass):\n{checks}\n\n\
RULES:\n\
- {entry} stays at the repository root\n\
- Return COMPLETE file contents for every file you change, not diffs\n\
- No secrets, API keys or tokens in code\n\
- Keep README.md accurate and keep its MIT License section\n\n\
{contract}\n\
Also include \"changes_summary\" describing what was updated and why.\n\n\
Return the raw JSON object only:",
        task_id = task.task,
        round = task.round,
        current = render_current_files(current_files),
        brief = task.brief,
        checks = numbered_checks(&task.checks),
        entry = ENTRY_POINT,
        contract = OUTPUT_CONTRACT,
    );
    debug!(prompt_len = text.len(), images = images.len(), "[PROMPT] Built revision prompt");
    Prompt { text, images }
}
