//! `<tool_use>` block parser.
//!
//! ```text
//! <tool_use>
//!   <server>PROVIDER_ID</server>
//!   <tool>OPERATION_NAME</tool>
//!   <arguments>{"key": "value"}</arguments>
//!   <id>optional-correlation-id</id>
//! </tool_use>
//! ```
//!
//! Matching is non-greedy and case-insensitive: the first close marker after
//! an open marker ends the block, so nesting is not supported. Sub-tags may
//! appear in any order; the first occurrence of each wins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::ToolCall;

static TOOL_USE: LazyLock<Regex> = LazyLock::new(|| tag_pattern("tool_use"));
static SERVER: LazyLock<Regex> = LazyLock::new(|| tag_pattern("server"));
static TOOL: LazyLock<Regex> = LazyLock::new(|| tag_pattern("tool"));
static ARGUMENTS: LazyLock<Regex> = LazyLock::new(|| tag_pattern("arguments"));
static ID: LazyLock<Regex> = LazyLock::new(|| tag_pattern("id"));

fn tag_pattern(tag: &str) -> Regex {
    // Tag names are fixed identifiers, so the pattern always compiles.
    Regex::new(&format!(r"(?is)<{tag}>(.*?)</{tag}>")).expect("static tag pattern")
}

/// Why a block was skipped.
#[derive(Debug, PartialEq, Eq)]
enum Malformed {
    MissingServer,
    MissingTool,
}

impl std::fmt::Display for Malformed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Malformed::MissingServer => f.write_str("missing <server>"),
            Malformed::MissingTool => f.write_str("missing <tool>"),
        }
    }
}

/// Parse every well-formed `<tool_use>` block in `content`, in source order.
///
/// Malformed blocks are logged and skipped; this never fails.
pub fn parse_tool_use_blocks(content: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    for block in blocks(content) {
        match parse_block(block) {
            Ok(call) => calls.push(call),
            Err(reason) => {
                tracing::warn!(%reason, "skipping malformed <tool_use> block");
            }
        }
    }
    calls
}

/// Whether `content` holds at least one well-formed `<tool_use>` block.
pub fn has_tool_use(content: &str) -> bool {
    blocks(content).any(|block| parse_block(block).is_ok())
}

fn blocks(content: &str) -> impl Iterator<Item = &str> {
    TOOL_USE
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
}

fn parse_block(block: &str) -> Result<ToolCall, Malformed> {
    let server = extract(&SERVER, block).ok_or(Malformed::MissingServer)?;
    let tool = extract(&TOOL, block).ok_or(Malformed::MissingTool)?;

    let arguments = match extract(&ARGUMENTS, block) {
        Some(raw) => parse_arguments(raw),
        None => Map::new(),
    };

    Ok(ToolCall {
        server: server.to_string(),
        tool: tool.to_string(),
        arguments,
        id: extract(&ID, block).map(str::to_string),
    })
}

/// Trimmed text of the first `<tag>` in `block`; `None` if absent or blank.
fn extract<'a>(pattern: &Regex, block: &'a str) -> Option<&'a str> {
    pattern
        .captures(block)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Arguments that are not a JSON object degrade to `{"raw": <text>}`.
fn parse_arguments(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert("raw".to_string(), Value::String(raw.to_string()));
            map
        }
    }
}
