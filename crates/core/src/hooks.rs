//! Hook text parsing.
//!
//! The user pastes (or loads from a file) a block of text; each non-empty
//! line becomes one hook, and each hook becomes one output video.

use serde::{Deserialize, Serialize};

/// Placeholder shown in the empty hook editor. Never treated as a hook.
pub const HOOK_PLACEHOLDER: &str = "Enter your hook here or load from a text file..";

/// One trimmed, non-empty line of overlay text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookLine(String);

impl HookLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HookLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split raw hook text into ordered hook lines.
///
/// Lines are trimmed; empty lines and the editor placeholder are dropped.
/// Order is preserved because it defines the job index.
pub fn parse_hook_lines(text: &str) -> Vec<HookLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != HOOK_PLACEHOLDER)
        .map(|line| HookLine(line.to_string()))
        .collect()
}

/// True when the raw text is empty, whitespace, or just the placeholder.
pub fn is_blank_hook_text(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed == HOOK_PLACEHOLDER
}
