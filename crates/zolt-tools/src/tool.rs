// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::session::SessionManager;
use crate::skills::SkillScope;

/// Configuration needed by `view-image` to request an optional vision
/// caption. Absent when no OpenAI-compatible provider is configured.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_base: String,
    pub api_key: String,
    /// Candidate model ids tried in order until one succeeds.
    pub model_candidates: Vec<String>,
}

/// Shared, read-only-ish state every tool execution receives.
///
/// `sessions` is the one piece of genuinely shared mutable state (owned
/// collectively by the shell session manager, per the concurrency model) —
/// everything else is either immutable or freshly computed per call.
#[derive(Clone)]
pub struct ToolContext {
    pub cwd: PathBuf,
    pub sessions: Arc<Mutex<SessionManager>>,
    /// Scoped skill roots, project roots last so they win on name collision.
    pub skill_roots: Vec<(PathBuf, SkillScope)>,
    pub vision: Option<VisionConfig>,
}

impl ToolContext {
    pub fn new(cwd: PathBuf, sessions: Arc<Mutex<SessionManager>>) -> Self {
        Self {
            cwd,
            sessions,
            skill_roots: Vec::new(),
            vision: None,
        }
    }

    /// Resolve a tool-supplied path against `cwd` unless already absolute.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = PathBuf::from(path);
        if p.is_absolute() {
            p
        } else {
            self.cwd.join(p)
        }
    }
}

/// Truncate `s` to at most `cap` bytes on a char boundary, reporting whether
/// truncation occurred.
pub fn truncate_bytes(s: &str, cap: usize) -> (String, bool) {
    if s.len() <= cap {
        return (s.to_string(), false);
    }
    let mut end = cap;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    (s[..end].to_string(), true)
}

/// Truncate `s` to at most `cap` lines, reporting whether truncation occurred.
pub fn truncate_lines(s: &str, cap: usize) -> (String, bool) {
    let lines: Vec<&str> = s.lines().collect();
    if lines.len() <= cap {
        return (s.to_string(), false);
    }
    (lines[..cap].join("\n"), true)
}

/// Standard `[NAME-result]` header line for a tool's output envelope.
pub fn result_header(name: &str) -> String {
    format!("[{name}-result]")
}
