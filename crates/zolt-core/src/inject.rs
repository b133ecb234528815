// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Context Injector (C5): `@path`/`$skill` scanning in the user prompt,
//! skill catalog discovery, and the `AGENTS.md` workspace-context lookup
//! consulted on the first turn of a conversation.

use std::path::{Path, PathBuf};

use zolt_tools::{SkillInfo, SkillScope};

pub const AGENTS_CONTEXT_HEADER: &str = "[agents-context]";
pub const SKILLS_CONTEXT_HEADER: &str = "[skills-context]";
pub const FILE_INJECT_HEADER: &str = "[file-inject]";
pub const SKILL_INJECT_HEADER: &str = "[skill-inject]";

const MAX_FILES_PER_PROMPT: usize = 8;
const MAX_FILE_BYTES: usize = 64 * 1024;
const MAX_SKILL_BYTES: usize = 256 * 1024;

/// Walk up from `start` looking for an `AGENTS.md` file. Returns the path and
/// its contents (as a single system message body, header-first).
pub fn find_agents_md(start: &Path) -> Option<(PathBuf, String)> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join("AGENTS.md");
        if candidate.is_file() {
            let contents = std::fs::read_to_string(&candidate).ok()?;
            return Some((candidate, contents));
        }
        dir = d.parent();
    }
    None
}

/// Build the `[agents-context]` system message injected once, at the start
/// of an empty conversation, when an `AGENTS.md` is found walking up from
/// `project_root`.
pub fn agents_context_message(project_root: &Path) -> Option<String> {
    let (path, contents) = find_agents_md(project_root)?;
    Some(format!(
        "{AGENTS_CONTEXT_HEADER} workspace context from {}\n{contents}",
        path.display()
    ))
}

/// Build the `[skills-context]` system message: a one-line summary followed
/// by a short catalog of discovered skills (name + description).
///
/// Returns `None` when no skills were discovered — nothing is injected.
pub fn skills_context_message(skills: &[SkillInfo]) -> Option<String> {
    if skills.is_empty() {
        return None;
    }
    let mut out = format!("{SKILLS_CONTEXT_HEADER} {} skill(s) available\n", skills.len());
    for s in skills {
        out.push_str(&format!("- {}: {}\n", s.name, s.description));
    }
    Some(out)
}

/// One `@path` or `$skill` token found in a prompt, in first-occurrence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptToken {
    Path(String),
    Skill(String),
}

/// Scan `prompt` for `@path` (optionally quoted with `@"..."` / `@'...'`) and
/// `$skill-name` tokens, returning unique tokens in first-occurrence order.
pub fn scan_prompt_tokens(prompt: &str) -> Vec<PromptToken> {
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let chars: Vec<char> = prompt.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '@' if i + 1 < chars.len() && (chars[i + 1] == '"' || chars[i + 1] == '\'') => {
                let quote = chars[i + 1];
                let start = i + 2;
                if let Some(end) = chars[start..].iter().position(|&c| c == quote) {
                    let path: String = chars[start..start + end].iter().collect();
                    if seen.insert(format!("@{path}")) {
                        out.push(PromptToken::Path(path));
                    }
                    i = start + end + 1;
                    continue;
                }
                i += 1;
            }
            '@' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && !chars[end].is_whitespace() {
                    end += 1;
                }
                if end > start {
                    let path: String = chars[start..end].iter().collect();
                    if seen.insert(format!("@{path}")) {
                        out.push(PromptToken::Path(path));
                    }
                }
                i = end;
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len()
                    && (chars[end].is_ascii_alphanumeric() || chars[end] == '-' || chars[end] == '_')
                {
                    end += 1;
                }
                if end > start {
                    let name: String = chars[start..end].iter().collect();
                    if seen.insert(format!("${name}")) {
                        out.push(PromptToken::Skill(name));
                    }
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    out
}

/// Binary if the first 1024 bytes contain a NUL or more than 10% control bytes.
fn looks_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(1024)];
    if sample.contains(&0) {
        return true;
    }
    if sample.is_empty() {
        return false;
    }
    let control = sample
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();
    (control as f64) / (sample.len() as f64) > 0.10
}

/// One resolved `@path` reference: either a file body, an image metadata
/// stub, or a skip reason.
enum ResolvedPath {
    File { path: String, body: String },
    Image { path: String },
    Skipped,
}

fn resolve_path(cwd: &Path, raw: &str) -> ResolvedPath {
    let p = PathBuf::from(raw);
    let resolved = if p.is_absolute() { p } else { cwd.join(&p) };

    if zolt_image::inspect(&resolved, false).is_ok() {
        return ResolvedPath::Image { path: resolved.display().to_string() };
    }

    let Ok(bytes) = std::fs::read(&resolved) else {
        return ResolvedPath::Skipped;
    };
    if looks_binary(&bytes) {
        return ResolvedPath::Skipped;
    }
    let truncated = bytes.len() > MAX_FILE_BYTES;
    let mut end = MAX_FILE_BYTES.min(bytes.len());
    while end < bytes.len() && end > 0 && (bytes[end] & 0xC0) == 0x80 {
        end -= 1;
    }
    let mut body = String::from_utf8_lossy(&bytes[..end]).to_string();
    if truncated {
        body.push_str("\n…(truncated)");
    }
    ResolvedPath::File { path: resolved.display().to_string(), body }
}

/// Result of running per-prompt enrichment over one prompt.
pub struct Enrichment {
    /// `[file-inject]`-headed system message, if any `@path` resolved.
    pub file_message: Option<String>,
    /// `[skill-inject]`-headed system message, if any `$skill` resolved.
    pub skill_message: Option<String>,
}

/// Scan `prompt` for `@path`/`$skill` tokens and build the enrichment
/// messages injected ahead of the user's turn.
pub fn enrich_prompt(prompt: &str, cwd: &Path, skills: &[SkillInfo]) -> Enrichment {
    let tokens = scan_prompt_tokens(prompt);

    let mut included_files = Vec::new();
    let mut referenced = 0usize;
    let mut skipped = 0usize;
    let mut image_entries = Vec::new();
    let mut file_entries = Vec::new();

    for tok in &tokens {
        let PromptToken::Path(raw) = tok else { continue };
        referenced += 1;
        if included_files.len() >= MAX_FILES_PER_PROMPT {
            skipped += 1;
            continue;
        }
        match resolve_path(cwd, raw) {
            ResolvedPath::Image { path } => {
                image_entries.push(format!(r#"<image path="{path}" />"#));
                included_files.push(raw.clone());
            }
            ResolvedPath::File { path, body } => {
                file_entries.push(format!(r#"<file path="{path}">{body}</file>"#));
                included_files.push(raw.clone());
            }
            ResolvedPath::Skipped => skipped += 1,
        }
    }

    let file_message = if included_files.is_empty() {
        None
    } else {
        let mut header = format!(
            "{FILE_INJECT_HEADER} included:{} referenced:{} skipped:{}\n",
            included_files.len(),
            referenced,
            skipped
        );
        header.push_str(&read_summary_line(&included_files));
        header.push('\n');
        for e in image_entries {
            header.push_str(&e);
            header.push('\n');
        }
        for e in file_entries {
            header.push_str(&e);
            header.push('\n');
        }
        Some(header)
    };

    let mut skill_included = Vec::new();
    let mut skill_bodies = Vec::new();
    let mut skill_referenced = 0usize;
    let mut skill_skipped = 0usize;
    for tok in &tokens {
        let PromptToken::Skill(name) = tok else { continue };
        skill_referenced += 1;
        match zolt_tools::find_skill(skills, name) {
            Some(info) => {
                let body = std::fs::read_to_string(&info.path).unwrap_or_default();
                let (body, _) = truncate_bytes(&body, MAX_SKILL_BYTES);
                skill_bodies.push(format!("--- {} ---\n{body}", info.name));
                skill_included.push(info.name.clone());
            }
            None => skill_skipped += 1,
        }
    }

    let skill_message = if skill_included.is_empty() {
        None
    } else {
        let mut header = format!(
            "{SKILL_INJECT_HEADER} included:{} referenced:{} skipped:{}\n",
            skill_included.len(),
            skill_referenced,
            skill_skipped
        );
        header.push_str(&read_summary_line(&skill_included));
        header.push('\n');
        header.push_str(&skill_bodies.join("\n"));
        Some(header)
    };

    Enrichment { file_message, skill_message }
}

fn truncate_bytes(s: &str, cap: usize) -> (String, bool) {
    if s.len() <= cap {
        return (s.to_string(), false);
    }
    let mut end = cap;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    (s[..end].to_string(), true)
}

/// `read: a, b, c (+N more)` summary line.
fn read_summary_line(names: &[String]) -> String {
    const SHOWN: usize = 3;
    if names.len() <= SHOWN {
        format!("read: {}", names.join(", "))
    } else {
        let head = &names[..SHOWN];
        format!("read: {} (+{} more)", head.join(", "), names.len() - SHOWN)
    }
}

/// Discover scoped skill roots: global (`~/.config/zolt/skills`) then
/// project (`<project_root>/.zolt/skills`), so project wins on collision.
pub fn default_skill_roots(project_root: Option<&Path>) -> Vec<(PathBuf, SkillScope)> {
    let mut roots = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        roots.push((config_dir.join("zolt").join("skills"), SkillScope::Global));
    }
    if let Some(root) = project_root {
        roots.push((root.join(".zolt").join("skills"), SkillScope::Project));
    }
    roots
}
