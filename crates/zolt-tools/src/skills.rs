// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Skill discovery: named `SKILL.md` files used as reusable workflow
//! guidance, scanned lazily across scoped roots.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillScope {
    Project,
    Global,
}

#[derive(Debug, Clone)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
    pub base_dir: PathBuf,
    pub scope: SkillScope,
}

/// A kebab-case name: 1–64 chars, no leading/trailing hyphen, no `--`.
pub fn is_valid_skill_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
        return false;
    }
    name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Parse the `name`/`description` frontmatter of a SKILL.md file.
///
/// Accepts a simple `---\nkey: value\n---` YAML-ish block; anything else is
/// treated as having no frontmatter (file is still discoverable by its
/// directory basename if valid, with an empty description).
fn parse_frontmatter(content: &str) -> (Option<String>, String) {
    let mut lines = content.lines();
    if lines.next() != Some("---") {
        return (None, String::new());
    }
    let mut name = None;
    let mut description = String::new();
    for line in lines {
        if line.trim() == "---" {
            break;
        }
        if let Some(rest) = line.strip_prefix("name:") {
            name = Some(rest.trim().trim_matches('"').trim_matches('\'').to_string());
        } else if let Some(rest) = line.strip_prefix("description:") {
            description = rest.trim().trim_matches('"').trim_matches('\'').to_string();
        }
    }
    (name, description)
}

/// Scan one root directory for immediate subdirectories containing a
/// `SKILL.md` file. Does not recurse past the first level.
fn scan_root(root: &Path, scope: SkillScope, out: &mut Vec<SkillInfo>) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let skill_md = dir.join("SKILL.md");
        if !skill_md.is_file() {
            continue;
        }
        let basename = match dir.file_name().and_then(|n| n.to_str()) {
            Some(b) => b.to_string(),
            None => continue,
        };
        if !is_valid_skill_name(&basename) {
            continue;
        }
        let content = std::fs::read_to_string(&skill_md).unwrap_or_default();
        let (fm_name, description) = parse_frontmatter(&content);
        // Invariant: name must equal the containing directory's basename
        // (case-insensitive), regardless of what the frontmatter claims.
        if let Some(n) = &fm_name {
            if !n.eq_ignore_ascii_case(&basename) {
                continue;
            }
        }
        out.push(SkillInfo {
            name: basename,
            description,
            path: skill_md,
            base_dir: dir,
            scope,
        });
    }
}

/// Discover all skills across the given roots.
///
/// Roots should be ordered global-first, project-last: on a duplicate name,
/// the later entry replaces the earlier one, so project skills win.
pub fn discover_skills(roots: &[(PathBuf, SkillScope)]) -> Vec<SkillInfo> {
    let mut found: Vec<SkillInfo> = Vec::new();
    for (root, scope) in roots {
        scan_root(root, *scope, &mut found);
    }
    let mut by_name: std::collections::HashMap<String, SkillInfo> = std::collections::HashMap::new();
    for skill in found {
        by_name.insert(skill.name.to_ascii_lowercase(), skill);
    }
    let mut result: Vec<SkillInfo> = by_name.into_values().collect();
    result.sort_by(|a, b| a.name.to_ascii_lowercase().cmp(&b.name.to_ascii_lowercase()));
    result
}

/// Case-insensitive lookup by name within an already-discovered catalog.
pub fn find_skill<'a>(skills: &'a [SkillInfo], name: &str) -> Option<&'a SkillInfo> {
    skills.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}
