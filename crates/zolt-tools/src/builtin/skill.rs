// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `SKILL` — load the body of a named skill by scanning the scoped roots
//! set up on the [`ToolContext`].

use serde::Deserialize;

use crate::skills::{discover_skills, find_skill};
use crate::tool::ToolContext;

#[derive(Deserialize, Default)]
struct Payload {
    name: Option<String>,
}

fn parse_payload(raw: &str) -> Payload {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).unwrap_or_default()
    } else {
        Payload {
            name: Some(trimmed.trim_matches('"').to_string()),
        }
    }
}

pub async fn execute(payload: &str, ctx: &ToolContext) -> String {
    let p = parse_payload(payload);
    let Some(name) = p.name.filter(|n| !n.is_empty()) else {
        return "[skill-result]\nerror: missing name".to_string();
    };

    let skills = discover_skills(&ctx.skill_roots);
    let Some(skill) = find_skill(&skills, &name) else {
        return format!("[skill-result]\nerror: unknown skill: {name}");
    };

    match std::fs::read_to_string(&skill.path) {
        Ok(content) => format!(
            "[skill-result]\nname: {}\nbase_dir: {}\n{}",
            skill.name,
            skill.base_dir.display(),
            content
        ),
        Err(e) => format!("[skill-result]\nerror: failed to read {}: {e}", skill.path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;
    use crate::skills::SkillScope;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn write_skill(dir: &std::path::Path, name: &str) {
        let d = dir.join(name);
        std::fs::create_dir_all(&d).unwrap();
        std::fs::write(
            d.join("SKILL.md"),
            format!("---\nname: {name}\ndescription: test skill\n---\nDo the thing."),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn loads_skill_body() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "deploy");
        let mut ctx = ToolContext::new(tmp.path().to_path_buf(), Arc::new(Mutex::new(SessionManager::new())));
        ctx.skill_roots = vec![(tmp.path().to_path_buf(), SkillScope::Project)];
        let out = execute("deploy", &ctx).await;
        assert!(out.contains("Do the thing."));
    }

    #[tokio::test]
    async fn unknown_skill_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(tmp.path().to_path_buf(), Arc::new(Mutex::new(SessionManager::new())));
        let out = execute("nope", &ctx).await;
        assert!(out.contains("error: unknown skill"));
    }
}
