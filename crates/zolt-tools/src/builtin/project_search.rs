// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `PROJECT_SEARCH` — ripgrep aggregated per file, ranked by hit count.

use serde::Deserialize;
use std::collections::HashMap;
use tokio::process::Command;

use crate::tool::ToolContext;

#[derive(Deserialize, Default)]
struct Payload {
    query: Option<String>,
    path: Option<String>,
    max_files: Option<usize>,
    max_matches: Option<usize>,
}

const DEFAULT_MAX_FILES: usize = 8;
const CAP_MAX_FILES: usize = 24;
const DEFAULT_MAX_MATCHES: usize = 300;
const CAP_MAX_MATCHES: usize = 5000;

fn parse_payload(raw: &str) -> Payload {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).unwrap_or_default()
    } else {
        Payload {
            query: Some(trimmed.to_string()),
            ..Default::default()
        }
    }
}

struct FileHits {
    hits: usize,
    first_line: u64,
    first_snippet: String,
}

pub async fn execute(payload: &str, ctx: &ToolContext) -> String {
    let p = parse_payload(payload);
    let Some(query) = p.query else {
        return "[project-search-result]\nerror: missing query".to_string();
    };
    let path = p.path.unwrap_or_else(|| ".".to_string());
    let max_files = p.max_files.unwrap_or(DEFAULT_MAX_FILES).min(CAP_MAX_FILES);
    let max_matches = p.max_matches.unwrap_or(DEFAULT_MAX_MATCHES).min(CAP_MAX_MATCHES);

    let output = Command::new("rg")
        .arg("--line-number")
        .arg("--column")
        .arg("--no-heading")
        .arg("--color=never")
        .arg(&query)
        .arg(&path)
        .current_dir(&ctx.cwd)
        .output()
        .await;

    let out = match output {
        Ok(out) if out.status.success() || out.status.code() == Some(1) => out,
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr).to_string();
            return format!("[project-search-result]\nerror: {stderr}");
        }
        Err(e) => return format!("[project-search-result]\nerror: failed to run rg: {e}"),
    };

    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let mut per_file: HashMap<String, FileHits> = HashMap::new();
    let mut total_matches = 0usize;

    'lines: for line in stdout.lines() {
        if total_matches >= max_matches {
            break 'lines;
        }
        // rg --no-heading format: path:line:col:text
        let mut parts = line.splitn(4, ':');
        let (Some(file), Some(lineno), Some(_col), Some(text)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let Ok(lineno) = lineno.parse::<u64>() else {
            continue;
        };
        total_matches += 1;
        per_file
            .entry(file.to_string())
            .and_modify(|f| f.hits += 1)
            .or_insert(FileHits {
                hits: 1,
                first_line: lineno,
                first_snippet: text.trim().to_string(),
            });
    }

    let mut files: Vec<(String, FileHits)> = per_file.into_iter().collect();
    files.sort_by(|a, b| {
        b.1.hits
            .cmp(&a.1.hits)
            .then(a.1.first_line.cmp(&b.1.first_line))
            .then(a.0.cmp(&b.0))
    });
    let total_files = files.len();
    let truncated = total_files > max_files || total_matches >= max_matches;
    files.truncate(max_files);

    let mut s = format!("[project-search-result]\nquery: {query}\npath: {path}\n");
    for (file, hits) in &files {
        s.push_str(&format!(
            "{file}\thits:{}\tfirst_line:{}\t{}\n",
            hits.hits, hits.first_line, hits.first_snippet
        ));
    }
    s.push_str(&format!("files: {} of {}", files.len(), total_files));
    if truncated {
        s.push_str("\nnote: output truncated by limit");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn ctx(dir: &std::path::Path) -> ToolContext {
        ToolContext::new(dir.to_path_buf(), Arc::new(Mutex::new(SessionManager::new())))
    }

    #[tokio::test]
    async fn aggregates_hits_per_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "needle\nneedle\nhay").unwrap();
        std::fs::write(tmp.path().join("b.txt"), "needle").unwrap();
        let out = execute("needle", &ctx(tmp.path())).await;
        assert!(out.contains("a.txt"));
        assert!(out.contains("hits:2"));
        assert!(out.contains("b.txt"));
        assert!(out.contains("hits:1"));
        let a_pos = out.find("a.txt").unwrap();
        let b_pos = out.find("b.txt").unwrap();
        assert!(a_pos < b_pos);
    }

    #[tokio::test]
    async fn no_matches_is_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("f.txt"), "nothing here").unwrap();
        let out = execute("zzzznomatch", &ctx(tmp.path())).await;
        assert!(!out.contains("error:"));
    }
}
