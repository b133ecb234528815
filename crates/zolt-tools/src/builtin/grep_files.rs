// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `GREP_FILES` — ripgrep over a path, one match per line.

use serde::Deserialize;
use tokio::process::Command;

use crate::tool::{truncate_bytes, truncate_lines, ToolContext};

#[derive(Deserialize, Default)]
struct Payload {
    query: Option<String>,
    path: Option<String>,
    #[serde(rename = "glob")]
    glob_pattern: Option<String>,
    max_matches: Option<usize>,
}

const DEFAULT_MAX_MATCHES: usize = 200;
const CAP_MAX_MATCHES: usize = 2000;
const MAX_BYTES: usize = 128 * 1024;

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

pub async fn execute(payload: &str, ctx: &ToolContext) -> String {
    let p = parse_payload(payload);
    let Some(query) = p.query else {
        return "[grep-files-result]\nerror: missing query".to_string();
    };
    let path = p.path.unwrap_or_else(|| ".".to_string());
    let max_matches = p.max_matches.unwrap_or(DEFAULT_MAX_MATCHES).min(CAP_MAX_MATCHES);

    let mut cmd = Command::new("rg");
    cmd.arg("--line-number")
        .arg("--column")
        .arg("--no-heading")
        .arg("--color=never");
    if let Some(glob) = &p.glob_pattern {
        cmd.arg("--glob").arg(glob);
    }
    cmd.arg(&query).arg(&path).current_dir(&ctx.cwd);

    let output = cmd.output().await;
    match output {
        Ok(out) if out.status.success() || out.status.code() == Some(1) => {
            let stdout = String::from_utf8_lossy(&out.stdout).to_string();
            let (stdout, byte_trunc) = truncate_bytes(&stdout, MAX_BYTES);
            let (stdout, line_trunc) = truncate_lines(&stdout, max_matches);
            let mut s = format!("[grep-files-result]\nquery: {query}\npath: {path}\n{stdout}");
            if byte_trunc || line_trunc {
                s.push_str("\nnote: output truncated by limit");
            }
            s
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr).to_string();
            format!("[grep-files-result]\nerror: {stderr}")
        }
        Err(e) => format!("[grep-files-result]\nerror: failed to run rg: {e}"),
    }
}
