// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `EXEC_COMMAND` — spawn a long-lived shell session and return its id plus
//! whatever it produced within the initial drain window.

use serde::Deserialize;

use crate::tool::ToolContext;

#[derive(Deserialize, Default)]
struct Payload {
    command: Option<String>,
    yield_ms: Option<u64>,
}

const DEFAULT_YIELD_MS: u64 = 1_000;
const MAX_YIELD_MS: u64 = 10_000;

fn parse_payload(raw: &str) -> Payload {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).unwrap_or_default()
    } else {
        Payload {
            command: Some(trimmed.to_string()),
            yield_ms: None,
        }
    }
}

pub async fn execute(payload: &str, ctx: &ToolContext) -> String {
    let p = parse_payload(payload);
    let Some(command) = p.command.filter(|c| !c.trim().is_empty()) else {
        return "[exec-command-result]\nerror: missing command".to_string();
    };
    let yield_ms = p.yield_ms.unwrap_or(DEFAULT_YIELD_MS).min(MAX_YIELD_MS);

    let mut sessions = ctx.sessions.lock().await;
    match sessions.spawn(&command, yield_ms).await {
        Ok((id, drain)) => format!(
            "[exec-command-result]\nsession_id: {id}\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
            drain.status, drain.stdout, drain.stderr
        ),
        Err(e) => format!("[exec-command-result]\nerror: failed to spawn: {e}"),
    }
}
