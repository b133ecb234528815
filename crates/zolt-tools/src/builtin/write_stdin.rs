// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `WRITE_STDIN` — send input to a running session, then drain its output.

use serde::Deserialize;

use crate::tool::ToolContext;

#[derive(Deserialize, Default)]
struct Payload {
    session_id: Option<u64>,
    input: Option<String>,
    yield_ms: Option<u64>,
}

const DEFAULT_YIELD_MS: u64 = 1_000;
const MAX_YIELD_MS: u64 = 10_000;

fn parse_payload(raw: &str) -> Result<Payload, String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).map_err(|e| format!("invalid payload: {e}"))
    } else {
        Err("expected a JSON object with session_id and input".to_string())
    }
}

pub async fn execute(payload: &str, ctx: &ToolContext) -> String {
    let p = match parse_payload(payload) {
        Ok(p) => p,
        Err(e) => return format!("[write-stdin-result]\nerror: {e}"),
    };
    let Some(session_id) = p.session_id else {
        return "[write-stdin-result]\nerror: missing session_id".to_string();
    };
    let input = p.input.unwrap_or_default();
    let yield_ms = p.yield_ms.unwrap_or(DEFAULT_YIELD_MS).min(MAX_YIELD_MS);

    let mut sessions = ctx.sessions.lock().await;
    match sessions.write_stdin(session_id, &input, yield_ms).await {
        Ok(drain) => format!(
            "[write-stdin-result]\nsession_id: {session_id}\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
            drain.status, drain.stdout, drain.stderr
        ),
        Err(e) => format!("[write-stdin-result]\nerror: {e}"),
    }
}
