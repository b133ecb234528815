// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `READ` — a single allow-listed shell command, executed without a shell.

use tokio::process::Command;

use crate::policy::{is_allowed_read_shell, tokenize};
use crate::session::STREAM_CAP_BYTES;
use crate::tool::{truncate_bytes, ToolContext};

pub async fn execute(payload: &str, ctx: &ToolContext) -> String {
    let cmdline = payload.trim();
    if cmdline.is_empty() {
        return "[read-shell-result]\nerror: empty command".to_string();
    }
    let argv = tokenize(cmdline);
    if let Err(e) = is_allowed_read_shell(&argv) {
        return format!("[read-shell-result]\nerror: {e}");
    }

    let (bin, args) = (&argv[0], &argv[1..]);
    let output = Command::new(bin)
        .args(args)
        .current_dir(&ctx.cwd)
        .output()
        .await;

    match output {
        Ok(out) => {
            let stdout = String::from_utf8_lossy(&out.stdout).to_string();
            let stderr = String::from_utf8_lossy(&out.stderr).to_string();
            let combined_len = stdout.len() + stderr.len();
            let (stdout, stdout_trunc) = truncate_bytes(&stdout, STREAM_CAP_BYTES);
            let remaining = STREAM_CAP_BYTES.saturating_sub(stdout.len());
            let (stderr, stderr_trunc) = truncate_bytes(&stderr, remaining);
            let mut s = format!("[read-shell-result]\nstdout:\n{stdout}\nstderr:\n{stderr}");
            if (stdout_trunc || stderr_trunc) || combined_len > STREAM_CAP_BYTES {
                s.push_str("\nnote: output truncated by limit");
            }
            s
        }
        Err(e) => format!("[read-shell-result]\nerror: failed to execute: {e}"),
    }
}
