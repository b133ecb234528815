// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `READ_FILE` — return a byte-capped slice of a text file.

use serde::Deserialize;

use crate::tool::ToolContext;

#[derive(Deserialize, Default)]
struct Payload {
    path: Option<String>,
    max_bytes: Option<usize>,
}

const DEFAULT_MAX_BYTES: usize = 12_288;
const CAP_MAX_BYTES: usize = 262_144;

fn parse_payload(raw: &str) -> Payload {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).unwrap_or_default()
    } else {
        Payload {
            path: Some(trimmed.trim_matches('"').to_string()),
            max_bytes: None,
        }
    }
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

pub async fn execute(payload: &str, ctx: &ToolContext) -> String {
    let p = parse_payload(payload);
    let Some(path) = p.path else {
        return "[read-file-result]\nerror: missing path".to_string();
    };
    let max_bytes = p.max_bytes.unwrap_or(DEFAULT_MAX_BYTES).min(CAP_MAX_BYTES);
    let resolved = ctx.resolve(&path);

    let bytes = match std::fs::read(&resolved) {
        Ok(b) => b,
        Err(e) => return format!("[read-file-result]\nerror: {e}"),
    };

    if looks_binary(&bytes) {
        return "[read-file-result]\nerror: binary file".to_string();
    }

    let total = bytes.len();
    let truncated = total > max_bytes;
    let mut end = max_bytes.min(total);
    while end > 0 && !is_char_boundary(&bytes, end) {
        end -= 1;
    }
    let text = String::from_utf8_lossy(&bytes[..end]).to_string();

    let mut out = format!(
        "[read-file-result]\npath: {}\nbytes: 0-{} of {}\n{}",
        resolved.display(),
        end,
        total,
        text
    );
    if truncated {
        out.push_str("\nnote: output truncated by limit");
    }
    out
}

fn is_char_boundary(bytes: &[u8], idx: usize) -> bool {
    idx == bytes.len() || (bytes[idx] & 0xC0) != 0x80
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
    async fn reads_small_text_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("f.txt"), "hello world").unwrap();
        let out = execute("f.txt", &ctx(tmp.path())).await;
        assert!(out.contains("hello world"));
        assert!(out.contains("bytes: 0-11 of 11"));
    }

    #[tokio::test]
    async fn rejects_binary_content() {
        let tmp = tempfile::tempdir().unwrap();
        let mut bytes = vec![0u8; 50];
        bytes[0] = b'a';
        std::fs::write(tmp.path().join("f.bin"), &bytes).unwrap();
        let out = execute("f.bin", &ctx(tmp.path())).await;
        assert!(out.contains("error: binary file"));
    }

    #[tokio::test]
    async fn truncates_at_max_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("f.txt"), "x".repeat(100)).unwrap();
        let out = execute(r#"{"path":"f.txt","max_bytes":10}"#, &ctx(tmp.path())).await;
        assert!(out.contains("note: output truncated by limit"));
        assert!(out.contains("bytes: 0-10 of 100"));
    }

    #[tokio::test]
    async fn missing_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let out = execute("nope.txt", &ctx(tmp.path())).await;
        assert!(out.contains("error:"));
    }
}
