// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `LIST_DIR` — immediate or recursive directory listing.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::tool::ToolContext;

#[derive(Deserialize, Default)]
struct Payload {
    path: Option<String>,
    #[serde(default)]
    recursive: bool,
    max_entries: Option<usize>,
}

const DEFAULT_MAX_ENTRIES: usize = 200;
const CAP_MAX_ENTRIES: usize = 1000;

fn parse_payload(raw: &str) -> Payload {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).unwrap_or_default()
    } else {
        Payload {
            path: Some(trimmed.trim_matches('"').to_string()),
            recursive: false,
            max_entries: None,
        }
    }
}

fn entry_kind(path: &Path) -> &'static str {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if let Ok(meta) = fs::symlink_metadata(path) {
            let ft = meta.file_type();
            if ft.is_symlink() {
                return "link";
            } else if ft.is_dir() {
                return "dir";
            } else if ft.is_file() {
                return "file";
            } else if ft.is_fifo() {
                return "pipe";
            } else if ft.is_char_device() {
                return "char";
            } else if ft.is_block_device() {
                return "block";
            } else if ft.is_socket() {
                return "sock";
            }
            return "other";
        }
        "other"
    }
    #[cfg(not(unix))]
    {
        if path.is_dir() {
            "dir"
        } else if path.is_file() {
            "file"
        } else {
            "other"
        }
    }
}

pub async fn execute(payload: &str, ctx: &ToolContext) -> String {
    let p = parse_payload(payload);
    let path = ctx.resolve(p.path.as_deref().unwrap_or("."));
    let max_entries = p.max_entries.unwrap_or(DEFAULT_MAX_ENTRIES).min(CAP_MAX_ENTRIES);

    if !path.is_dir() {
        return format!("[list-dir-result]\nerror: not a directory: {}", path.display());
    }

    let mut entries: Vec<(String, &'static str)> = Vec::new();
    if p.recursive {
        for entry in walkdir::WalkDir::new(&path).into_iter().flatten() {
            if entry.path() == path {
                continue;
            }
            let rel = entry.path().strip_prefix(&path).unwrap_or(entry.path());
            entries.push((rel.display().to_string(), entry_kind(entry.path())));
        }
    } else {
        match fs::read_dir(&path) {
            Ok(rd) => {
                for entry in rd.flatten() {
                    let name = entry.file_name().to_string_lossy().to_string();
                    entries.push((name, entry_kind(&entry.path())));
                }
            }
            Err(e) => return format!("[list-dir-result]\nerror: {e}"),
        }
    }

    entries.sort_by(|a, b| a.0.to_ascii_lowercase().cmp(&b.0.to_ascii_lowercase()));
    let total = entries.len();
    let truncated = total > max_entries;
    entries.truncate(max_entries);

    let mut out = format!("[list-dir-result]\npath: {}\n", path.display());
    for (name, kind) in &entries {
        out.push_str(&format!("{kind}\t{name}\n"));
    }
    out.push_str(&format!("count: {}", entries.len()));
    if truncated {
        out.push_str(&format!(" (of {total})\nnote: output truncated by limit"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn ctx(dir: &Path) -> ToolContext {
        ToolContext::new(dir.to_path_buf(), Arc::new(Mutex::new(SessionManager::new())))
    }

    #[tokio::test]
    async fn lists_immediate_children_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.txt"), "").unwrap();
        fs::write(tmp.path().join("A.txt"), "").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        let out = execute(".", &ctx(tmp.path())).await;
        assert!(out.contains("A.txt"));
        assert!(out.contains("b.txt"));
        assert!(out.contains("dir\tsub"));
        let a_pos = out.find("A.txt").unwrap();
        let b_pos = out.find("b.txt").unwrap();
        assert!(a_pos < b_pos);
    }

    #[tokio::test]
    async fn non_recursive_excludes_nested_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/nested.txt"), "").unwrap();
        let out = execute(".", &ctx(tmp.path())).await;
        assert!(!out.contains("nested.txt"));
    }

    #[tokio::test]
    async fn recursive_includes_nested_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/nested.txt"), "").unwrap();
        let out = execute(r#"{"path":".","recursive":true}"#, &ctx(tmp.path())).await;
        assert!(out.contains("nested.txt"));
    }

    #[tokio::test]
    async fn missing_directory_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let out = execute("does-not-exist", &ctx(tmp.path())).await;
        assert!(out.contains("error:"));
    }
}
