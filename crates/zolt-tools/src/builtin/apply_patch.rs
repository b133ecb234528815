// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `APPLY_PATCH` — a small, self-contained patch envelope (not a unified-diff
//! dialect): `*** Begin Patch` / `*** Add File: P` / `*** Delete File: P` /
//! `*** Update File: P` (optionally followed by `*** Move to: Q`) / `*** End Patch`.
//!
//! Parsing, validation, and filesystem application are separate phases: if
//! any file in the patch fails to apply, nothing is written (see scenario
//! on atomicity).

use std::path::PathBuf;

use crate::tool::{truncate_lines, ToolContext};

const MAX_PATCH_BYTES: usize = 256 * 1024;
const PREVIEW_LINE_CAP: usize = 120;

#[derive(Debug)]
enum FileOp {
    Add { path: String, content: String },
    Delete { path: String },
    Update {
        path: String,
        move_to: Option<String>,
        hunks: Vec<Hunk>,
    },
}

#[derive(Debug)]
struct Hunk {
    /// Context/removed lines to locate in the original file (without the
    /// leading ` `/`-` marker).
    find: Vec<String>,
    /// Replacement lines (context + added, without the leading ` `/`+` marker).
    replace: Vec<String>,
}

fn parse_patch(text: &str) -> Result<Vec<FileOp>, String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;

    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }
    if i >= lines.len() || lines[i].trim() != "*** Begin Patch" {
        return Err("missing '*** Begin Patch' header".to_string());
    }
    i += 1;

    let mut ops = Vec::new();

    while i < lines.len() {
        let line = lines[i];
        if line.trim() == "*** End Patch" {
            return Ok(ops);
        }
        if let Some(path) = line.strip_prefix("*** Add File: ") {
            i += 1;
            let mut content_lines = Vec::new();
            while i < lines.len() && !lines[i].starts_with("*** ") {
                let l = lines[i];
                content_lines.push(l.strip_prefix('+').unwrap_or(l).to_string());
                i += 1;
            }
            ops.push(FileOp::Add {
                path: path.trim().to_string(),
                content: content_lines.join("\n"),
            });
        } else if let Some(path) = line.strip_prefix("*** Delete File: ") {
            ops.push(FileOp::Delete {
                path: path.trim().to_string(),
            });
            i += 1;
        } else if let Some(path) = line.strip_prefix("*** Update File: ") {
            let path = path.trim().to_string();
            i += 1;
            let mut move_to = None;
            if i < lines.len() {
                if let Some(dest) = lines[i].strip_prefix("*** Move to: ") {
                    move_to = Some(dest.trim().to_string());
                    i += 1;
                }
            }
            let mut hunks = Vec::new();
            while i < lines.len() && lines[i].trim_start().starts_with("@@") {
                i += 1;
                let mut find = Vec::new();
                let mut replace = Vec::new();
                while i < lines.len()
                    && !lines[i].trim_start().starts_with("@@")
                    && !lines[i].starts_with("*** ")
                {
                    let l = lines[i];
                    if let Some(rest) = l.strip_prefix('-') {
                        find.push(rest.to_string());
                    } else if let Some(rest) = l.strip_prefix('+') {
                        replace.push(rest.to_string());
                    } else if let Some(rest) = l.strip_prefix(' ') {
                        find.push(rest.to_string());
                        replace.push(rest.to_string());
                    } else if l.is_empty() {
                        find.push(String::new());
                        replace.push(String::new());
                    }
                    i += 1;
                }
                hunks.push(Hunk { find, replace });
            }
            ops.push(FileOp::Update {
                path,
                move_to,
                hunks,
            });
        } else {
            return Err(format!("unrecognized directive: {line}"));
        }
    }

    Err("missing '*** End Patch' trailer".to_string())
}

/// Locate `hunk.find` as a contiguous subsequence of `lines` and splice in
/// `hunk.replace`. Returns an error naming `path` if the context cannot be
/// found uniquely.
fn apply_hunk(lines: &[String], hunk: &Hunk, path: &str) -> Result<Vec<String>, String> {
    if hunk.find.is_empty() {
        return Ok(lines.to_vec());
    }
    let mut matches = Vec::new();
    if hunk.find.len() <= lines.len() {
        for start in 0..=(lines.len() - hunk.find.len()) {
            if lines[start..start + hunk.find.len()] == hunk.find[..] {
                matches.push(start);
            }
        }
    }
    match matches.len() {
        0 => Err(format!("hunk match failed in {path}")),
        1 => {
            let start = matches[0];
            let mut out = lines[..start].to_vec();
            out.extend(hunk.replace.iter().cloned());
            out.extend(lines[start + hunk.find.len()..].iter().cloned());
            Ok(out)
        }
        _ => Err(format!("hunk context matches more than once in {path}; patch is ambiguous")),
    }
}

struct PlannedWrite {
    target: PathBuf,
    content: Option<String>,
    remove_source: Option<PathBuf>,
    delete: bool,
}

fn plan(ops: &[FileOp], ctx: &ToolContext) -> Result<Vec<PlannedWrite>, String> {
    let mut plans = Vec::new();
    for op in ops {
        match op {
            FileOp::Add { path, content } => {
                let target = ctx.resolve(path);
                if target.exists() {
                    return Err(format!("cannot add, file already exists: {path}"));
                }
                plans.push(PlannedWrite {
                    target,
                    content: Some(content.clone()),
                    remove_source: None,
                    delete: false,
                });
            }
            FileOp::Delete { path } => {
                let target = ctx.resolve(path);
                if !target.is_file() {
                    return Err(format!("cannot delete, file not found: {path}"));
                }
                plans.push(PlannedWrite {
                    target,
                    content: None,
                    remove_source: None,
                    delete: true,
                });
            }
            FileOp::Update {
                path,
                move_to,
                hunks,
            } => {
                let source = ctx.resolve(path);
                let original = std::fs::read_to_string(&source)
                    .map_err(|e| format!("cannot update, failed to read {path}: {e}"))?;
                let mut lines: Vec<String> = original.lines().map(str::to_string).collect();
                for hunk in hunks {
                    lines = apply_hunk(&lines, hunk, path)?;
                }
                let new_content = lines.join("\n");
                let target = match move_to {
                    Some(dest) => ctx.resolve(dest),
                    None => source.clone(),
                };
                plans.push(PlannedWrite {
                    target,
                    content: Some(new_content),
                    remove_source: move_to.as_ref().map(|_| source),
                    delete: false,
                });
            }
        }
    }
    Ok(plans)
}

/// Renders the patch's `diff_preview` body, capped at `PREVIEW_LINE_CAP`
/// lines, alongside the counts of lines kept vs. dropped by that cap.
fn diff_preview(text: &str) -> (String, usize, usize) {
    let relevant: Vec<&str> = text
        .lines()
        .filter(|l| {
            l.starts_with("*** ") || l.starts_with("@@") || l.starts_with('+') || l.starts_with('-')
        })
        .collect();
    let total = relevant.len();
    let joined = relevant.join("\n");
    let (joined, truncated) = truncate_lines(&joined, PREVIEW_LINE_CAP);
    let included = if truncated { PREVIEW_LINE_CAP } else { total };
    (joined, included, total - included)
}

pub async fn execute(payload: &str, ctx: &ToolContext) -> String {
    if payload.len() > MAX_PATCH_BYTES {
        return "[apply-patch-result]\nstatus: rejected\nerror: patch exceeds size limit".to_string();
    }

    let (preview, included, omitted) = diff_preview(payload);

    let ops = match parse_patch(payload) {
        Ok(ops) => ops,
        Err(e) => {
            return format!(
                "[apply-patch-result]\nstatus: rejected\nerror: {e}\ndiff_preview:\n{preview}"
            )
        }
    };
    if ops.is_empty() {
        return format!(
            "[apply-patch-result]\nstatus: rejected\nerror: patch contains no file operations\ndiff_preview:\n{preview}"
        );
    }

    let plans = match plan(&ops, ctx) {
        Ok(p) => p,
        Err(e) => {
            return format!(
                "[apply-patch-result]\nstatus: rejected\nerror: {e}\ndiff_preview:\n{preview}"
            )
        }
    };

    // All hunks matched and all preconditions held; now apply atomically.
    for p in &plans {
        if let Some(parent) = p.target.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return format!(
                    "[apply-patch-result]\nstatus: rejected\nerror: failed to create directories: {e}\ndiff_preview:\n{preview}"
                );
            }
        }
        if p.delete {
            if let Err(e) = std::fs::remove_file(&p.target) {
                return format!(
                    "[apply-patch-result]\nstatus: rejected\nerror: failed to delete {}: {e}\ndiff_preview:\n{preview}",
                    p.target.display()
                );
            }
            continue;
        }
        if let Some(content) = &p.content {
            if let Err(e) = std::fs::write(&p.target, content) {
                return format!(
                    "[apply-patch-result]\nstatus: rejected\nerror: failed to write {}: {e}\ndiff_preview:\n{preview}",
                    p.target.display()
                );
            }
        }
        if let Some(src) = &p.remove_source {
            if src != &p.target {
                let _ = std::fs::remove_file(src);
            }
        }
    }

    format!(
        "[apply-patch-result]\nstatus: applied\nincluded: {included} omitted: {omitted}\ndiff_preview:\n{preview}"
    )
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
    async fn adds_new_file() {
        let tmp = tempfile::tempdir().unwrap();
        let patch = "*** Begin Patch\n*** Add File: new.txt\n+hello\n+world\n*** End Patch";
        let out = execute(patch, &ctx(tmp.path())).await;
        assert!(out.contains("status: applied"));
        assert_eq!(std::fs::read_to_string(tmp.path().join("new.txt")).unwrap(), "hello\nworld");
    }

    #[tokio::test]
    async fn deletes_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("gone.txt"), "bye").unwrap();
        let patch = "*** Begin Patch\n*** Delete File: gone.txt\n*** End Patch";
        let out = execute(patch, &ctx(tmp.path())).await;
        assert!(out.contains("status: applied"));
        assert!(!tmp.path().join("gone.txt").exists());
    }

    #[tokio::test]
    async fn updates_file_via_hunk() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "one\ntwo\nthree").unwrap();
        let patch = "*** Begin Patch\n*** Update File: a.txt\n@@\n one\n-two\n+TWO\n three\n*** End Patch";
        let out = execute(patch, &ctx(tmp.path())).await;
        assert!(out.contains("status: applied"), "{out}");
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("a.txt")).unwrap(),
            "one\nTWO\nthree"
        );
    }

    #[tokio::test]
    async fn update_with_move_renames_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("old.txt"), "x").unwrap();
        let patch = "*** Begin Patch\n*** Update File: old.txt\n*** Move to: new.txt\n@@\n-x\n+y\n*** End Patch";
        let out = execute(patch, &ctx(tmp.path())).await;
        assert!(out.contains("status: applied"), "{out}");
        assert!(!tmp.path().join("old.txt").exists());
        assert_eq!(std::fs::read_to_string(tmp.path().join("new.txt")).unwrap(), "y");
    }

    #[tokio::test]
    async fn atomic_on_failed_hunk_no_files_written() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "one\ntwo").unwrap();
        let patch = "*** Begin Patch\n*** Add File: new.txt\n+hi\n*** Update File: a.txt\n@@\n-nomatch\n+x\n*** End Patch";
        let out = execute(patch, &ctx(tmp.path())).await;
        assert!(out.contains("status: rejected"), "{out}");
        assert!(!tmp.path().join("new.txt").exists());
        assert_eq!(std::fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "one\ntwo");
    }

    #[tokio::test]
    async fn missing_begin_header_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let out = execute("*** Add File: x\n+y", &ctx(tmp.path())).await;
        assert!(out.contains("status: rejected"));
    }
}
