// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Safety policy for `read-shell`: a fixed binary allow-list plus a narrow
//! subcommand allow-list for `git`. There is no sandbox; this allow-list,
//! together with the patch tool's textual envelope, is the whole safety
//! story.

/// Binaries `read-shell` may invoke directly.
pub const ALLOWED_BINARIES: &[&str] = &[
    "rg", "grep", "ls", "cat", "find", "head", "tail", "sed", "wc", "stat", "pwd",
];

/// `git` subcommands `read-shell` may invoke.
pub const ALLOWED_GIT_SUBCOMMANDS: &[&str] =
    &["status", "diff", "show", "log", "rev-parse", "ls-files"];

/// Split a command line into argv, respecting simple single/double quoting.
/// No glob expansion, no environment-variable interpolation.
pub fn tokenize(cmdline: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut has_token = false;

    for ch in cmdline.chars() {
        match ch {
            '\'' if !in_double => {
                in_single = !in_single;
                has_token = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                has_token = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Decide whether a tokenized command line is allowed to run under
/// `read-shell`.
pub fn is_allowed_read_shell(argv: &[String]) -> Result<(), String> {
    let Some(bin) = argv.first() else {
        return Err("empty command".to_string());
    };
    if bin.contains('/') {
        return Err(format!("binary path not allowed: {bin}"));
    }
    if bin == "git" {
        let sub = argv.get(1).map(String::as_str);
        match sub {
            Some(s) if s.starts_with('-') => {
                Err(format!("git: leading-dash flag not allowed: {s}"))
            }
            Some(s) if ALLOWED_GIT_SUBCOMMANDS.contains(&s) => Ok(()),
            Some(s) => Err(format!("git subcommand not allowed: {s}")),
            None => Err("git: missing subcommand".to_string()),
        }
    } else if ALLOWED_BINARIES.contains(&bin.as_str()) {
        Ok(())
    } else {
        Err(format!("binary not allowed: {bin}"))
    }
}
