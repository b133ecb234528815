// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = "zolt",
    about = "An interactive terminal AI coding assistant",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Select a specific conversation by id. Applies to both interactive
    /// and `run` mode.
    #[arg(long, short = 's', value_name = "ID")]
    pub session: Option<String>,

    /// Path to config file (overrides auto-discovery).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace). Written to
    /// `ZOLT_LOG_FILE` if set, otherwise suppressed in interactive mode to
    /// avoid corrupting the terminal.
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one prompt non-interactively and print the final answer to
    /// stdout.
    Run {
        /// The prompt text.
        #[arg(value_name = "PROMPT", trailing_var_arg = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Print a shell completion script to stdout.
    Completions {
        shell: Shell,
    },
}

impl Cli {
    /// Joins a `run` subcommand's (possibly multi-token) prompt back into a
    /// single string, the way a shell would have before quoting.
    pub fn run_prompt(words: &[String]) -> String {
        words.join(" ")
    }
}
