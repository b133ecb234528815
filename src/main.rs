// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use zolt_core::{Agent, AgentEvent, AppState};

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

fn main() -> anyhow::Result<()> {
    // `help`/`version` as bare words, alongside clap's own
    // `-h/--help` and `-V/--version` flags.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(word) = args.get(1) {
        match word.as_str() {
            "help" => args[1] = "--help".to_string(),
            "version" => args[1] = "--version".to_string(),
            _ => {}
        }
    }
    let cli = Cli::parse_from(args);

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    let is_run_mode = matches!(cli.command, Some(Commands::Run { .. }));
    init_logging(cli.verbose, !is_run_mode);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = zolt_config::load(cli.config.as_deref())?;
    let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let state_path = zolt_core::default_state_path();

    let mut state = AppState::load_or_create(&state_path, now_ms(), &config.model.provider, &config.model.name)
        .map_err(|e| anyhow::anyhow!("loading {}: {e}", state_path.display()))?;

    if let Some(id) = &cli.session {
        if !state.select(id) {
            eprintln!("no such conversation: {id}");
            std::process::exit(1);
        }
    }

    let agent = Agent::new(config, state_path, project_root)?;

    match cli.command {
        Some(Commands::Run { prompt }) => run_once(&agent, &mut state, &Cli::run_prompt(&prompt)).await,
        Some(Commands::Completions { .. }) => unreachable!("handled in main() before config/agent setup"),
        None => run_interactive(&agent, &mut state).await,
    }
}

/// `zolt run "<prompt>…"`: a single non-interactive turn. Prints
/// the final assistant text to stdout with a trailing newline; errors and
/// local/provider failures go to stderr with the matching exit code.
async fn run_once(agent: &Agent, state: &mut AppState, prompt: &str) -> anyhow::Result<()> {
    if prompt.trim().is_empty() {
        eprintln!("usage: zolt run \"<prompt>\"");
        std::process::exit(1);
    }

    let mut on_event = |_: AgentEvent| {};
    let mut should_interrupt = || false;

    let result = agent.run_turn(state, prompt, &mut on_event, &mut should_interrupt).await;

    match result {
        Ok(text) => {
            if text.starts_with("[local] Missing credentials") {
                eprintln!("{text}");
                std::process::exit(1);
            }
            if text.starts_with("[local] Request failed") {
                eprintln!("{text}");
                std::process::exit(2);
            }
            println!("{text}");
            Ok(())
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// `zolt` with no subcommand: a line-oriented interactive loop. Each prompt
/// is read in cooked mode; while a turn streams, stdin is switched to raw
/// mode so a double-Esc can interrupt generation without
/// waiting for Enter.
async fn run_interactive(agent: &Agent, state: &mut AppState) -> anyhow::Result<()> {
    println!("zolt — interactive terminal coding assistant. Ctrl-D to quit.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        let mut interrupt = zolt_core::InterruptController::new();
        let _raw = raw_mode::RawModeGuard::enable();

        let mut printed_hint = false;
        let mut on_event = |event: AgentEvent| {
            if let AgentEvent::Token(text) = event {
                print!("{text}");
                std::io::stdout().flush().ok();
            }
        };
        let mut should_interrupt = || match zolt_core::poll_stdin_nonblocking() {
            Ok(bytes) if !bytes.is_empty() => match interrupt.observe_bytes(&bytes) {
                zolt_core::PollOutcome::StreamInterrupted => true,
                zolt_core::PollOutcome::HintFirstEsc => {
                    if !printed_hint {
                        printed_hint = true;
                        eprint!("\n(press Esc again to stop) ");
                    }
                    false
                }
                zolt_core::PollOutcome::Continue => false,
            },
            _ => false,
        };

        let result = agent.run_turn(state, prompt, &mut on_event, &mut should_interrupt).await;
        drop(_raw);
        println!();

        if let Err(e) = result {
            eprintln!("error: {e}");
        }
    }
    Ok(())
}

fn init_logging(verbose: u8, is_interactive: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Writing to stderr during interactive mode would interleave with the
    // prompt; only log there when explicitly verbose, or always to a file
    // if ZOLT_LOG_FILE is set.
    if let Ok(path) = std::env::var("ZOLT_LOG_FILE") {
        if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::sync::Mutex::new(file)).with_ansi(false))
                .try_init();
            return;
        }
    }
    if !is_interactive || verbose > 0 {
        let _ = tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(std::io::stderr)).try_init();
    }
}

#[cfg(unix)]
mod raw_mode {
    /// Toggles the terminal into raw (non-canonical, non-echo) mode for the
    /// duration of a stream so single ESC bytes arrive immediately instead
    /// of waiting for Enter; restores the previous mode on drop.
    pub struct RawModeGuard {
        original: Option<libc::termios>,
    }

    impl RawModeGuard {
        pub fn enable() -> Self {
            unsafe {
                let fd = 0;
                if libc::isatty(fd) == 0 {
                    return Self { original: None };
                }
                let mut term: libc::termios = std::mem::zeroed();
                if libc::tcgetattr(fd, &mut term) != 0 {
                    return Self { original: None };
                }
                let original = term;
                term.c_lflag &= !(libc::ICANON | libc::ECHO);
                term.c_cc[libc::VMIN] = 0;
                term.c_cc[libc::VTIME] = 0;
                libc::tcsetattr(fd, libc::TCSANOW, &term);
                Self { original: Some(original) }
            }
        }
    }

    impl Drop for RawModeGuard {
        fn drop(&mut self) {
            if let Some(term) = &self.original {
                unsafe {
                    libc::tcsetattr(0, libc::TCSANOW, term);
                }
            }
        }
    }
}

#[cfg(not(unix))]
mod raw_mode {
    pub struct RawModeGuard;
    impl RawModeGuard {
        pub fn enable() -> Self {
            Self
        }
    }
}
