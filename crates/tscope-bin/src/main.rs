//! Triescope entrypoint: batch scans or an interactive REPL over one
//! observable Aho–Corasick automaton.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use clap::Parser;
use core_automaton::AcTrie;
use core_input::{Command, Controller, HELP_TEXT, Outcome, ParseError, parse_line};
use core_render::Renderer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "triescope", version, about = "Observable Aho-Corasick substring search")]
struct Args {
    /// Pattern to insert before any scan; repeatable.
    #[arg(short = 'p', long = "pattern")]
    patterns: Vec<String>,
    /// Text to scan in batch mode. Without it the REPL starts.
    #[arg(short = 't', long = "text")]
    text: Option<String>,
    /// Optional configuration file path (overrides discovery of `triescope.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Disable ANSI styling in rendered frames.
    #[arg(long = "plain")]
    plain: bool,
}

fn configure_logging() -> Result<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("triescope.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "triescope.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(nb_writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

fn main() -> Result<()> {
    let _log_guard = configure_logging()?;
    info!(target: "runtime", "startup");
    let args = Args::parse();

    let config = core_config::load_from(args.config.clone())?;
    let alphabet = config.alphabet()?;
    info!(
        target: "runtime.startup",
        alphabet_start = alphabet.start(),
        alphabet_end = alphabet.end(),
        case_insensitive = alphabet.is_case_insensitive(),
        event_capacity = config.file.render.event_capacity,
        "bootstrap_complete"
    );

    let model = Rc::new(RefCell::new(AcTrie::new(alphabet)));
    let mut renderer = {
        let mut trie = model.borrow_mut();
        Renderer::attach(&mut trie, config.file.render.event_capacity, !args.plain)
    };
    let mut controller = Controller::new(Rc::clone(&model));

    for pattern in &args.patterns {
        controller.dispatch(Command::AddPattern(pattern.clone()));
    }

    if let Some(text) = args.text {
        controller.dispatch(Command::Scan(text));
        renderer.drain();
        let stdout = io::stdout();
        renderer.render_to(&mut stdout.lock())?;
        info!(target: "runtime", "shutdown");
        return Ok(());
    }

    repl(&mut controller, &mut renderer)
}

fn repl(controller: &mut Controller, renderer: &mut Renderer) -> Result<()> {
    let stdin = io::stdin();
    let mut out = io::stdout();
    writeln!(out, "{HELP_TEXT}")?;
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(ParseError::Empty) => continue,
            Err(err) => {
                writeln!(out, "{err}")?;
                continue;
            }
        };
        match controller.dispatch(command) {
            Outcome::Continue => {
                renderer.drain();
                renderer.render_to(&mut out)?;
            }
            Outcome::ShowStats => {
                let model = controller.model().borrow();
                writeln!(
                    out,
                    "nodes: {}  patterns: {}  ready: {}",
                    model.node_count(),
                    model.pattern_count(),
                    model.is_ready()
                )?;
            }
            Outcome::ShowHelp => writeln!(out, "{HELP_TEXT}")?,
            Outcome::Quit => break,
        }
    }
    info!(target: "runtime", "shutdown");
    Ok(())
}
