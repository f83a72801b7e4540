//! User-input controller: parses command lines and forwards them into the
//! automaton through dedicated in-ports.
//!
//! The REPL surface is deliberately small: one line, one command. Parsing
//! yields a [`Command`]; [`Controller::dispatch`] routes model-mutating
//! commands through unicast/signal in-ports wired to the shared automaton,
//! and bounces display-only commands back to the caller as an [`Outcome`]
//! so the controller stays free of any rendering concern.

use std::cell::RefCell;
use std::rc::Rc;

use core_automaton::AcTrie;
use core_ports::{SignalPort, UnicastPort};
use thiserror::Error;
use tracing::debug;

/// One parsed REPL command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddPattern(String),
    Scan(String),
    Build,
    Reset,
    Stats,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("command {0:?} expects an argument")]
    MissingArgument(&'static str),
}

/// Parse one input line. The first word selects the command; the rest of
/// the line, verbatim, is its argument.
pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (trimmed, ""),
    };
    match word {
        "pattern" | "p" => {
            if rest.is_empty() {
                Err(ParseError::MissingArgument("pattern"))
            } else {
                Ok(Command::AddPattern(rest.to_string()))
            }
        }
        "text" | "t" => {
            if rest.is_empty() {
                Err(ParseError::MissingArgument("text"))
            } else {
                Ok(Command::Scan(rest.to_string()))
            }
        }
        "build" | "b" => Ok(Command::Build),
        "reset" | "r" => Ok(Command::Reset),
        "stats" | "s" => Ok(Command::Stats),
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

/// What the caller should do after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    ShowStats,
    ShowHelp,
    Quit,
}

/// Owns the automaton-facing in-ports. Each mutating command flows through
/// its own port, so alternative front-ends (scripts, tests) can write into
/// the same ports without going through line parsing.
pub struct Controller {
    model: Rc<RefCell<AcTrie>>,
    pattern_in: UnicastPort<Vec<u8>>,
    text_in: UnicastPort<Vec<u8>>,
    build_in: SignalPort,
    reset_in: SignalPort,
}

impl Controller {
    pub fn new(model: Rc<RefCell<AcTrie>>) -> Self {
        let mut pattern_in = UnicastPort::new();
        {
            let model = Rc::clone(&model);
            pattern_in
                .subscribe(move |pattern: &Vec<u8>| {
                    model.borrow_mut().add_pattern(pattern);
                })
                .expect("fresh unicast port has a free slot");
        }
        let mut text_in = UnicastPort::new();
        {
            let model = Rc::clone(&model);
            text_in
                .subscribe(move |text: &Vec<u8>| {
                    model.borrow_mut().scan(text);
                })
                .expect("fresh unicast port has a free slot");
        }
        let mut build_in = SignalPort::new();
        {
            let model = Rc::clone(&model);
            build_in.subscribe(move || model.borrow_mut().build());
        }
        let mut reset_in = SignalPort::new();
        {
            let model = Rc::clone(&model);
            reset_in.subscribe(move || model.borrow_mut().reset());
        }
        Self {
            model,
            pattern_in,
            text_in,
            build_in,
            reset_in,
        }
    }

    pub fn model(&self) -> &Rc<RefCell<AcTrie>> {
        &self.model
    }

    /// Route one command. Mutating commands go through the in-ports;
    /// display-only commands are returned to the caller untouched.
    pub fn dispatch(&mut self, command: Command) -> Outcome {
        debug!(target: "input", command = command_name(&command), "dispatch");
        match command {
            Command::AddPattern(pattern) => {
                self.pattern_in.notify(&pattern.into_bytes());
                Outcome::Continue
            }
            Command::Scan(text) => {
                self.text_in.notify(&text.into_bytes());
                Outcome::Continue
            }
            Command::Build => {
                self.build_in.notify();
                Outcome::Continue
            }
            Command::Reset => {
                self.reset_in.notify();
                Outcome::Continue
            }
            Command::Stats => Outcome::ShowStats,
            Command::Help => Outcome::ShowHelp,
            Command::Quit => Outcome::Quit,
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::AddPattern(_) => "pattern",
        Command::Scan(_) => "text",
        Command::Build => "build",
        Command::Reset => "reset",
        Command::Stats => "stats",
        Command::Help => "help",
        Command::Quit => "quit",
    }
}

/// One-screen command summary for the REPL.
pub const HELP_TEXT: &str = "\
commands:
  pattern <p>   add a search pattern (alias: p)
  text <t>      scan text for all patterns (alias: t)
  build         compute links now (alias: b)
  reset         drop all patterns (alias: r)
  stats         node and pattern counts (alias: s)
  help          this summary (alias: h, ?)
  quit          leave (alias: q, exit)";
