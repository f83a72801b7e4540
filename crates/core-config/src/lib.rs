//! Configuration loading and the automaton alphabet.
//!
//! Parses `triescope.toml` (or an override path provided by the binary) into
//! a [`Config`]. Unknown fields are ignored (TOML deserialization tolerance)
//! and a missing or unparseable file falls back to defaults, so the binary
//! always starts.
//!
//! The [`Alphabet`] is the validated, runtime form of the `[alphabet]`
//! section: a contiguous byte range with optional case folding. The
//! automaton indexes edges by `index_of`, so the alphabet is fixed for the
//! lifetime of an automaton instance.

use std::{fs, path::PathBuf};

use anyhow::Result;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlphabetError {
    /// The configured range is empty, starts at NUL, or leaves ASCII.
    #[error("invalid alphabet range [0x{start:02x}; 0x{end:02x}]")]
    InvalidRange { start: u8, end: u8 },
    /// A config value was not a single-byte (ASCII) character.
    #[error("alphabet bound {0:?} is not an ASCII character")]
    NonAsciiBound(char),
}

/// Contiguous byte alphabet `[start; end]` with optional case folding.
///
/// `index_of` maps a (folded) byte to its edge slot; `symbol` is the
/// inverse, used by renderers to label edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alphabet {
    start: u8,
    end: u8,
    case_insensitive: bool,
}

impl Default for Alphabet {
    /// The range `['A'; 'z']`, case-sensitive. Width 58: it spans the
    /// uppercase letters, a handful of punctuation bytes, and the
    /// lowercase letters.
    fn default() -> Self {
        Self {
            start: b'A',
            end: b'z',
            case_insensitive: false,
        }
    }
}

impl Alphabet {
    pub fn new(start: u8, end: u8, case_insensitive: bool) -> Result<Self, AlphabetError> {
        if start == 0 || start > end || end > 0x7F {
            return Err(AlphabetError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            case_insensitive,
        })
    }

    pub fn start(&self) -> u8 {
        self.start
    }

    pub fn end(&self) -> u8 {
        self.end
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Number of edge slots per node. Never zero: `new` rejects empty
    /// ranges.
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    /// Canonical form of an input byte: lowercased when folding is on.
    pub fn fold(&self, byte: u8) -> u8 {
        if self.case_insensitive {
            byte.to_ascii_lowercase()
        } else {
            byte
        }
    }

    /// Edge slot for `byte` after folding, or `None` when the byte is
    /// outside the range.
    pub fn index_of(&self, byte: u8) -> Option<usize> {
        let folded = self.fold(byte);
        if folded >= self.start && folded <= self.end {
            Some(usize::from(folded - self.start))
        } else {
            None
        }
    }

    pub fn contains(&self, byte: u8) -> bool {
        self.index_of(byte).is_some()
    }

    /// Byte labelling edge slot `index`. Inverse of `index_of` over
    /// canonical (folded) bytes.
    pub fn symbol(&self, index: usize) -> u8 {
        debug_assert!(index < self.len(), "edge slot out of range");
        self.start + index as u8
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlphabetSection {
    #[serde(default = "AlphabetSection::default_start")]
    pub start: char,
    #[serde(default = "AlphabetSection::default_end")]
    pub end: char,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl Default for AlphabetSection {
    fn default() -> Self {
        Self {
            start: Self::default_start(),
            end: Self::default_end(),
            case_insensitive: false,
        }
    }
}

impl AlphabetSection {
    const fn default_start() -> char {
        'A'
    }
    const fn default_end() -> char {
        'z'
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderSection {
    /// Bound on the renderer's pending-event queue; oldest events are
    /// dropped past this.
    #[serde(default = "RenderSection::default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            event_capacity: Self::default_event_capacity(),
        }
    }
}

impl RenderSection {
    const fn default_event_capacity() -> usize {
        1024
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub alphabet: AlphabetSection,
    #[serde(default)]
    pub render: RenderSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

impl Config {
    /// Validate the `[alphabet]` section into a runtime [`Alphabet`].
    pub fn alphabet(&self) -> Result<Alphabet, AlphabetError> {
        let section = &self.file.alphabet;
        let start = ascii_byte(section.start)?;
        let end = ascii_byte(section.end)?;
        Alphabet::new(start, end, section.case_insensitive)
    }
}

fn ascii_byte(ch: char) -> Result<u8, AlphabetError> {
    if ch.is_ascii() {
        Ok(ch as u8)
    } else {
        Err(AlphabetError::NonAsciiBound(ch))
    }
}

/// Best-effort config path: working directory first, then the platform
/// config dir (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("triescope.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("triescope").join("triescope.toml");
    }
    PathBuf::from("triescope.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(Config {
                    raw: Some(content),
                    file,
                })
            }
            Err(_e) => {
                // Unparseable file falls back to defaults rather than
                // refusing to start.
                info!(target: "config", path = %path.display(), "config_parse_failed_using_defaults");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}
