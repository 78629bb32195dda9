//! Command-line surface: `camwatch [-c <config-path>] [-v]... [-t]`.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! Parsed with `docopt`, the teacher's own CLI crate (see its `main.rs`
//! `USAGE`/`Args`/`Docopt::new` pattern).

use docopt::Docopt;

const USAGE: &str = "
camwatch: multi-camera video recorder and motion-triggered archiver.

Usage:
  camwatch -c <config-path> [-v...] [-t]
  camwatch (--version | --help)

Options:
    -c <config-path>    Load camera configuration from this file.
    -v                  Increase media-library log verbosity by one level.
    -t                  Test mode: parse and validate configuration, then exit.
    --version           Show version.
    --help              Show help.
";

#[derive(Debug, Clone, Deserialize)]
pub struct Args {
    pub flag_c: String,
    pub flag_v: usize,
    pub flag_t: bool,
}

/// Parses `argv`. On a usage error or `--help`/`--version`, this exits the
/// process, matching docopt's own behavior in the teacher's `main.rs`.
pub fn parse(version: &str) -> Args {
    Docopt::new(USAGE)
        .map(|d| d.help(true))
        .map(|d| d.version(Some(version.to_string())))
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit())
}

/// Maps `-v` occurrence count to a `log::LevelFilter`, baseline "fatal only".
pub fn verbosity_to_level(count: usize) -> log::LevelFilter {
    match count {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}
