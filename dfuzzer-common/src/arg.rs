//! Command-line surface (original spec §6). Parsing itself, and the mapping
//! from parsed flags to an exit code, are explicitly out of the fuzzing
//! core's scope; this module only owns the shared `Options` parser and the
//! three-stage resolution (`CommandLineArguments` -> `RunArguments`) so that
//! both the core crate's tests and the CLI binary agree on flag names.

use getopts::Options;
use std::path::PathBuf;

pub const MIN_MAX_STRING_BYTES: usize = 256;

#[derive(Debug, Clone)]
pub struct DefaultArguments {
    pub max_rss_kib: Option<i64>,
    pub max_string_bytes: usize,
    pub min_iterations: u64,
    pub max_iterations: u64,
}

impl Default for DefaultArguments {
    fn default() -> Self {
        Self {
            max_rss_kib: None,
            max_string_bytes: 4096,
            min_iterations: 10,
            max_iterations: u64::MAX,
        }
    }
}

/// Every flag as the user typed it, before defaults are merged in.
#[derive(Debug, Clone, Default)]
pub struct CommandLineArguments {
    pub bus_name: Option<String>,
    pub object_path: Option<String>,
    pub interface: Option<String>,
    pub method: Option<String>,
    pub max_rss_kib: Option<i64>,
    pub max_string_bytes: Option<usize>,
    pub list_names: bool,
    pub list_only: bool,
    pub verbose: bool,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub external_command: Option<String>,
    pub min_iterations: Option<u64>,
    pub max_iterations: Option<u64>,
    pub seed: Option<u64>,
    pub want_version: bool,
    pub want_help: bool,
}

/// Fully resolved configuration ready to drive `Traversal`.
#[derive(Debug, Clone)]
pub struct RunArguments {
    pub bus_name: String,
    pub object_path: Option<String>,
    pub interface: Option<String>,
    pub method: Option<String>,
    pub max_rss_kib: Option<i64>,
    pub max_string_bytes: usize,
    pub list_only: bool,
    pub verbose: bool,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub external_command: Option<String>,
    pub min_iterations: u64,
    pub max_iterations: u64,
    pub seed: Option<u64>,
}

#[derive(Debug)]
pub enum ArgumentsError {
    NoBusName,
    InterfaceWithoutObjectPath,
    MaxStringBytesTooSmall(usize),
    Parsing(getopts::Fail),
}

impl std::fmt::Display for ArgumentsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgumentsError::NoBusName => write!(f, "a bus name (-n) is required unless -l is given"),
            ArgumentsError::InterfaceWithoutObjectPath => {
                write!(f, "-i requires -o to also be given")
            }
            ArgumentsError::MaxStringBytesTooSmall(got) => write!(
                f,
                "-b must be at least {min}, got {got}",
                min = MIN_MAX_STRING_BYTES
            ),
            ArgumentsError::Parsing(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ArgumentsError {}

#[must_use]
pub fn options_parser() -> Options {
    let mut options = Options::new();
    options.optopt("n", "", "well-known bus name to fuzz", "NAME");
    options.optopt("o", "", "restrict fuzzing to this object path", "PATH");
    options.optopt("i", "", "restrict fuzzing to this interface", "IFACE");
    options.optopt("t", "", "restrict fuzzing to this method", "METHOD");
    options.optopt("m", "", "maximum resident set size in KiB", "KIB");
    options.optopt(
        "b",
        "",
        format!(
            "maximum length of generated strings in bytes (minimum {min})",
            min = MIN_MAX_STRING_BYTES
        )
        .as_str(),
        "BYTES",
    );
    options.optflag("l", "", "list names on both buses and exit");
    options.optflag("", "list-only", "introspect and print methods without invoking them");
    options.optflag("v", "", "verbose output");
    options.optflag("d", "", "debug output");
    options.optopt("L", "", "append structured log lines to this file", "FILE");
    options.optopt(
        "e",
        "",
        "run this command after every call, treat nonzero exit as failure",
        "CMD",
    );
    options.optopt("", "min-iterations", "clamp the per-method iteration budget from below", "N");
    options.optopt("", "max-iterations", "clamp the per-method iteration budget from above", "N");
    options.optopt("", "seed", "seed the random source for a reproducible run", "N");
    options.optflag("V", "", "print version and exit");
    options.optflag("h", "", "print this help and exit");
    options
}

impl CommandLineArguments {
    pub fn from_parser(options: &Options, args: &[String]) -> Result<Self, ArgumentsError> {
        let matches = options.parse(args).map_err(ArgumentsError::Parsing)?;

        Ok(Self {
            bus_name: matches.opt_str("n"),
            object_path: matches.opt_str("o"),
            interface: matches.opt_str("i"),
            method: matches.opt_str("t"),
            max_rss_kib: matches.opt_str("m").and_then(|s| s.parse().ok()),
            max_string_bytes: matches.opt_str("b").and_then(|s| s.parse().ok()),
            list_names: matches.opt_present("l"),
            list_only: matches.opt_present("list-only"),
            verbose: matches.opt_present("v"),
            debug: matches.opt_present("d"),
            log_file: matches.opt_str("L").map(PathBuf::from),
            external_command: matches.opt_str("e"),
            min_iterations: matches.opt_str("min-iterations").and_then(|s| s.parse().ok()),
            max_iterations: matches.opt_str("max-iterations").and_then(|s| s.parse().ok()),
            seed: matches.opt_str("seed").and_then(|s| s.parse().ok()),
            want_version: matches.opt_present("V"),
            want_help: matches.opt_present("h"),
        })
    }

    /// Merge user-supplied flags with `defaults`, validating the invariants
    /// from the original spec's §3 (`BusTarget`) and §6 (`-b` minimum).
    pub fn resolved(&self, defaults: &DefaultArguments) -> Result<RunArguments, ArgumentsError> {
        let bus_name = self.bus_name.clone().ok_or(ArgumentsError::NoBusName)?;

        if self.interface.is_some() && self.object_path.is_none() {
            return Err(ArgumentsError::InterfaceWithoutObjectPath);
        }

        let max_string_bytes = self.max_string_bytes.unwrap_or(defaults.max_string_bytes);
        if max_string_bytes < MIN_MAX_STRING_BYTES {
            return Err(ArgumentsError::MaxStringBytesTooSmall(max_string_bytes));
        }

        let max_rss_kib = self.max_rss_kib.or(defaults.max_rss_kib);

        Ok(RunArguments {
            bus_name,
            object_path: self.object_path.clone(),
            interface: self.interface.clone(),
            method: self.method.clone(),
            max_rss_kib,
            max_string_bytes,
            list_only: self.list_only,
            verbose: self.verbose,
            debug: self.debug,
            log_file: self.log_file.clone(),
            external_command: self.external_command.clone(),
            min_iterations: self.min_iterations.unwrap_or(defaults.min_iterations),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            seed: self.seed,
        })
    }
}
