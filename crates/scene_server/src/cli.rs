//! Command-line interface handling for the scene server.
//!
//! Every option overrides a value from the configuration file; anything not
//! given on the command line keeps the file's setting.

use clap::{value_parser, Arg, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the drain heartbeat interval
    pub heartbeat_ms: Option<u64>,
    /// Optional number of synthetic presences to simulate
    pub simulate: Option<usize>,
}

impl CliArgs {
    /// Parses the process arguments. Exits with usage on invalid input.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    /// Parses an explicit argument list, returning clap's error instead of
    /// exiting.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&Self::command().try_get_matches_from(args)?))
    }

    fn command() -> Command {
        Command::new("Scene Server")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Interest-managed region host: prioritized, coalesced event delivery per presence")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("scene.toml"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .arg(
                Arg::new("heartbeat-ms")
                    .long("heartbeat-ms")
                    .value_name("MILLIS")
                    .help("Interval between heartbeat drains of every presence")
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                Arg::new("simulate")
                    .long("simulate")
                    .value_name("N")
                    .help("Drive the scene with N synthetic presences")
                    .value_parser(value_parser!(usize)),
            )
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .expect("Default config path should always be set"),
            ),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            heartbeat_ms: matches.get_one::<u64>("heartbeat-ms").copied(),
            simulate: matches.get_one::<usize>("simulate").copied(),
        }
    }
}
