//! # Command Line
//!
//! Flag parsing for the host binary. Help and every parse failure take the
//! same exit path, so both are reported as [`CliError`].

use crate::runtime::HostRuntimeConfig;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use thiserror::Error;

/// Usage text printed for `-h` and after any argument error
pub const USAGE: &str = "\
Usage: ossd -n proc -s simul -t time_limit -i launch_interval [-f logfile] [-v]
Options:
  -h                 Show this help message and exit
  -n proc            Total number of workers to launch (non-negative integer)
  -s simul           Maximum number of simultaneous workers (positive integer)
  -t time_limit      Time limit for each worker in seconds (non-negative number)
  -i launch_interval Interval between worker launches in seconds (non-negative number)
  -f logfile         Log file name (optional)
  -v                 Turn on verbose mode
Example:
  ossd -n 10 -s 3 -t 2.5 -i 0.5 -f oss.log
";

/// Argument errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("help requested")]
    HelpRequested,

    #[error("{0}")]
    Invalid(String),

    #[error("Missing required options: {0}")]
    Missing(String),
}

#[derive(Parser, Debug, Default, PartialEq)]
#[command(name = "ossd", disable_help_flag = true, disable_version_flag = true)]
pub struct CliArgs {
    /// Total number of workers to launch
    #[arg(short = 'n', value_parser = parse_count)]
    pub total: Option<usize>,

    /// Maximum number of simultaneous workers
    #[arg(short = 's', value_parser = parse_positive)]
    pub simultaneous: Option<usize>,

    /// Time limit for each worker, in seconds
    #[arg(short = 't', value_parser = parse_seconds)]
    pub time_limit: Option<f64>,

    /// Interval between launches, in seconds
    #[arg(short = 'i', value_parser = parse_seconds)]
    pub launch_interval: Option<f64>,

    /// Log file name
    #[arg(short = 'f', value_parser = parse_path)]
    pub log_file: Option<PathBuf>,

    /// Turn on verbose mode
    #[arg(short = 'v', action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Show usage
    #[arg(short = 'h', action = ArgAction::SetTrue)]
    pub help: bool,
}

impl CliArgs {
    /// Parses process arguments, program name first
    pub fn parse_from_args<I, T>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let args = Self::try_parse_from(args).map_err(|err| {
            CliError::Invalid(err.render().to_string().trim_end().to_string())
        })?;
        if args.help {
            return Err(CliError::HelpRequested);
        }
        Ok(args)
    }

    /// Checks that every required flag was given
    pub fn into_config(self) -> Result<HostRuntimeConfig, CliError> {
        let missing: Vec<&str> = [
            ("-n", self.total.is_none()),
            ("-s", self.simultaneous.is_none()),
            ("-t", self.time_limit.is_none()),
            ("-i", self.launch_interval.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(flag, _)| flag)
        .collect();

        match (
            self.total,
            self.simultaneous,
            self.time_limit,
            self.launch_interval,
        ) {
            (Some(total_workers), Some(max_simultaneous), Some(time_limit), Some(interval)) => {
                Ok(HostRuntimeConfig {
                    total_workers,
                    max_simultaneous,
                    time_limit_secs: time_limit,
                    launch_interval_secs: interval,
                    log_path: self.log_file,
                    verbose: self.verbose,
                    ..HostRuntimeConfig::default()
                })
            }
            _ => Err(CliError::Missing(missing.join(" "))),
        }
    }
}

fn parse_count(value: &str) -> Result<usize, String> {
    let value = non_blank(value)?;
    value
        .parse::<usize>()
        .map_err(|_| "must be a non-negative integer".to_string())
}

fn parse_positive(value: &str) -> Result<usize, String> {
    match parse_count(value) {
        Ok(0) | Err(_) => Err("must be a positive integer".to_string()),
        Ok(count) => Ok(count),
    }
}

fn parse_seconds(value: &str) -> Result<f64, String> {
    let value = non_blank(value)?;
    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err("must be a non-negative number".to_string()),
    }
}

fn parse_path(value: &str) -> Result<PathBuf, String> {
    non_blank(value).map(PathBuf::from)
}

fn non_blank(value: &str) -> Result<&str, String> {
    let value = value.trim();
    if value.is_empty() {
        Err("requires a non-blank argument".to_string())
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, CliError> {
        CliArgs::parse_from_args(std::iter::once("ossd").chain(args.iter().copied()))
    }

    #[test]
    fn test_full_invocation() {
        let config = parse(&["-n", "10", "-s", "3", "-t", "2.5", "-i", "0.5", "-f", "oss.log", "-v"])
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.total_workers, 10);
        assert_eq!(config.max_simultaneous, 3);
        assert_eq!(config.time_limit_secs, 2.5);
        assert_eq!(config.launch_interval_secs, 0.5);
        assert_eq!(config.log_path, Some(PathBuf::from("oss.log")));
        assert!(config.verbose);
    }

    #[test]
    fn test_help_is_an_error() {
        assert!(matches!(parse(&["-h"]), Err(CliError::HelpRequested)));
        assert!(matches!(
            parse(&["-n", "1", "-h"]),
            Err(CliError::HelpRequested)
        ));
    }

    #[test]
    fn test_zero_simultaneous_rejected() {
        assert!(matches!(
            parse(&["-n", "1", "-s", "0", "-t", "1", "-i", "0"]),
            Err(CliError::Invalid(_))
        ));
    }

    #[test]
    fn test_negative_values_rejected() {
        assert!(parse(&["-n", "-1"]).is_err());
        assert!(parse(&["-t", "-0.5"]).is_err());
        assert!(parse(&["-i", "abc"]).is_err());
    }

    #[test]
    fn test_zero_workers_allowed() {
        let config = parse(&["-n", "0", "-s", "1", "-t", "0", "-i", "0"])
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.total_workers, 0);
        assert_eq!(config.time_limit_secs, 0.0);
    }

    #[test]
    fn test_missing_flags_listed() {
        let err = parse(&["-n", "4", "-t", "1"])
            .unwrap()
            .into_config()
            .unwrap_err();
        match err {
            CliError::Missing(flags) => assert_eq!(flags, "-s -i"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(matches!(parse(&["-x"]), Err(CliError::Invalid(_))));
    }

    #[test]
    fn test_blank_log_file_rejected() {
        assert!(parse(&["-f", " "]).is_err());
    }
}
