//! Cohort report runner.

use clap::{ColorChoice, Parser};
use cohort_cli::logging::{LogConfig, LogFormat, init_logging};
use std::io::{self, IsTerminal};
use tracing::level_filters::LevelFilter;

mod cli;
mod commands;
mod summary;
mod types;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::commands::{run_columns, run_report, run_reports};
use crate::summary::print_run;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match cli.command {
        Command::Run(args) => match run_report(&args).and_then(|result| {
            print_run(&result, args.output)?;
            Ok(result)
        }) {
            Ok(result) => result.exit_code(),
            Err(error) => {
                eprintln!("error: {error:#}");
                1
            }
        },
        Command::Reports => exit_code_of(run_reports()),
        Command::Columns(args) => exit_code_of(run_columns(&args)),
    };
    std::process::exit(exit_code);
}

fn exit_code_of(result: anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.log_data = cli.log_data;
    config.with_timestamps = cli.log_timestamps;
    config.with_target = cli.log_target;
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_flags_reach_the_config() {
        let cli = Cli::parse_from([
            "cohort-report",
            "--log-timestamps",
            "--log-target",
            "--log-level",
            "debug",
            "--color",
            "never",
            "reports",
        ]);
        let config = log_config_from_cli(&cli);
        assert!(config.with_timestamps);
        assert!(config.with_target);
        assert!(!config.with_ansi);
        assert!(!config.use_env_filter);
        assert_eq!(config.level_filter, LevelFilter::DEBUG);
    }

    #[test]
    fn log_flags_default_off() {
        let cli = Cli::parse_from(["cohort-report", "reports"]);
        let config = log_config_from_cli(&cli);
        assert!(!config.with_timestamps);
        assert!(!config.with_target);
        assert!(!config.log_data);
    }
}
