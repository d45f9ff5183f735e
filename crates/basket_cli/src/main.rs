//! `basketweaver`: encodes and decodes `.baskets` files.
//!
//! # Responsibility
//! - Parse flags, merge them with the optional config file.
//! - Run one of weave, unweave or inspect and map the outcome to an exit
//!   code (0 success, 1 usage or I/O error).

mod config;
mod weaver;

use basket_core::{default_log_level, init_logging, IoErrorCode, LogSpec, LogTarget};
use clap::{ArgGroup, Parser};
use config::{resolve_path, Config};
use std::path::PathBuf;
use std::process::ExitCode;
use weaver::{Destination, WeaverError};

#[derive(Parser, Debug)]
#[command(name = "basketweaver", version, about = "Encodes and decodes .baskets files")]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["weave", "unweave", "inspect"])
))]
struct Cli {
    /// Encodes the <DIRECTORY>. Cannot be used together with --unweave.
    #[arg(short = 'w', long, visible_short_alias = 'c', value_name = "DIRECTORY")]
    weave: Option<PathBuf>,
    /// Decodes the <FILE>. Cannot be used together with --weave.
    #[arg(short = 'u', long, visible_short_alias = 'x', value_name = "FILE")]
    unweave: Option<PathBuf>,
    /// Prints the header of the <FILE> without extracting it.
    #[arg(long, value_name = "FILE")]
    inspect: Option<PathBuf>,
    /// Destination directory.
    #[arg(short, long, value_name = "DIRECTORY")]
    output: Option<PathBuf>,
    /// Label of the new content within the output directory.
    #[arg(short, long, value_name = "NAME")]
    name: Option<String>,
    /// PNG used as preview image of a woven file.
    #[arg(short, long, value_name = "IMAGE")]
    preview: Option<PathBuf>,
    /// Overwrite existing files.
    #[arg(short, long)]
    force: bool,
    /// Config file (default: <config dir>/basketweaver/config.toml).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// trace, debug, info, warn or error. Logs go to stderr unless a log
    /// directory is set.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
    /// Directory for rotated log files.
    #[arg(long, value_name = "DIRECTORY")]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    start_logging(&cli, &config);

    let code = match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=weaver_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    };
    log::logger().flush();
    code
}

/// Starts file logging when a log directory is configured, stderr logging
/// when only a level was asked for.
fn start_logging(cli: &Cli, config: &Config) {
    let dir = cli
        .log_dir
        .as_ref()
        .map(|dir| resolve_path(&dir.to_string_lossy()))
        .or_else(|| config.log_dir());
    let level = cli.log_level.clone().or_else(|| config.log_level.clone());
    let target = match (dir, &level) {
        (Some(dir), _) => LogTarget::File(dir),
        (None, Some(_)) => LogTarget::Stderr,
        (None, None) => return,
    };
    let level = level.unwrap_or_else(|| default_log_level().to_string());
    let started = LogSpec::new(&level, target).and_then(|spec| init_logging(&spec));
    if let Err(err) = started {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn run(cli: &Cli, config: &Config) -> Result<(), WeaverError> {
    let destination = Destination {
        output: cli.output.clone().or_else(|| config.output_dir()),
        name: cli.name.clone(),
        force: cli.force,
    };

    if let Some(source) = &cli.weave {
        let target = weaver::weave(source, cli.preview.as_deref(), &destination)?;
        println!("{}", target.display());
    } else if let Some(input) = &cli.unweave {
        let outcome = weaver::unweave(input, &destination)?;
        if let Some(code) = outcome.warning {
            report_warning(code);
        }
        println!("{}", outcome.destination.display());
    } else if let Some(input) = &cli.inspect {
        let summary = weaver::inspect(input)?;
        print!("{}", weaver::render_summary(&summary));
    }
    Ok(())
}

fn report_warning(code: IoErrorCode) {
    eprintln!("warning: {}", code.message());
}
