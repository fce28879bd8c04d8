use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    config::{Settings, default_config_path},
    types::{Command, OutputFormat, QueueSpec, Repo, StatsSpec},
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Args, Debug, Clone, Default)]
struct QueueArgs {
    /// GitHub organization name
    #[arg(value_name = "ORG")]
    pub org: Option<String>,

    /// Path to JSON config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (default: table)
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub output: Option<OutputFormat>,

    /// Comma-separated list of repo names to ignore
    #[arg(long, value_name = "REPOS")]
    pub ignore: Option<String>,

    /// Don't open HTML report in default browser
    #[arg(long = "no-open")]
    pub no_open: bool,
}

#[derive(Args, Debug, Clone)]
struct StatsArgs {
    /// Repository in owner/repo format (e.g. onebusaway/maglev)
    #[arg(value_name = "OWNER/REPO")]
    pub repo: String,

    /// Write CSV to FILE instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum CliCommand {
    /// List an organization's open PRs, the ones needing your review first
    Queue(QueueArgs),
    /// Export every PR (open and closed) of a repository as CSV
    Stats(StatsArgs),
}

#[derive(Parser, Debug)]
#[command(
    name = "prqueue",
    about = "Find the open pull requests across a GitHub organization that need your review"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommand,
}

fn parse_ignore_list(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Merges queue arguments with the settings file they point at (or the
/// default one when no arguments were given).
fn resolve_queue_spec(args: QueueArgs, default_config: &Path) -> Result<QueueSpec> {
    let config_path = match (&args.config, &args.org) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(_)) => None,
        (None, None) => {
            if !default_config.exists() {
                anyhow::bail!(
                    "No arguments given and {} not found",
                    default_config.display()
                );
            }
            Some(default_config.to_path_buf())
        }
    };

    let settings = config_path
        .as_deref()
        .map(Settings::load)
        .transpose()?
        .unwrap_or_default();

    let org = args
        .org
        .or(settings.org)
        .map(|org| org.trim().to_string())
        .filter(|org| !org.is_empty())
        .context("org is required (via argument or --config)")?;

    let output = args.output.or(settings.output).unwrap_or_default();

    // An empty --ignore leaves the settings list in place.
    let ignore = match args
        .ignore
        .as_deref()
        .map(parse_ignore_list)
        .filter(|list| !list.is_empty())
    {
        Some(list) => list,
        None => settings.ignore.into_iter().collect(),
    };

    let open_browser = !args.no_open && settings.open.unwrap_or(true);

    Ok(QueueSpec {
        org,
        output,
        ignore,
        open_browser,
    })
}

fn resolve_stats_spec(args: StatsArgs) -> Result<StatsSpec> {
    let repo = Repo::parse(&args.repo)?;
    Ok(StatsSpec {
        repo,
        output: args.output,
    })
}

fn build_command(cli: CliArgs, default_config: &Path) -> Result<Command> {
    match cli.command {
        CliCommand::Queue(args) => resolve_queue_spec(args, default_config).map(Command::Queue),
        CliCommand::Stats(args) => resolve_stats_spec(args).map(Command::Stats),
    }
}

/// Parses command-line arguments into a fully resolved [`Command`].
///
/// Settings for `queue` are read from `--config`, or from the default
/// settings file when neither an organization nor `--config` is given.
/// Clap errors (including help and version requests) are returned as-is
/// inside the [`anyhow::Error`] so the caller can downcast them.
pub fn parse_args<I, T>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    parse_args_with_default_config(args, &default_config_path())
}

/// Like [`parse_args`] with an explicit fallback settings path.
pub fn parse_args_with_default_config<I, T>(args: I, default_config: &Path) -> Result<Command>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_command(cli, default_config)
}
