use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Args, Parser};

use crate::config::Configuration;

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Args, Debug, Clone, Default)]
struct DisplayArgs {
    /// Print each refresh as a JSON document instead of a menu
    #[arg(long, help_heading = "Display")]
    pub json: bool,

    /// Include the hidden pull requests section
    #[arg(long = "show-hidden", help_heading = "Display")]
    pub show_hidden: bool,

    /// Include draft pull requests even if the config excludes them
    #[arg(long = "show-drafts", help_heading = "Display")]
    pub show_drafts: bool,

    /// Do not shorten titles to the terminal width
    #[arg(long = "no-truncate", help_heading = "Display")]
    pub no_truncate: bool,
}

#[derive(Parser, Default, Debug)]
#[command(
    name = "prbar",
    about = "Periodically list the GitHub pull requests you care about, grouped by category and repository"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// Configuration file (default: <config dir>/prbar/config.yml, then config.yml next to the binary)
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Refresh once, print, and exit
    #[arg(long)]
    pub once: bool,

    /// Seconds between refreshes, overriding github_refresh_interval
    #[arg(
        short = 'i',
        long,
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: Option<u64>,

    #[command(flatten)]
    pub display: DisplayArgs,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// How refresh results are written to stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Text { truncate_titles: bool },
    Json,
}

/// Everything the binary needs to know about one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub config_path: Option<PathBuf>,
    pub once: bool,
    pub interval: Option<Duration>,
    pub show_hidden: bool,
    pub show_drafts: bool,
    pub debug: bool,
}

impl RunSpec {
    /// Applies command-line overrides on top of the loaded configuration.
    /// Flags only ever switch display options on.
    pub fn apply_overrides(&self, mut config: Configuration) -> Configuration {
        if self.show_hidden {
            config = config.with_render_hidden(true);
        }
        if self.show_drafts {
            config = config.with_show_drafts(true);
        }
        if let Some(interval) = self.interval {
            config = config.with_refresh_interval(interval);
        }
        config
    }
}

fn determine_output_mode(display: &DisplayArgs) -> OutputMode {
    if display.json {
        OutputMode::Json
    } else {
        OutputMode::Text {
            truncate_titles: !display.no_truncate,
        }
    }
}

fn build_run_spec(cli: CliArgs) -> (RunSpec, OutputMode) {
    let output_mode = determine_output_mode(&cli.display);
    let spec = RunSpec {
        config_path: cli.config,
        once: cli.once,
        interval: cli.interval.map(Duration::from_secs),
        show_hidden: cli.display.show_hidden,
        show_drafts: cli.display.show_drafts,
        debug: cli.debug,
    };
    (spec, output_mode)
}

/// Parses command-line arguments into run settings and an output mode.
pub fn parse_args<I, T>(args: I) -> Result<(RunSpec, OutputMode)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    Ok(build_run_spec(cli))
}
