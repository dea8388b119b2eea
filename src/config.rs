use std::fs;
use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::engine::validate_config;
use crate::error::{Error, Result};
use crate::logging;
use crate::models::{CallMode, SimConfig, Timing};

#[derive(Parser, Debug)]
#[command(name = "tier-sim", about = "Discrete-event simulator of a two-tier request network")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the simulation and print its metrics
    Run(RunArgs),
    /// Print the merged configuration without running it
    ShowConfig(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, help = "TOML or JSON file; flags override its values")]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub app_cores: Option<u32>,
    #[arg(long)]
    pub db_cores: Option<u32>,
    #[arg(long)]
    pub app_service_time: Option<f64>,
    #[arg(long)]
    pub db_service_time: Option<f64>,
    #[arg(long)]
    pub app_queue_capacity: Option<usize>,
    #[arg(long)]
    pub db_queue_capacity: Option<usize>,
    #[arg(long, help = "Probability an application completion calls the database")]
    pub db_prob: Option<f64>,
    #[arg(long)]
    pub think_time: Option<f64>,
    #[arg(long)]
    pub high_priority_prob: Option<f64>,
    #[arg(long)]
    pub horizon: Option<f64>,
    #[arg(long)]
    pub clients: Option<usize>,
    #[arg(long, help = "Mean delay before a failed request is retried")]
    pub retry_delay: Option<f64>,
    #[arg(long)]
    pub timeout: Option<f64>,
    #[arg(long, value_enum)]
    pub call_mode: Option<CallModeArg>,
    #[arg(long, help = "Shorthand for --call-mode sync")]
    pub sync: bool,
    #[arg(long, value_enum)]
    pub timing: Option<TimingArg>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, value_enum, default_value = "human")]
    pub format: FormatArg,
    #[arg(long, help = "Shorthand for --format summary")]
    pub summary: bool,
    #[arg(long, default_value = logging::DEFAULT_LEVEL)]
    pub log_level: String,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Human,
    Summary,
    Json,
    Csv,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CallModeArg {
    Sync,
    Async,
}

impl From<CallModeArg> for CallMode {
    fn from(value: CallModeArg) -> Self {
        match value {
            CallModeArg::Sync => CallMode::Sync,
            CallModeArg::Async => CallMode::Async,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TimingArg {
    Exponential,
    Constant,
}

impl From<TimingArg> for Timing {
    fn from(value: TimingArg) -> Self {
        match value {
            TimingArg::Exponential => Timing::Exponential,
            TimingArg::Constant => Timing::Constant,
        }
    }
}

pub fn parse_args() -> Result<Cli> {
    match Cli::try_parse() {
        Ok(cli) => Ok(cli),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => Err(Error::Cli(err.to_string())),
    }
}

pub fn load_config(path: &Path) -> Result<SimConfig> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::ConfigIo(format!(
            "failed to read config '{}': {}",
            path.display(),
            err
        ))
    })?;
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or("");

    match ext {
        "toml" => toml::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse TOML: {}", err))),
        "json" => serde_json::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse JSON: {}", err))),
        "" => Err(Error::UnsupportedConfigFormat("unknown".to_string())),
        _ => Err(Error::UnsupportedConfigFormat(ext.to_string())),
    }
}

/// Defaults, then the config file, then individual flags.
pub fn build_config(args: RunArgs) -> Result<(SimConfig, FormatArg)> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SimConfig::default(),
    };

    if let Some(value) = args.app_cores {
        config.app.cores = value;
    }
    if let Some(value) = args.db_cores {
        config.db.cores = value;
    }
    if let Some(value) = args.app_service_time {
        config.app.service_time = value;
    }
    if let Some(value) = args.db_service_time {
        config.db.service_time = value;
    }
    if let Some(value) = args.app_queue_capacity {
        config.app.queue_capacity = value;
    }
    if let Some(value) = args.db_queue_capacity {
        config.db.queue_capacity = value;
    }
    if let Some(value) = args.db_prob {
        config.app_to_db_prob = value;
    }
    if let Some(value) = args.think_time {
        config.think_time = value;
    }
    if let Some(value) = args.high_priority_prob {
        config.high_priority_prob = value;
    }
    if let Some(value) = args.horizon {
        config.horizon = value;
    }
    if let Some(value) = args.clients {
        config.clients = value;
    }
    if let Some(value) = args.retry_delay {
        config.retry_delay = value;
    }
    if let Some(value) = args.timeout {
        config.timeout = value;
    }
    if let Some(value) = args.call_mode {
        config.call_mode = value.into();
    }
    if args.sync {
        config.call_mode = CallMode::Sync;
    }
    if let Some(value) = args.timing {
        config.timing = value.into();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    validate_config(&config)?;

    let format = if args.summary {
        FormatArg::Summary
    } else {
        args.format
    };
    Ok((config, format))
}
