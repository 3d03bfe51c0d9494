use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

mod config;
mod process;
mod settings;
mod store;

pub use config::Config;

/// lctrace - Liquid chromatography trace processing
#[derive(Parser)]
#[command(name = "lctrace")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Flags for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Export files, or directories of them
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Experiment id (defaults to the run identity of the first file)
    #[arg(short, long)]
    pub id: Option<String>,

    /// Directory for CSV output (defaults to ./<id>)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// HPLC flow rate in mL/min for every HPLC file
    #[arg(long, value_name = "ML_PER_MIN")]
    pub hplc_flow_rate: Option<f64>,

    /// FPLC column volume in mL
    #[arg(long, value_name = "ML")]
    pub fplc_cv: Option<f64>,

    /// Channel label for Agilent exports
    #[arg(long)]
    pub channel: Option<String>,

    /// Detector that wins Shimadzu channel conflicts
    #[arg(long)]
    pub preferred_detector: Option<String>,

    /// Normalize so the maximum inside this mL range is 1
    #[arg(short, long, num_args = 2, value_names = ["LO", "HI"])]
    pub normalize: Option<Vec<f64>>,

    /// Also take the minimum from the normalization range
    #[arg(long)]
    pub strict_normalize: bool,

    /// Legacy Shimadzu channel renames, as pairs: A Trp B GFP
    #[arg(long, num_args = 1.., value_name = "NAME")]
    pub channel_mapping: Vec<String>,

    /// Multiply HPLC signal by this factor
    #[arg(long, value_name = "FACTOR")]
    pub scale_hplc: Option<f64>,

    /// Save the experiment to the document store
    #[arg(short, long)]
    pub database: bool,

    /// Document store directory (overrides the config file)
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Replace a stored experiment with the same id without asking
    #[arg(long)]
    pub overwrite: bool,

    /// Points per HPLC trace kept in the stored copy; CSVs keep full resolution
    #[arg(short, long, default_value = "1000")]
    pub reduce: usize,

    /// Fail instead of prompting for missing metadata
    #[arg(long)]
    pub no_input: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode exports into one experiment and write CSVs
    Process(ProcessArgs),

    /// Show or edit the persisted user settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Work with the document store
    Store {
        /// Document store directory (overrides the config file)
        #[arg(long, value_name = "DIR")]
        path: Option<PathBuf>,

        /// Load the store path from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[command(subcommand)]
        command: StoreCommand,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print the settings file
    Show,

    /// Register a flow rate for methods containing NAME
    SetFlow {
        /// Method-name substring
        name: String,
        /// Flow rate in mL/min
        flow_rate: f64,
    },

    /// Remove a registered flow rate
    DeleteFlow {
        /// Method-name substring
        name: String,
    },

    /// Set the default FPLC column volume
    SetCv {
        /// Column volume in mL
        column_volume: f64,
    },

    /// Remove the default FPLC column volume
    ClearCv,
}

#[derive(Subcommand)]
pub enum StoreCommand {
    /// List stored experiment ids
    List,

    /// Write a stored experiment's CSVs
    Export {
        /// Experiment id
        id: String,
        /// Output directory (defaults to ./<id>)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Re-save every document at the current layout version
    Migrate {
        /// Skip the backup confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Process(args) => process::run(args),
        Commands::Settings { command } => settings::run(command),
        Commands::Store {
            path,
            config,
            command,
        } => {
            let config = Config::load(config.as_deref())?;
            let path = store_path(path.as_deref(), &config)?;
            store::run(&path, command)
        }
    }
}

/// Store directory from the flag, else the config file.
fn store_path(flag: Option<&Path>, config: &Config) -> Result<PathBuf> {
    match flag.or(config.store.path.as_deref()) {
        Some(path) => Ok(config::expand_home(path)),
        None => bail!("No document store configured; pass a store directory or set [store] path in the config file"),
    }
}
