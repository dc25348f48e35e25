// lotledger CLI - import and reconcile marketplace listings and profiles

mod app;
mod exit_codes;
mod fetch;
mod import;
mod logging;
mod show;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lotledger_config::{ConfigError, Settings};
use lotledger_recon::EntityKind;
use lotledger_store::{ImportError, StoreError};

use exit_codes::{import_exit_code, store_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_STORE_BUSY, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "lotledger")]
#[command(about = "Reconcile marketplace listings and seller profiles into a local database")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// SQLite database file (default: from settings, else the data directory)
    #[arg(long, global = true, env = "LOTLEDGER_DB")]
    pub db: Option<PathBuf>,

    /// Settings file (default: <config dir>/lotledger/settings.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for downloaded images; remembered for later runs
    #[arg(long, global = true)]
    pub data_location: Option<PathBuf>,

    /// Marketplace base URL (default: from settings)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Entity {
    #[value(name = "listings", alias = "listing")]
    Listings,
    #[value(name = "profiles", alias = "profile")]
    Profiles,
}

impl From<Entity> for EntityKind {
    fn from(entity: Entity) -> Self {
        match entity {
            Entity::Listings => EntityKind::Listing,
            Entity::Profiles => EntityKind::Profile,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import a CSV export of listings or profiles
    #[command(after_help = "\
Examples:
  lotledger csv listings auctions.csv
  lotledger csv profiles sellers.csv --db ~/lots.db")]
    Csv {
        /// What the rows describe
        kind: Entity,

        /// CSV file with a header row
        file: PathBuf,
    },

    /// Import jbidwatcher XML export files
    #[command(after_help = "\
Examples:
  lotledger xml auctions.xml
  lotledger xml 2009/*.xml")]
    Xml {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Fetch one listing page
    #[command(after_help = "\
Examples:
  lotledger listing 183885054092
  lotledger listing https://www.ebay.co.uk/itm/183885054092")]
    Listing {
        /// Item id or item page URL
        target: String,

        /// Do not download listing images
        #[arg(long)]
        no_images: bool,
    },

    /// Fetch one seller profile page
    Profile {
        /// Profile id or profile page URL
        target: String,
    },

    /// Fetch the listings found by a search, then their sellers' profiles
    #[command(after_help = "\
Examples:
  lotledger search 'mambila mask' 100")]
    Search {
        query: String,

        /// Maximum number of listings
        count: usize,

        /// Do not download listing images
        #[arg(long)]
        no_images: bool,
    },

    /// Print a stored listing or profile as JSON
    Show {
        kind: Entity,
        id: String,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("LOTLEDGER_COMMIT"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("LOTLEDGER_TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("LOTLEDGER_COMMIT"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("LOTLEDGER_TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = Settings::load(cli.global.config.as_deref()).map_err(CliError::config)?;
    logging::init(&settings.log, cli.global.verbose);
    let app = app::App::open(settings, &cli.global)?;

    match cli.command {
        Commands::Csv { kind, file } => import::cmd_csv(&app, kind.into(), &file),
        Commands::Xml { files } => import::cmd_xml(&app, &files),
        Commands::Listing { target, no_images } => fetch::cmd_listing(&app, &target, !no_images),
        Commands::Profile { target } => fetch::cmd_profile(&app, &target),
        Commands::Search { query, count, no_images } => fetch::cmd_search(&app, &query, count, !no_images),
        Commands::Show { kind, id } => show::cmd_show(&app, kind.into(), &id),
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn config(err: ConfigError) -> Self {
        Self {
            code: EXIT_CONFIG,
            message: err.to_string(),
            hint: Some(format!("default settings file: {}", Settings::config_path().display())),
        }
    }

    /// Create error from store error with proper exit code.
    pub fn store(err: StoreError) -> Self {
        let code = store_exit_code(&err);
        let hint = match &err {
            StoreError::Open { .. } => Some("check --db or LOTLEDGER_DB".to_string()),
            _ if code == EXIT_STORE_BUSY => {
                Some("another process is writing to the database; retry later".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn import(err: ImportError) -> Self {
        let code = import_exit_code(&err);
        let hint = (code == EXIT_STORE_BUSY)
            .then(|| "another process is writing to the database; retry later".to_string());
        Self { code, message: err.to_string(), hint }
    }
}
