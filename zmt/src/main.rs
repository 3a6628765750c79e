// Copyright (c) 2024 Botho Foundation

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zmt::{
    commands::{self, history::HistoryKind},
    config,
};

#[derive(Parser)]
#[command(name = "zmt")]
#[command(about = "Mining, boost, referral and exchange ledger for ZMT", long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.zmt/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the ledger
    Init,

    /// Register a new account
    Register {
        username: String,

        /// Referral code of the inviting account
        #[arg(long)]
        referral_code: Option<String>,
    },

    /// Show an account
    Profile { username: String },

    /// List all accounts
    Accounts,

    /// Start a mining session
    Start { username: String },

    /// Settle the active mining session into the balance
    Claim {
        username: String,

        /// Claim this session id instead of the active one
        #[arg(long)]
        session: Option<u64>,
    },

    /// Stop mining without claiming (accrual is forfeited)
    Stop { username: String },

    /// List the boost catalog
    Boosts,

    /// Buy a boost level
    BuyBoost { username: String, level: u32 },

    /// List the task catalog
    Tasks,

    /// Record today's login
    Login { username: String },

    /// Claim a task reward
    ClaimTask { username: String, task_type: String },

    /// Exchange ZMT for an external-currency claim
    Exchange {
        username: String,

        /// Amount in ZMT (e.g. 12.5)
        amount: String,
    },

    /// Settle a pending exchange
    Settle {
        code: String,

        /// completed or failed
        outcome: String,
    },

    /// Show account history
    History {
        username: String,

        #[arg(long, value_enum, default_value = "audit")]
        kind: HistoryKind,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::default_config_path);
    let json = cli.json;

    match cli.command {
        Commands::Init => commands::init::run(&config_path),
        Commands::Register {
            username,
            referral_code,
        } => {
            commands::account::register(&config_path, &username, referral_code.as_deref(), json)
        }
        Commands::Profile { username } => commands::account::profile(&config_path, &username, json),
        Commands::Accounts => commands::account::list(&config_path, json),
        Commands::Start { username } => commands::mining::start(&config_path, &username, json),
        Commands::Claim { username, session } => {
            commands::mining::claim(&config_path, &username, session, json)
        }
        Commands::Stop { username } => commands::mining::stop(&config_path, &username, json),
        Commands::Boosts => commands::boost::list(&config_path, json),
        Commands::BuyBoost { username, level } => {
            commands::boost::buy(&config_path, &username, level, json)
        }
        Commands::Tasks => commands::tasks::list(&config_path, json),
        Commands::Login { username } => commands::tasks::login(&config_path, &username, json),
        Commands::ClaimTask {
            username,
            task_type,
        } => commands::tasks::claim(&config_path, &username, &task_type, json),
        Commands::Exchange { username, amount } => {
            commands::exchange::request(&config_path, &username, &amount, json)
        }
        Commands::Settle { code, outcome } => {
            commands::exchange::settle(&config_path, &code, &outcome, json)
        }
        Commands::History { username, kind } => {
            commands::history::run(&config_path, &username, kind, json)
        }
    }
}
