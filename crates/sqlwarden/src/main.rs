//! sqlwarden: permission-enforcing SQL gateway.
//!
//! Commands:
//! - `serve`: MCP server over stdio, bound to one principal
//! - `init`: create gateway storage (optionally the demo dataset)
//! - `check`: validate a statement and print the final SQL
//! - `plan`: execute a candidate plan file
//! - `audit`: print audit history
//! - `config`: print the resolved configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

use cli::config::{default_config_path, Overrides, WardenConfig};
use cli::context::PrincipalArgs;

#[derive(Parser, Debug)]
#[command(name = "sqlwarden", version, about = "Permission-enforcing SQL gateway")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.sqlwarden/config.toml)
    #[arg(long, global = true, env = "SQLWARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true, env = "SQLWARDEN_DATABASE")]
    database: Option<PathBuf>,

    /// Row cap for reads
    #[arg(long, global = true)]
    max_limit: Option<u64>,

    /// Statement timeout in milliseconds
    #[arg(long, global = true)]
    statement_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the gateway tools over MCP (JSON-RPC on stdio)
    Serve {
        #[command(flatten)]
        principal: PrincipalArgs,
    },

    /// Create the database and gateway tables
    Init {
        /// Also create and populate the demo tables, users and grants
        #[arg(long)]
        demo: bool,
    },

    /// Validate a statement without executing it
    Check {
        #[command(flatten)]
        principal: PrincipalArgs,

        /// SQL statement
        sql: String,
    },

    /// Execute a candidate plan (JSON)
    Plan {
        #[command(flatten)]
        principal: PrincipalArgs,

        /// Plan file, or `-` for stdin
        file: PathBuf,
    },

    /// Show audit history, newest first
    Audit {
        #[command(flatten)]
        principal: PrincipalArgs,

        /// Only entries of this user (admin only)
        #[arg(long)]
        user: Option<i64>,

        /// Table name substring
        #[arg(long)]
        table: Option<String>,

        #[arg(long, default_value_t = 100)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Print the resolved configuration
    Config {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

fn load_config(cli: &Cli) -> Result<WardenConfig> {
    let (path, required) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (default_config_path(), false),
    };
    let mut config = WardenConfig::load(&path, required)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    config.apply(&Overrides {
        database: cli.database.clone(),
        max_limit: cli.max_limit,
        statement_timeout_ms: cli.statement_timeout_ms,
        verbose: cli.verbose,
    })?;
    Ok(config)
}

async fn run_command(command: Commands, config: WardenConfig) -> Result<()> {
    match command {
        Commands::Serve { principal } => cli::serve::run(&config, principal).await,
        Commands::Init { demo } => cli::init::run(&config, cli::init::InitArgs { demo }).await,
        Commands::Check { principal, sql } => {
            cli::check::run(&config, principal, cli::check::CheckArgs { sql }).await
        }
        Commands::Plan { principal, file } => {
            cli::plan::run(&config, principal, cli::plan::PlanArgs { file }).await
        }
        Commands::Audit {
            principal,
            user,
            table,
            limit,
            offset,
        } => {
            cli::audit::run(
                &config,
                principal,
                cli::audit::AuditArgs {
                    user,
                    table,
                    limit,
                    offset,
                },
            )
            .await
        }
        Commands::Config { json } => cli::config::run(&config, cli::config::ConfigArgs { json }),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{:?}", err);
            return ExitCode::from(2);
        }
    };

    let _log_guard = match sqlwarden_logging::init_logging(sqlwarden_logging::LogConfig {
        app_name: "sqlwarden",
        verbose: config.logging.verbose,
        log_dir: None,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start async runtime: {}", err);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run_command(cli.command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}
