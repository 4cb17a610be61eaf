use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::Instrument;

use mikrotik_billing::commands::{self, FieldArgs, ManualAction, ReceiptArgs};
use mikrotik_billing::config::{Config, DEFAULT_CONFIG_FILE};
use mikrotik_billing::logging;

#[derive(Parser)]
#[command(name = "mikrotik-billing")]
#[command(about = "WiFi billing helper for MikroTik routers: customers, usage and receipts")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh and show customers from the manual list and the routers
    Customers {
        /// Router id or host, or "all"
        #[arg(long)]
        router: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Do not regenerate the provisioning script
        #[arg(long)]
        no_script: bool,
    },
    /// Write current usage into every lease comment
    PushUsage {
        /// Router id or host, or "all"
        #[arg(long)]
        router: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Log in to a router and show its board, version and uptime
    TestConnection {
        /// Router id or host
        router: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Write the simple queue provisioning script
    Rsc {
        /// Router id or host, or "all"
        #[arg(long)]
        router: Option<String>,
    },
    /// Print a payment receipt for one customer
    Receipt(ReceiptArgs),
    /// Rewrite the billing fields of a lease comment and/or a manual record
    EditComment {
        /// Address of the lease or manual record
        #[arg(long)]
        ip: String,
        /// Router holding the lease
        #[arg(long)]
        router: Option<String>,
        /// Also (or only) edit the manual record with this name
        #[arg(long = "manual")]
        manual_name: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Manage customers without a router lease
    Manual {
        #[command(subcommand)]
        action: ManualAction,
    },
    /// Write a starter configuration file
    InitConfig {
        /// Target file, defaults to --config or ./mikrotik-billing.toml
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Customers { .. } => "customers",
            Commands::PushUsage { .. } => "push-usage",
            Commands::TestConnection { .. } => "test-connection",
            Commands::Rsc { .. } => "rsc",
            Commands::Receipt(_) => "receipt",
            Commands::EditComment { .. } => "edit-comment",
            Commands::Manual { .. } => "manual",
            Commands::InitConfig { .. } => "init-config",
        }
    }

    fn json(&self) -> bool {
        match self {
            Commands::Customers { json, .. }
            | Commands::PushUsage { json, .. }
            | Commands::TestConnection { json, .. } => *json,
            Commands::Manual {
                action: ManualAction::List { json },
            } => *json,
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.command.json();

    // The file to be written need not exist yet, so skip loading
    if let Commands::InitConfig { path, force } = &cli.command {
        let path = path
            .clone()
            .or_else(|| cli.config.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        return match commands::run_init_config(&path, *force) {
            Ok(()) => Ok(()),
            Err(e) => handle_error(e, json),
        };
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return handle_error(e, json),
    };

    // Keep the guard alive so file output is flushed on exit
    let _guard = logging::init_logging(&config.logging, &config.paths.log_directory);
    config.log_loaded();

    let span = logging::run_span(cli.command.name());
    match run(&config, cli.command).instrument(span).await {
        Ok(()) => Ok(()),
        Err(e) => handle_error(e, json),
    }
}

async fn run(config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Customers {
            router,
            json,
            no_script,
        } => {
            let target = commands::resolve_target(config, router.as_deref());
            commands::run_customers(config, target, json, !no_script).await
        }
        Commands::PushUsage { router, json } => {
            let target = commands::resolve_target(config, router.as_deref());
            commands::run_push_usage(config, target, json).await
        }
        Commands::TestConnection { router, json } => commands::run_test_connection(config, &router, json).await,
        Commands::Rsc { router } => {
            let target = commands::resolve_target(config, router.as_deref());
            commands::run_rsc(config, target).await
        }
        Commands::Receipt(args) => commands::run_receipt(config, args).await,
        Commands::EditComment {
            ip,
            router,
            manual_name,
            fields,
        } => commands::run_edit_comment(config, &ip, router.as_deref(), manual_name.as_deref(), &fields).await,
        Commands::Manual { action } => commands::run_manual(config, action),
        // Dispatched in main before the configuration is loaded
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<(), anyhow::Error> {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
