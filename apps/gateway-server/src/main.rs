use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use api_ingress::{ApiIngress, ApiIngressConfig};

mod shutdown;
mod wallets;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Wallet Gateway - envelope-based HTTP API host
#[derive(Parser)]
#[command(name = "gateway-server")]
#[command(about = "Wallet Gateway - envelope-based HTTP API host")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server (default)
    Run,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::init_logging_from_config(&logging_config, &config.work_dir());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config, args).await,
        Commands::Check => check_config(&config, &args),
    }
}

/// Ingress settings with the effective bind address.
///
/// `modules.api_ingress.bind_addr` wins over `server.host`/`server.port` when set;
/// `--port` replaces the port either way.
fn ingress_from(config: &AppConfig, port_override: Option<u16>) -> Result<ApiIngress> {
    let mut ingress_cfg = config.module_config::<ApiIngressConfig>(api_ingress::MODULE_NAME)?;

    let explicit_addr = config
        .modules
        .get(api_ingress::MODULE_NAME)
        .is_some_and(|section| section.get("bind_addr").is_some());
    if !explicit_addr {
        ingress_cfg.bind_addr = format!("{}:{}", config.server.host, config.server.port);
    }

    if let Some(port) = port_override {
        let mut addr: SocketAddr = ingress_cfg
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", ingress_cfg.bind_addr))?;
        addr.set_port(port);
        ingress_cfg.bind_addr = addr.to_string();
    }

    Ok(ApiIngress::new(ingress_cfg))
}

async fn run_server(config: AppConfig, args: CliArgs) -> Result<()> {
    tracing::info!("Wallet Gateway starting");

    let ingress = ingress_from(&config, args.port)?;
    let wallets_cfg = config.module_config::<wallets::WalletsConfig>(wallets::MODULE_NAME)?;
    let routes = wallets::router(Arc::new(wallets::WalletStore::default()), wallets_cfg);

    let cancel = CancellationToken::new();
    let mut server = tokio::spawn({
        let cancel = cancel.clone();
        async move { ingress.serve(routes, cancel).await }
    });

    tokio::select! {
        joined = &mut server => {
            return joined.context("HTTP server task panicked")?;
        }
        res = shutdown::wait_for_shutdown() => {
            match res {
                Ok(()) => tracing::info!("shutdown: signal received"),
                Err(e) => tracing::warn!(error = %e, "shutdown: signal listener failed"),
            }
        }
    }

    cancel.cancel();

    let grace = config.server.shutdown_grace_sec;
    if grace == 0 {
        return server.await.context("HTTP server task panicked")?;
    }
    match tokio::time::timeout(Duration::from_secs(grace), &mut server).await {
        Ok(joined) => joined.context("HTTP server task panicked")?,
        Err(_) => {
            tracing::warn!(
                grace_sec = grace,
                "shutdown: grace period elapsed, aborting in-flight requests"
            );
            server.abort();
            Ok(())
        }
    }
}

fn check_config(config: &AppConfig, args: &CliArgs) -> Result<()> {
    tracing::info!("Checking configuration...");

    let ingress = ingress_from(config, args.port)?;
    let addr = ingress.bind_addr()?;
    config
        .module_config::<wallets::WalletsConfig>(wallets::MODULE_NAME)
        .context("wallets module configuration is invalid")?;

    tracing::info!(%addr, "Configuration is valid");
    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);

    Ok(())
}
