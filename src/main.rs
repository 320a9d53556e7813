use clap::{Args, Parser, Subcommand};
use dns_workbench::{
    config::{DnsConfig, Network},
    config_reload::ReloadCoordinator,
    http_server::HttpServer,
    metrics::DnsMetrics,
    resolver::Resolver,
    server::{QueryHandler, run_tcp_server, run_udp_server},
    zone::{ZoneBuilder, ZoneDefinition, ZoneName, ZoneStore},
};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A simple authoritative DNS workbench server
#[derive(Parser, Debug)]
#[command(name = "dns-workbench", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Starts the DNS server
    Run(RunArgs),
    /// Loads a new zone file into a running workbench
    Reload(ReloadArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Hostname of the DNS server
    #[arg(long)]
    dns_name: Option<String>,

    /// Address for the DNS server to listen on
    #[arg(long)]
    dns_address: Option<IpAddr>,

    /// Port for the DNS server to listen on
    #[arg(long)]
    dns_port: Option<u16>,

    /// Network for the DNS server to listen on
    #[arg(long, value_enum)]
    dns_network: Option<Network>,

    /// Use DNS message compression
    #[arg(long)]
    dns_compression: bool,

    /// Path to workbench zones file (YAML or JSON)
    #[arg(long)]
    zone_file: Option<PathBuf>,

    /// Address for the HTTP API to listen on
    #[arg(long)]
    api_uri: Option<SocketAddr>,

    /// Don't start the HTTP API
    #[arg(long)]
    disable_api: bool,
}

#[derive(Args, Debug)]
struct ReloadArgs {
    /// Path to workbench zones file (YAML or JSON)
    #[arg(long)]
    zone_file: PathBuf,

    /// Address of the running workbench's HTTP API
    #[arg(long, default_value = "127.0.0.1:5353")]
    api_uri: String,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Run(args) => run(args).await,
        Command::Reload(args) => reload(args).await,
    }
}

/// Environment first, then command line flags on top
fn build_config(args: RunArgs) -> Result<DnsConfig, BoxError> {
    let mut config = DnsConfig::from_env()?;

    if let Some(name) = args.dns_name {
        config.server_name = ZoneName::parse(&name)?;
    }
    if let Some(address) = args.dns_address {
        config.bind_addr.set_ip(address);
    }
    if let Some(port) = args.dns_port {
        config.bind_addr.set_port(port);
    }
    if let Some(network) = args.dns_network {
        config.network = network;
    }
    if args.dns_compression {
        config.compression = true;
    }
    if let Some(zone_file) = args.zone_file {
        config.zone_file = Some(zone_file);
    }
    if let Some(api_uri) = args.api_uri {
        config.http_bind_addr = Some(api_uri);
    }
    if args.disable_api {
        config.http_bind_addr = None;
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: RunArgs) -> Result<(), BoxError> {
    let config = build_config(args)?;
    info!(
        "Starting dns-workbench as {} on {} ({})",
        config.server_name, config.bind_addr, config.network
    );

    let metrics = Arc::new(
        DnsMetrics::new().map_err(|e| format!("Failed to create metrics registry: {}", e))?,
    );
    let store = Arc::new(ZoneStore::default());
    let builder = ZoneBuilder::new(config.server_name.clone())?;

    let mut coordinator =
        ReloadCoordinator::new(store.clone(), builder).with_metrics(metrics.clone());
    if let Some(zone_file) = &config.zone_file {
        coordinator = coordinator.with_zone_file(zone_file);
    }
    let coordinator = Arc::new(coordinator);

    match coordinator.zone_file() {
        Some(path) => {
            coordinator.reload_from_file(path)?;
        }
        None => {
            info!("No zone file given, serving no zones until a reload");
            metrics.update_snapshot(&store.current(), store.generation());
        }
    }
    coordinator.start_signal_handler();

    let handler = Arc::new(
        QueryHandler::new(store.clone(), Resolver::new(config.compression))
            .with_metrics(metrics.clone()),
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut tasks: JoinSet<Result<(), BoxError>> = JoinSet::new();

    if config.network.serves_udp() {
        let (config, handler, shutdown_rx) =
            (config.clone(), handler.clone(), shutdown_tx.subscribe());
        tasks.spawn(async move { Ok(run_udp_server(config, handler, shutdown_rx).await?) });
    }
    if config.network.serves_tcp() {
        let (config, handler, shutdown_rx) =
            (config.clone(), handler.clone(), shutdown_tx.subscribe());
        tasks.spawn(async move { Ok(run_tcp_server(config, handler, shutdown_rx).await?) });
    }
    if let Some(http_bind_addr) = config.http_bind_addr {
        let http_server = HttpServer::new(coordinator.clone(), metrics.clone(), http_bind_addr);
        let shutdown_rx = shutdown_tx.subscribe();
        tasks.spawn(async move { http_server.start(shutdown_rx).await });
    }

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal, stopping servers"),
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
        let _ = signal_tx.send(());
    });

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result? {
            error!("Server task failed: {}", e);
            let _ = shutdown_tx.send(());
            return Err(e);
        }
    }

    info!("dns-workbench stopped");
    Ok(())
}

async fn reload(args: ReloadArgs) -> Result<(), BoxError> {
    let definition = ZoneDefinition::from_path(&args.zone_file)?;
    let body = definition.to_json()?;

    let url = format!("http://{}/api/reload", args.api_uri);
    let response = reqwest::Client::new()
        .post(&url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await?;

    let status = response.status();
    let reply: serde_json::Value = response.json().await.unwrap_or_default();
    if status != reqwest::StatusCode::OK {
        let message = reply["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("server answered {}", status));
        return Err(format!("Reload rejected: {}", message).into());
    }

    info!(
        "Reloaded {} zones ({} names, {} records), generation {}",
        reply["zones"], reply["names"], reply["records"], reply["generation"]
    );
    Ok(())
}
