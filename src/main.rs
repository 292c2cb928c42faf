use clap::Parser;
use shared::{BlockchainError, NodeConfig, Wallet};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod network;
mod node;

use network::PeerClient;
use node::Node;

#[derive(Parser)]
#[command(name = "noobcash")]
#[command(about = "NoobCash - permissioned proof-of-work blockchain node")]
#[command(version)]
struct Cli {
    /// Port in which the node is running
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// IP of the host
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    /// Total number of nodes in the network
    #[arg(long, default_value_t = 5)]
    total_nodes: usize,
}

#[tokio::main]
async fn main() -> shared::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = NodeConfig::from_env();

    info!("🚀 Starting NoobCash node on {}:{}", cli.ip, cli.port);
    let wallet = Wallet::generate()?;
    let is_bootstrap = cli.ip == config.bootstrap_ip && cli.port == config.bootstrap_port;

    let mut node = Node::new(
        wallet,
        cli.ip.clone(),
        cli.port,
        cli.total_nodes,
        config,
        is_bootstrap,
    );
    let client = PeerClient::new()?;

    if is_bootstrap {
        info!("👑 I am the bootstrap node");
        node.init_bootstrap()?;
    } else {
        let id = client
            .register(
                &node.config.bootstrap_ip,
                node.config.bootstrap_port,
                &node.ip,
                node.port,
                &node.wallet.address,
            )
            .await?;
        node.id = id;
        info!("🆔 Registered with the bootstrap, assigned id {id}");
    }

    let state = api::AppState {
        node: Arc::new(node),
        client,
    };
    let app = api::router(state);

    let addr = format!("{}:{}", cli.ip, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BlockchainError::IoError(e.to_string()))?;
    info!("✅ NoobCash node listening on {addr}");
    axum::serve(listener, app)
        .await
        .map_err(|e| BlockchainError::IoError(e.to_string()))?;
    Ok(())
}
