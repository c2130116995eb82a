use anyhow::Result;
use argh::FromArgs;
use chaincore::config::BlockchainConfig;
use chaincore::pool::TransactionPool;
use chaincore::types::Blockchain;
use dashmap::DashMap;
use static_init::dynamic;
use std::path::Path;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

mod handler;
mod util;

#[dynamic]
pub static BLOCKCHAIN: RwLock<Blockchain> = RwLock::new(Blockchain::new());

#[dynamic]
pub static POOL: RwLock<TransactionPool> = RwLock::new(TransactionPool::new());

#[dynamic]
pub static NODES: DashMap<String, TcpStream> = DashMap::new();

#[derive(FromArgs)]
/// A toy blockchain node
struct Args {
    #[argh(option)]
    /// port number (defaults to NODE_PORT env var or 9000)
    port: Option<u16>,
    #[argh(option)]
    /// blockchain file location (defaults to BLOCKCHAIN_FILE env var or ./blockchain.cbor)
    blockchain_file: Option<String>,
    #[argh(positional)]
    /// addresses of initial nodes (can also use INITIAL_PEERS env var)
    nodes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    util::init_tracing();

    let config = BlockchainConfig::global();
    let args: Args = argh::from_env();

    let port = args.port.unwrap_or(config.node.port);
    let blockchain_file = args.blockchain_file.unwrap_or_else(|| config.node.blockchain_file.clone());

    let mut nodes = args.nodes;
    if nodes.is_empty() {
        nodes = config.node.initial_peers.clone();
    }

    tracing::info!(network = %config.network.network_id, port, blockchain_file, "starting blockchain node");
    if !nodes.is_empty() {
        tracing::info!(?nodes, "initial peers");
    }

    if Path::new(&blockchain_file).exists() {
        util::load_blockchain(&blockchain_file).await?;
    } else {
        tracing::info!("no blockchain file on disk, starting from genesis");
        util::populate_connections(&nodes).await?;
        tracing::info!(known_nodes = NODES.len(), "peer discovery complete");
        if nodes.is_empty() {
            tracing::info!("no initial peers, starting as a seed node");
        } else {
            let (longest_name, longest_count) = util::find_longest_chain_node().await?;
            util::download_blockchain(&longest_name, longest_count).await?;
            tracing::info!(peer = longest_name, "blockchain downloaded");
        }
    }

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr, "listening");

    tokio::spawn(util::cleanup());
    tokio::spawn(util::save(blockchain_file.clone()));
    loop {
        let (socket, _) = listener.accept().await?;
        tokio::spawn(handler::handle_connection(socket));
    }
}
