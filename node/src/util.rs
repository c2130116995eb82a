use anyhow::{Context, Result};
use chaincore::config::BlockchainConfig;
use chaincore::network::Message;
use chaincore::types::Blockchain;
use chaincore::util::Saveable;
use tokio::net::TcpStream;
use tokio::time;

pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

pub async fn load_blockchain(blockchain_file: &str) -> Result<()> {
    tracing::info!("blockchain file exists, loading...");
    let new_blockchain =
        Blockchain::load_from_file(blockchain_file).context("failed to load blockchain from file")?;
    let mut blockchain = crate::BLOCKCHAIN.write().await;
    *blockchain = new_blockchain;
    tracing::info!(height = blockchain.block_height(), "blockchain loaded");
    Ok(())
}

pub async fn populate_connections(nodes: &[String]) -> Result<()> {
    tracing::info!("discovering peers...");
    for node in nodes {
        let mut stream = TcpStream::connect(node).await?;
        Message::DiscoverNodes.send_async(&mut stream).await?;
        match Message::receive_async(&mut stream).await? {
            Message::NodeList(child_nodes) => {
                tracing::info!(peer = node, count = child_nodes.len(), "received peer list");
                for child_node in child_nodes {
                    if child_node == node.as_str() || crate::NODES.contains_key(&child_node) {
                        continue;
                    }
                    let new_stream = TcpStream::connect(&child_node).await?;
                    crate::NODES.insert(child_node, new_stream);
                }
            }
            other => tracing::warn!(peer = node, ?other, "unexpected response to DiscoverNodes"),
        }
        crate::NODES.insert(node.clone(), stream);
    }
    Ok(())
}

pub async fn find_longest_chain_node() -> Result<(String, u64)> {
    tracing::info!("asking peers for their chain length...");
    let mut longest_name = String::new();
    let mut longest_count: u64 = 0;
    let all_nodes: Vec<String> = crate::NODES.iter().map(|x| x.key().clone()).collect();
    for node in all_nodes {
        let Some(mut stream) = crate::NODES.get_mut(&node) else { continue };
        Message::AskDifference(0).send_async(&mut *stream).await?;
        match Message::receive_async(&mut *stream).await? {
            Message::Difference(count) if count > 0 => {
                let count = count as u64;
                if count > longest_count {
                    longest_count = count;
                    longest_name = node;
                }
            }
            other => tracing::debug!(peer = node, ?other, "no usable difference reported"),
        }
    }
    Ok((longest_name, longest_count))
}

/// Downloads blocks `1..=height` (the genesis block is fixed and never
/// transferred) from `node`, applying each as it arrives.
pub async fn download_blockchain(node: &str, height: u64) -> Result<()> {
    if node.is_empty() {
        return Ok(());
    }
    for index in 1..=height {
        let Some(mut stream) = crate::NODES.get_mut(node) else {
            anyhow::bail!("lost connection to {node} mid-download");
        };
        Message::FetchBlock(index).send_async(&mut *stream).await?;
        match Message::receive_async(&mut *stream).await? {
            Message::NewBlock(block) => {
                let mut blockchain = crate::BLOCKCHAIN.write().await;
                let mut pool = crate::POOL.write().await;
                if !blockchain.add_block(block, &mut pool) {
                    anyhow::bail!("block {index} from {node} was rejected");
                }
            }
            other => anyhow::bail!("unexpected response fetching block {index}: {other:?}"),
        }
    }
    Ok(())
}

pub async fn cleanup() {
    let config = BlockchainConfig::global();
    let mut interval = time::interval(time::Duration::from_secs(config.node.mempool_cleanup_interval_secs));
    loop {
        interval.tick().await;
        tracing::debug!("evicting stale mempool transactions");
        crate::POOL.write().await.evict_stale();
    }
}

pub async fn save(path: String) {
    let config = BlockchainConfig::global();
    let mut interval = time::interval(time::Duration::from_secs(config.node.blockchain_save_interval_secs));
    loop {
        interval.tick().await;
        let blockchain = crate::BLOCKCHAIN.read().await;
        if let Err(e) = blockchain.save_to_file(&path) {
            tracing::warn!(error = %e, "failed to save blockchain to disk");
        }
    }
}
