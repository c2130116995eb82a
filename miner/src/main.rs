//! Polling proof-of-work miner: fetches a block template from a node, races
//! the CPU to find a conforming nonce, and submits the result back.
//!
//! Grounded in the node's `FetchTemplate`/`SubmitTemplate` handshake
//! (`node/src/handler.rs`) rather than any in-tree mining loop, since mining
//! itself lives behind the network protocol and not inside `Blockchain`.

use anyhow::{Context, Result};
use chaincore::config::BlockchainConfig;
use chaincore::crypto::PublicKey;
use chaincore::network::Message;
use chaincore::types::transaction::Address;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

#[derive(Parser)]
/// Proof-of-work miner for the toy blockchain node
struct Args {
    /// node address to mine against (defaults to MiningConfig::node_address)
    #[arg(long)]
    node: Option<String>,

    /// PEM file holding the public key that collects mined rewards
    /// (defaults to MiningConfig::public_key_file)
    #[arg(long)]
    public_key_file: Option<String>,

    /// seconds between supersession checks while a mine is in flight
    /// (defaults to MiningConfig::template_fetch_interval_secs)
    #[arg(long)]
    fetch_interval: Option<u64>,
}

fn load_or_explain_public_key(path: &str) -> Result<PublicKey> {
    PublicKey::load_from_file(path).with_context(|| {
        format!("no public key at {path}; generate a wallet key and point --public-key-file at its .pub.pem")
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = BlockchainConfig::global();
    let args = Args::parse();

    let node_addr = args.node.unwrap_or_else(|| config.mining.node_address.clone());
    let public_key_file = args
        .public_key_file
        .unwrap_or_else(|| config.mining.public_key_file.clone());
    let fetch_interval = args.fetch_interval.unwrap_or(config.mining.template_fetch_interval_secs);

    let public_key = load_or_explain_public_key(&public_key_file)?;
    let address = Address::from(public_key);
    tracing::info!(node = node_addr, public_key_file, "starting miner");

    loop {
        if let Err(e) = mine_one_block(&node_addr, address, fetch_interval).await {
            tracing::warn!(error = %e, "mining round failed, retrying");
            tokio::time::sleep(std::time::Duration::from_secs(fetch_interval)).await;
        }
    }
}

/// Fetches a template, mines it on a blocking thread (cancelling if a
/// competing block supersedes it first), and submits a solution.
async fn mine_one_block(node_addr: &str, address: Address, fetch_interval: u64) -> Result<()> {
    let mut stream = TcpStream::connect(node_addr).await.context("connecting to node")?;
    Message::FetchTemplate(address).send_async(&mut stream).await?;
    let template = match Message::receive_async(&mut stream).await? {
        Message::Template(block) => block,
        other => anyhow::bail!("unexpected response to FetchTemplate: {other:?}"),
    };
    tracing::info!(index = template.index, difficulty = template.difficulty, "got template, mining");

    let cancel = Arc::new(AtomicBool::new(false));
    let watcher = spawn_supersession_watcher(node_addr.to_string(), template.index, Arc::clone(&cancel), fetch_interval);

    let mine_cancel = Arc::clone(&cancel);
    let mined = tokio::task::spawn_blocking(move || {
        chaincore::types::Block::mine(
            template.index,
            template.previous_hash,
            template.timestamp,
            template.data,
            template.difficulty,
            &mine_cancel,
        )
    })
    .await
    .context("mining task panicked")?;

    cancel.store(true, Ordering::Relaxed);
    watcher.abort();

    let Some(block) = mined else {
        tracing::info!("superseded by a competing block, fetching a fresh template");
        return Ok(());
    };

    tracing::info!(index = block.index, nonce = block.nonce, "found a conforming nonce, submitting");
    let mut submit_stream = TcpStream::connect(node_addr).await.context("reconnecting to submit")?;
    Message::SubmitTemplate(block.clone()).send_async(&mut submit_stream).await?;
    tracing::info!(index = block.index, "submitted");
    Ok(())
}

/// Polls the node's chain height while a mine is in flight and flips
/// `cancel` the moment someone else's block makes our template stale, so a
/// long-running search doesn't keep grinding on dead work.
fn spawn_supersession_watcher(
    node_addr: String,
    template_index: u64,
    cancel: Arc<AtomicBool>,
    poll_interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(poll_interval_secs)).await;
            let Ok(mut stream) = TcpStream::connect(&node_addr).await else {
                continue;
            };
            if Message::AskDifference(0).send_async(&mut stream).await.is_err() {
                continue;
            }
            if let Ok(Message::Difference(height)) = Message::receive_async(&mut stream).await {
                if height as u64 + 1 > template_index {
                    cancel.store(true, Ordering::Relaxed);
                    return;
                }
            }
        }
    })
}
