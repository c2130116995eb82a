//! Mines a single standalone block (on top of the fixed genesis hash) and
//! writes it to a CBOR file, for manual inspection or seeding a node.
//!
//! Usage: `block_gen <block_file> [difficulty]`

use chaincore::crypto::PrivateKey;
use chaincore::types::block::Block;
use chaincore::types::transaction::{Amount, Transaction};
use chaincore::util::Saveable;
use std::{env, process::exit};

fn main() {
    let path = if let Some(arg) = env::args().nth(1) {
        arg
    } else {
        eprintln!("Usage: block_gen <block_file> [difficulty]");
        eprintln!("  difficulty: optional leading-zero-bit count (default 8)");
        exit(1);
    };

    let difficulty: u32 = env::args()
        .nth(2)
        .map(|s| s.parse().expect("difficulty must be a non-negative integer"))
        .unwrap_or(8);

    let genesis = Block::genesis();
    let private_key = PrivateKey::new_key();
    let address = private_key.public_key().into();
    let coinbase = Transaction::coinbase(address, 1, Amount::from_whole(chaincore::INITIAL_REWARD));

    println!("mining at difficulty {difficulty}");
    let cancel = std::sync::atomic::AtomicBool::new(false);
    let block = Block::mine(
        genesis.index + 1,
        Some(genesis.hash),
        chrono::Utc::now(),
        vec![coinbase],
        difficulty,
        &cancel,
    )
    .expect("mining was not cancelled");

    block.save_to_file(&path).expect("failed to save block");
    println!("block generated successfully: {path}");
}
