//! The `Blockchain` aggregate: owns the chain, the derived UTXO set, and the
//! rules for extending or replacing it.
//!
//! Grounded in the original Python `Blockchain` class (`add_block`,
//! `generate_raw_next_block`/`generate_next_block`/
//! `generate_next_with_transaction`, `send_transaction`, `replace`,
//! `validate_blocks`, `get_accumulated_difficulty`, `get_difficulty`/
//! `get_adjusted_difficulty`), with the teacher's `try_adjust_target`/
//! `calculate_block_reward` contributing the retarget-safety-clamp and
//! halving-reward shape, and the teacher's `Saveable` trait used for the
//! on-disk snapshot the `node` binary persists.

use super::block::Block;
use super::transaction::{process_transactions, Address, Amount, Transaction, UtxoSet};
use crate::error::{ChainError, Result};
use crate::pool::TransactionPool;
use crate::sha256::Hash;
use crate::util::Saveable;
use crate::wallet::Wallet;
use crate::{
    BLOCK_GENERATION_INTERVAL, DIFFICULTY_ADJUSTMENT_INTERVAL, HALVING_INTERVAL, INITIAL_REWARD,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::{Error as IoError, ErrorKind as IoErrorKind, Read, Result as IoResult, Write};
use std::sync::atomic::AtomicBool;

/// The coinbase reward for a block at `height`, following a Bitcoin-style
/// halving schedule: halved every [`HALVING_INTERVAL`] blocks, starting from
/// [`INITIAL_REWARD`].
pub fn block_reward(height: u64) -> Amount {
    let halvings = height / HALVING_INTERVAL;
    if halvings >= 64 {
        return Amount::zero();
    }
    Amount::from_whole(INITIAL_REWARD >> halvings)
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Blockchain {
    blocks: Vec<Block>,
    utxos: UtxoSet,
}

impl Blockchain {
    pub fn new() -> Self {
        Blockchain {
            blocks: vec![Block::genesis()],
            utxos: UtxoSet::new(),
        }
    }

    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn block_height(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    pub fn get_latest(&self) -> &Block {
        self.blocks.last().expect("always has at least genesis")
    }

    /// Validates an entire candidate chain from its own genesis, replaying
    /// transactions to derive the resulting UTXO set. Returns `None` (logged)
    /// on any structural, linkage or transaction violation.
    pub fn validate_blocks(blocks: &[Block]) -> Option<UtxoSet> {
        if blocks.is_empty() || !blocks[0].is_genesis() {
            tracing::warn!("invalid genesis block");
            return None;
        }
        let mut utxos = UtxoSet::new();
        for (i, block) in blocks.iter().enumerate() {
            if i != 0 && !blocks[i - 1].is_valid_next(block) {
                tracing::warn!(index = i, "block is not valid");
                return None;
            }
            match process_transactions(&block.data, &utxos, block.index) {
                Ok(next) => utxos = next,
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "invalid transactions in blockchain");
                    return None;
                }
            }
        }
        Some(utxos)
    }

    pub fn get_accumulated_difficulty(blocks: &[Block]) -> u128 {
        blocks.iter().map(|b| 1u128 << b.difficulty.min(127)).sum()
    }

    /// Appends `block` after checking it is a valid successor and that its
    /// transactions apply cleanly; on success the pool is told which
    /// transactions were just mined so it can drop them. Returns `false`
    /// (non-fatal) on rejection rather than raising, since an invalid
    /// candidate is a routine protocol outcome, not an error; it is up to
    /// the caller to decide what rejection means for it (drop the
    /// connection, abort a sync, retry a mine).
    pub fn add_block(&mut self, block: Block, pool: &mut TransactionPool) -> bool {
        if !self.get_latest().is_valid_next(&block) {
            tracing::warn!(index = block.index, "rejected block: not a valid successor");
            return false;
        }
        let utxos = match process_transactions(&block.data, &self.utxos, block.index) {
            Ok(utxos) => utxos,
            Err(e) => {
                tracing::warn!(index = block.index, error = %e, "rejected block: invalid transactions");
                return false;
            }
        };
        self.blocks.push(block.clone());
        self.utxos = utxos;
        pool.update(&block.data, &self.utxos);
        tracing::info!(index = block.index, hash = %block.hash, "accepted block");
        true
    }

    /// Mines and appends a block carrying exactly `data`, at the difficulty
    /// implied by the current tip. Returns `None` either if mining was
    /// cancelled before a conforming nonce was found, or if the mined block
    /// was rejected on append (a race where another append happened
    /// concurrently) — the two cases are indistinguishable from the return
    /// value alone, so a caller that needs to tell them apart should check
    /// its own cancellation flag first.
    pub fn mine_next_raw(
        &mut self,
        data: Vec<Transaction>,
        pool: &mut TransactionPool,
        cancel: &AtomicBool,
    ) -> Result<Option<Block>> {
        let previous = self.get_latest();
        let next_index = previous.index + 1;
        let difficulty = self.get_difficulty();
        let timestamp = Utc::now();
        tracing::debug!(next_index, difficulty, "mining next block");
        let Some(block) = Block::mine(next_index, Some(previous.hash), timestamp, data, difficulty, cancel)
        else {
            return Ok(None);
        };
        if !self.add_block(block.clone(), pool) {
            return Ok(None);
        }
        Ok(Some(block))
    }

    /// Builds an unmined block (nonce `0`) carrying the coinbase reward for
    /// `miner` plus whatever is pending in `pool`, for a remote miner to
    /// search a conforming nonce for and submit back via [`Self::add_block`].
    pub fn build_template(&self, miner: Address, pool: &TransactionPool) -> Block {
        let next_index = self.get_latest().index + 1;
        let coinbase = Transaction::coinbase(miner, next_index, block_reward(next_index));
        let mut data = vec![coinbase];
        data.extend(pool.transactions());
        Block::new(next_index, Some(self.get_latest().hash), Utc::now(), data, self.get_difficulty(), 0)
    }

    /// Mines the next block containing the coinbase reward plus whatever is
    /// pending in `pool`.
    pub fn mine_next(
        &mut self,
        miner: &Wallet,
        pool: &mut TransactionPool,
        cancel: &AtomicBool,
    ) -> Result<Option<Block>> {
        let next_index = self.get_latest().index + 1;
        let coinbase = Transaction::coinbase(miner.get_address(), next_index, block_reward(next_index));
        let mut data = vec![coinbase];
        data.extend(pool.transactions());
        self.mine_next_raw(data, pool, cancel)
    }

    /// Mines a block paying `amount` from `sender` to `recipient`, alongside
    /// the block's own coinbase.
    pub fn mine_with_transaction(
        &mut self,
        miner: &Wallet,
        sender: &Wallet,
        recipient: Address,
        amount: Amount,
        pool: &mut TransactionPool,
        cancel: &AtomicBool,
    ) -> Result<Option<Block>> {
        if !Address::is_valid(&recipient.0) {
            return Err(ChainError::bad_request("invalid recipient address"));
        }
        let next_index = self.get_latest().index + 1;
        let coinbase = Transaction::coinbase(miner.get_address(), next_index, block_reward(next_index));
        let tx = sender.create_transaction(recipient, amount, &self.utxos)?;
        self.mine_next_raw(vec![coinbase, tx], pool, cancel)
    }

    /// Builds, signs and submits a transaction to `pool` without mining it.
    pub fn send_transaction(
        &self,
        sender: &Wallet,
        recipient: Address,
        amount: Amount,
        pool: &mut TransactionPool,
    ) -> Result<Transaction> {
        let tx = sender.create_transaction(recipient, amount, &self.utxos)?;
        pool.add_transaction(tx.clone(), &self.utxos)?;
        Ok(tx)
    }

    pub fn handle_received_transaction(&self, transaction: Transaction, pool: &mut TransactionPool) -> Result<()> {
        pool.add_transaction(transaction, &self.utxos)
    }

    pub fn get_block_with_hash(&self, hash: Hash) -> Result<&Block> {
        self.blocks
            .iter()
            .find(|b| b.hash == hash)
            .ok_or_else(|| ChainError::not_found(hash.to_hex()))
    }

    pub fn get_transaction_with_id(&self, id: Hash) -> Result<&Transaction> {
        self.blocks
            .iter()
            .flat_map(|b| b.data.iter())
            .find(|tx| tx.id == id)
            .ok_or_else(|| ChainError::not_found(id.to_hex()))
    }

    /// Replaces the current chain with `new_blocks` if it is both valid and
    /// strictly heavier by accumulated difficulty. Returns whether the
    /// replacement happened.
    pub fn replace(&mut self, new_blocks: Vec<Block>, pool: &mut TransactionPool) -> bool {
        let Some(utxos) = Self::validate_blocks(&new_blocks) else {
            tracing::warn!("received chain is invalid");
            return false;
        };
        if Self::get_accumulated_difficulty(&new_blocks) <= Self::get_accumulated_difficulty(&self.blocks) {
            tracing::debug!("received chain is not heavier than the current chain");
            return false;
        }
        tracing::info!(
            blocks = new_blocks.len(),
            "replacing current chain with received chain"
        );
        self.blocks = new_blocks;
        self.utxos = utxos;
        pool.update(&[], &self.utxos);
        true
    }

    /// The difficulty the next block must satisfy: the tip's difficulty,
    /// unless the tip falls on a retarget boundary.
    pub fn get_difficulty(&self) -> u32 {
        let latest = self.get_latest();
        if latest.index != 0 && latest.index % DIFFICULTY_ADJUSTMENT_INTERVAL == 0 {
            self.get_adjusted_difficulty()
        } else {
            latest.difficulty
        }
    }

    fn get_adjusted_difficulty(&self) -> u32 {
        let interval = DIFFICULTY_ADJUSTMENT_INTERVAL as usize;
        let prev_adjustment_block = &self.blocks[self.blocks.len().saturating_sub(interval)];
        let latest = self.get_latest();
        let time_expected = BLOCK_GENERATION_INTERVAL * DIFFICULTY_ADJUSTMENT_INTERVAL as i64;
        let time_taken = (latest.timestamp - prev_adjustment_block.timestamp).num_seconds();
        tracing::debug!(time_taken, time_expected, "retargeting difficulty");
        if time_taken < time_expected / 2 {
            prev_adjustment_block.difficulty + 1
        } else if time_taken > time_expected * 2 {
            prev_adjustment_block.difficulty.saturating_sub(1)
        } else {
            prev_adjustment_block.difficulty
        }
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Saveable for Blockchain {
    fn load<I: Read>(reader: I) -> IoResult<Self> {
        ciborium::de::from_reader(reader)
            .map_err(|_| IoError::new(IoErrorKind::InvalidData, "failed to deserialize blockchain"))
    }

    fn save<O: Write>(&self, writer: O) -> IoResult<()> {
        ciborium::ser::into_writer(self, writer)
            .map_err(|_| IoError::new(IoErrorKind::InvalidData, "failed to serialize blockchain"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    fn wallet() -> Wallet {
        Wallet::new(PrivateKey::new_key())
    }

    #[test]
    fn new_chain_starts_at_genesis() {
        let chain = Blockchain::new();
        assert_eq!(chain.block_height(), 0);
        assert!(chain.get_latest().is_genesis());
    }

    #[test]
    fn mine_next_extends_chain_and_credits_miner() {
        let mut chain = Blockchain::new();
        let miner = wallet();
        let mut pool = TransactionPool::new();
        let cancel = AtomicBool::new(false);

        let mined = chain.mine_next(&miner, &mut pool, &cancel).unwrap().unwrap();
        assert_eq!(mined.index, 1);
        assert_eq!(chain.block_height(), 1);
        assert_eq!(miner.get_balance(chain.utxos()), block_reward(1));
    }

    #[test]
    fn mine_with_transaction_pays_recipient() {
        let mut chain = Blockchain::new();
        let miner = wallet();
        let mut pool = TransactionPool::new();
        let cancel = AtomicBool::new(false);
        chain.mine_next(&miner, &mut pool, &cancel).unwrap();

        let recipient = wallet();
        chain
            .mine_with_transaction(
                &miner,
                &miner,
                recipient.get_address(),
                Amount::from_whole(10),
                &mut pool,
                &cancel,
            )
            .unwrap()
            .unwrap();

        assert_eq!(recipient.get_balance(chain.utxos()), Amount::from_whole(10));
    }

    #[test]
    fn send_transaction_enters_pool_and_is_mined() {
        let mut chain = Blockchain::new();
        let miner = wallet();
        let mut pool = TransactionPool::new();
        let cancel = AtomicBool::new(false);
        chain.mine_next(&miner, &mut pool, &cancel).unwrap();

        let recipient = wallet();
        chain
            .send_transaction(&miner, recipient.get_address(), Amount::from_whole(5), &mut pool)
            .unwrap();
        assert_eq!(pool.len(), 1);

        chain.mine_next(&miner, &mut pool, &cancel).unwrap();
        assert!(pool.is_empty());
        assert_eq!(recipient.get_balance(chain.utxos()), Amount::from_whole(5));
    }

    #[test]
    fn replace_accepts_strictly_heavier_valid_chain() {
        let mut chain_a = Blockchain::new();
        let mut chain_b = Blockchain::new();
        let miner = wallet();
        let mut pool_a = TransactionPool::new();
        let mut pool_b = TransactionPool::new();
        let cancel = AtomicBool::new(false);

        chain_a.mine_next(&miner, &mut pool_a, &cancel).unwrap();
        chain_b.mine_next(&miner, &mut pool_b, &cancel).unwrap();
        chain_b.mine_next(&miner, &mut pool_b, &cancel).unwrap();

        let replaced = chain_a.replace(chain_b.blocks.clone(), &mut pool_a);
        assert!(replaced);
        assert_eq!(chain_a.block_height(), 2);
    }

    #[test]
    fn replace_rejects_lighter_chain() {
        let mut chain_a = Blockchain::new();
        let chain_b = Blockchain::new();
        let miner = wallet();
        let mut pool_a = TransactionPool::new();
        let mut pool_b = TransactionPool::new();
        let cancel = AtomicBool::new(false);

        chain_a.mine_next(&miner, &mut pool_a, &cancel).unwrap();

        let replaced = chain_a.replace(chain_b.blocks().cloned().collect(), &mut pool_b);
        assert!(!replaced);
        assert_eq!(chain_a.block_height(), 1);
    }

    #[test]
    fn get_block_and_transaction_lookups() {
        let mut chain = Blockchain::new();
        let miner = wallet();
        let mut pool = TransactionPool::new();
        let cancel = AtomicBool::new(false);
        let block = chain.mine_next(&miner, &mut pool, &cancel).unwrap().unwrap();

        assert!(chain.get_block_with_hash(block.hash).is_ok());
        assert!(chain.get_block_with_hash(Hash::zero()).is_err());

        let tx_id = block.data[0].id;
        assert!(chain.get_transaction_with_id(tx_id).is_ok());
        assert!(chain.get_transaction_with_id(Hash::zero()).is_err());
    }

    #[test]
    fn build_template_is_an_unmined_valid_successor_shape() {
        let chain = Blockchain::new();
        let miner = wallet();
        let pool = TransactionPool::new();

        let template = chain.build_template(miner.get_address(), &pool);
        assert_eq!(template.index, 1);
        assert_eq!(template.previous_hash, Some(chain.get_latest().hash));
        assert_eq!(template.nonce, 0);
        assert_eq!(template.data.len(), 1);
        assert!(template.data[0].is_coinbase());
    }
}
