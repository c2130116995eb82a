//! The pending-transaction pool: validates candidate transactions against a
//! UTXO snapshot, holds them until mined, and evicts stale ones.
//!
//! Grounded in the teacher's `Blockchain::add_to_mempool`/`cleanup_mempool`
//! (RBF-by-replacing-the-conflicting-transaction, then sort-by-fee, then
//! age-based eviction), adapted from the teacher's single boolean
//! "UTXO reserved" marker onto an explicit `(transaction_id, output_index) ->
//! reserving transaction id` map, since the UTXO value type itself
//! (`types::transaction::UtxoSet`) carries no such marker here.

use crate::error::{ChainError, Result};
use crate::sha256::Hash;
use crate::types::transaction::{output_reference_hash, Amount, Transaction, UtxoSet};
use crate::MAX_MEMPOOL_TRANSACTION_AGE;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct TransactionPool {
    entries: Vec<(DateTime<Utc>, Transaction)>,
    reserved: HashMap<(Hash, u32), Hash>,
}

impl TransactionPool {
    pub fn new() -> Self {
        TransactionPool {
            entries: vec![],
            reserved: HashMap::new(),
        }
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.entries.iter().map(|(_, tx)| tx.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether some pending transaction already spends the UTXO at `key`.
    pub fn reserves(&self, key: (Hash, u32)) -> bool {
        self.reserved.contains_key(&key)
    }

    /// Validates `transaction` against `utxos`, replacing any pool entry that
    /// conflicts on an input (replace-by-fee) rather than rejecting outright,
    /// then inserts it ordered by descending fee.
    pub fn add_transaction(&mut self, transaction: Transaction, utxos: &UtxoSet) -> Result<()> {
        if transaction.is_coinbase() {
            return Err(ChainError::invalid_transaction(
                "coinbase transactions are not submitted to the pool",
            ));
        }
        if transaction.inputs.is_empty() {
            return Err(ChainError::invalid_transaction("transaction has no inputs"));
        }

        let mut seen = std::collections::HashSet::new();
        for input in &transaction.inputs {
            let key = input.utxo_key();
            let Some(output) = utxos.get(&key) else {
                return Err(ChainError::invalid_transaction("referenced UTXO not found"));
            };
            if !seen.insert(key) {
                return Err(ChainError::invalid_transaction(
                    "duplicate input within transaction",
                ));
            }
            let digest = output_reference_hash(&key.0, key.1);
            let owner = output.to_address.to_public_key()?;
            if !input.signature.verify(&digest, &owner) {
                return Err(ChainError::InvalidSignature);
            }
        }

        let input_total: Amount = transaction
            .inputs
            .iter()
            .map(|input| utxos[&input.utxo_key()].amount.clone())
            .sum();
        let output_total: Amount = transaction.outputs.iter().map(|o| o.amount.clone()).sum();
        if input_total < output_total {
            return Err(ChainError::invalid_transaction(
                "input amount is lower than output amount",
            ));
        }

        for input in &transaction.inputs {
            let key = input.utxo_key();
            if let Some(conflicting_id) = self.reserved.get(&key).copied() {
                if conflicting_id != transaction.id {
                    self.remove_by_id(conflicting_id);
                }
            }
        }

        for input in &transaction.inputs {
            self.reserved.insert(input.utxo_key(), transaction.id);
        }
        self.entries.push((Utc::now(), transaction));
        self.sort_by_fee(utxos);
        Ok(())
    }

    fn remove_by_id(&mut self, id: Hash) {
        if let Some(pos) = self.entries.iter().position(|(_, tx)| tx.id == id) {
            let (_, tx) = self.entries.remove(pos);
            for input in &tx.inputs {
                self.reserved.remove(&input.utxo_key());
            }
        }
    }

    fn sort_by_fee(&mut self, utxos: &UtxoSet) {
        self.entries.sort_by(|(_, a), (_, b)| {
            let fee = |tx: &Transaction| -> Amount {
                let inputs: Amount = tx
                    .inputs
                    .iter()
                    .filter_map(|i| utxos.get(&i.utxo_key()).map(|o| o.amount.clone()))
                    .sum();
                let outputs: Amount = tx.outputs.iter().map(|o| o.amount.clone()).sum();
                if inputs.0 >= outputs.0 {
                    Amount(inputs.0 - outputs.0)
                } else {
                    Amount::zero()
                }
            };
            fee(b).0.cmp(&fee(a).0)
        });
    }

    /// Drops every pending transaction that a just-accepted block already
    /// includes, and re-checks the rest still apply cleanly to the new UTXO
    /// set (removing any that no longer do).
    pub fn update(&mut self, mined: &[Transaction], utxos: &UtxoSet) {
        let mined_ids: std::collections::HashSet<Hash> = mined.iter().map(|tx| tx.id).collect();
        self.entries.retain(|(_, tx)| !mined_ids.contains(&tx.id));

        let surviving: Vec<Transaction> = self.entries.iter().map(|(_, tx)| tx.clone()).collect();
        self.entries.clear();
        self.reserved.clear();
        for tx in surviving {
            let _ = self.add_transaction(tx, utxos);
        }
    }

    /// Removes entries older than [`MAX_MEMPOOL_TRANSACTION_AGE`] seconds.
    pub fn evict_stale(&mut self) {
        let now = Utc::now();
        let max_age = chrono::Duration::seconds(MAX_MEMPOOL_TRANSACTION_AGE as i64);
        let mut expired_ids = vec![];
        self.entries.retain(|(timestamp, tx)| {
            if now - *timestamp > max_age {
                expired_ids.push(tx.id);
                false
            } else {
                true
            }
        });
        for id in expired_ids {
            self.reserved.retain(|_, reserving_id| *reserving_id != id);
        }
    }
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::types::transaction::{process_transactions, sign_input, Address, TransactionOutput};

    fn funded_utxos(key: &PrivateKey, amount: u64) -> (UtxoSet, Hash) {
        let address = Address::from(key.public_key());
        let coinbase = Transaction::coinbase(address, 1, Amount::from_whole(amount));
        let utxos = process_transactions(&[coinbase.clone()], &UtxoSet::new(), 1).unwrap();
        (utxos, coinbase.id)
    }

    #[test]
    fn accepts_well_formed_transaction() {
        let key = PrivateKey::new_key();
        let receiver = PrivateKey::new_key().public_key();
        let (utxos, coinbase_id) = funded_utxos(&key, 50);

        let input = sign_input(coinbase_id, 0, &key);
        let tx = Transaction::new(
            vec![input],
            vec![TransactionOutput {
                to_address: Address::from(receiver),
                amount: Amount::from_whole(40),
            }],
        );

        let mut pool = TransactionPool::new();
        pool.add_transaction(tx, &utxos).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn higher_fee_transaction_replaces_conflicting_one() {
        let key = PrivateKey::new_key();
        let receiver = PrivateKey::new_key().public_key();
        let (utxos, coinbase_id) = funded_utxos(&key, 50);

        let low_fee = Transaction::new(
            vec![sign_input(coinbase_id, 0, &key)],
            vec![TransactionOutput {
                to_address: Address::from(receiver),
                amount: Amount::from_whole(49),
            }],
        );
        let high_fee = Transaction::new(
            vec![sign_input(coinbase_id, 0, &key)],
            vec![TransactionOutput {
                to_address: Address::from(receiver),
                amount: Amount::from_whole(30),
            }],
        );

        let mut pool = TransactionPool::new();
        pool.add_transaction(low_fee, &utxos).unwrap();
        pool.add_transaction(high_fee.clone(), &utxos).unwrap();

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.transactions()[0].id, high_fee.id);
    }

    #[test]
    fn rejects_transaction_with_unknown_utxo() {
        let key = PrivateKey::new_key();
        let receiver = PrivateKey::new_key().public_key();
        let unknown = Hash::hash_bytes(b"nonexistent");
        let tx = Transaction::new(
            vec![sign_input(unknown, 0, &key)],
            vec![TransactionOutput {
                to_address: Address::from(receiver),
                amount: Amount::from_whole(1),
            }],
        );
        let mut pool = TransactionPool::new();
        assert!(pool.add_transaction(tx, &UtxoSet::new()).is_err());
    }

    #[test]
    fn update_drops_mined_transactions() {
        let key = PrivateKey::new_key();
        let receiver = PrivateKey::new_key().public_key();
        let (utxos, coinbase_id) = funded_utxos(&key, 50);
        let tx = Transaction::new(
            vec![sign_input(coinbase_id, 0, &key)],
            vec![TransactionOutput {
                to_address: Address::from(receiver),
                amount: Amount::from_whole(40),
            }],
        );

        let mut pool = TransactionPool::new();
        pool.add_transaction(tx.clone(), &utxos).unwrap();
        let next_utxos = process_transactions(&[tx.clone()], &utxos, 0).unwrap();
        pool.update(&[tx], &next_utxos);
        assert!(pool.is_empty());
    }
}
