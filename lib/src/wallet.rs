//! A single-keypair wallet: balance lookup and transaction construction via
//! greedy coin selection, grounded in the teacher wallet's
//! `Core::create_transaction`/`get_balance`, adapted from the teacher's
//! multi-key `SkipMap<PublicKey, _>` store down to the one keypair the
//! specification's `Wallet` collaborator names, and from raw `u64` satoshis
//! onto [`Amount`].

use crate::crypto::{PrivateKey, PublicKey};
use crate::error::{ChainError, Result};
use crate::types::transaction::{sign_input, Address, Amount, Transaction, TransactionOutput, UtxoSet};

pub struct Wallet {
    private_key: PrivateKey,
}

impl Wallet {
    pub fn new(private_key: PrivateKey) -> Self {
        Wallet { private_key }
    }

    pub fn generate() -> Self {
        Wallet::new(PrivateKey::new_key())
    }

    pub fn get_public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }

    pub fn get_address(&self) -> Address {
        Address::from(self.get_public_key())
    }

    /// The sum of every UTXO in `utxos` this wallet's address owns.
    pub fn get_balance(&self, utxos: &UtxoSet) -> Amount {
        let address = self.get_address();
        utxos
            .values()
            .filter(|output| output.to_address == address)
            .map(|output| output.amount.clone())
            .sum()
    }

    /// Builds and signs a transaction paying `amount` to `recipient`, using a
    /// greedy coin-selection pass over this wallet's own UTXOs, with any
    /// excess returned to this wallet as a change output.
    pub fn create_transaction(
        &self,
        recipient: Address,
        amount: Amount,
        utxos: &UtxoSet,
    ) -> Result<Transaction> {
        if amount.is_zero() {
            return Err(ChainError::bad_request("amount must be greater than zero"));
        }
        let address = self.get_address();

        let mut inputs = Vec::new();
        let mut input_sum = Amount::zero();
        for (&(prev_transaction_id, prev_output_index), output) in utxos.iter() {
            if input_sum >= amount {
                break;
            }
            if output.to_address != address {
                continue;
            }
            inputs.push(sign_input(prev_transaction_id, prev_output_index, &self.private_key));
            input_sum = input_sum + output.amount.clone();
        }

        if input_sum < amount {
            return Err(ChainError::bad_request("insufficient funds"));
        }

        let mut outputs = vec![TransactionOutput {
            to_address: recipient,
            amount: amount.clone(),
        }];
        if input_sum > amount {
            outputs.push(TransactionOutput {
                to_address: address,
                amount: Amount(input_sum.0 - amount.0),
            });
        }

        Ok(Transaction::new(inputs, outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::process_transactions;

    #[test]
    fn balance_sums_owned_outputs() {
        let wallet = Wallet::generate();
        let coinbase = Transaction::coinbase(wallet.get_address(), 1, Amount::from_whole(50));
        let utxos = process_transactions(&[coinbase], &UtxoSet::new(), 1).unwrap();
        assert_eq!(wallet.get_balance(&utxos), Amount::from_whole(50));
    }

    #[test]
    fn create_transaction_produces_change_output() {
        let wallet = Wallet::generate();
        let receiver = Wallet::generate();
        let coinbase = Transaction::coinbase(wallet.get_address(), 1, Amount::from_whole(50));
        let utxos = process_transactions(&[coinbase], &UtxoSet::new(), 1).unwrap();

        let tx = wallet
            .create_transaction(receiver.get_address(), Amount::from_whole(20), &utxos)
            .unwrap();
        assert_eq!(tx.outputs.len(), 2);
        let reward = Transaction::coinbase(wallet.get_address(), 2, Amount::from_whole(1));
        let next = process_transactions(&[reward, tx], &utxos, 2).unwrap();
        assert_eq!(receiver.get_balance(&next), Amount::from_whole(20));
        assert_eq!(wallet.get_balance(&next), Amount::from_whole(31));
    }

    #[test]
    fn rejects_insufficient_funds() {
        let wallet = Wallet::generate();
        let receiver = Wallet::generate();
        let coinbase = Transaction::coinbase(wallet.get_address(), 1, Amount::from_whole(5));
        let utxos = process_transactions(&[coinbase], &UtxoSet::new(), 1).unwrap();

        assert!(wallet
            .create_transaction(receiver.get_address(), Amount::from_whole(20), &utxos)
            .is_err());
    }
}
