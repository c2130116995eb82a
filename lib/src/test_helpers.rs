//! Shared test helper functions for unit tests
//!
//! This module provides reusable test utilities to avoid duplication
//! across test modules in the codebase.

use crate::crypto::PrivateKey;
use crate::sha256::Hash;
use crate::types::transaction::{sign_input, Address, Amount, TransactionInput, TransactionOutput};

/// Create a test transaction output paying `amount` to `private_key`'s address.
pub fn create_test_output(amount: u64, private_key: &PrivateKey) -> TransactionOutput {
    TransactionOutput {
        to_address: Address::from(private_key.public_key()),
        amount: Amount::from_whole(amount),
    }
}

/// Create a test transaction input spending `(prev_transaction_id, prev_output_index)`,
/// signed by `private_key`.
pub fn create_test_input(
    prev_transaction_id: Hash,
    prev_output_index: u32,
    private_key: &PrivateKey,
) -> TransactionInput {
    sign_input(prev_transaction_id, prev_output_index, private_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::types::transaction::output_reference_hash;

    #[test]
    fn test_create_test_output() {
        let private_key = PrivateKey::new_key();
        let output = create_test_output(100, &private_key);

        assert_eq!(output.amount, Amount::from_whole(100));
        assert_eq!(output.to_address, Address::from(private_key.public_key()));
    }

    #[test]
    fn test_create_test_input() {
        let private_key = PrivateKey::new_key();
        let prev_id = Hash::hash_bytes(b"prior transaction");
        let input = create_test_input(prev_id, 0, &private_key);

        assert_eq!(input.prev_transaction_id, prev_id);
        let digest = output_reference_hash(&prev_id, 0);
        assert!(input.signature.verify(&digest, &private_key.public_key()));
    }
}
