pub mod block;
pub mod blockchain;
pub mod transaction;

pub use block::{Block, BlockRaw};
pub use blockchain::{block_reward, Blockchain};
pub use transaction::{
    process_transactions, sign_input, Address, Amount, Transaction, TransactionInput,
    TransactionOutput, UtxoSet,
};
