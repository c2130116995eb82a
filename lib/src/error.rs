//! Error types for the `chaincore` crate.
//!
//! The specification distinguishes three kinds of outcome:
//!
//! - **bad-request**: caller error surfaced to an API layer with a structured
//!   payload (invalid block shape, invalid address, invalid amount, a
//!   transaction the pool refuses). Never mutates state.
//! - **not-found**: a lookup miss, carrying the queried identifier.
//! - **validation-rejection**: an otherwise well-formed block or chain that
//!   fails a consensus check. These are normal protocol outcomes, not
//!   errors, and are returned as `bool`/`Option` rather than raised; the
//!   [`ChainError::InvalidTransaction`] variant below exists so the UTXO
//!   ledger has a `Result`-shaped way of describing *why* a candidate was
//!   rejected before the caller (`Blockchain::add_block`) folds that into a
//!   boolean outcome.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("bad request: {reason}")]
    BadRequest { reason: String },

    #[error("not found: {id}")]
    NotFound { id: String },

    #[error("invalid transaction: {reason}")]
    InvalidTransaction { reason: String },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    #[error("invalid private key: {reason}")]
    InvalidPrivateKey { reason: String },
}

impl ChainError {
    pub fn bad_request<S: Into<String>>(reason: S) -> Self {
        ChainError::BadRequest {
            reason: reason.into(),
        }
    }

    pub fn not_found<S: Into<String>>(id: S) -> Self {
        ChainError::NotFound { id: id.into() }
    }

    pub fn invalid_transaction<S: Into<String>>(reason: S) -> Self {
        ChainError::InvalidTransaction {
            reason: reason.into(),
        }
    }

}

pub type Result<T> = std::result::Result<T, ChainError>;
