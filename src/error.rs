//! Failures that make a proposal unprocessable.
//!
//! Transport and RPC failures are not listed here, they travel as
//! `anyhow::Error` straight from the node client.

use thiserror::Error;
use web3::types::U256;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Could not decode transaction {index} to {destination}: {reason}")]
    Decode {
        index: usize,
        destination: String,
        reason: String,
    },

    #[error("Transaction {index} calls {function} with {expected} parameters but {decoded} were decoded")]
    ParamCount {
        index: usize,
        function: String,
        expected: usize,
        decoded: usize,
    },

    #[error("Proposal {id} lists {expected} transactions but {decoded} were decoded")]
    TransactionCount {
        id: U256,
        expected: u64,
        decoded: usize,
    },

    #[error("Proposal {0} not found")]
    NotFound(U256),
}
