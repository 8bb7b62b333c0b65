//! Bitcoin Block Fee Analyser
//!
//! Breaks a block down per transaction: the address and value of every
//! spent output, every new output, and the resulting fee. Transactions are
//! analysed concurrently against a shared prior-transaction cache and
//! reported in block order.

pub mod analyser;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod errors;
pub mod rpc;
pub mod types;
pub mod utils;
