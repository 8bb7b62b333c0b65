//! Output script decoding
//!
//! Turns a `scriptPubKey` into the set of addresses that can spend it. Raw
//! transactions fetched over RPC carry only the script, so every output is
//! completed through [`decode_addresses`] before it is rendered.

pub mod address;
pub mod error;

pub use address::decode_addresses;
pub use error::{DecodeError, DecodeResult};
