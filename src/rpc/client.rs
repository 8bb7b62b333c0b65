use crate::config::BitcoinRpcConfig;
use crate::errors::{RpcError, RpcResult};
use crate::rpc::BlockSource;
use crate::types::TransactionDetail;
use bitcoin::{Block, Transaction};
use corepc_client::bitcoin::{BlockHash, Txid};
use corepc_client::client_sync::{v28::Client, Auth};
use std::str::FromStr;
use tracing::{debug, info};

/// Bitcoin Core RPC client serving blocks and transactions to the analyser.
///
/// Calls are blocking; [`crate::rpc::Fetcher`] runs them on the blocking pool
/// with a timeout and retry policy.
pub struct BitcoinRpcClient {
    client: Client,
    url: String,
}

impl BitcoinRpcClient {
    /// Create the client. No request is made until the first call.
    pub fn new(config: &BitcoinRpcConfig) -> RpcResult<Self> {
        let auth = Auth::UserPass(config.username.clone(), config.password.clone());
        let client = Client::new_with_auth(&config.url, auth).map_err(|e| {
            RpcError::ConnectionFailed(format!("Failed to create Bitcoin RPC client: {}", e))
        })?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Create the client and verify the node answers
    pub fn connect(config: &BitcoinRpcConfig) -> RpcResult<Self> {
        let client = Self::new(config)?;
        let summary = client.test_connection().map_err(|e| {
            RpcError::ConnectionFailed(format!("Failed to connect to Bitcoin RPC - check URL, credentials, and that Bitcoin Core is running: {}", e))
        })?;
        info!("Bitcoin RPC connection established ({})", summary);
        Ok(client)
    }

    /// Call `getblockchaininfo` and describe the node's chain state
    pub fn test_connection(&self) -> RpcResult<String> {
        let info = self
            .client
            .get_blockchain_info()
            .map_err(|e| RpcError::CallFailed {
                method: "get_blockchain_info".to_string(),
                message: e.to_string(),
            })?;
        debug!(
            "Bitcoin Core connection test successful - chain: {}, blocks: {}",
            info.chain, info.blocks
        );
        Ok(format!("chain: {}, blocks: {}", info.chain, info.blocks))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl BlockSource for BitcoinRpcClient {
    fn fetch_block(&self, block_hash: &str) -> RpcResult<Vec<TransactionDetail>> {
        let hash = BlockHash::from_str(block_hash).map_err(|_| RpcError::InvalidBlockHash {
            hash: block_hash.to_string(),
        })?;

        let raw = self.client.get_block_verbose_zero(hash).map_err(|e| {
            let message = e.to_string();
            if message.contains("Block not found") {
                RpcError::BlockNotFound {
                    hash: block_hash.to_string(),
                }
            } else {
                RpcError::CallFailed {
                    method: "getblock".to_string(),
                    message,
                }
            }
        })?;

        let block: Block = decode_hex(&raw.0, "block")?;
        debug!(
            "Fetched block {} with {} transactions",
            block_hash,
            block.txdata.len()
        );
        Ok(block.txdata.iter().map(TransactionDetail::from).collect())
    }

    fn fetch_transaction(&self, txid: &str) -> RpcResult<TransactionDetail> {
        let tx_hash = Txid::from_str(txid).map_err(|_| RpcError::InvalidTxid {
            txid: txid.to_string(),
        })?;

        let raw = self.client.get_raw_transaction(tx_hash).map_err(|e| {
            let message = e.to_string();
            if message.contains("No such mempool or blockchain transaction")
                || message.contains("Invalid or non-wallet transaction id")
            {
                RpcError::TransactionNotFound {
                    txid: txid.to_string(),
                }
            } else {
                RpcError::CallFailed {
                    method: "get_raw_transaction".to_string(),
                    message,
                }
            }
        })?;

        let transaction: Transaction = decode_hex(&raw.0, "transaction")?;
        Ok(TransactionDetail::from(&transaction))
    }
}

/// Deserialise a consensus-encoded object from the hex the node returns
fn decode_hex<T: bitcoin::consensus::Decodable>(hex_str: &str, what: &str) -> RpcResult<T> {
    let bytes = hex::decode(hex_str).map_err(|e| {
        RpcError::DeserialisationFailed(format!("Failed to decode raw {} hex: {}", what, e))
    })?;
    bitcoin::consensus::deserialize(&bytes).map_err(|e| {
        RpcError::DeserialisationFailed(format!("Failed to deserialise raw {}: {}", what, e))
    })
}
