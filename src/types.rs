//! Transaction detail as seen by the analyser
//!
//! - `TransactionDetail`: decoded transaction with inputs reduced to the output
//!   they spend and outputs carrying a lazily-derived address set
//! - `InputDetail`: coinbase or an output reference
//! - `OutputDetail`: value, script and address set

use bitcoin::{Amount, Network, OutPoint, ScriptBuf, Transaction, Txid};

use crate::decoder::{decode_addresses, DecodeResult};

/// Full detail of a ledger transaction. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetail {
    pub txid: Txid,
    pub inputs: Vec<InputDetail>,
    pub outputs: Vec<OutputDetail>,
}

/// What a transaction input spends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDetail {
    /// Newly issued value, no prior output
    Coinbase,
    /// Output reference (txid, vout) of a prior transaction
    Spend(OutPoint),
}

/// A transaction output with its (possibly not yet derived) address set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDetail {
    pub value: Amount,
    pub script_pubkey: ScriptBuf,
    /// Empty until derived from `script_pubkey`, unless the source supplied it
    pub addresses: Vec<String>,
}

impl TransactionDetail {
    /// Whether any input issues new value
    pub fn is_coinbase(&self) -> bool {
        self.inputs
            .iter()
            .any(|input| matches!(input, InputDetail::Coinbase))
    }

    pub fn output(&self, vout: u32) -> Option<&OutputDetail> {
        self.outputs.get(vout as usize)
    }
}

impl From<&Transaction> for TransactionDetail {
    fn from(transaction: &Transaction) -> Self {
        let coinbase = transaction.is_coinbase();
        let inputs = transaction
            .input
            .iter()
            .map(|input| {
                if coinbase {
                    InputDetail::Coinbase
                } else {
                    InputDetail::Spend(input.previous_output)
                }
            })
            .collect();
        let outputs = transaction
            .output
            .iter()
            .map(|output| OutputDetail::new(output.value, output.script_pubkey.clone()))
            .collect();

        Self {
            txid: transaction.compute_txid(),
            inputs,
            outputs,
        }
    }
}

impl OutputDetail {
    /// Output whose addresses still have to be derived from the script
    pub fn new(value: Amount, script_pubkey: ScriptBuf) -> Self {
        Self {
            value,
            script_pubkey,
            addresses: Vec::new(),
        }
    }

    /// Derive the address set from the script if it is missing.
    ///
    /// A no-op when addresses are already present, so calling it repeatedly
    /// always leaves the same set behind.
    pub fn complete_addresses(&mut self, network: Network) -> DecodeResult<&[String]> {
        if self.addresses.is_empty() {
            self.addresses = decode_addresses(&self.script_pubkey, network)?;
        }
        Ok(&self.addresses)
    }
}
