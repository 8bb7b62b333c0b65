use bitcoin::script::Instruction;
use bitcoin::{Address, Network, PublicKey, Script};

use tracing::debug;

use super::error::{DecodeError, DecodeResult};

/// Derive the addresses able to spend `script` on `network`.
///
/// - Standard templates (P2PKH, P2SH, P2WPKH, P2WSH, P2TR) yield their single address.
/// - P2PK and bare multisig yield the P2PKH address of each public key, in script order.
///   Pushes that are not valid keys (data-carrying outputs) are skipped.
/// - Null-data and non-standard scripts yield an empty set.
///
/// Pure: the same script always decodes to the same set.
pub fn decode_addresses(script: &Script, network: Network) -> DecodeResult<Vec<String>> {
    if let Ok(address) = Address::from_script(script, network) {
        return Ok(vec![address.to_string()]);
    }

    if script.is_p2pk() || script.is_multisig() {
        return pubkey_addresses(script, network);
    }

    Ok(Vec::new())
}

fn pubkey_addresses(script: &Script, network: Network) -> DecodeResult<Vec<String>> {
    let mut addresses = Vec::new();

    for instruction in script.instructions() {
        let instruction = instruction.map_err(|e| DecodeError::MalformedScript {
            script_hex: hex::encode(script.as_bytes()),
            reason: e.to_string(),
        })?;

        // m/n and OP_CHECKSIG/OP_CHECKMULTISIG are opcodes, keys are the only pushes
        if let Instruction::PushBytes(bytes) = instruction {
            match PublicKey::from_slice(bytes.as_bytes()) {
                Ok(key) => addresses.push(Address::p2pkh(key.pubkey_hash(), network).to_string()),
                Err(e) => debug!("Skipping invalid public key {}: {}", hex::encode(bytes.as_bytes()), e),
            }
        }
    }

    Ok(addresses)
}
