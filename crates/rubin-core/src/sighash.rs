//! Canonical signature-hash construction.
//!
//! The digest binds a signature to one input of one transaction on one
//! chain: the preimage carries the chain id, the transaction core
//! (including a hash of the DA-core fields), hashes of all prevouts,
//! sequences and outputs, and the spent input's identity and value.
//! Committing to the input value means a signer cannot be tricked about
//! what it is spending even when shown only the digest.

use crate::crypto::CryptoProvider;
use crate::error::ConsensusError;
use crate::types::Tx;

/// Domain tag for the v1 sighash.
pub const SIGHASH_TAG: &[u8] = b"RUBINv1-sighash/";

/// Compute the 32-byte v1 signature hash for `input_index`.
pub fn sighash_v1_digest(
    provider: &dyn CryptoProvider,
    chain_id: &[u8; 32],
    tx: &Tx,
    input_index: u32,
    input_value: u64,
) -> Result<[u8; 32], ConsensusError> {
    let index = input_index as usize;
    if index >= tx.inputs.len() {
        return Err(ConsensusError::parse("sighash input_index out of range"));
    }

    let hash_of_da_core = provider.sha3_256(&tx.da_core_bytes()?);

    let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
    for input in &tx.inputs {
        prevouts.extend_from_slice(&input.prev_txid);
        prevouts.extend_from_slice(&input.prev_vout.to_le_bytes());
    }
    let hash_of_prevouts = provider.sha3_256(&prevouts);

    let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
    for input in &tx.inputs {
        sequences.extend_from_slice(&input.sequence.to_le_bytes());
    }
    let hash_of_sequences = provider.sha3_256(&sequences);

    let mut outputs = Vec::new();
    for output in &tx.outputs {
        outputs.extend_from_slice(&output.wire_bytes());
    }
    let hash_of_outputs = provider.sha3_256(&outputs);

    let input = &tx.inputs[index];
    let mut preimage = Vec::with_capacity(SIGHASH_TAG.len() + 32 * 5 + 64);
    preimage.extend_from_slice(SIGHASH_TAG);
    preimage.extend_from_slice(chain_id);
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.push(tx.tx_kind);
    preimage.extend_from_slice(&tx.tx_nonce.to_le_bytes());
    preimage.extend_from_slice(&hash_of_da_core);
    preimage.extend_from_slice(&hash_of_prevouts);
    preimage.extend_from_slice(&hash_of_sequences);
    preimage.extend_from_slice(&input_index.to_le_bytes());
    preimage.extend_from_slice(&input.prev_txid);
    preimage.extend_from_slice(&input.prev_vout.to_le_bytes());
    preimage.extend_from_slice(&input_value.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&hash_of_outputs);
    preimage.extend_from_slice(&tx.locktime.to_le_bytes());

    Ok(provider.sha3_256(&preimage))
}
