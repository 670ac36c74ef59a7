//! Tagged SHA3-256 merkle trees and the coinbase witness commitment.
//!
//! Domain separation: txid-tree leaves hash as `SHA3(0x00 ‖ txid)` and
//! inner nodes as `SHA3(0x01 ‖ left ‖ right)`; the witness tree over
//! wtxids uses `0x02`/`0x03`. A lone node at an odd level is promoted
//! unchanged, with no Bitcoin-style duplication, so CVE-2012-2459-shaped
//! mutations cannot produce a colliding root.
//!
//! The block commits to its witness data through a coinbase ANCHOR
//! output carrying `SHA3("RUBIN-WITNESS/" ‖ witness_merkle_root)`, with
//! the coinbase's own wtxid pinned to zero in the tree (the commitment
//! cannot contain itself).

use crate::crypto::CryptoProvider;
use crate::error::{ConsensusError, ErrorCode};

const TXID_LEAF_TAG: u8 = 0x00;
const TXID_NODE_TAG: u8 = 0x01;
const WITNESS_LEAF_TAG: u8 = 0x02;
const WITNESS_NODE_TAG: u8 = 0x03;

/// Domain tag for the coinbase witness commitment hash.
pub const WITNESS_COMMITMENT_TAG: &[u8] = b"RUBIN-WITNESS/";

fn tagged_root(
    provider: &dyn CryptoProvider,
    leaves: &[[u8; 32]],
    leaf_tag: u8,
    node_tag: u8,
) -> Result<[u8; 32], ConsensusError> {
    if leaves.is_empty() {
        return Err(ConsensusError::new(
            ErrorCode::BlockMerkleInvalid,
            "merkle root of empty list",
        ));
    }

    let mut leaf_preimage = [0u8; 1 + 32];
    leaf_preimage[0] = leaf_tag;
    let mut level: Vec<[u8; 32]> = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        leaf_preimage[1..].copy_from_slice(leaf);
        level.push(provider.sha3_256(&leaf_preimage));
    }

    let mut node_preimage = [0u8; 1 + 32 + 32];
    node_preimage[0] = node_tag;
    while level.len() > 1 {
        let mut next: Vec<[u8; 32]> = Vec::with_capacity(level.len().div_ceil(2));
        let mut i = 0;
        while i < level.len() {
            if i + 1 == level.len() {
                // Odd promotion rule: carry the lone node up unchanged.
                next.push(level[i]);
                i += 1;
                continue;
            }
            node_preimage[1..33].copy_from_slice(&level[i]);
            node_preimage[33..].copy_from_slice(&level[i + 1]);
            next.push(provider.sha3_256(&node_preimage));
            i += 2;
        }
        level = next;
    }

    Ok(level[0])
}

/// Merkle root over transaction ids.
pub fn merkle_root_txids(
    provider: &dyn CryptoProvider,
    txids: &[[u8; 32]],
) -> Result<[u8; 32], ConsensusError> {
    tagged_root(provider, txids, TXID_LEAF_TAG, TXID_NODE_TAG)
}

/// Merkle root over witness transaction ids.
///
/// The caller supplies the wtxid list with the coinbase slot already
/// zeroed (see [`crate::types::Tx::wtxid`] and the block validator).
pub fn witness_merkle_root_wtxids(
    provider: &dyn CryptoProvider,
    wtxids: &[[u8; 32]],
) -> Result<[u8; 32], ConsensusError> {
    tagged_root(provider, wtxids, WITNESS_LEAF_TAG, WITNESS_NODE_TAG)
}

/// The 32-byte value a coinbase ANCHOR output must carry.
pub fn witness_commitment_hash(
    provider: &dyn CryptoProvider,
    witness_root: [u8; 32],
) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(WITNESS_COMMITMENT_TAG.len() + 32);
    preimage.extend_from_slice(WITNESS_COMMITMENT_TAG);
    preimage.extend_from_slice(&witness_root);
    provider.sha3_256(&preimage)
}
