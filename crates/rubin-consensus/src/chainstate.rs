//! In-memory chainstate transition.
//!
//! [`connect_block_in_memory`] runs the stateless block checks, applies
//! every non-coinbase transaction to a private working copy of the UTXO
//! map, enforces the subsidy bound with the fees it just computed, and
//! only then swaps the working copy into the caller's state. On any
//! error the caller's state is bitwise untouched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rubin_core::arith::add_u64;
use rubin_core::codec::write_compact_size;
use rubin_core::crypto::CryptoProvider;
use rubin_core::error::{ConsensusError, ErrorCode};
use rubin_core::types::{Outpoint, UtxoEntry};
use rubin_core::wire::parse_block;

use crate::block::{check_subsidy_bound, validate_parsed_block};
use crate::params::ValidationParams;
use crate::pow::median_time_past;
use crate::subsidy::block_subsidy;
use crate::tx_apply::apply_non_coinbase_tx;

/// Domain tag for the canonical UTXO-set hash.
pub const UTXO_SET_HASH_TAG: &[u8] = b"RUBINv1-utxo-set-hash/";

/// The validator's view of chain state: the UTXO set plus the
/// cumulative subsidy issued so far (fees excluded).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryChainState {
    pub utxos: HashMap<Outpoint, UtxoEntry>,
    pub already_generated: u64,
}

/// Summary of a successfully connected block.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConnectBlockSummary {
    pub block_hash: [u8; 32],
    pub tx_count: u64,
    pub sum_fees: u64,
    /// `already_generated` after this block.
    pub already_generated: u64,
    pub utxo_count: u64,
}

/// Validate `block_bytes` against `state` and, on success, advance the
/// state. All-or-nothing: a rejected block leaves `state` untouched.
#[allow(clippy::too_many_arguments)]
pub fn connect_block_in_memory(
    provider: &dyn CryptoProvider,
    params: &ValidationParams,
    block_bytes: &[u8],
    expected_prev: Option<[u8; 32]>,
    expected_target: Option<[u8; 32]>,
    height: u64,
    prev_timestamps: Option<&[u64]>,
    state: &mut InMemoryChainState,
) -> Result<ConnectBlockSummary, ConsensusError> {
    let pb = parse_block(provider, block_bytes)?;
    let summary = validate_parsed_block(
        provider,
        params,
        &pb,
        expected_prev,
        expected_target,
        height,
        prev_timestamps,
    )?;
    debug!(height, txs = pb.tx_count, "block passed stateless checks");

    let block_mtp =
        median_time_past(height, prev_timestamps)?.unwrap_or(pb.header.timestamp);

    let mut working = state.utxos.clone();
    let mut sum_fees = 0u64;
    for i in 1..pb.txs.len() {
        let tx_summary = apply_non_coinbase_tx(
            provider,
            params,
            &pb.txs[i],
            pb.txids[i],
            &mut working,
            height,
            block_mtp,
        )?;
        sum_fees = add_u64(sum_fees, tx_summary.fee)
            .map_err(|_| ConsensusError::new(ErrorCode::BlockParse, "fee sum overflow"))?;
    }

    check_subsidy_bound(&pb, height, state.already_generated, sum_fees)?;

    // Coinbase outputs enter the set last, flagged for maturity.
    let coinbase_txid = pb.txids[0];
    for (vout, output) in pb.txs[0].outputs.iter().enumerate() {
        if !output.creates_utxo() {
            continue;
        }
        working.insert(
            Outpoint {
                txid: coinbase_txid,
                vout: vout as u32,
            },
            UtxoEntry {
                value: output.value,
                covenant_type: output.covenant_type,
                covenant_data: output.covenant_data.clone(),
                creation_height: height,
                created_by_coinbase: true,
            },
        );
    }

    let already_generated = if height == 0 {
        state.already_generated
    } else {
        state
            .already_generated
            .checked_add(block_subsidy(height, state.already_generated))
            .ok_or(ConsensusError::new(
                ErrorCode::BlockParse,
                "already_generated overflow",
            ))?
    };

    // Commit point: nothing past here can fail.
    state.utxos = working;
    state.already_generated = already_generated;

    info!(height, fees = sum_fees, utxos = state.utxos.len(), "connected block");
    Ok(ConnectBlockSummary {
        block_hash: summary.block_hash,
        tx_count: summary.tx_count,
        sum_fees,
        already_generated,
        utxo_count: state.utxos.len() as u64,
    })
}

/// Canonical UTXO-set hash for cross-client chainstate comparison.
///
/// Entries are folded in sorted-outpoint order so the hash is stable
/// under insertion-order differences between implementations.
pub fn utxo_set_hash(
    provider: &dyn CryptoProvider,
    utxos: &HashMap<Outpoint, UtxoEntry>,
) -> [u8; 32] {
    let mut items: Vec<([u8; 36], &UtxoEntry)> = Vec::with_capacity(utxos.len());
    for (outpoint, entry) in utxos {
        let mut key = [0u8; 36];
        key[0..32].copy_from_slice(&outpoint.txid);
        key[32..36].copy_from_slice(&outpoint.vout.to_le_bytes());
        items.push((key, entry));
    }
    items.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let mut buf = Vec::with_capacity(64 + items.len() * 64);
    buf.extend_from_slice(UTXO_SET_HASH_TAG);
    buf.extend_from_slice(&(items.len() as u64).to_le_bytes());
    for (key, entry) in items {
        buf.extend_from_slice(&key);
        buf.extend_from_slice(&entry.value.to_le_bytes());
        buf.extend_from_slice(&entry.covenant_type.to_le_bytes());
        write_compact_size(entry.covenant_data.len() as u64, &mut buf);
        buf.extend_from_slice(&entry.covenant_data);
        buf.extend_from_slice(&entry.creation_height.to_le_bytes());
        buf.push(entry.created_by_coinbase as u8);
    }
    provider.sha3_256(&buf)
}
