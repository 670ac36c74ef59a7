//! Per-transaction application against a working UTXO view.
//!
//! Checks run in a fixed order so every implementation reports the same
//! code for the same input: parse-level shape, then structural input
//! checks, then UTXO lookup, then authorization. The working map is
//! mutated as the transaction validates; callers own the map and
//! discard it wholesale on any error (block application is
//! all-or-nothing at the chainstate layer).

use std::collections::{HashMap, HashSet};

use rubin_core::arith::{add_u64_to_u128, u128_to_u64};
use rubin_core::constants::{
    COV_TYPE_ANCHOR, COV_TYPE_DA_COMMIT, COV_TYPE_EXT, COV_TYPE_HTLC, COV_TYPE_HTLC_V2,
    COV_TYPE_MULTISIG, COV_TYPE_P2PK, COV_TYPE_TIMELOCK_V1, COV_TYPE_VAULT, COINBASE_MATURITY,
    MAX_TX_SEQUENCE,
};
use rubin_core::covenant::{
    self, hash_in_sorted, output_descriptor_hash, parse_multisig, parse_vault, witness_slots,
};
use rubin_core::crypto::CryptoProvider;
use rubin_core::error::{ConsensusError, ErrorCode};
use rubin_core::sighash::sighash_v1_digest;
use rubin_core::types::{Outpoint, Tx, UtxoEntry, WitnessItem};

use crate::params::ValidationParams;
use crate::spend;

/// Result of applying one non-coinbase transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxApplySummary {
    /// `sum_in - sum_out`, narrowed to u64.
    pub fee: u64,
}

/// Deferred CORE_VAULT context: the threshold check runs only after the
/// owner-authorization and fee-sponsorship rules have been settled.
struct VaultSpend {
    owner_lock_id: [u8; 32],
    threshold: u8,
    keys: Vec<[u8; 32]>,
    whitelist: Vec<[u8; 32]>,
    witness: Vec<WitnessItem>,
    digest: [u8; 32],
    sum_in_vault: u128,
}

/// Validate a non-coinbase transaction and apply it to `utxos`.
///
/// On success the spent outpoints are gone from the map and every
/// UTXO-creating output is present. On error the map may hold a partial
/// update; the block-level caller works on a private copy and throws it
/// away.
#[allow(clippy::too_many_arguments)]
pub fn apply_non_coinbase_tx(
    provider: &dyn CryptoProvider,
    params: &ValidationParams,
    tx: &Tx,
    txid: [u8; 32],
    utxos: &mut HashMap<Outpoint, UtxoEntry>,
    height: u64,
    block_mtp: u64,
) -> Result<TxApplySummary, ConsensusError> {
    if tx.inputs.is_empty() {
        return Err(ConsensusError::parse(
            "non-coinbase must have at least one input",
        ));
    }
    if tx.tx_nonce == 0 {
        return Err(ConsensusError::new(
            ErrorCode::TxNonceInvalid,
            "non-coinbase tx_nonce must be non-zero",
        ));
    }

    covenant::validate_tx_covenants(tx, height, params.htlc_v2_active)?;

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    let mut sum_in = 0u128;
    let mut witness_cursor = 0usize;
    let mut input_lock_ids = Vec::with_capacity(tx.inputs.len());
    let mut input_cov_types = Vec::with_capacity(tx.inputs.len());
    let mut vault: Option<VaultSpend> = None;

    for (input_index, input) in tx.inputs.iter().enumerate() {
        if !input.script_sig.is_empty() {
            return Err(ConsensusError::parse(
                "script_sig must be empty under genesis rules",
            ));
        }
        if input.sequence > MAX_TX_SEQUENCE {
            return Err(ConsensusError::new(
                ErrorCode::TxSequenceInvalid,
                "sequence above non-coinbase bound",
            ));
        }
        let outpoint = input.outpoint();
        if outpoint.is_coinbase_sentinel() {
            return Err(ConsensusError::parse(
                "coinbase sentinel outpoint in non-coinbase",
            ));
        }
        if !seen.insert(outpoint.clone()) {
            return Err(ConsensusError::parse("duplicate input outpoint"));
        }

        let entry = utxos
            .get(&outpoint)
            .cloned()
            .ok_or(ConsensusError::new(ErrorCode::TxMissingUtxo, "utxo not found"))?;
        if entry.covenant_type == COV_TYPE_ANCHOR || entry.covenant_type == COV_TYPE_DA_COMMIT {
            return Err(ConsensusError::new(
                ErrorCode::TxMissingUtxo,
                "covenant is never spendable",
            ));
        }
        if !entry.is_mature(height, COINBASE_MATURITY) {
            return Err(ConsensusError::new(
                ErrorCode::TxCoinbaseImmature,
                "coinbase output not yet mature",
            ));
        }

        let digest = sighash_v1_digest(provider, &params.chain_id, tx, input_index as u32, entry.value)?;

        let slots = witness_slots(entry.covenant_type, &entry.covenant_data)?;
        if witness_cursor + slots > tx.witness.len() {
            return Err(ConsensusError::parse("witness slot underflow"));
        }
        let assigned = &tx.witness[witness_cursor..witness_cursor + slots];
        witness_cursor += slots;

        match entry.covenant_type {
            COV_TYPE_P2PK => {
                spend::validate_p2pk_spend(provider, &entry, &assigned[0], &digest, height)?;
            }
            COV_TYPE_TIMELOCK_V1 => {
                spend::validate_timelock_spend(&entry, &assigned[0], height, block_mtp)?;
            }
            COV_TYPE_MULTISIG => {
                let cov = parse_multisig(&entry.covenant_data)?;
                spend::validate_threshold_spend(
                    provider,
                    &cov.keys,
                    cov.threshold,
                    assigned,
                    &digest,
                    height,
                    "MULTISIG spend",
                )?;
            }
            COV_TYPE_VAULT => {
                if vault.is_some() {
                    return Err(ConsensusError::new(
                        ErrorCode::TxVaultMultiInputForbidden,
                        "multiple vault inputs forbidden",
                    ));
                }
                let cov = parse_vault(&entry.covenant_data)?;
                vault = Some(VaultSpend {
                    owner_lock_id: cov.owner_lock_id,
                    threshold: cov.threshold,
                    keys: cov.keys,
                    whitelist: cov.whitelist,
                    witness: assigned.to_vec(),
                    digest,
                    sum_in_vault: entry.value as u128,
                });
            }
            COV_TYPE_HTLC => {
                spend::validate_htlc_spend(
                    provider,
                    &entry,
                    &assigned[0],
                    &assigned[1],
                    &digest,
                    height,
                    block_mtp,
                )?;
            }
            COV_TYPE_HTLC_V2 => {
                spend::validate_htlc_v2_spend(
                    provider,
                    &entry,
                    tx,
                    &assigned[0],
                    &digest,
                    height,
                    block_mtp,
                )?;
            }
            COV_TYPE_EXT => {
                spend::validate_ext_spend(provider, params, &entry, &assigned[0], &digest, height)?;
            }
            _ => {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "unknown covenant in utxo set",
                ));
            }
        }

        input_lock_ids.push(output_descriptor_hash(
            provider,
            entry.covenant_type,
            &entry.covenant_data,
        ));
        input_cov_types.push(entry.covenant_type);

        sum_in = add_u64_to_u128(sum_in, entry.value)?;
        utxos.remove(&outpoint);
    }

    if witness_cursor != tx.witness.len() {
        return Err(ConsensusError::parse("unconsumed witness items"));
    }

    let mut sum_out = 0u128;
    let mut creates_vault = false;
    for (vout, output) in tx.outputs.iter().enumerate() {
        sum_out = add_u64_to_u128(sum_out, output.value)?;
        if output.covenant_type == COV_TYPE_VAULT {
            creates_vault = true;
        }
        if !output.creates_utxo() {
            continue;
        }
        utxos.insert(
            Outpoint {
                txid,
                vout: vout as u32,
            },
            UtxoEntry {
                value: output.value,
                covenant_type: output.covenant_type,
                covenant_data: output.covenant_data.clone(),
                creation_height: height,
                created_by_coinbase: false,
            },
        );
    }

    // Creating a vault demands an owner-authorized P2PK or MULTISIG
    // input matching the new vault's owner descriptor.
    if creates_vault {
        for output in &tx.outputs {
            if output.covenant_type != COV_TYPE_VAULT {
                continue;
            }
            let owner_lock_id = parse_vault(&output.covenant_data)?.owner_lock_id;
            let authorized = input_lock_ids
                .iter()
                .zip(&input_cov_types)
                .any(|(lock_id, cov_type)| {
                    *lock_id == owner_lock_id
                        && (*cov_type == COV_TYPE_P2PK || *cov_type == COV_TYPE_MULTISIG)
                });
            if !authorized {
                return Err(ConsensusError::new(
                    ErrorCode::TxVaultOwnerAuthRequired,
                    "vault creation lacks owner-authorized input",
                ));
            }
        }
    }

    if let Some(v) = &vault {
        // Owner binding: some input must spend the owner descriptor.
        if !input_lock_ids.contains(&v.owner_lock_id) {
            return Err(ConsensusError::new(
                ErrorCode::TxVaultOwnerAuthRequired,
                "vault spend lacks owner-authorized input",
            ));
        }
        // No external fee sponsors: every non-vault input belongs to
        // the same owner descriptor.
        for (lock_id, cov_type) in input_lock_ids.iter().zip(&input_cov_types) {
            if *cov_type == COV_TYPE_VAULT {
                continue;
            }
            if *lock_id != v.owner_lock_id {
                return Err(ConsensusError::new(
                    ErrorCode::TxVaultFeeSponsorForbidden,
                    "non-owner input in vault spend",
                ));
            }
        }

        spend::validate_threshold_spend(
            provider,
            &v.keys,
            v.threshold,
            &v.witness,
            &v.digest,
            height,
            "VAULT spend",
        )?;

        // Destinations: no new vaults, and every output descriptor must
        // sit in the whitelist.
        for output in &tx.outputs {
            if output.covenant_type == COV_TYPE_VAULT {
                return Err(ConsensusError::new(
                    ErrorCode::TxVaultOutputNotWhitelisted,
                    "vault spend may not create a vault",
                ));
            }
            let desc = output_descriptor_hash(provider, output.covenant_type, &output.covenant_data);
            if !hash_in_sorted(&v.whitelist, &desc) {
                return Err(ConsensusError::new(
                    ErrorCode::TxVaultOutputNotWhitelisted,
                    "output not in vault whitelist",
                ));
            }
        }
    }

    if sum_out > sum_in {
        return Err(ConsensusError::new(
            ErrorCode::TxValueConservation,
            "outputs exceed inputs",
        ));
    }
    if let Some(v) = &vault {
        // The vault's value may move only to whitelisted outputs, never
        // to the miner.
        if sum_out < v.sum_in_vault {
            return Err(ConsensusError::new(
                ErrorCode::TxValueConservation,
                "vault value would fund the fee",
            ));
        }
    }

    let fee = u128_to_u64(sum_in - sum_out)?;
    Ok(TxApplySummary { fee })
}
