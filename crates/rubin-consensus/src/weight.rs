//! Transaction weight and per-transaction resource stats.
//!
//! `weight = 4 * base + witness + da + sig_cost`: core bytes pay the
//! full rate, witness and DA bytes are discounted, and each canonical
//! post-quantum signature adds a flat verification cost so that
//! CPU-heavy blocks cannot hide behind small byte counts.

use rubin_core::arith::{add_u64, mul_u64};
use rubin_core::codec::compact_size_len;
use rubin_core::constants::{
    COV_TYPE_ANCHOR, COV_TYPE_DA_COMMIT, MAX_SLH_DSA_SIG_BYTES, ML_DSA_87_PUBKEY_BYTES,
    ML_DSA_87_SIG_BYTES, SLH_DSA_SHAKE_256F_PUBKEY_BYTES, SUITE_ID_ML_DSA_87,
    SUITE_ID_SLH_DSA_SHAKE_256F, TX_KIND_STANDARD, VERIFY_COST_ML_DSA_87,
    VERIFY_COST_SLH_DSA_SHAKE_256F, WITNESS_DISCOUNT_DIVISOR,
};
use rubin_core::error::ConsensusError;
use rubin_core::types::Tx;

/// Weight and byte stats for one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxStats {
    pub weight: u64,
    /// DA payload bytes (zero for standard transactions).
    pub da_bytes: u64,
    /// Covenant-data bytes of ANCHOR and DA_COMMIT outputs.
    pub anchor_bytes: u64,
}

/// Compute a transaction's weight and resource stats.
pub fn tx_weight_and_stats(tx: &Tx) -> Result<TxStats, ConsensusError> {
    let base_size = tx.core_bytes()?.len() as u64;
    let witness_size = tx.witness_bytes().len() as u64;

    let mut anchor_bytes = 0u64;
    for output in &tx.outputs {
        if output.covenant_type == COV_TYPE_ANCHOR || output.covenant_type == COV_TYPE_DA_COMMIT {
            anchor_bytes = add_u64(anchor_bytes, output.covenant_data.len() as u64)?;
        }
    }

    let mut ml_count = 0u64;
    let mut slh_count = 0u64;
    for item in &tx.witness {
        match item.suite_id {
            SUITE_ID_ML_DSA_87 => {
                if item.pubkey.len() == ML_DSA_87_PUBKEY_BYTES
                    && item.signature.len() == ML_DSA_87_SIG_BYTES
                {
                    ml_count += 1;
                }
            }
            SUITE_ID_SLH_DSA_SHAKE_256F => {
                if item.pubkey.len() == SLH_DSA_SHAKE_256F_PUBKEY_BYTES
                    && !item.signature.is_empty()
                    && item.signature.len() <= MAX_SLH_DSA_SIG_BYTES
                {
                    slh_count += 1;
                }
            }
            _ => {}
        }
    }
    let sig_cost = add_u64(
        mul_u64(ml_count, VERIFY_COST_ML_DSA_87)?,
        mul_u64(slh_count, VERIFY_COST_SLH_DSA_SHAKE_256F)?,
    )?;

    let da_len = tx.da_payload.len() as u64;
    let da_size = add_u64(compact_size_len(da_len), da_len)?;
    let da_bytes = if tx.tx_kind != TX_KIND_STANDARD {
        da_len
    } else {
        0
    };

    let weight = add_u64(
        add_u64(
            add_u64(mul_u64(WITNESS_DISCOUNT_DIVISOR, base_size)?, witness_size)?,
            da_size,
        )?,
        sig_cost,
    )?;

    Ok(TxStats {
        weight,
        da_bytes,
        anchor_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rubin_core::constants::{COV_TYPE_P2PK, SUITE_ID_SENTINEL};
    use rubin_core::types::{TxInput, TxOutput, WitnessItem};

    fn bare_tx() -> Tx {
        Tx {
            version: 1,
            tx_kind: 0,
            tx_nonce: 1,
            inputs: vec![],
            outputs: vec![],
            locktime: 0,
            da_commit: None,
            da_chunk: None,
            witness: vec![],
            da_payload: vec![],
        }
    }

    #[test]
    fn bare_tx_weight_is_four_times_core_plus_counts() {
        let tx = bare_tx();
        // core = version(4) + kind(1) + nonce(8) + counts(2) + locktime(4) = 19
        // witness section = 1 count byte, da section = 1 length byte.
        let stats = tx_weight_and_stats(&tx).unwrap();
        assert_eq!(stats.weight, 4 * 19 + 1 + 1);
        assert_eq!(stats.da_bytes, 0);
        assert_eq!(stats.anchor_bytes, 0);
    }

    #[test]
    fn witness_bytes_pay_single_rate() {
        let mut tx = bare_tx();
        tx.inputs.push(TxInput {
            prev_txid: [1u8; 32],
            prev_vout: 0,
            script_sig: vec![],
            sequence: 0,
        });
        let base_stats = tx_weight_and_stats(&tx).unwrap();

        tx.witness.push(WitnessItem {
            suite_id: SUITE_ID_SENTINEL,
            pubkey: vec![],
            signature: vec![],
        });
        let with_witness = tx_weight_and_stats(&tx).unwrap();
        // The sentinel item is 3 bytes (suite + two zero lengths) at the
        // undiscounted rate; sentinel items carry no sig cost.
        assert_eq!(with_witness.weight, base_stats.weight + 3);
    }

    #[test]
    fn canonical_ml_dsa_item_adds_verify_cost() {
        let mut tx = bare_tx();
        tx.witness.push(WitnessItem {
            suite_id: SUITE_ID_ML_DSA_87,
            pubkey: vec![0u8; ML_DSA_87_PUBKEY_BYTES],
            signature: vec![0u8; ML_DSA_87_SIG_BYTES],
        });
        let with = tx_weight_and_stats(&tx).unwrap();

        let item_bytes = 1
            + compact_size_len(ML_DSA_87_PUBKEY_BYTES as u64)
            + ML_DSA_87_PUBKEY_BYTES as u64
            + compact_size_len(ML_DSA_87_SIG_BYTES as u64)
            + ML_DSA_87_SIG_BYTES as u64;
        let bare = tx_weight_and_stats(&bare_tx()).unwrap();
        assert_eq!(
            with.weight,
            bare.weight + item_bytes + VERIFY_COST_ML_DSA_87
        );
    }

    #[test]
    fn non_canonical_item_contributes_no_sig_cost() {
        let mut tx = bare_tx();
        tx.witness.push(WitnessItem {
            suite_id: SUITE_ID_ML_DSA_87,
            pubkey: vec![0u8; 10],
            signature: vec![0u8; 10],
        });
        let with = tx_weight_and_stats(&tx).unwrap();
        let item_bytes = 1 + 1 + 10 + 1 + 10;
        let bare = tx_weight_and_stats(&bare_tx()).unwrap();
        assert_eq!(with.weight, bare.weight + item_bytes);
    }

    #[test]
    fn slh_dsa_costs_more_than_ml_dsa() {
        assert!(VERIFY_COST_SLH_DSA_SHAKE_256F > VERIFY_COST_ML_DSA_87);
        let mut tx = bare_tx();
        tx.witness.push(WitnessItem {
            suite_id: SUITE_ID_SLH_DSA_SHAKE_256F,
            pubkey: vec![0u8; SLH_DSA_SHAKE_256F_PUBKEY_BYTES],
            signature: vec![0u8; 100],
        });
        let stats = tx_weight_and_stats(&tx).unwrap();
        let item_bytes = 1 + 1 + 64 + 1 + 100;
        let bare = tx_weight_and_stats(&bare_tx()).unwrap();
        assert_eq!(
            stats.weight,
            bare.weight + item_bytes + VERIFY_COST_SLH_DSA_SHAKE_256F
        );
    }

    #[test]
    fn anchor_bytes_sum_anchor_and_da_commit_outputs() {
        let mut tx = bare_tx();
        tx.outputs.push(TxOutput {
            value: 0,
            covenant_type: COV_TYPE_ANCHOR,
            covenant_data: vec![0u8; 40],
        });
        tx.outputs.push(TxOutput {
            value: 1,
            covenant_type: COV_TYPE_P2PK,
            covenant_data: vec![0u8; 33],
        });
        let stats = tx_weight_and_stats(&tx).unwrap();
        assert_eq!(stats.anchor_bytes, 40);
    }

    #[test]
    fn da_payload_counts_toward_da_bytes_for_chunks() {
        let mut tx = bare_tx();
        tx.tx_kind = 2;
        tx.da_chunk = Some(rubin_core::types::DaChunkFields {
            da_id: [0u8; 32],
            chunk_index: 0,
            chunk_hash: [0u8; 32],
        });
        tx.da_payload = vec![0u8; 300];
        let stats = tx_weight_and_stats(&tx).unwrap();
        assert_eq!(stats.da_bytes, 300);
    }
}
