//! Stateless block validation.
//!
//! Everything that can be checked without a UTXO set: header linkage,
//! merkle commitment, proof of work, coinbase shape, per-transaction
//! covenant validity, the witness commitment, timestamp rules, DA-set
//! integrity, aggregate resource caps and the subsidy bound. The check
//! order is part of the consensus contract: the first failing check's
//! code is what every implementation must report.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use rubin_core::arith::add_u64;
use rubin_core::constants::{
    COV_TYPE_ANCHOR, COV_TYPE_DA_COMMIT, MAX_ANCHOR_BYTES_PER_BLOCK, MAX_BLOCK_WEIGHT,
    MAX_DA_BATCHES_PER_BLOCK, MAX_DA_BYTES_PER_BLOCK, SLH_DSA_ACTIVATION_HEIGHT,
    SUITE_ID_SLH_DSA_SHAKE_256F, TX_KIND_DA_CHUNK, TX_KIND_DA_COMMIT,
};
use rubin_core::covenant::validate_tx_covenants;
use rubin_core::crypto::CryptoProvider;
use rubin_core::error::{ConsensusError, ErrorCode};
use rubin_core::merkle::{merkle_root_txids, witness_commitment_hash, witness_merkle_root_wtxids};
use rubin_core::types::Tx;
use rubin_core::wire::{ParsedBlock, parse_block};

use crate::params::ValidationParams;
use crate::pow::{check_timestamp_rules, pow_check};
use crate::subsidy::block_subsidy;
use crate::weight::tx_weight_and_stats;

/// Summary of a block that passed stateless validation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockSummary {
    pub block_hash: [u8; 32],
    pub tx_count: u64,
    pub sum_weight: u64,
    pub sum_da_bytes: u64,
    pub sum_anchor_bytes: u64,
}

/// Run the full stateless check suite over raw block bytes, including
/// the subsidy bound against externally supplied fees.
#[allow(clippy::too_many_arguments)]
pub fn validate_block(
    provider: &dyn CryptoProvider,
    params: &ValidationParams,
    block_bytes: &[u8],
    expected_prev: Option<[u8; 32]>,
    expected_target: Option<[u8; 32]>,
    height: u64,
    prev_timestamps: Option<&[u64]>,
    already_generated: u64,
    sum_fees: u64,
) -> Result<BlockSummary, ConsensusError> {
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
    check_subsidy_bound(&pb, height, already_generated, sum_fees)?;
    Ok(summary)
}

/// Stateless checks over an already parsed block, without the subsidy
/// bound (the chainstate layer supplies fees it computed itself).
pub(crate) fn validate_parsed_block(
    provider: &dyn CryptoProvider,
    params: &ValidationParams,
    pb: &ParsedBlock,
    expected_prev: Option<[u8; 32]>,
    expected_target: Option<[u8; 32]>,
    height: u64,
    prev_timestamps: Option<&[u64]>,
) -> Result<BlockSummary, ConsensusError> {
    if let Some(prev) = expected_prev {
        if pb.header.prev_block_hash != prev {
            return Err(ConsensusError::new(
                ErrorCode::BlockLinkageInvalid,
                "prev_block_hash mismatch",
            ));
        }
    }

    let merkle = merkle_root_txids(provider, &pb.txids)?;
    if merkle != pb.header.merkle_root {
        return Err(ConsensusError::new(
            ErrorCode::BlockMerkleInvalid,
            "merkle_root mismatch",
        ));
    }

    pow_check(provider, &pb.header_bytes, &pb.header.target)?;
    if let Some(target) = expected_target {
        if pb.header.target != target {
            return Err(ConsensusError::new(
                ErrorCode::BlockTargetInvalid,
                "target mismatch",
            ));
        }
    }

    check_coinbase_shape(pb, height)?;

    let mut sum_weight = 0u64;
    let mut sum_da_bytes = 0u64;
    let mut sum_anchor_bytes = 0u64;
    let mut seen_nonces: HashSet<u64> = HashSet::with_capacity(pb.txs.len());
    for (i, tx) in pb.txs.iter().enumerate() {
        if i > 0 {
            if tx.is_coinbase_shaped() {
                return Err(ConsensusError::new(
                    ErrorCode::BlockCoinbaseInvalid,
                    "coinbase-shaped tx after index zero",
                ));
            }
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
            if !seen_nonces.insert(tx.tx_nonce) {
                return Err(ConsensusError::new(
                    ErrorCode::TxNonceReplay,
                    "duplicate tx_nonce in block",
                ));
            }
            check_suite_activation(tx, height)?;
        }
        validate_tx_covenants(tx, height, params.htlc_v2_active)?;

        let stats = tx_weight_and_stats(tx)?;
        sum_weight = add_u64(sum_weight, stats.weight)?;
        sum_da_bytes = add_u64(sum_da_bytes, stats.da_bytes)?;
        sum_anchor_bytes = add_u64(sum_anchor_bytes, stats.anchor_bytes)?;
    }

    check_witness_commitment(provider, pb)?;
    check_timestamp_rules(pb.header.timestamp, height, prev_timestamps)?;
    check_da_set_integrity(provider, &pb.txs)?;

    if sum_da_bytes > MAX_DA_BYTES_PER_BLOCK {
        return Err(ConsensusError::new(
            ErrorCode::BlockWeightExceeded,
            "DA bytes exceed block cap",
        ));
    }
    if sum_anchor_bytes > MAX_ANCHOR_BYTES_PER_BLOCK {
        return Err(ConsensusError::new(
            ErrorCode::BlockAnchorBytesExceeded,
            "anchor bytes exceed block cap",
        ));
    }
    if sum_weight > MAX_BLOCK_WEIGHT {
        return Err(ConsensusError::new(
            ErrorCode::BlockWeightExceeded,
            "block weight exceeds cap",
        ));
    }

    Ok(BlockSummary {
        block_hash: provider.sha3_256(&pb.header_bytes),
        tx_count: pb.tx_count,
        sum_weight,
        sum_da_bytes,
        sum_anchor_bytes,
    })
}

fn check_coinbase_shape(pb: &ParsedBlock, height: u64) -> Result<(), ConsensusError> {
    let coinbase = pb.txs.first().ok_or(ConsensusError::new(
        ErrorCode::BlockCoinbaseInvalid,
        "missing coinbase",
    ))?;
    if u32::try_from(height).is_err() {
        return Err(ConsensusError::new(
            ErrorCode::BlockCoinbaseInvalid,
            "height outside locktime range",
        ));
    }
    if !coinbase.is_coinbase(height) {
        return Err(ConsensusError::new(
            ErrorCode::BlockCoinbaseInvalid,
            "first tx is not a canonical coinbase",
        ));
    }
    Ok(())
}

/// SLH-DSA witnesses are invalid anywhere in a block below the
/// activation height, independent of the covenant being spent.
fn check_suite_activation(tx: &Tx, height: u64) -> Result<(), ConsensusError> {
    if height >= SLH_DSA_ACTIVATION_HEIGHT {
        return Ok(());
    }
    for item in &tx.witness {
        if item.suite_id == SUITE_ID_SLH_DSA_SHAKE_256F {
            return Err(ConsensusError::new(
                ErrorCode::TxSigAlgInvalid,
                "SLH-DSA suite inactive at this height",
            ));
        }
    }
    Ok(())
}

/// Exactly one coinbase ANCHOR output must equal the witness
/// commitment over the block's wtxids (coinbase wtxid zeroed).
fn check_witness_commitment(
    provider: &dyn CryptoProvider,
    pb: &ParsedBlock,
) -> Result<(), ConsensusError> {
    let mut wtxids = pb.wtxids.clone();
    wtxids[0] = [0u8; 32];
    let wroot = witness_merkle_root_wtxids(provider, &wtxids)
        .map_err(|_| ConsensusError::new(ErrorCode::BlockWitnessCommitment, "witness root failed"))?;
    let expected = witness_commitment_hash(provider, wroot);

    let mut matches = 0u64;
    for output in &pb.txs[0].outputs {
        if output.covenant_type != COV_TYPE_ANCHOR || output.covenant_data.len() != 32 {
            continue;
        }
        if output.covenant_data.as_slice() == expected.as_slice() {
            matches += 1;
        }
    }
    if matches != 1 {
        return Err(ConsensusError::new(
            ErrorCode::BlockWitnessCommitment,
            "witness commitment missing or duplicated",
        ));
    }
    Ok(())
}

/// The in-block DA invariants: commits unique per `da_id`, every chunk
/// hash-bound to its payload, chunk indices contiguous and complete,
/// and the concatenated payloads matching the commit tx's single
/// DA_COMMIT output commitment.
fn check_da_set_integrity(
    provider: &dyn CryptoProvider,
    txs: &[Tx],
) -> Result<(), ConsensusError> {
    let mut commits: HashMap<[u8; 32], &Tx> = HashMap::new();
    let mut chunks: HashMap<[u8; 32], BTreeMap<u16, &Tx>> = HashMap::new();

    for tx in txs {
        match tx.tx_kind {
            TX_KIND_DA_COMMIT => {
                let core = tx
                    .da_commit
                    .as_ref()
                    .ok_or(ConsensusError::parse("missing DA commit fields"))?;
                if commits.insert(core.da_id, tx).is_some() {
                    return Err(ConsensusError::new(
                        ErrorCode::BlockDaSetInvalid,
                        "duplicate DA commit for da_id",
                    ));
                }
            }
            TX_KIND_DA_CHUNK => {
                let core = tx
                    .da_chunk
                    .as_ref()
                    .ok_or(ConsensusError::parse("missing DA chunk fields"))?;
                if provider.sha3_256(&tx.da_payload) != core.chunk_hash {
                    return Err(ConsensusError::new(
                        ErrorCode::BlockDaChunkHashInvalid,
                        "chunk payload does not match chunk_hash",
                    ));
                }
                let per_batch = chunks.entry(core.da_id).or_default();
                if per_batch.insert(core.chunk_index, tx).is_some() {
                    return Err(ConsensusError::new(
                        ErrorCode::BlockDaSetInvalid,
                        "duplicate DA chunk index",
                    ));
                }
            }
            _ => {}
        }
    }

    if commits.len() as u64 > MAX_DA_BATCHES_PER_BLOCK {
        return Err(ConsensusError::new(
            ErrorCode::BlockDaBatchExceeded,
            "too many DA batches in block",
        ));
    }

    for da_id in chunks.keys() {
        if !commits.contains_key(da_id) {
            return Err(ConsensusError::new(
                ErrorCode::BlockDaSetInvalid,
                "DA chunks without a commit",
            ));
        }
    }

    for (da_id, commit_tx) in &commits {
        let core = commit_tx.da_commit.as_ref().expect("checked above");
        let per_batch = chunks.get(da_id).ok_or(ConsensusError::new(
            ErrorCode::BlockDaIncomplete,
            "DA commit without chunks",
        ))?;
        if per_batch.len() != core.chunk_count as usize {
            return Err(ConsensusError::new(
                ErrorCode::BlockDaIncomplete,
                "DA chunk count mismatch",
            ));
        }
        let mut concat = Vec::new();
        for index in 0..core.chunk_count {
            let chunk_tx = per_batch.get(&index).ok_or(ConsensusError::new(
                ErrorCode::BlockDaIncomplete,
                "missing DA chunk index",
            ))?;
            concat.extend_from_slice(&chunk_tx.da_payload);
        }
        let payload_commitment = provider.sha3_256(&concat);

        // The commit tx carries the batch commitment in exactly one
        // DA_COMMIT covenant output.
        let mut commitment_outputs = 0u32;
        let mut committed = [0u8; 32];
        for output in &commit_tx.outputs {
            if output.covenant_type != COV_TYPE_DA_COMMIT {
                continue;
            }
            commitment_outputs += 1;
            if output.covenant_data.len() == 32 {
                committed.copy_from_slice(&output.covenant_data);
            }
        }
        if commitment_outputs != 1 {
            return Err(ConsensusError::new(
                ErrorCode::BlockDaPayloadCommitInvalid,
                "DA commitment output missing or duplicated",
            ));
        }
        if committed != payload_commitment {
            return Err(ConsensusError::new(
                ErrorCode::BlockDaPayloadCommitInvalid,
                "payload commitment mismatch",
            ));
        }
    }

    Ok(())
}

/// Coinbase outputs may pay out at most subsidy plus fees; summed in
/// u128 so a pair of near-max outputs cannot wrap past the bound.
pub(crate) fn check_subsidy_bound(
    pb: &ParsedBlock,
    height: u64,
    already_generated: u64,
    sum_fees: u64,
) -> Result<(), ConsensusError> {
    if height == 0 {
        return Ok(());
    }
    let coinbase = pb.txs.first().ok_or(ConsensusError::new(
        ErrorCode::BlockCoinbaseInvalid,
        "missing coinbase",
    ))?;

    let mut sum_coinbase = 0u128;
    for output in &coinbase.outputs {
        sum_coinbase += output.value as u128;
    }

    let limit = block_subsidy(height, already_generated) as u128 + sum_fees as u128;
    if sum_coinbase > limit {
        return Err(ConsensusError::new(
            ErrorCode::BlockSubsidyExceeded,
            "coinbase outputs exceed subsidy plus fees",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rubin_core::codec::write_compact_size;
    use rubin_core::constants::{
        COV_TYPE_P2PK, SUITE_ID_ML_DSA_87, SUITE_ID_SENTINEL,
    };
    use rubin_core::crypto::testing::AcceptAllProvider;
    use rubin_core::types::{BlockHeader, TxOutput};

    fn provider() -> AcceptAllProvider {
        AcceptAllProvider
    }

    fn params() -> ValidationParams {
        ValidationParams::default()
    }

    fn p2pk_data() -> Vec<u8> {
        let mut data = vec![SUITE_ID_ML_DSA_87];
        data.extend_from_slice(&[0u8; 32]);
        data
    }

    /// Raw coinbase bytes with the given locktime and outputs.
    fn coinbase_bytes(locktime: u32, outputs: &[TxOutput]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&1u32.to_le_bytes());
        b.push(0x00);
        b.extend_from_slice(&0u64.to_le_bytes());
        b.push(0x01); // one input
        b.extend_from_slice(&[0u8; 32]);
        b.extend_from_slice(&u32::MAX.to_le_bytes());
        b.push(0x00); // script_sig_len
        b.extend_from_slice(&u32::MAX.to_le_bytes());
        write_compact_size(outputs.len() as u64, &mut b);
        for output in outputs {
            b.extend_from_slice(&output.wire_bytes());
        }
        b.extend_from_slice(&locktime.to_le_bytes());
        b.push(0x00); // witness_count
        b.push(0x00); // da_payload_len
        b
    }

    /// Coinbase carrying the correct witness commitment for itself plus
    /// the given non-coinbase transactions, and optionally extra outputs.
    fn coinbase_with_commitment(
        locktime: u32,
        non_coinbase: &[Vec<u8>],
        extra_outputs: &[TxOutput],
    ) -> Vec<u8> {
        let p = provider();
        let mut wtxids = vec![[0u8; 32]];
        for tx_bytes in non_coinbase {
            let (_, _, wtxid, _) = rubin_core::wire::parse_tx(&p, tx_bytes).expect("parse");
            wtxids.push(wtxid);
        }
        let wroot = witness_merkle_root_wtxids(&p, &wtxids).unwrap();
        let commit = witness_commitment_hash(&p, wroot);

        let mut outputs = extra_outputs.to_vec();
        outputs.push(TxOutput {
            value: 0,
            covenant_type: COV_TYPE_ANCHOR,
            covenant_data: commit.to_vec(),
        });
        coinbase_bytes(locktime, &outputs)
    }

    fn build_block(txs: &[Vec<u8>]) -> Vec<u8> {
        let p = provider();
        let mut txids = Vec::new();
        for tx_bytes in txs {
            let (_, txid, _, _) = rubin_core::wire::parse_tx(&p, tx_bytes).expect("parse");
            txids.push(txid);
        }
        let header = BlockHeader {
            version: 1,
            prev_block_hash: [0x22; 32],
            merkle_root: merkle_root_txids(&p, &txids).unwrap(),
            timestamp: 1,
            target: [0xff; 32],
            nonce: 9,
        };
        let mut b = header.wire_bytes().to_vec();
        write_compact_size(txs.len() as u64, &mut b);
        for tx_bytes in txs {
            b.extend_from_slice(tx_bytes);
        }
        b
    }

    fn validate(bytes: &[u8], height: u64) -> Result<BlockSummary, ConsensusError> {
        validate_block(
            &provider(),
            &params(),
            bytes,
            Some([0x22; 32]),
            Some([0xff; 32]),
            height,
            None,
            0,
            0,
        )
    }

    // --- Happy path and header checks ---

    #[test]
    fn minimal_block_validates() {
        let cb = coinbase_with_commitment(0, &[], &[]);
        let block = build_block(&[cb]);
        let summary = validate(&block, 0).expect("valid block");
        assert_eq!(summary.tx_count, 1);
        assert!(summary.sum_weight > 0);
    }

    #[test]
    fn linkage_mismatch_rejected() {
        let cb = coinbase_with_commitment(0, &[], &[]);
        let block = build_block(&[cb]);
        let err = validate_block(
            &provider(),
            &params(),
            &block,
            Some([0x99; 32]),
            Some([0xff; 32]),
            0,
            None,
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockLinkageInvalid);
    }

    #[test]
    fn merkle_mismatch_rejected() {
        let cb = coinbase_with_commitment(0, &[], &[]);
        let mut block = build_block(&[cb]);
        block[36] ^= 0xff; // corrupt merkle_root in the header
        assert_eq!(validate(&block, 0).unwrap_err().code, ErrorCode::BlockMerkleInvalid);
    }

    #[test]
    fn target_mismatch_rejected() {
        let cb = coinbase_with_commitment(0, &[], &[]);
        let block = build_block(&[cb]);
        let err = validate_block(
            &provider(),
            &params(),
            &block,
            Some([0x22; 32]),
            Some([0xee; 32]),
            0,
            None,
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockTargetInvalid);
    }

    #[test]
    fn pow_failure_rejected() {
        // Rebuild the same block with an impossible target.
        let p = provider();
        let cb = coinbase_with_commitment(0, &[], &[]);
        let (_, txid, _, _) = rubin_core::wire::parse_tx(&p, &cb).unwrap();
        let mut tiny = [0u8; 32];
        tiny[31] = 0x01;
        let header = BlockHeader {
            version: 1,
            prev_block_hash: [0x22; 32],
            merkle_root: merkle_root_txids(&p, &[txid]).unwrap(),
            timestamp: 1,
            target: tiny,
            nonce: 9,
        };
        let mut block = header.wire_bytes().to_vec();
        write_compact_size(1, &mut block);
        block.extend_from_slice(&cb);
        let err = validate_block(
            &provider(),
            &params(),
            &block,
            Some([0x22; 32]),
            Some(tiny),
            0,
            None,
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockPowInvalid);
    }

    // --- Coinbase shape ---

    #[test]
    fn first_tx_must_be_coinbase() {
        let mut b = Vec::new();
        b.extend_from_slice(&1u32.to_le_bytes());
        b.push(0x00);
        b.extend_from_slice(&0u64.to_le_bytes());
        b.push(0x00); // no inputs: not coinbase-shaped
        b.push(0x00);
        b.extend_from_slice(&0u32.to_le_bytes());
        b.push(0x00);
        b.push(0x00);
        let block = build_block(&[b]);
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::BlockCoinbaseInvalid
        );
    }

    #[test]
    fn coinbase_locktime_must_equal_height() {
        let cb = coinbase_with_commitment(0, &[], &[]);
        let block = build_block(&[cb]);
        assert_eq!(
            validate(&block, 5).unwrap_err().code,
            ErrorCode::BlockCoinbaseInvalid
        );
    }

    #[test]
    fn later_coinbase_shaped_tx_rejected() {
        let shadow = coinbase_bytes(0, &[TxOutput {
            value: 1,
            covenant_type: COV_TYPE_P2PK,
            covenant_data: p2pk_data(),
        }]);
        let cb = coinbase_with_commitment(0, std::slice::from_ref(&shadow), &[]);
        let block = build_block(&[cb, shadow]);
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::BlockCoinbaseInvalid
        );
    }

    // --- Nonces ---

    /// Minimal non-coinbase tx bytes with a chosen nonce and sequence 0.
    fn simple_spend_bytes(nonce: u64, prev_byte: u8) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&1u32.to_le_bytes());
        b.push(0x00);
        b.extend_from_slice(&nonce.to_le_bytes());
        b.push(0x01);
        b.extend_from_slice(&[prev_byte; 32]);
        b.extend_from_slice(&0u32.to_le_bytes());
        b.push(0x00);
        b.extend_from_slice(&0u32.to_le_bytes());
        b.push(0x01); // one output
        let out = TxOutput {
            value: 1,
            covenant_type: COV_TYPE_P2PK,
            covenant_data: p2pk_data(),
        };
        b.extend_from_slice(&out.wire_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b.push(0x01); // one sentinel witness
        b.push(SUITE_ID_SENTINEL);
        b.push(0x00);
        b.push(0x00);
        b.push(0x00); // da_payload_len
        b
    }

    #[test]
    fn duplicate_nonces_rejected() {
        let tx1 = simple_spend_bytes(7, 0xa1);
        let tx2 = simple_spend_bytes(7, 0xa2);
        let cb = coinbase_with_commitment(0, &[tx1.clone(), tx2.clone()], &[]);
        let block = build_block(&[cb, tx1, tx2]);
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::TxNonceReplay
        );
    }

    #[test]
    fn zero_nonce_rejected_for_non_coinbase() {
        let tx1 = simple_spend_bytes(0, 0xa1);
        let cb = coinbase_with_commitment(0, std::slice::from_ref(&tx1), &[]);
        let block = build_block(&[cb, tx1]);
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::TxNonceInvalid
        );
    }

    // --- Witness commitment ---

    #[test]
    fn missing_witness_commitment_rejected() {
        let cb = coinbase_bytes(0, &[TxOutput {
            value: 1,
            covenant_type: COV_TYPE_P2PK,
            covenant_data: p2pk_data(),
        }]);
        let block = build_block(&[cb]);
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::BlockWitnessCommitment
        );
    }

    #[test]
    fn duplicated_witness_commitment_rejected() {
        let p = provider();
        let wroot = witness_merkle_root_wtxids(&p, &[[0u8; 32]]).unwrap();
        let commit = witness_commitment_hash(&p, wroot);
        let anchor = TxOutput {
            value: 0,
            covenant_type: COV_TYPE_ANCHOR,
            covenant_data: commit.to_vec(),
        };
        let cb = coinbase_bytes(0, &[anchor.clone(), anchor]);
        let block = build_block(&[cb]);
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::BlockWitnessCommitment
        );
    }

    // --- Timestamps ---

    #[test]
    fn timestamp_rules_applied_with_context() {
        let p = provider();
        let cb = coinbase_with_commitment(20, &[], &[]);
        let (_, txid, _, _) = rubin_core::wire::parse_tx(&p, &cb).unwrap();
        let prev: Vec<u64> = (10..=20).rev().collect();

        for (timestamp, expected) in [
            (15u64, Some(ErrorCode::BlockTimestampOld)),
            (16, None),
            (15 + rubin_core::constants::MAX_FUTURE_DRIFT + 1,
                Some(ErrorCode::BlockTimestampFuture)),
        ] {
            let header = BlockHeader {
                version: 1,
                prev_block_hash: [0x22; 32],
                merkle_root: merkle_root_txids(&p, &[txid]).unwrap(),
                timestamp,
                target: [0xff; 32],
                nonce: 9,
            };
            let mut block = header.wire_bytes().to_vec();
            write_compact_size(1, &mut block);
            block.extend_from_slice(&cb);
            let result = validate_block(
                &p,
                &params(),
                &block,
                Some([0x22; 32]),
                Some([0xff; 32]),
                20,
                Some(&prev),
                0,
                1_000_000,
            );
            match expected {
                Some(code) => assert_eq!(result.unwrap_err().code, code),
                None => {
                    result.expect("timestamp inside window");
                }
            }
        }
    }

    // --- Subsidy bound ---

    #[test]
    fn subsidy_bound_enforced_and_fee_financed() {
        let subsidy = block_subsidy(1, 0);
        let over = TxOutput {
            value: subsidy + 1,
            covenant_type: COV_TYPE_P2PK,
            covenant_data: p2pk_data(),
        };
        let cb = coinbase_with_commitment(1, &[], std::slice::from_ref(&over));
        let block = build_block(&[cb]);
        assert_eq!(
            validate(&block, 1).unwrap_err().code,
            ErrorCode::BlockSubsidyExceeded
        );

        // The same payout passes when fees cover the excess.
        let exact = TxOutput {
            value: subsidy + 5,
            covenant_type: COV_TYPE_P2PK,
            covenant_data: p2pk_data(),
        };
        let cb = coinbase_with_commitment(1, &[], std::slice::from_ref(&exact));
        let block = build_block(&[cb]);
        validate_block(
            &provider(),
            &params(),
            &block,
            Some([0x22; 32]),
            Some([0xff; 32]),
            1,
            None,
            0,
            5,
        )
        .expect("fees cover the payout");
    }

    #[test]
    fn height_zero_exempt_from_subsidy_bound() {
        let payout = TxOutput {
            value: u64::MAX,
            covenant_type: COV_TYPE_P2PK,
            covenant_data: p2pk_data(),
        };
        let cb = coinbase_with_commitment(0, &[], std::slice::from_ref(&payout));
        let block = build_block(&[cb]);
        validate(&block, 0).expect("no bound at genesis");
    }

    #[test]
    fn coinbase_sum_uses_u128() {
        let payout = TxOutput {
            value: u64::MAX,
            covenant_type: COV_TYPE_P2PK,
            covenant_data: p2pk_data(),
        };
        let cb = coinbase_with_commitment(1, &[], &[payout.clone(), payout]);
        let block = build_block(&[cb]);
        // Two u64::MAX outputs wrap u64 but not u128; the bound holds.
        assert_eq!(
            validate(&block, 1).unwrap_err().code,
            ErrorCode::BlockSubsidyExceeded
        );
    }

    // --- DA set ---

    fn da_commit_bytes(da_id: [u8; 32], chunk_count: u16, commitment: [u8; 32], nonce: u64) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&1u32.to_le_bytes());
        b.push(0x01); // DA_COMMIT
        b.extend_from_slice(&nonce.to_le_bytes());
        b.push(0x01); // one input
        b.extend_from_slice(&[0xd0; 32]);
        b.extend_from_slice(&0u32.to_le_bytes());
        b.push(0x00);
        b.extend_from_slice(&0u32.to_le_bytes());
        b.push(0x01); // one output: the DA_COMMIT commitment
        let out = TxOutput {
            value: 0,
            covenant_type: COV_TYPE_DA_COMMIT,
            covenant_data: commitment.to_vec(),
        };
        b.extend_from_slice(&out.wire_bytes());
        b.extend_from_slice(&0u32.to_le_bytes()); // locktime
        b.extend_from_slice(&da_id);
        b.extend_from_slice(&chunk_count.to_le_bytes());
        b.extend_from_slice(&[0x01; 32]); // retl_domain_id
        b.extend_from_slice(&1u64.to_le_bytes()); // batch_number
        b.extend_from_slice(&[0x02; 32]); // tx_data_root
        b.extend_from_slice(&[0x03; 32]); // state_root
        b.extend_from_slice(&[0x04; 32]); // withdrawals_root
        b.push(0x01); // batch_sig_suite
        b.push(0x00); // batch_sig_len
        b.push(0x01); // one sentinel witness (for the input slot)
        b.push(SUITE_ID_SENTINEL);
        b.push(0x00);
        b.push(0x00);
        b.push(0x00); // da_payload_len
        b
    }

    fn da_chunk_bytes(
        da_id: [u8; 32],
        chunk_index: u16,
        chunk_hash: [u8; 32],
        payload: &[u8],
        nonce: u64,
    ) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&1u32.to_le_bytes());
        b.push(0x02); // DA_CHUNK
        b.extend_from_slice(&nonce.to_le_bytes());
        b.push(0x01);
        b.extend_from_slice(&[0xd1 + chunk_index as u8; 32]);
        b.extend_from_slice(&0u32.to_le_bytes());
        b.push(0x00);
        b.extend_from_slice(&0u32.to_le_bytes());
        b.push(0x00); // no outputs
        b.extend_from_slice(&0u32.to_le_bytes()); // locktime
        b.extend_from_slice(&da_id);
        b.extend_from_slice(&chunk_index.to_le_bytes());
        b.extend_from_slice(&chunk_hash);
        b.push(0x01); // one sentinel witness
        b.push(SUITE_ID_SENTINEL);
        b.push(0x00);
        b.push(0x00);
        write_compact_size(payload.len() as u64, &mut b);
        b.extend_from_slice(payload);
        b
    }

    fn da_block(commit: Vec<u8>, chunks: Vec<Vec<u8>>) -> Vec<u8> {
        let mut non_coinbase = vec![commit];
        non_coinbase.extend(chunks);
        let cb = coinbase_with_commitment(0, &non_coinbase, &[]);
        let mut txs = vec![cb];
        txs.extend(non_coinbase);
        build_block(&txs)
    }

    #[test]
    fn da_round_trip_validates() {
        let p = provider();
        let da_id = [0x99; 32];
        let mut concat = Vec::new();
        concat.extend_from_slice(b"aaa");
        concat.extend_from_slice(b"bbb");
        let commitment = p.sha3_256(&concat);
        let block = da_block(
            da_commit_bytes(da_id, 2, commitment, 11),
            vec![
                da_chunk_bytes(da_id, 0, p.sha3_256(b"aaa"), b"aaa", 12),
                da_chunk_bytes(da_id, 1, p.sha3_256(b"bbb"), b"bbb", 13),
            ],
        );
        validate(&block, 0).expect("complete DA set");
    }

    #[test]
    fn da_chunk_hash_mismatch_rejected() {
        let p = provider();
        let da_id = [0x99; 32];
        let mut concat = Vec::new();
        concat.extend_from_slice(b"aaa");
        concat.extend_from_slice(b"bbb");
        let commitment = p.sha3_256(&concat);
        let block = da_block(
            da_commit_bytes(da_id, 2, commitment, 11),
            vec![
                da_chunk_bytes(da_id, 0, p.sha3_256(b"WRONG"), b"aaa", 12),
                da_chunk_bytes(da_id, 1, p.sha3_256(b"bbb"), b"bbb", 13),
            ],
        );
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::BlockDaChunkHashInvalid
        );
    }

    #[test]
    fn da_missing_chunk_rejected() {
        let p = provider();
        let da_id = [0x99; 32];
        let mut concat = Vec::new();
        concat.extend_from_slice(b"aaa");
        concat.extend_from_slice(b"bbb");
        let commitment = p.sha3_256(&concat);
        let block = da_block(
            da_commit_bytes(da_id, 2, commitment, 11),
            vec![da_chunk_bytes(da_id, 0, p.sha3_256(b"aaa"), b"aaa", 12)],
        );
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::BlockDaIncomplete
        );
    }

    #[test]
    fn da_chunks_without_commit_rejected() {
        let p = provider();
        let da_id = [0x99; 32];
        let chunk = da_chunk_bytes(da_id, 0, p.sha3_256(b"aaa"), b"aaa", 12);
        let cb = coinbase_with_commitment(0, std::slice::from_ref(&chunk), &[]);
        let block = build_block(&[cb, chunk]);
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::BlockDaSetInvalid
        );
    }

    #[test]
    fn da_batch_cap_enforced() {
        // One commit over the cap, no chunks: the batch count trips
        // before completeness is even considered.
        let mut rest = Vec::new();
        for i in 0..(MAX_DA_BATCHES_PER_BLOCK + 1) {
            let mut da_id = [0u8; 32];
            da_id[0..8].copy_from_slice(&i.to_le_bytes());
            rest.push(da_commit_bytes(da_id, 1, [0x42; 32], i + 1));
        }
        let cb = coinbase_with_commitment(0, &rest, &[]);
        let mut txs = vec![cb];
        txs.extend(rest);
        let block = build_block(&txs);
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::BlockDaBatchExceeded
        );
    }

    #[test]
    fn anchor_bytes_cap_enforced() {
        let big_anchor = TxOutput {
            value: 0,
            covenant_type: COV_TYPE_ANCHOR,
            covenant_data: vec![0u8; rubin_core::constants::MAX_ANCHOR_PAYLOAD_SIZE],
        };
        // Three maximal anchors (196,608 bytes) blow the per-block cap.
        let cb = coinbase_with_commitment(
            0,
            &[],
            &[big_anchor.clone(), big_anchor.clone(), big_anchor],
        );
        let block = build_block(&[cb]);
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::BlockAnchorBytesExceeded
        );
    }

    #[test]
    fn da_payload_commitment_mismatch_rejected() {
        let p = provider();
        let da_id = [0x99; 32];
        let block = da_block(
            da_commit_bytes(da_id, 2, [0x42; 32], 11),
            vec![
                da_chunk_bytes(da_id, 0, p.sha3_256(b"aaa"), b"aaa", 12),
                da_chunk_bytes(da_id, 1, p.sha3_256(b"bbb"), b"bbb", 13),
            ],
        );
        assert_eq!(
            validate(&block, 0).unwrap_err().code,
            ErrorCode::BlockDaPayloadCommitInvalid
        );
    }
}
