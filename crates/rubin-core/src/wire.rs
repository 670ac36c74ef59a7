//! Strict wire decoding for transactions and blocks.
//!
//! Single-pass, length-bounded, and canonical: every cap is enforced
//! while reading, every CompactSize must be minimal, and witness items
//! must already have their suite's canonical byte lengths. A
//! serialization that differs in any byte from the canonical encoding
//! of its content fails to parse.

use crate::codec::{Reader, read_compact_size};
use crate::constants::{
    BLOCK_HEADER_BYTES, MAX_COVENANT_DATA_PER_OUTPUT, MAX_DA_CHUNK_BYTES_PER_TX,
    MAX_DA_CHUNK_COUNT, MAX_DA_MANIFEST_BYTES_PER_TX, MAX_HTLC_PREIMAGE_BYTES,
    MAX_SCRIPT_SIG_BYTES, MAX_SLH_DSA_SIG_BYTES, MAX_TX_INPUTS, MAX_TX_OUTPUTS,
    MAX_WITNESS_BYTES_PER_TX, MAX_WITNESS_ITEMS, ML_DSA_87_PUBKEY_BYTES, ML_DSA_87_SIG_BYTES,
    SLH_DSA_SHAKE_256F_PUBKEY_BYTES, SUITE_ID_ML_DSA_87, SUITE_ID_SENTINEL,
    SUITE_ID_SLH_DSA_SHAKE_256F, TX_KIND_DA_CHUNK, TX_KIND_DA_COMMIT, TX_KIND_STANDARD,
    TX_VERSION,
};
use crate::crypto::CryptoProvider;
use crate::error::{ConsensusError, ErrorCode};
use crate::types::{
    Block, BlockHeader, DaChunkFields, DaCommitFields, Tx, TxInput, TxOutput, WitnessItem,
};

/// A block parsed to transactions, with ids precomputed.
#[derive(Clone, Debug)]
pub struct ParsedBlock {
    pub header: BlockHeader,
    pub header_bytes: [u8; BLOCK_HEADER_BYTES],
    pub tx_count: u64,
    pub txs: Vec<Tx>,
    pub txids: Vec<[u8; 32]>,
    pub wtxids: Vec<[u8; 32]>,
}

impl ParsedBlock {
    /// Reassemble the owned [`Block`].
    pub fn into_block(self) -> Block {
        Block {
            header: self.header,
            transactions: self.txs,
        }
    }
}

/// Check one witness item's per-suite canonical shape at parse time.
///
/// SENTINEL items are either fully empty or one of the two HTLC path
/// selector forms; native suites must carry exactly their canonical
/// pubkey/signature byte lengths.
fn check_witness_item_canonical(item: &WitnessItem) -> Result<(), ConsensusError> {
    match item.suite_id {
        SUITE_ID_SENTINEL => {
            let ok = if item.pubkey.is_empty() && item.signature.is_empty() {
                true
            } else if item.pubkey.len() == 32 {
                match item.signature.as_slice() {
                    // Refund selector: path id alone.
                    [0x01] => true,
                    // Claim selector: path id, u16 preimage length, preimage.
                    [0x00, rest @ ..] if rest.len() >= 2 => {
                        let pre_len =
                            u16::from_le_bytes([rest[0], rest[1]]) as usize;
                        pre_len <= MAX_HTLC_PREIMAGE_BYTES && rest.len() == 2 + pre_len
                    }
                    _ => false,
                }
            } else {
                false
            };
            if !ok {
                return Err(ConsensusError::parse("non-canonical sentinel witness item"));
            }
            Ok(())
        }
        SUITE_ID_ML_DSA_87 => {
            if item.pubkey.len() != ML_DSA_87_PUBKEY_BYTES
                || item.signature.len() != ML_DSA_87_SIG_BYTES
            {
                return Err(ConsensusError::new(
                    ErrorCode::TxSigNoncanonical,
                    "non-canonical ML-DSA witness item lengths",
                ));
            }
            Ok(())
        }
        SUITE_ID_SLH_DSA_SHAKE_256F => {
            if item.pubkey.len() != SLH_DSA_SHAKE_256F_PUBKEY_BYTES
                || item.signature.is_empty()
                || item.signature.len() > MAX_SLH_DSA_SIG_BYTES
            {
                return Err(ConsensusError::new(
                    ErrorCode::TxSigNoncanonical,
                    "non-canonical SLH-DSA witness item lengths",
                ));
            }
            Ok(())
        }
        _ => Err(ConsensusError::new(
            ErrorCode::TxSigAlgInvalid,
            "unknown suite id",
        )),
    }
}

/// Parse one transaction from the front of `bytes`.
///
/// Returns the transaction, its txid (over the core bytes), its wtxid
/// (over the full serialization) and the number of bytes consumed.
/// Trailing bytes after the transaction are the caller's concern.
pub fn parse_tx(
    provider: &dyn CryptoProvider,
    bytes: &[u8],
) -> Result<(Tx, [u8; 32], [u8; 32], usize), ConsensusError> {
    let mut r = Reader::new(bytes);

    let version = r.read_u32_le()?;
    if version != TX_VERSION {
        return Err(ConsensusError::parse("unsupported tx version"));
    }

    let tx_kind = r.read_u8()?;
    if tx_kind != TX_KIND_STANDARD && tx_kind != TX_KIND_DA_COMMIT && tx_kind != TX_KIND_DA_CHUNK
    {
        return Err(ConsensusError::parse("unsupported tx_kind"));
    }

    let tx_nonce = r.read_u64_le()?;

    let (input_count, _) = read_compact_size(&mut r)?;
    if input_count > MAX_TX_INPUTS {
        return Err(ConsensusError::parse("input_count exceeds cap"));
    }
    let mut inputs = Vec::with_capacity(input_count as usize);
    for _ in 0..input_count {
        let prev_txid: [u8; 32] = r.read_array("truncated prev_txid")?;
        let prev_vout = r.read_u32_le()?;
        let (script_sig_len, _) = read_compact_size(&mut r)?;
        if script_sig_len > MAX_SCRIPT_SIG_BYTES {
            return Err(ConsensusError::parse("script_sig_len exceeds cap"));
        }
        let script_sig = r.read_bytes(script_sig_len as usize)?.to_vec();
        let sequence = r.read_u32_le()?;
        inputs.push(TxInput {
            prev_txid,
            prev_vout,
            script_sig,
            sequence,
        });
    }

    let (output_count, _) = read_compact_size(&mut r)?;
    if output_count > MAX_TX_OUTPUTS {
        return Err(ConsensusError::parse("output_count exceeds cap"));
    }
    let mut outputs = Vec::with_capacity(output_count as usize);
    for _ in 0..output_count {
        let value = r.read_u64_le()?;
        let covenant_type = r.read_u16_le()?;
        let (covenant_data_len, _) = read_compact_size(&mut r)?;
        if covenant_data_len > MAX_COVENANT_DATA_PER_OUTPUT {
            return Err(ConsensusError::parse("covenant_data_len exceeds cap"));
        }
        let covenant_data = r.read_bytes(covenant_data_len as usize)?.to_vec();
        outputs.push(TxOutput {
            value,
            covenant_type,
            covenant_data,
        });
    }

    let locktime = r.read_u32_le()?;

    let mut da_commit: Option<DaCommitFields> = None;
    let mut da_chunk: Option<DaChunkFields> = None;
    match tx_kind {
        TX_KIND_DA_COMMIT => {
            let da_id: [u8; 32] = r.read_array("truncated da_id")?;
            let chunk_count = r.read_u16_le()?;
            if chunk_count == 0 || chunk_count as u64 > MAX_DA_CHUNK_COUNT {
                return Err(ConsensusError::parse("chunk_count out of range"));
            }
            let retl_domain_id: [u8; 32] = r.read_array("truncated retl_domain_id")?;
            let batch_number = r.read_u64_le()?;
            let tx_data_root: [u8; 32] = r.read_array("truncated tx_data_root")?;
            let state_root: [u8; 32] = r.read_array("truncated state_root")?;
            let withdrawals_root: [u8; 32] = r.read_array("truncated withdrawals_root")?;
            let batch_sig_suite = r.read_u8()?;
            let (batch_sig_len, _) = read_compact_size(&mut r)?;
            if batch_sig_len > MAX_DA_MANIFEST_BYTES_PER_TX {
                return Err(ConsensusError::parse("batch_sig_len exceeds cap"));
            }
            let batch_sig = r.read_bytes(batch_sig_len as usize)?.to_vec();
            da_commit = Some(DaCommitFields {
                da_id,
                chunk_count,
                retl_domain_id,
                batch_number,
                tx_data_root,
                state_root,
                withdrawals_root,
                batch_sig_suite,
                batch_sig,
            });
        }
        TX_KIND_DA_CHUNK => {
            let da_id: [u8; 32] = r.read_array("truncated da_id")?;
            let chunk_index = r.read_u16_le()?;
            if chunk_index as u64 >= MAX_DA_CHUNK_COUNT {
                return Err(ConsensusError::parse("chunk_index out of range"));
            }
            let chunk_hash: [u8; 32] = r.read_array("truncated chunk_hash")?;
            da_chunk = Some(DaChunkFields {
                da_id,
                chunk_index,
                chunk_hash,
            });
        }
        _ => {}
    }

    let core_end = r.offset();

    let (witness_count, witness_count_len) = read_compact_size(&mut r)?;
    if witness_count > MAX_WITNESS_ITEMS {
        return Err(ConsensusError::new(
            ErrorCode::TxWitnessOverflow,
            "witness_count exceeds cap",
        ));
    }
    let mut witness_bytes = witness_count_len;
    let mut witness = Vec::with_capacity(witness_count as usize);
    for _ in 0..witness_count {
        let suite_id = r.read_u8()?;
        witness_bytes += 1;

        let (pubkey_len, pubkey_len_bytes) = read_compact_size(&mut r)?;
        witness_bytes += pubkey_len_bytes;
        let pubkey = r.read_bytes(pubkey_len as usize)?.to_vec();
        witness_bytes += pubkey.len();

        let (sig_len, sig_len_bytes) = read_compact_size(&mut r)?;
        witness_bytes += sig_len_bytes;
        let signature = r.read_bytes(sig_len as usize)?.to_vec();
        witness_bytes += signature.len();

        let item = WitnessItem {
            suite_id,
            pubkey,
            signature,
        };
        check_witness_item_canonical(&item)?;

        if witness_bytes > MAX_WITNESS_BYTES_PER_TX {
            return Err(ConsensusError::new(
                ErrorCode::TxWitnessOverflow,
                "witness bytes exceed cap",
            ));
        }
        witness.push(item);
    }

    let (da_payload_len, _) = read_compact_size(&mut r)?;
    match tx_kind {
        TX_KIND_STANDARD => {
            if da_payload_len != 0 {
                return Err(ConsensusError::parse(
                    "da_payload_len must be 0 for standard txs",
                ));
            }
        }
        TX_KIND_DA_COMMIT => {
            if da_payload_len > MAX_DA_MANIFEST_BYTES_PER_TX {
                return Err(ConsensusError::parse("da_payload_len exceeds manifest cap"));
            }
        }
        TX_KIND_DA_CHUNK => {
            if da_payload_len == 0 || da_payload_len > MAX_DA_CHUNK_BYTES_PER_TX {
                return Err(ConsensusError::parse("da_payload_len out of chunk range"));
            }
        }
        _ => unreachable!("tx_kind checked above"),
    }
    let da_payload = r.read_bytes(da_payload_len as usize)?.to_vec();

    let total_end = r.offset();
    let txid = provider.sha3_256(&bytes[..core_end]);
    let wtxid = provider.sha3_256(&bytes[..total_end]);

    let tx = Tx {
        version,
        tx_kind,
        tx_nonce,
        inputs,
        outputs,
        locktime,
        da_commit,
        da_chunk,
        witness,
        da_payload,
    };
    Ok((tx, txid, wtxid, total_end))
}

/// Parse a 116-byte block header.
pub fn parse_block_header(bytes: &[u8]) -> Result<BlockHeader, ConsensusError> {
    if bytes.len() != BLOCK_HEADER_BYTES {
        return Err(ConsensusError::new(
            ErrorCode::BlockParse,
            "block header length mismatch",
        ));
    }
    let mut r = Reader::new(bytes);
    let version = r.read_u32_le()?;
    let prev_block_hash: [u8; 32] = r.read_array("truncated prev_block_hash")?;
    let merkle_root: [u8; 32] = r.read_array("truncated merkle_root")?;
    let timestamp = r.read_u64_le()?;
    let target: [u8; 32] = r.read_array("truncated target")?;
    let nonce = r.read_u64_le()?;
    Ok(BlockHeader {
        version,
        prev_block_hash,
        merkle_root,
        timestamp,
        target,
        nonce,
    })
}

/// Parse a full block: header, tx count, transactions, no trailing bytes.
pub fn parse_block(
    provider: &dyn CryptoProvider,
    bytes: &[u8],
) -> Result<ParsedBlock, ConsensusError> {
    if bytes.len() < BLOCK_HEADER_BYTES + 1 {
        return Err(ConsensusError::new(ErrorCode::BlockParse, "block too short"));
    }

    let mut header_bytes = [0u8; BLOCK_HEADER_BYTES];
    header_bytes.copy_from_slice(&bytes[..BLOCK_HEADER_BYTES]);
    let header = parse_block_header(&header_bytes)?;

    let mut r = Reader::new(&bytes[BLOCK_HEADER_BYTES..]);
    let (tx_count, _) = read_compact_size(&mut r)
        .map_err(|_| ConsensusError::new(ErrorCode::BlockParse, "invalid tx_count"))?;
    if tx_count == 0 {
        return Err(ConsensusError::new(
            ErrorCode::BlockCoinbaseInvalid,
            "empty block tx list",
        ));
    }

    // No preallocation from an attacker-controlled count; the byte
    // length bounds the real transaction count.
    let mut txs = Vec::new();
    let mut txids = Vec::new();
    let mut wtxids = Vec::new();
    for _ in 0..tx_count {
        let rest = &bytes[BLOCK_HEADER_BYTES + r.offset()..];
        if rest.is_empty() {
            return Err(ConsensusError::new(
                ErrorCode::BlockParse,
                "unexpected EOF in tx list",
            ));
        }
        let (tx, txid, wtxid, consumed) = parse_tx(provider, rest)?;
        r.read_bytes(consumed)
            .map_err(|_| ConsensusError::new(ErrorCode::BlockParse, "unexpected EOF in tx list"))?;
        txs.push(tx);
        txids.push(txid);
        wtxids.push(wtxid);
    }

    if BLOCK_HEADER_BYTES + r.offset() != bytes.len() {
        return Err(ConsensusError::new(
            ErrorCode::BlockParse,
            "trailing bytes after tx list",
        ));
    }

    Ok(ParsedBlock {
        header,
        header_bytes,
        tx_count,
        txs,
        txids,
        wtxids,
    })
}
