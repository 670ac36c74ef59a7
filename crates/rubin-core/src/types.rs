//! Core protocol types: transactions, blocks, outpoints, UTXO entries.
//!
//! The wire layout is fixed by the protocol down to the byte, so every
//! type carries its own canonical encoder; [`crate::wire`] holds the
//! matching strict decoders. `txid` covers the core bytes (through
//! locktime and the DA-core fields), `wtxid` covers the full
//! serialization including witnesses and the DA payload.

use serde::{Deserialize, Serialize};

use crate::codec::write_compact_size;
use crate::constants::{
    BLOCK_HEADER_BYTES, COINBASE_PREVOUT_VOUT, COINBASE_SEQUENCE, COV_TYPE_ANCHOR,
    COV_TYPE_DA_COMMIT, TX_KIND_DA_CHUNK, TX_KIND_DA_COMMIT, TX_KIND_STANDARD,
};
use crate::crypto::CryptoProvider;
use crate::error::ConsensusError;

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Outpoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

impl Outpoint {
    /// The coinbase sentinel: zero txid, all-ones vout.
    pub fn coinbase_sentinel() -> Self {
        Self {
            txid: [0u8; 32],
            vout: COINBASE_PREVOUT_VOUT,
        }
    }

    /// Whether this is the coinbase sentinel outpoint.
    pub fn is_coinbase_sentinel(&self) -> bool {
        self.txid == [0u8; 32] && self.vout == COINBASE_PREVOUT_VOUT
    }
}

/// A transaction input, spending a previous output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    pub prev_txid: [u8; 32],
    pub prev_vout: u32,
    /// Must be empty under the genesis covenant set.
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    pub fn outpoint(&self) -> Outpoint {
        Outpoint {
            txid: self.prev_txid,
            vout: self.prev_vout,
        }
    }
}

/// A transaction output: a value locked behind a covenant.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub covenant_type: u16,
    pub covenant_data: Vec<u8>,
}

impl TxOutput {
    /// Whether applying this output creates a UTXO. ANCHOR and
    /// DA_COMMIT outputs are pure commitments and never enter the set.
    pub fn creates_utxo(&self) -> bool {
        self.covenant_type != COV_TYPE_ANCHOR && self.covenant_type != COV_TYPE_DA_COMMIT
    }

    /// Canonical wire bytes: value ‖ covenant_type ‖ CompactSize(len) ‖ data.
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 2 + 9 + self.covenant_data.len());
        out.extend_from_slice(&self.value.to_le_bytes());
        out.extend_from_slice(&self.covenant_type.to_le_bytes());
        write_compact_size(self.covenant_data.len() as u64, &mut out);
        out.extend_from_slice(&self.covenant_data);
        out
    }
}

/// One witness item: suite id plus length-prefixed pubkey and signature.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WitnessItem {
    pub suite_id: u8,
    pub pubkey: Vec<u8>,
    pub signature: Vec<u8>,
}

impl WitnessItem {
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 9 + self.pubkey.len() + 9 + self.signature.len());
        out.push(self.suite_id);
        write_compact_size(self.pubkey.len() as u64, &mut out);
        out.extend_from_slice(&self.pubkey);
        write_compact_size(self.signature.len() as u64, &mut out);
        out.extend_from_slice(&self.signature);
        out
    }
}

/// DA-core fields of a batch commitment transaction (tx_kind = 1).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DaCommitFields {
    pub da_id: [u8; 32],
    pub chunk_count: u16,
    pub retl_domain_id: [u8; 32],
    pub batch_number: u64,
    pub tx_data_root: [u8; 32],
    pub state_root: [u8; 32],
    pub withdrawals_root: [u8; 32],
    pub batch_sig_suite: u8,
    pub batch_sig: Vec<u8>,
}

/// DA-core fields of a chunk carrier transaction (tx_kind = 2).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DaChunkFields {
    pub da_id: [u8; 32],
    pub chunk_index: u16,
    pub chunk_hash: [u8; 32],
}

/// A parsed transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Tx {
    pub version: u32,
    pub tx_kind: u8,
    pub tx_nonce: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
    /// Present iff `tx_kind == TX_KIND_DA_COMMIT`.
    pub da_commit: Option<DaCommitFields>,
    /// Present iff `tx_kind == TX_KIND_DA_CHUNK`.
    pub da_chunk: Option<DaChunkFields>,
    pub witness: Vec<WitnessItem>,
    pub da_payload: Vec<u8>,
}

impl Tx {
    /// Whether this transaction has canonical coinbase shape: a single
    /// sentinel input, empty script_sig, zero nonce, no witnesses, no
    /// DA payload, standard kind.
    ///
    /// Shape alone does not make a valid coinbase; the first block
    /// transaction must also commit to the height via `locktime`.
    pub fn is_coinbase_shaped(&self) -> bool {
        if self.tx_kind != TX_KIND_STANDARD
            || self.tx_nonce != 0
            || self.inputs.len() != 1
            || !self.witness.is_empty()
            || !self.da_payload.is_empty()
        {
            return false;
        }
        let input = &self.inputs[0];
        input.outpoint().is_coinbase_sentinel()
            && input.script_sig.is_empty()
            && input.sequence == COINBASE_SEQUENCE
    }

    /// Whether this is the canonical coinbase for a block at `height`.
    pub fn is_coinbase(&self, height: u64) -> bool {
        self.is_coinbase_shaped() && self.locktime as u64 == height
    }

    /// The DA-core field bytes, as serialized between locktime and the
    /// witness section. Empty for standard transactions.
    pub fn da_core_bytes(&self) -> Result<Vec<u8>, ConsensusError> {
        match self.tx_kind {
            TX_KIND_STANDARD => Ok(Vec::new()),
            TX_KIND_DA_COMMIT => {
                let f = self
                    .da_commit
                    .as_ref()
                    .ok_or(ConsensusError::parse("missing DA commit fields"))?;
                let mut out = Vec::with_capacity(32 + 2 + 32 + 8 + 32 * 3 + 1 + 9 + f.batch_sig.len());
                out.extend_from_slice(&f.da_id);
                out.extend_from_slice(&f.chunk_count.to_le_bytes());
                out.extend_from_slice(&f.retl_domain_id);
                out.extend_from_slice(&f.batch_number.to_le_bytes());
                out.extend_from_slice(&f.tx_data_root);
                out.extend_from_slice(&f.state_root);
                out.extend_from_slice(&f.withdrawals_root);
                out.push(f.batch_sig_suite);
                write_compact_size(f.batch_sig.len() as u64, &mut out);
                out.extend_from_slice(&f.batch_sig);
                Ok(out)
            }
            TX_KIND_DA_CHUNK => {
                let f = self
                    .da_chunk
                    .as_ref()
                    .ok_or(ConsensusError::parse("missing DA chunk fields"))?;
                let mut out = Vec::with_capacity(32 + 2 + 32);
                out.extend_from_slice(&f.da_id);
                out.extend_from_slice(&f.chunk_index.to_le_bytes());
                out.extend_from_slice(&f.chunk_hash);
                Ok(out)
            }
            _ => Err(ConsensusError::parse("unsupported tx_kind")),
        }
    }

    /// The core bytes: everything up to and including the DA-core
    /// fields. This is the `txid` preimage.
    pub fn core_bytes(&self) -> Result<Vec<u8>, ConsensusError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.push(self.tx_kind);
        out.extend_from_slice(&self.tx_nonce.to_le_bytes());
        write_compact_size(self.inputs.len() as u64, &mut out);
        for input in &self.inputs {
            out.extend_from_slice(&input.prev_txid);
            out.extend_from_slice(&input.prev_vout.to_le_bytes());
            write_compact_size(input.script_sig.len() as u64, &mut out);
            out.extend_from_slice(&input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(self.outputs.len() as u64, &mut out);
        for output in &self.outputs {
            out.extend_from_slice(&output.wire_bytes());
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out.extend_from_slice(&self.da_core_bytes()?);
        Ok(out)
    }

    /// The witness section bytes, count prefix included.
    pub fn witness_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_compact_size(self.witness.len() as u64, &mut out);
        for item in &self.witness {
            out.extend_from_slice(&item.wire_bytes());
        }
        out
    }

    /// The full canonical serialization. This is the `wtxid` preimage.
    pub fn wire_bytes(&self) -> Result<Vec<u8>, ConsensusError> {
        let mut out = self.core_bytes()?;
        out.extend_from_slice(&self.witness_bytes());
        write_compact_size(self.da_payload.len() as u64, &mut out);
        out.extend_from_slice(&self.da_payload);
        Ok(out)
    }

    /// Transaction id: SHA3-256 of the core bytes.
    pub fn txid(&self, provider: &dyn CryptoProvider) -> Result<[u8; 32], ConsensusError> {
        Ok(provider.sha3_256(&self.core_bytes()?))
    }

    /// Witness transaction id: SHA3-256 of the full serialization.
    pub fn wtxid(&self, provider: &dyn CryptoProvider) -> Result<[u8; 32], ConsensusError> {
        Ok(provider.sha3_256(&self.wire_bytes()?))
    }
}

/// Fixed 116-byte block header.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u64,
    /// 32-byte big-endian proof-of-work target.
    pub target: [u8; 32],
    pub nonce: u64,
}

impl BlockHeader {
    /// Canonical 116-byte wire form.
    pub fn wire_bytes(&self) -> [u8; BLOCK_HEADER_BYTES] {
        let mut out = [0u8; BLOCK_HEADER_BYTES];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(&self.prev_block_hash);
        out[36..68].copy_from_slice(&self.merkle_root);
        out[68..76].copy_from_slice(&self.timestamp.to_le_bytes());
        out[76..108].copy_from_slice(&self.target);
        out[108..116].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Block hash: SHA3-256 of the header bytes.
    pub fn hash(&self, provider: &dyn CryptoProvider) -> [u8; 32] {
        provider.sha3_256(&self.wire_bytes())
    }
}

/// A complete block: header plus ordered transactions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Tx>,
}

/// An entry in the unspent transaction output set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UtxoEntry {
    pub value: u64,
    pub covenant_type: u16,
    pub covenant_data: Vec<u8>,
    pub creation_height: u64,
    /// Gates the 100-block coinbase maturity rule.
    pub created_by_coinbase: bool,
}

impl UtxoEntry {
    /// Whether a coinbase output has matured enough to be spent at
    /// `height`. Non-coinbase outputs are always mature.
    pub fn is_mature(&self, height: u64, maturity: u64) -> bool {
        if !self.created_by_coinbase {
            return true;
        }
        height >= self.creation_height.saturating_add(maturity)
    }
}
