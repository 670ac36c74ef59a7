//! Covenant decoding and output-side constraints.
//!
//! Each covenant type has an exact byte layout; the decoders reject
//! anything else. Key and whitelist lists must be strictly sorted and
//! unique so that a covenant has exactly one canonical encoding.

use crate::codec::{Reader, read_compact_size, write_compact_size};
use crate::constants::{
    COV_TYPE_ANCHOR, COV_TYPE_DA_COMMIT, COV_TYPE_EXT, COV_TYPE_HTLC, COV_TYPE_HTLC_V2,
    COV_TYPE_MULTISIG, COV_TYPE_P2PK, COV_TYPE_RESERVED_FUTURE, COV_TYPE_TIMELOCK_V1,
    COV_TYPE_VAULT, EXT_WITNESS_SLOTS, HTLC_COVENANT_DATA_BYTES, LOCK_MODE_HEIGHT,
    LOCK_MODE_TIMESTAMP, MAX_ANCHOR_PAYLOAD_SIZE, MAX_MULTISIG_KEYS, MAX_VAULT_KEYS,
    MAX_VAULT_WHITELIST_ENTRIES, P2PK_COVENANT_DATA_BYTES, SLH_DSA_ACTIVATION_HEIGHT,
    SUITE_ID_ML_DSA_87, SUITE_ID_SLH_DSA_SHAKE_256F, TIMELOCK_COVENANT_DATA_BYTES,
    TX_KIND_DA_COMMIT,
};
use crate::crypto::CryptoProvider;
use crate::error::{ConsensusError, ErrorCode};
use crate::types::{Tx, TxOutput};

/// P2PK covenant: suite id plus the SHA3-256 of the controlling pubkey.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P2pkCovenant {
    pub suite_id: u8,
    pub key_id: [u8; 32],
}

/// TIMELOCK_V1 covenant: spendable once the lock is satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimelockCovenant {
    /// 0 = block height, 1 = median time past.
    pub lock_mode: u8,
    pub lock_value: u64,
}

/// HTLC covenant: hash lock with claim and refund key bindings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HtlcCovenant {
    pub hash: [u8; 32],
    pub lock_mode: u8,
    pub lock_value: u64,
    pub claim_key_id: [u8; 32],
    pub refund_key_id: [u8; 32],
}

/// VAULT covenant: threshold keys plus a destination whitelist bound to
/// an owner lock descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultCovenant {
    pub owner_lock_id: [u8; 32],
    pub threshold: u8,
    pub keys: Vec<[u8; 32]>,
    pub whitelist: Vec<[u8; 32]>,
}

/// MULTISIG covenant: threshold over strictly sorted key ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultisigCovenant {
    pub threshold: u8,
    pub keys: Vec<[u8; 32]>,
}

/// EXT covenant: an extension id with an opaque payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtCovenant {
    pub ext_id: u16,
    pub ext_payload: Vec<u8>,
}

fn strictly_sorted_unique(xs: &[[u8; 32]]) -> bool {
    xs.windows(2).all(|w| w[0] < w[1])
}

/// Binary search in a strictly sorted key-id list.
pub fn hash_in_sorted(list: &[[u8; 32]], target: &[u8; 32]) -> bool {
    list.binary_search(target).is_ok()
}

pub fn parse_p2pk(covenant_data: &[u8]) -> Result<P2pkCovenant, ConsensusError> {
    if covenant_data.len() != P2PK_COVENANT_DATA_BYTES {
        return Err(ConsensusError::parse("P2PK covenant_data length mismatch"));
    }
    let suite_id = covenant_data[0];
    if suite_id != SUITE_ID_ML_DSA_87 && suite_id != SUITE_ID_SLH_DSA_SHAKE_256F {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "P2PK suite id invalid",
        ));
    }
    let mut key_id = [0u8; 32];
    key_id.copy_from_slice(&covenant_data[1..33]);
    Ok(P2pkCovenant { suite_id, key_id })
}

pub fn parse_timelock(covenant_data: &[u8]) -> Result<TimelockCovenant, ConsensusError> {
    if covenant_data.len() != TIMELOCK_COVENANT_DATA_BYTES {
        return Err(ConsensusError::parse(
            "TIMELOCK covenant_data length mismatch",
        ));
    }
    let lock_mode = covenant_data[0];
    if lock_mode != LOCK_MODE_HEIGHT && lock_mode != LOCK_MODE_TIMESTAMP {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "TIMELOCK lock_mode invalid",
        ));
    }
    let lock_value = u64::from_le_bytes(covenant_data[1..9].try_into().expect("8 bytes"));
    Ok(TimelockCovenant {
        lock_mode,
        lock_value,
    })
}

pub fn parse_htlc(covenant_data: &[u8]) -> Result<HtlcCovenant, ConsensusError> {
    if covenant_data.len() != HTLC_COVENANT_DATA_BYTES {
        return Err(ConsensusError::parse("HTLC covenant_data length mismatch"));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&covenant_data[0..32]);
    let lock_mode = covenant_data[32];
    let lock_value = u64::from_le_bytes(covenant_data[33..41].try_into().expect("8 bytes"));
    let mut claim_key_id = [0u8; 32];
    claim_key_id.copy_from_slice(&covenant_data[41..73]);
    let mut refund_key_id = [0u8; 32];
    refund_key_id.copy_from_slice(&covenant_data[73..105]);

    if lock_mode != LOCK_MODE_HEIGHT && lock_mode != LOCK_MODE_TIMESTAMP {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "HTLC lock_mode invalid",
        ));
    }
    if lock_value == 0 {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "HTLC lock_value must be > 0",
        ));
    }
    if claim_key_id == refund_key_id {
        return Err(ConsensusError::parse("HTLC claim/refund key ids equal"));
    }

    Ok(HtlcCovenant {
        hash,
        lock_mode,
        lock_value,
        claim_key_id,
        refund_key_id,
    })
}

pub fn parse_vault(covenant_data: &[u8]) -> Result<VaultCovenant, ConsensusError> {
    if covenant_data.len() < 34 {
        return Err(ConsensusError::new(
            ErrorCode::TxVaultMalformed,
            "VAULT covenant_data too short",
        ));
    }

    let mut owner_lock_id = [0u8; 32];
    owner_lock_id.copy_from_slice(&covenant_data[0..32]);
    let threshold = covenant_data[32];
    let key_count = covenant_data[33];
    if key_count == 0 || key_count > MAX_VAULT_KEYS {
        return Err(ConsensusError::new(
            ErrorCode::TxVaultParamsInvalid,
            "VAULT key_count out of range",
        ));
    }
    if threshold == 0 || threshold > key_count {
        return Err(ConsensusError::new(
            ErrorCode::TxVaultParamsInvalid,
            "VAULT threshold out of range",
        ));
    }

    let mut offset = 34usize;
    let mut keys = Vec::with_capacity(key_count as usize);
    for _ in 0..key_count {
        if offset + 32 > covenant_data.len() {
            return Err(ConsensusError::new(
                ErrorCode::TxVaultMalformed,
                "VAULT truncated key list",
            ));
        }
        let mut k = [0u8; 32];
        k.copy_from_slice(&covenant_data[offset..offset + 32]);
        offset += 32;
        keys.push(k);
    }
    if !strictly_sorted_unique(&keys) {
        return Err(ConsensusError::new(
            ErrorCode::TxVaultKeysNotCanonical,
            "VAULT keys not strictly sorted",
        ));
    }

    if offset + 2 > covenant_data.len() {
        return Err(ConsensusError::new(
            ErrorCode::TxVaultMalformed,
            "VAULT missing whitelist_count",
        ));
    }
    let whitelist_count =
        u16::from_le_bytes([covenant_data[offset], covenant_data[offset + 1]]);
    offset += 2;
    if whitelist_count == 0 || whitelist_count > MAX_VAULT_WHITELIST_ENTRIES {
        return Err(ConsensusError::new(
            ErrorCode::TxVaultParamsInvalid,
            "VAULT whitelist_count out of range",
        ));
    }

    let expected = 32 + 1 + 1 + (key_count as usize) * 32 + 2 + (whitelist_count as usize) * 32;
    if covenant_data.len() != expected {
        return Err(ConsensusError::new(
            ErrorCode::TxVaultMalformed,
            "VAULT covenant_data length mismatch",
        ));
    }

    let mut whitelist = Vec::with_capacity(whitelist_count as usize);
    for _ in 0..whitelist_count {
        let mut h = [0u8; 32];
        h.copy_from_slice(&covenant_data[offset..offset + 32]);
        offset += 32;
        whitelist.push(h);
    }
    if !strictly_sorted_unique(&whitelist) {
        return Err(ConsensusError::new(
            ErrorCode::TxVaultWhitelistNotCanonical,
            "VAULT whitelist not strictly sorted",
        ));
    }
    if hash_in_sorted(&whitelist, &owner_lock_id) {
        return Err(ConsensusError::new(
            ErrorCode::TxVaultOwnerDestinationForbidden,
            "VAULT whitelist contains owner_lock_id",
        ));
    }

    Ok(VaultCovenant {
        owner_lock_id,
        threshold,
        keys,
        whitelist,
    })
}

pub fn parse_multisig(covenant_data: &[u8]) -> Result<MultisigCovenant, ConsensusError> {
    if covenant_data.len() < 34 {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "MULTISIG covenant_data too short",
        ));
    }
    let threshold = covenant_data[0];
    let key_count = covenant_data[1];
    if key_count == 0 || key_count > MAX_MULTISIG_KEYS {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "MULTISIG key_count out of range",
        ));
    }
    if threshold == 0 || threshold > key_count {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "MULTISIG threshold out of range",
        ));
    }
    let expected = 2 + (key_count as usize) * 32;
    if covenant_data.len() != expected {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "MULTISIG covenant_data length mismatch",
        ));
    }

    let mut keys = Vec::with_capacity(key_count as usize);
    let mut offset = 2usize;
    for _ in 0..key_count {
        let mut k = [0u8; 32];
        k.copy_from_slice(&covenant_data[offset..offset + 32]);
        offset += 32;
        keys.push(k);
    }
    if !strictly_sorted_unique(&keys) {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "MULTISIG keys not strictly sorted",
        ));
    }

    Ok(MultisigCovenant { threshold, keys })
}

pub fn parse_ext(covenant_data: &[u8]) -> Result<ExtCovenant, ConsensusError> {
    if covenant_data.len() < 3 {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "EXT covenant_data too short",
        ));
    }
    let mut r = Reader::new(covenant_data);
    let ext_id = r
        .read_u16_le()
        .map_err(|_| ConsensusError::new(ErrorCode::TxCovenantTypeInvalid, "EXT missing ext_id"))?;
    let (payload_len, _) = read_compact_size(&mut r).map_err(|_| {
        ConsensusError::new(ErrorCode::TxCovenantTypeInvalid, "EXT payload length invalid")
    })?;
    if payload_len as usize != r.remaining() {
        return Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "EXT covenant_data length mismatch",
        ));
    }
    let ext_payload = r
        .read_bytes(payload_len as usize)
        .map_err(|_| {
            ConsensusError::new(ErrorCode::TxCovenantTypeInvalid, "EXT truncated payload")
        })?
        .to_vec();
    Ok(ExtCovenant {
        ext_id,
        ext_payload,
    })
}

/// Number of witness items an input of this covenant consumes.
pub fn witness_slots(covenant_type: u16, covenant_data: &[u8]) -> Result<usize, ConsensusError> {
    match covenant_type {
        COV_TYPE_P2PK => Ok(1),
        COV_TYPE_TIMELOCK_V1 => Ok(1),
        COV_TYPE_MULTISIG => Ok(parse_multisig(covenant_data)?.keys.len()),
        COV_TYPE_VAULT => Ok(parse_vault(covenant_data)?.keys.len()),
        COV_TYPE_HTLC => Ok(2),
        COV_TYPE_HTLC_V2 => Ok(1),
        COV_TYPE_EXT => Ok(EXT_WITNESS_SLOTS),
        COV_TYPE_ANCHOR | COV_TYPE_DA_COMMIT => Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "unspendable covenant has no witness slots",
        )),
        _ => Err(ConsensusError::new(
            ErrorCode::TxCovenantTypeInvalid,
            "unknown covenant type",
        )),
    }
}

/// Canonical output descriptor: covenant_type ‖ CompactSize(len) ‖ data.
///
/// Its SHA3-256 identifies a destination for vault owner binding and
/// whitelist membership.
pub fn output_descriptor_bytes(covenant_type: u16, covenant_data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + 9 + covenant_data.len());
    out.extend_from_slice(&covenant_type.to_le_bytes());
    write_compact_size(covenant_data.len() as u64, &mut out);
    out.extend_from_slice(covenant_data);
    out
}

/// SHA3-256 of the canonical output descriptor.
pub fn output_descriptor_hash(
    provider: &dyn CryptoProvider,
    covenant_type: u16,
    covenant_data: &[u8],
) -> [u8; 32] {
    provider.sha3_256(&output_descriptor_bytes(covenant_type, covenant_data))
}

/// Validate one output against the genesis covenant rules.
pub fn validate_output_covenant(
    output: &TxOutput,
    tx_kind: u8,
    block_height: u64,
    htlc_v2_active: bool,
) -> Result<(), ConsensusError> {
    match output.covenant_type {
        COV_TYPE_P2PK => {
            if output.value == 0 {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "P2PK value must be > 0",
                ));
            }
            let cov = parse_p2pk(&output.covenant_data)?;
            if cov.suite_id == SUITE_ID_SLH_DSA_SHAKE_256F
                && block_height < SLH_DSA_ACTIVATION_HEIGHT
            {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "SLH-DSA P2PK inactive at this height",
                ));
            }
        }
        COV_TYPE_TIMELOCK_V1 => {
            if output.value == 0 {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "TIMELOCK value must be > 0",
                ));
            }
            parse_timelock(&output.covenant_data)?;
        }
        COV_TYPE_ANCHOR => {
            if output.value != 0 {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "ANCHOR value must be 0",
                ));
            }
            if output.covenant_data.is_empty()
                || output.covenant_data.len() > MAX_ANCHOR_PAYLOAD_SIZE
            {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "ANCHOR payload length out of range",
                ));
            }
        }
        COV_TYPE_HTLC => {
            if output.value == 0 {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "HTLC value must be > 0",
                ));
            }
            parse_htlc(&output.covenant_data)?;
        }
        COV_TYPE_HTLC_V2 => {
            // Unassigned until the deployment activates; never at genesis.
            if !htlc_v2_active {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "HTLC_V2 deployment inactive",
                ));
            }
            if output.value == 0 {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "HTLC_V2 value must be > 0",
                ));
            }
            parse_htlc(&output.covenant_data)?;
        }
        COV_TYPE_VAULT => {
            if output.value == 0 {
                return Err(ConsensusError::new(
                    ErrorCode::TxVaultParamsInvalid,
                    "VAULT value must be > 0",
                ));
            }
            parse_vault(&output.covenant_data)?;
        }
        COV_TYPE_MULTISIG => {
            if output.value == 0 {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "MULTISIG value must be > 0",
                ));
            }
            parse_multisig(&output.covenant_data)?;
        }
        COV_TYPE_DA_COMMIT => {
            if tx_kind != TX_KIND_DA_COMMIT {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "DA_COMMIT output outside a commit transaction",
                ));
            }
            if output.value != 0 {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "DA_COMMIT value must be 0",
                ));
            }
            if output.covenant_data.len() != 32 {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "DA_COMMIT commitment must be 32 bytes",
                ));
            }
        }
        COV_TYPE_EXT => {
            if output.value == 0 {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "EXT value must be > 0",
                ));
            }
            parse_ext(&output.covenant_data)?;
        }
        COV_TYPE_RESERVED_FUTURE => {
            return Err(ConsensusError::new(
                ErrorCode::TxCovenantTypeInvalid,
                "reserved covenant type",
            ));
        }
        _ => {
            return Err(ConsensusError::new(
                ErrorCode::TxCovenantTypeInvalid,
                "unknown covenant type",
            ));
        }
    }
    Ok(())
}

/// Validate every output of a transaction against the genesis rules.
pub fn validate_tx_covenants(
    tx: &Tx,
    block_height: u64,
    htlc_v2_active: bool,
) -> Result<(), ConsensusError> {
    for output in &tx.outputs {
        validate_output_covenant(output, tx.tx_kind, block_height, htlc_v2_active)?;
    }
    Ok(())
}
