//! Covenant-specific spend authorization.
//!
//! Each function checks one input's witness slice against the covenant
//! carried by the UTXO it spends. Key bindings are by SHA3-256 of the
//! pubkey, so the chain never stores a full post-quantum public key
//! until the moment it is used.

use rubin_core::constants::{
    COV_TYPE_ANCHOR, LOCK_MODE_HEIGHT, MAX_HTLC_PREIMAGE_BYTES, SLH_DSA_ACTIVATION_HEIGHT,
    SUITE_ID_ML_DSA_87, SUITE_ID_SENTINEL, SUITE_ID_SLH_DSA_SHAKE_256F,
};
use rubin_core::covenant::{HtlcCovenant, parse_htlc, parse_p2pk, parse_timelock};
use rubin_core::crypto::CryptoProvider;
use rubin_core::error::{ConsensusError, ErrorCode};
use rubin_core::types::{Tx, UtxoEntry, WitnessItem};

use crate::params::ValidationParams;

/// Reject SLH-DSA witness items below the activation height.
pub(crate) fn check_suite_active(suite_id: u8, height: u64) -> Result<(), ConsensusError> {
    if suite_id == SUITE_ID_SLH_DSA_SHAKE_256F && height < SLH_DSA_ACTIVATION_HEIGHT {
        return Err(ConsensusError::new(
            ErrorCode::TxSigAlgInvalid,
            "SLH-DSA suite inactive at this height",
        ));
    }
    Ok(())
}

/// Verify a native-suite signature over `digest`, mapping a failed
/// verification to `TX_ERR_SIG_INVALID`.
fn verify_native_sig(
    provider: &dyn CryptoProvider,
    item: &WitnessItem,
    digest: &[u8; 32],
) -> Result<(), ConsensusError> {
    match item.suite_id {
        SUITE_ID_ML_DSA_87 | SUITE_ID_SLH_DSA_SHAKE_256F => {
            let valid = provider
                .verify(item.suite_id, &item.pubkey, &item.signature, digest)
                .map_err(|_| {
                    ConsensusError::new(ErrorCode::TxSigInvalid, "signature backend failure")
                })?;
            if !valid {
                return Err(ConsensusError::new(
                    ErrorCode::TxSigInvalid,
                    "signature verification failed",
                ));
            }
            Ok(())
        }
        _ => Err(ConsensusError::new(
            ErrorCode::TxSigAlgInvalid,
            "non-native signature suite",
        )),
    }
}

fn lock_satisfied(
    lock_mode: u8,
    lock_value: u64,
    height: u64,
    mtp: u64,
) -> Result<(), ConsensusError> {
    let reference = if lock_mode == LOCK_MODE_HEIGHT {
        height
    } else {
        mtp
    };
    if reference < lock_value {
        return Err(ConsensusError::new(
            ErrorCode::TxTimelockNotMet,
            "lock not yet satisfied",
        ));
    }
    Ok(())
}

/// P2PK: one native-suite witness whose pubkey hashes to the committed
/// key id and whose signature verifies over the sighash.
pub fn validate_p2pk_spend(
    provider: &dyn CryptoProvider,
    entry: &UtxoEntry,
    item: &WitnessItem,
    digest: &[u8; 32],
    height: u64,
) -> Result<(), ConsensusError> {
    if item.suite_id == SUITE_ID_SENTINEL {
        return Err(ConsensusError::new(
            ErrorCode::TxSigAlgInvalid,
            "P2PK requires a signature",
        ));
    }
    check_suite_active(item.suite_id, height)?;
    let cov = parse_p2pk(&entry.covenant_data)?;
    if item.suite_id != cov.suite_id {
        return Err(ConsensusError::new(
            ErrorCode::TxSigInvalid,
            "P2PK suite binding mismatch",
        ));
    }
    if provider.sha3_256(&item.pubkey) != cov.key_id {
        return Err(ConsensusError::new(
            ErrorCode::TxSigInvalid,
            "P2PK key binding mismatch",
        ));
    }
    verify_native_sig(provider, item, digest)
}

/// TIMELOCK_V1: an empty sentinel slot, spendable once the lock passes.
pub fn validate_timelock_spend(
    entry: &UtxoEntry,
    item: &WitnessItem,
    height: u64,
    mtp: u64,
) -> Result<(), ConsensusError> {
    if item.suite_id != SUITE_ID_SENTINEL {
        return Err(ConsensusError::new(
            ErrorCode::TxSigAlgInvalid,
            "TIMELOCK slot must be a sentinel",
        ));
    }
    if !item.pubkey.is_empty() || !item.signature.is_empty() {
        return Err(ConsensusError::parse("TIMELOCK sentinel must be empty"));
    }
    let cov = parse_timelock(&entry.covenant_data)?;
    lock_satisfied(cov.lock_mode, cov.lock_value, height, mtp)
}

/// MULTISIG / VAULT key-set check: one witness slot per declared key, a
/// sentinel meaning "no signature here", and at least `threshold` valid
/// signatures bound to their slot's key id.
pub fn validate_threshold_spend(
    provider: &dyn CryptoProvider,
    keys: &[[u8; 32]],
    threshold: u8,
    items: &[WitnessItem],
    digest: &[u8; 32],
    height: u64,
    context: &'static str,
) -> Result<(), ConsensusError> {
    if items.len() != keys.len() {
        return Err(ConsensusError::parse("witness slot assignment mismatch"));
    }

    let mut valid = 0u8;
    for (key, item) in keys.iter().zip(items) {
        match item.suite_id {
            SUITE_ID_SENTINEL => continue,
            SUITE_ID_ML_DSA_87 | SUITE_ID_SLH_DSA_SHAKE_256F => {
                check_suite_active(item.suite_id, height)?;
                if provider.sha3_256(&item.pubkey) != *key {
                    return Err(ConsensusError::new(ErrorCode::TxSigInvalid, context));
                }
                verify_native_sig(provider, item, digest)
                    .map_err(|e| ConsensusError::new(e.code, context))?;
                valid = valid.saturating_add(1);
            }
            _ => {
                return Err(ConsensusError::new(ErrorCode::TxSigAlgInvalid, context));
            }
        }
    }
    if valid < threshold {
        return Err(ConsensusError::new(ErrorCode::TxSigInvalid, context));
    }
    Ok(())
}

/// HTLC: a sentinel selector naming the path and key, then a signature
/// slot that verifies like a P2PK against the selected key id.
pub fn validate_htlc_spend(
    provider: &dyn CryptoProvider,
    entry: &UtxoEntry,
    selector: &WitnessItem,
    sig_item: &WitnessItem,
    digest: &[u8; 32],
    height: u64,
    mtp: u64,
) -> Result<(), ConsensusError> {
    let cov = parse_htlc(&entry.covenant_data)?;

    if selector.suite_id != SUITE_ID_SENTINEL {
        return Err(ConsensusError::parse("HTLC selector must be a sentinel"));
    }
    if selector.pubkey.len() != 32 {
        return Err(ConsensusError::parse("HTLC selector key id length"));
    }
    if selector.signature.is_empty() {
        return Err(ConsensusError::parse("HTLC selector payload missing"));
    }
    let mut selector_key_id = [0u8; 32];
    selector_key_id.copy_from_slice(&selector.pubkey);

    let expected_key_id = match selector.signature[0] {
        0x00 => {
            if selector_key_id != cov.claim_key_id {
                return Err(ConsensusError::new(
                    ErrorCode::TxSigInvalid,
                    "HTLC claim key id mismatch",
                ));
            }
            if selector.signature.len() < 3 {
                return Err(ConsensusError::parse("HTLC claim payload too short"));
            }
            let pre_len = u16::from_le_bytes([selector.signature[1], selector.signature[2]])
                as usize;
            if pre_len == 0 || pre_len > MAX_HTLC_PREIMAGE_BYTES {
                return Err(ConsensusError::parse("HTLC preimage length out of range"));
            }
            if selector.signature.len() != 3 + pre_len {
                return Err(ConsensusError::parse("HTLC claim payload length mismatch"));
            }
            let preimage = &selector.signature[3..];
            if provider.sha3_256(preimage) != cov.hash {
                return Err(ConsensusError::new(
                    ErrorCode::TxSigInvalid,
                    "HTLC preimage hash mismatch",
                ));
            }
            cov.claim_key_id
        }
        0x01 => {
            if selector_key_id != cov.refund_key_id {
                return Err(ConsensusError::new(
                    ErrorCode::TxSigInvalid,
                    "HTLC refund key id mismatch",
                ));
            }
            if selector.signature.len() != 1 {
                return Err(ConsensusError::parse("HTLC refund payload length mismatch"));
            }
            lock_satisfied(cov.lock_mode, cov.lock_value, height, mtp)?;
            cov.refund_key_id
        }
        _ => return Err(ConsensusError::parse("HTLC unknown spend path")),
    };

    check_signature_slot(provider, sig_item, &expected_key_id, digest, height)
}

/// HTLC_V2: the claim preimage rides in an ANCHOR envelope among the
/// spending transaction's outputs instead of the witness, so a watcher
/// can extract it from the block without witness data.
pub fn validate_htlc_v2_spend(
    provider: &dyn CryptoProvider,
    entry: &UtxoEntry,
    tx: &Tx,
    sig_item: &WitnessItem,
    digest: &[u8; 32],
    height: u64,
    mtp: u64,
) -> Result<(), ConsensusError> {
    const ENVELOPE_PREFIX: &[u8] = b"RUBINv1-htlc-preimage/";
    const ENVELOPE_LEN: usize = 54; // prefix (22) + preimage (32)

    let cov: HtlcCovenant = parse_htlc(&entry.covenant_data)?;

    let mut matching: Option<&[u8]> = None;
    let mut matches = 0usize;
    for output in &tx.outputs {
        if output.covenant_type != COV_TYPE_ANCHOR
            || output.covenant_data.len() != ENVELOPE_LEN
            || &output.covenant_data[..ENVELOPE_PREFIX.len()] != ENVELOPE_PREFIX
        {
            continue;
        }
        matches += 1;
        matching = Some(&output.covenant_data);
    }

    let expected_key_id = match matches {
        0 => {
            // No envelope: refund path.
            lock_satisfied(cov.lock_mode, cov.lock_value, height, mtp)?;
            cov.refund_key_id
        }
        1 => {
            let envelope = matching.expect("matches == 1");
            let preimage = &envelope[ENVELOPE_PREFIX.len()..];
            if provider.sha3_256(preimage) != cov.hash {
                return Err(ConsensusError::new(
                    ErrorCode::TxSigInvalid,
                    "HTLC_V2 preimage hash mismatch",
                ));
            }
            cov.claim_key_id
        }
        _ => return Err(ConsensusError::parse("ambiguous HTLC_V2 envelopes")),
    };

    check_signature_slot(provider, sig_item, &expected_key_id, digest, height)
}

/// EXT: spendable only under an ACTIVE deployment profile that admits
/// the witness suite.
pub fn validate_ext_spend(
    provider: &dyn CryptoProvider,
    params: &ValidationParams,
    entry: &UtxoEntry,
    item: &WitnessItem,
    digest: &[u8; 32],
    height: u64,
) -> Result<(), ConsensusError> {
    let cov = rubin_core::covenant::parse_ext(&entry.covenant_data)?;
    let Some(profile) = params.ext_profile(cov.ext_id)? else {
        return Err(ConsensusError::new(
            ErrorCode::TxSigAlgInvalid,
            "no active EXT deployment for ext_id",
        ));
    };
    if !profile.allowed_suite_ids.contains(&item.suite_id) {
        return Err(ConsensusError::new(
            ErrorCode::TxSigAlgInvalid,
            "suite not admitted by EXT profile",
        ));
    }
    check_suite_active(item.suite_id, height)?;
    verify_native_sig(provider, item, digest)
}

/// The signature half of a selector-based spend: a native suite bound
/// to `expected_key_id`, verifying over `digest`.
fn check_signature_slot(
    provider: &dyn CryptoProvider,
    item: &WitnessItem,
    expected_key_id: &[u8; 32],
    digest: &[u8; 32],
    height: u64,
) -> Result<(), ConsensusError> {
    if item.suite_id == SUITE_ID_SENTINEL {
        return Err(ConsensusError::new(
            ErrorCode::TxSigAlgInvalid,
            "signature slot requires a native suite",
        ));
    }
    check_suite_active(item.suite_id, height)?;
    if provider.sha3_256(&item.pubkey) != *expected_key_id {
        return Err(ConsensusError::new(
            ErrorCode::TxSigInvalid,
            "signature key binding mismatch",
        ));
    }
    verify_native_sig(provider, item, digest)
}
