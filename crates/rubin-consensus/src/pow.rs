//! Proof-of-work, timestamp rules and the difficulty retarget.
//!
//! Header hashes and targets compare as 32-byte big-endian integers,
//! which for equal-length byte arrays is plain lexicographic order. The
//! retarget runs every [`WINDOW_SIZE`] blocks and clamps the adjustment
//! to a factor of four in either direction; the upper bound saturates
//! at the pow limit so the result always fits 32 bytes.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use rubin_core::constants::{
    BLOCK_HEADER_BYTES, MAX_FUTURE_DRIFT, MTP_WINDOW, POW_LIMIT, TARGET_BLOCK_INTERVAL,
    WINDOW_SIZE,
};
use rubin_core::crypto::CryptoProvider;
use rubin_core::error::{ConsensusError, ErrorCode};

/// Check a header satisfies its target: `SHA3(header) < target`, with
/// the target non-zero and at most the pow limit.
pub fn pow_check(
    provider: &dyn CryptoProvider,
    header_bytes: &[u8],
    target: &[u8; 32],
) -> Result<(), ConsensusError> {
    if header_bytes.len() != BLOCK_HEADER_BYTES {
        return Err(ConsensusError::new(
            ErrorCode::BlockParse,
            "pow: invalid header length",
        ));
    }
    check_target_range(target)?;
    let hash = provider.sha3_256(header_bytes);
    if hash.as_slice() >= target.as_slice() {
        return Err(ConsensusError::new(
            ErrorCode::BlockPowInvalid,
            "header hash not below target",
        ));
    }
    Ok(())
}

/// Target must be non-zero and no easier than the pow limit.
pub fn check_target_range(target: &[u8; 32]) -> Result<(), ConsensusError> {
    if target == &[0u8; 32] {
        return Err(ConsensusError::new(
            ErrorCode::BlockTargetInvalid,
            "target is zero",
        ));
    }
    if target.as_slice() > POW_LIMIT.as_slice() {
        return Err(ConsensusError::new(
            ErrorCode::BlockTargetInvalid,
            "target above pow limit",
        ));
    }
    Ok(())
}

/// Median time past at `height`.
///
/// `prev_timestamps` is ordered most-recent-first (the parent header's
/// timestamp at index 0); the median covers the first `min(11, height)`
/// entries. Returns `None` at height 0 or when no context was supplied;
/// a context shorter than required is a parse error.
pub fn median_time_past(
    height: u64,
    prev_timestamps: Option<&[u64]>,
) -> Result<Option<u64>, ConsensusError> {
    if height == 0 {
        return Ok(None);
    }
    let Some(prev) = prev_timestamps else {
        return Ok(None);
    };
    if prev.is_empty() {
        return Ok(None);
    }

    let k = height.min(MTP_WINDOW) as usize;
    if prev.len() < k {
        return Err(ConsensusError::new(
            ErrorCode::BlockParse,
            "insufficient prev_timestamps context",
        ));
    }

    let mut window = prev[..k].to_vec();
    window.sort_unstable();
    Ok(Some(window[(window.len() - 1) / 2]))
}

/// Enforce the header timestamp window against the median time past:
/// strictly above MTP, at most MTP plus the future drift (saturating).
pub fn check_timestamp_rules(
    header_timestamp: u64,
    height: u64,
    prev_timestamps: Option<&[u64]>,
) -> Result<(), ConsensusError> {
    let Some(median) = median_time_past(height, prev_timestamps)? else {
        return Ok(());
    };
    if header_timestamp <= median {
        return Err(ConsensusError::new(
            ErrorCode::BlockTimestampOld,
            "timestamp not above median time past",
        ));
    }
    if header_timestamp > median.saturating_add(MAX_FUTURE_DRIFT) {
        return Err(ConsensusError::new(
            ErrorCode::BlockTimestampFuture,
            "timestamp exceeds future drift",
        ));
    }
    Ok(())
}

fn biguint_to_target(x: &BigUint) -> Result<[u8; 32], ConsensusError> {
    let bytes = x.to_bytes_be();
    if bytes.len() > 32 {
        return Err(ConsensusError::parse("u256 overflow"));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Compute the retargeted value from the first and last timestamps of a
/// completed window.
///
/// `t_new = floor(target_old * t_actual / (interval * window))`, with
/// `t_actual` floored at one second and the result clamped to
/// `[max(1, target_old/4), min(pow_limit, target_old*4)]`.
pub fn retarget_v1(
    target_old: [u8; 32],
    timestamp_first: u64,
    timestamp_last: u64,
) -> Result<[u8; 32], ConsensusError> {
    let pow_limit = BigUint::from_bytes_be(&POW_LIMIT);
    let t_old = BigUint::from_bytes_be(&target_old);
    if t_old.is_zero() {
        return Err(ConsensusError::parse("retarget: target_old is zero"));
    }
    if t_old > pow_limit {
        return Err(ConsensusError::parse("retarget: target_old above pow limit"));
    }

    let t_actual = if timestamp_last <= timestamp_first {
        1u64
    } else {
        timestamp_last - timestamp_first
    };
    let t_expected = TARGET_BLOCK_INTERVAL
        .checked_mul(WINDOW_SIZE)
        .ok_or(ConsensusError::parse("retarget: expected time overflow"))?;

    let mut t_new = (&t_old * BigUint::from(t_actual)) / BigUint::from(t_expected);

    let mut lower = &t_old >> 2;
    if lower < BigUint::one() {
        lower = BigUint::one();
    }
    // The shift cannot overflow a BigUint; taking the minimum with the
    // pow limit is the 32-byte saturation.
    let upper = core::cmp::min(&t_old << 2, pow_limit);

    if t_new < lower {
        t_new = lower;
    }
    if t_new > upper {
        t_new = upper;
    }

    biguint_to_target(&t_new)
}

/// Retarget from a full window of timestamps, oldest first.
pub fn retarget_for_window(
    target_old: [u8; 32],
    window_timestamps: &[u64],
) -> Result<[u8; 32], ConsensusError> {
    if window_timestamps.len() != WINDOW_SIZE as usize {
        return Err(ConsensusError::parse("retarget: window length mismatch"));
    }
    let first = window_timestamps[0];
    let last = window_timestamps[window_timestamps.len() - 1];
    retarget_v1(target_old, first, last)
}
