//! Chain work for fork choice.
//!
//! Per-header work is `floor(2^256 / target)`; the heaviest chain is
//! the one with the largest cumulative sum. Arbitrary precision, no
//! floats; fork choice must be exact.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use rubin_core::constants::POW_LIMIT;
use rubin_core::error::ConsensusError;

/// Work contributed by one header with the given target.
pub fn work_from_target(target: [u8; 32]) -> Result<BigUint, ConsensusError> {
    let t = BigUint::from_bytes_be(&target);
    if t.is_zero() {
        return Err(ConsensusError::parse("work: target is zero"));
    }
    if t > BigUint::from_bytes_be(&POW_LIMIT) {
        return Err(ConsensusError::parse("work: target above pow limit"));
    }
    let two256: BigUint = BigUint::one() << 256u32;
    Ok(two256 / t)
}

/// Cumulative work of a header chain given its targets.
pub fn chain_work_from_targets(targets: &[[u8; 32]]) -> Result<BigUint, ConsensusError> {
    let mut total = BigUint::zero();
    for target in targets {
        total += work_from_target(*target)?;
    }
    Ok(total)
}
