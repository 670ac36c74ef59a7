//! Block subsidy schedule.
//!
//! [`SUBSIDY_TOTAL_MINED`] is distributed evenly across
//! [`SUBSIDY_DURATION_BLOCKS`]; the division remainder is paid one extra
//! unit per height at the front of the schedule so the total comes out
//! exact. Once the schedule is exhausted a constant tail emission keeps
//! every block worth mining. Fees never enter `already_generated`; the
//! ledger tracks issuance, not throughput.

use rubin_core::constants::{
    SUBSIDY_DURATION_BLOCKS, SUBSIDY_TOTAL_MINED, TAIL_EMISSION_PER_BLOCK,
};

/// Subsidy for the block at `height`, given the cumulative subsidy
/// issued strictly before it.
pub fn block_subsidy(height: u64, already_generated: u64) -> u64 {
    if height == 0 {
        return 0;
    }
    if already_generated >= SUBSIDY_TOTAL_MINED || height > SUBSIDY_DURATION_BLOCKS {
        return TAIL_EMISSION_PER_BLOCK;
    }
    let base = SUBSIDY_TOTAL_MINED / SUBSIDY_DURATION_BLOCKS;
    let remainder = SUBSIDY_TOTAL_MINED % SUBSIDY_DURATION_BLOCKS;
    let amount = if height <= remainder { base + 1 } else { base };
    amount.max(TAIL_EMISSION_PER_BLOCK)
}

/// `already_generated` for the next height: the current value plus this
/// block's subsidy. Height 0 issues nothing.
pub fn advance_already_generated(height: u64, already_generated: u64) -> u64 {
    already_generated.saturating_add(block_subsidy(height, already_generated))
}
