//! Protocol constants. All monetary values are in base units; every value
//! here is consensus-critical and must match across independent
//! implementations bit for bit.

/// Only transaction wire version accepted by the genesis ruleset.
pub const TX_VERSION: u32 = 1;

/// Standard value-transfer transaction.
pub const TX_KIND_STANDARD: u8 = 0x00;
/// Data-availability batch commitment transaction.
pub const TX_KIND_DA_COMMIT: u8 = 0x01;
/// Data-availability chunk carrier transaction.
pub const TX_KIND_DA_CHUNK: u8 = 0x02;

// Covenant type codes (u16, little-endian on the wire).
pub const COV_TYPE_P2PK: u16 = 0x0000;
pub const COV_TYPE_TIMELOCK_V1: u16 = 0x0001;
pub const COV_TYPE_ANCHOR: u16 = 0x0002;
pub const COV_TYPE_RESERVED_FUTURE: u16 = 0x00ff;
pub const COV_TYPE_HTLC: u16 = 0x0100;
pub const COV_TYPE_VAULT: u16 = 0x0101;
pub const COV_TYPE_HTLC_V2: u16 = 0x0102;
pub const COV_TYPE_DA_COMMIT: u16 = 0x0103;
pub const COV_TYPE_MULTISIG: u16 = 0x0104;
pub const COV_TYPE_EXT: u16 = 0x0105;

// Signature suite identifiers.
pub const SUITE_ID_SENTINEL: u8 = 0x00;
pub const SUITE_ID_ML_DSA_87: u8 = 0x01;
pub const SUITE_ID_SLH_DSA_SHAKE_256F: u8 = 0x02;

// Canonical witness-item byte lengths per suite.
pub const ML_DSA_87_PUBKEY_BYTES: usize = 2_592;
pub const ML_DSA_87_SIG_BYTES: usize = 4_627;
pub const SLH_DSA_SHAKE_256F_PUBKEY_BYTES: usize = 64;
pub const MAX_SLH_DSA_SIG_BYTES: usize = 49_856;

// Transaction-level caps enforced at parse time.
pub const MAX_TX_INPUTS: u64 = 1_024;
pub const MAX_TX_OUTPUTS: u64 = 1_024;
pub const MAX_WITNESS_ITEMS: u64 = 1_024;
pub const MAX_WITNESS_BYTES_PER_TX: usize = 100_000;
pub const MAX_SCRIPT_SIG_BYTES: u64 = 32;
pub const MAX_COVENANT_DATA_PER_OUTPUT: u64 = 65_536;

// Covenant-specific layout bounds.
pub const P2PK_COVENANT_DATA_BYTES: usize = 33;
pub const TIMELOCK_COVENANT_DATA_BYTES: usize = 9;
pub const HTLC_COVENANT_DATA_BYTES: usize = 105;
pub const MAX_ANCHOR_PAYLOAD_SIZE: usize = 65_536;
pub const MAX_HTLC_PREIMAGE_BYTES: usize = 256;
pub const MAX_MULTISIG_KEYS: u8 = 64;
pub const MAX_VAULT_KEYS: u8 = 64;
pub const MAX_VAULT_WHITELIST_ENTRIES: u16 = 256;
/// Witness items consumed by one EXT input.
pub const EXT_WITNESS_SLOTS: usize = 1;

// Timelock modes shared by TIMELOCK_V1, HTLC and HTLC_V2.
pub const LOCK_MODE_HEIGHT: u8 = 0x00;
pub const LOCK_MODE_TIMESTAMP: u8 = 0x01;

// Data-availability caps.
pub const MAX_DA_MANIFEST_BYTES_PER_TX: u64 = 65_536;
pub const MAX_DA_CHUNK_BYTES_PER_TX: u64 = 524_288;
pub const MAX_DA_CHUNK_COUNT: u64 = 4_096;
pub const MAX_DA_BATCHES_PER_BLOCK: u64 = 128;
pub const MAX_DA_BYTES_PER_BLOCK: u64 = 32_000_000;

// Block-level caps and header geometry.
pub const BLOCK_HEADER_BYTES: usize = 116;
pub const MAX_BLOCK_WEIGHT: u64 = 4_000_000;
pub const MAX_ANCHOR_BYTES_PER_BLOCK: u64 = 131_072;
pub const WITNESS_DISCOUNT_DIVISOR: u64 = 4;

// Signature verification cost model (consensus weight accounting).
pub const VERIFY_COST_ML_DSA_87: u64 = 8;
pub const VERIFY_COST_SLH_DSA_SHAKE_256F: u64 = 64;

// Proof-of-work and timestamp rules.
pub const POW_LIMIT: [u8; 32] = [0xff; 32];
pub const WINDOW_SIZE: u64 = 2_016;
pub const TARGET_BLOCK_INTERVAL: u64 = 600;
pub const MAX_FUTURE_DRIFT: u64 = 7_200;
pub const MTP_WINDOW: u64 = 11;

// Coinbase rules.
pub const COINBASE_MATURITY: u64 = 100;
pub const COINBASE_PREVOUT_VOUT: u32 = u32::MAX;
pub const COINBASE_SEQUENCE: u32 = u32::MAX;
/// Highest sequence value a non-coinbase input may carry.
pub const MAX_TX_SEQUENCE: u32 = 0x7fff_ffff;

// Subsidy schedule: SUBSIDY_TOTAL_MINED distributed evenly across
// SUBSIDY_DURATION_BLOCKS, the division remainder front-loaded one unit
// per height, then a flat tail emission forever.
pub const SUBSIDY_TOTAL_MINED: u64 = 1_000_000_000_000_000;
pub const SUBSIDY_DURATION_BLOCKS: u64 = 3_000_000;
pub const TAIL_EMISSION_PER_BLOCK: u64 = 60_000_000;

// Deployment gates.
pub const SLH_DSA_ACTIVATION_HEIGHT: u64 = 20_160;
pub const SIGNAL_WINDOW: u64 = 2_016;
pub const SIGNAL_THRESHOLD: u32 = 1_815;
