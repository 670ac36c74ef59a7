//! Consensus error codes for the Rubin protocol.
//!
//! Every rejection is a value with a stable code string; the code-to-string
//! mapping is part of the cross-implementation contract and callers switch
//! on [`ErrorCode`] rather than on rendered text. The free-form context is
//! diagnostic only and carries no consensus meaning.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable consensus error code.
///
/// The set is exhaustive: every rejection a validator can produce maps to
/// exactly one of these, and [`ErrorCode::as_str`] reconstructs the wire
/// string other implementations emit for the same input.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    TxParse,
    TxSigAlgInvalid,
    TxSigInvalid,
    TxSigNoncanonical,
    TxWitnessOverflow,
    TxMissingUtxo,
    TxValueConservation,
    TxCovenantTypeInvalid,
    TxTimelockNotMet,
    TxCoinbaseImmature,
    TxSequenceInvalid,
    TxNonceInvalid,
    TxNonceReplay,
    TxVaultMalformed,
    TxVaultParamsInvalid,
    TxVaultKeysNotCanonical,
    TxVaultWhitelistNotCanonical,
    TxVaultOwnerDestinationForbidden,
    TxVaultOwnerAuthRequired,
    TxVaultFeeSponsorForbidden,
    TxVaultMultiInputForbidden,
    TxVaultOutputNotWhitelisted,
    BlockParse,
    BlockLinkageInvalid,
    BlockMerkleInvalid,
    BlockPowInvalid,
    BlockTargetInvalid,
    BlockWeightExceeded,
    BlockCoinbaseInvalid,
    BlockSubsidyExceeded,
    BlockTimestampOld,
    BlockTimestampFuture,
    BlockAnchorBytesExceeded,
    BlockWitnessCommitment,
    BlockDaBatchExceeded,
    BlockDaSetInvalid,
    BlockDaIncomplete,
    BlockDaChunkHashInvalid,
    BlockDaPayloadCommitInvalid,
}

impl ErrorCode {
    /// The stable string form of this code.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::TxParse => "TX_ERR_PARSE",
            ErrorCode::TxSigAlgInvalid => "TX_ERR_SIG_ALG_INVALID",
            ErrorCode::TxSigInvalid => "TX_ERR_SIG_INVALID",
            ErrorCode::TxSigNoncanonical => "TX_ERR_SIG_NONCANONICAL",
            ErrorCode::TxWitnessOverflow => "TX_ERR_WITNESS_OVERFLOW",
            ErrorCode::TxMissingUtxo => "TX_ERR_MISSING_UTXO",
            ErrorCode::TxValueConservation => "TX_ERR_VALUE_CONSERVATION",
            ErrorCode::TxCovenantTypeInvalid => "TX_ERR_COVENANT_TYPE_INVALID",
            ErrorCode::TxTimelockNotMet => "TX_ERR_TIMELOCK_NOT_MET",
            ErrorCode::TxCoinbaseImmature => "TX_ERR_COINBASE_IMMATURE",
            ErrorCode::TxSequenceInvalid => "TX_ERR_SEQUENCE_INVALID",
            ErrorCode::TxNonceInvalid => "TX_ERR_TX_NONCE_INVALID",
            ErrorCode::TxNonceReplay => "TX_ERR_NONCE_REPLAY",
            ErrorCode::TxVaultMalformed => "TX_ERR_VAULT_MALFORMED",
            ErrorCode::TxVaultParamsInvalid => "TX_ERR_VAULT_PARAMS_INVALID",
            ErrorCode::TxVaultKeysNotCanonical => "TX_ERR_VAULT_KEYS_NOT_CANONICAL",
            ErrorCode::TxVaultWhitelistNotCanonical => "TX_ERR_VAULT_WHITELIST_NOT_CANONICAL",
            ErrorCode::TxVaultOwnerDestinationForbidden => {
                "TX_ERR_VAULT_OWNER_DESTINATION_FORBIDDEN"
            }
            ErrorCode::TxVaultOwnerAuthRequired => "TX_ERR_VAULT_OWNER_AUTH_REQUIRED",
            ErrorCode::TxVaultFeeSponsorForbidden => "TX_ERR_VAULT_FEE_SPONSOR_FORBIDDEN",
            ErrorCode::TxVaultMultiInputForbidden => "TX_ERR_VAULT_MULTI_INPUT_FORBIDDEN",
            ErrorCode::TxVaultOutputNotWhitelisted => "TX_ERR_VAULT_OUTPUT_NOT_WHITELISTED",
            ErrorCode::BlockParse => "BLOCK_ERR_PARSE",
            ErrorCode::BlockLinkageInvalid => "BLOCK_ERR_LINKAGE_INVALID",
            ErrorCode::BlockMerkleInvalid => "BLOCK_ERR_MERKLE_INVALID",
            ErrorCode::BlockPowInvalid => "BLOCK_ERR_POW_INVALID",
            ErrorCode::BlockTargetInvalid => "BLOCK_ERR_TARGET_INVALID",
            ErrorCode::BlockWeightExceeded => "BLOCK_ERR_WEIGHT_EXCEEDED",
            ErrorCode::BlockCoinbaseInvalid => "BLOCK_ERR_COINBASE_INVALID",
            ErrorCode::BlockSubsidyExceeded => "BLOCK_ERR_SUBSIDY_EXCEEDED",
            ErrorCode::BlockTimestampOld => "BLOCK_ERR_TIMESTAMP_OLD",
            ErrorCode::BlockTimestampFuture => "BLOCK_ERR_TIMESTAMP_FUTURE",
            ErrorCode::BlockAnchorBytesExceeded => "BLOCK_ERR_ANCHOR_BYTES_EXCEEDED",
            ErrorCode::BlockWitnessCommitment => "BLOCK_ERR_WITNESS_COMMITMENT",
            ErrorCode::BlockDaBatchExceeded => "BLOCK_ERR_DA_BATCH_EXCEEDED",
            ErrorCode::BlockDaSetInvalid => "BLOCK_ERR_DA_SET_INVALID",
            ErrorCode::BlockDaIncomplete => "BLOCK_ERR_DA_INCOMPLETE",
            ErrorCode::BlockDaChunkHashInvalid => "BLOCK_ERR_DA_CHUNK_HASH_INVALID",
            ErrorCode::BlockDaPayloadCommitInvalid => "BLOCK_ERR_DA_PAYLOAD_COMMIT_INVALID",
        }
    }

    /// Whether this is a transaction-level (`TX_ERR_*`) code.
    pub fn is_tx_error(self) -> bool {
        self.as_str().starts_with("TX_ERR_")
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consensus rejection: stable code plus a diagnostic context string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {context}")]
pub struct ConsensusError {
    pub code: ErrorCode,
    pub context: &'static str,
}

impl ConsensusError {
    pub const fn new(code: ErrorCode, context: &'static str) -> Self {
        Self { code, context }
    }

    /// Shorthand for the most common rejection.
    pub const fn parse(context: &'static str) -> Self {
        Self::new(ErrorCode::TxParse, context)
    }
}
