//! The cryptographic capability consumed by the validators.
//!
//! The validator never implements a primitive itself: hashing and
//! signature verification are reached through [`CryptoProvider`], so a
//! FIPS-validated backend can be swapped in without touching consensus
//! code. Providers must be referentially transparent (equal inputs give
//! equal outputs) and thread-safe; callers may validate blocks from
//! multiple threads against one shared provider.

use sha3::{Digest, Sha3_256};

use crate::constants::{SUITE_ID_ML_DSA_87, SUITE_ID_SLH_DSA_SHAKE_256F};
use crate::error::{ConsensusError, ErrorCode};

/// Hashing and signature verification as an injected capability.
pub trait CryptoProvider: Send + Sync {
    /// SHA3-256 of `input`.
    fn sha3_256(&self, input: &[u8]) -> [u8; 32];

    /// Verify `signature` over `digest` with `pubkey` under the given
    /// suite. Returns `Ok(false)` for a well-formed but invalid
    /// signature; errors are reserved for unknown suites or backend
    /// failures.
    fn verify(
        &self,
        suite_id: u8,
        pubkey: &[u8],
        signature: &[u8],
        digest: &[u8; 32],
    ) -> Result<bool, ConsensusError>;
}

pub(crate) fn sha3_256_digest(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Software SHA3-256 with no signature backend.
///
/// Enough for header hashing, merkle roots and txids (compact-block
/// relay, header sync, explorers). Spend verification requires a
/// provider with an ML-DSA / SLH-DSA backend; this one rejects every
/// verification attempt.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashOnlyProvider;

impl CryptoProvider for HashOnlyProvider {
    fn sha3_256(&self, input: &[u8]) -> [u8; 32] {
        sha3_256_digest(input)
    }

    fn verify(
        &self,
        _suite_id: u8,
        _pubkey: &[u8],
        _signature: &[u8],
        _digest: &[u8; 32],
    ) -> Result<bool, ConsensusError> {
        Err(ConsensusError::new(
            ErrorCode::TxSigAlgInvalid,
            "no signature backend configured",
        ))
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! Deterministic provider for test suites.

    use super::*;

    /// Real SHA3-256; every canonically-shaped signature verifies.
    ///
    /// Lets tests exercise covenant and block logic without key
    /// material. Unknown suites still error, so suite dispatch keeps
    /// its production shape under test.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct AcceptAllProvider;

    impl CryptoProvider for AcceptAllProvider {
        fn sha3_256(&self, input: &[u8]) -> [u8; 32] {
            sha3_256_digest(input)
        }

        fn verify(
            &self,
            suite_id: u8,
            _pubkey: &[u8],
            _signature: &[u8],
            _digest: &[u8; 32],
        ) -> Result<bool, ConsensusError> {
            match suite_id {
                SUITE_ID_ML_DSA_87 | SUITE_ID_SLH_DSA_SHAKE_256F => Ok(true),
                _ => Err(ConsensusError::new(
                    ErrorCode::TxSigAlgInvalid,
                    "unknown suite id",
                )),
            }
        }
    }

    /// Real SHA3-256; every signature fails verification.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct RejectAllProvider;

    impl CryptoProvider for RejectAllProvider {
        fn sha3_256(&self, input: &[u8]) -> [u8; 32] {
            sha3_256_digest(input)
        }

        fn verify(
            &self,
            suite_id: u8,
            _pubkey: &[u8],
            _signature: &[u8],
            _digest: &[u8; 32],
        ) -> Result<bool, ConsensusError> {
            match suite_id {
                SUITE_ID_ML_DSA_87 | SUITE_ID_SLH_DSA_SHAKE_256F => Ok(false),
                _ => Err(ConsensusError::new(
                    ErrorCode::TxSigAlgInvalid,
                    "unknown suite id",
                )),
            }
        }
    }
}
