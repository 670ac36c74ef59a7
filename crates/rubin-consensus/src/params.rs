//! Chain parameters threaded through the validators.
//!
//! No process-wide state: every validator call receives the parameters
//! it runs under, so one process can validate several chains (mainnet,
//! testnet, regtest fixtures) side by side.

use rubin_core::error::{ConsensusError, ErrorCode};

/// An ACTIVE deployment profile for one EXT covenant id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtProfile {
    pub ext_id: u16,
    /// Signature suites an input under this profile may use.
    pub allowed_suite_ids: Vec<u8>,
}

/// Parameters a validation run is evaluated under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationParams {
    /// Domain-separates sighashes across chains.
    pub chain_id: [u8; 32],
    /// HTLC_V2 deployment flag. Never active at genesis.
    pub htlc_v2_active: bool,
    /// ACTIVE EXT deployment profiles. Empty under the genesis ruleset,
    /// which makes EXT outputs creatable but unspendable.
    pub ext_profiles: Vec<ExtProfile>,
}

impl ValidationParams {
    /// The genesis ruleset for a chain: no optional deployments active.
    pub fn genesis(chain_id: [u8; 32]) -> Self {
        Self {
            chain_id,
            htlc_v2_active: false,
            ext_profiles: Vec::new(),
        }
    }

    /// Look up the ACTIVE profile for an EXT id. Two active profiles
    /// for the same id is a configuration error, not a spendable state.
    pub fn ext_profile(&self, ext_id: u16) -> Result<Option<&ExtProfile>, ConsensusError> {
        let mut found = None;
        for profile in &self.ext_profiles {
            if profile.ext_id != ext_id {
                continue;
            }
            if found.is_some() {
                return Err(ConsensusError::new(
                    ErrorCode::TxCovenantTypeInvalid,
                    "multiple active EXT profiles for ext_id",
                ));
            }
            found = Some(profile);
        }
        Ok(found)
    }
}

impl Default for ValidationParams {
    fn default() -> Self {
        Self::genesis([0u8; 32])
    }
}
