//! # rubin-core
//!
//! Wire format, covenants, hashing domains and the sighash for the
//! Rubin protocol. Everything here is consensus-critical and
//! deterministic: two implementations fed the same bytes must agree on
//! every accept, reject and error code, or the chain forks.
//!
//! Cryptographic primitives are consumed through the
//! [`crypto::CryptoProvider`] capability; this crate implements none of
//! them beyond a software SHA3-256.

pub mod arith;
pub mod codec;
pub mod constants;
pub mod covenant;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod sighash;
pub mod types;
pub mod wire;

pub use error::{ConsensusError, ErrorCode};
pub use types::{Block, BlockHeader, Outpoint, Tx, TxInput, TxOutput, UtxoEntry, WitnessItem};
