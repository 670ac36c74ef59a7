//! # rubin-consensus
//!
//! The validation rules of the Rubin protocol: proof of work and
//! difficulty retargeting, the subsidy schedule, weight accounting,
//! transaction application against a UTXO set, stateless block checks,
//! the in-memory chainstate transition, chain work, and the
//! deployment state machine.
//!
//! Every entry point is a synchronous, deterministic function over
//! explicit inputs. Persistence, networking and mempool policy live in
//! other crates; this one only answers "is this block valid, and what
//! does the state look like afterwards".

pub mod block;
pub mod chainstate;
pub mod feature_bits;
pub mod params;
pub mod pow;
pub mod spend;
pub mod subsidy;
pub mod tx_apply;
pub mod weight;
pub mod work;

pub use block::{BlockSummary, validate_block};
pub use chainstate::{
    ConnectBlockSummary, InMemoryChainState, connect_block_in_memory, utxo_set_hash,
};
pub use params::ValidationParams;
pub use subsidy::block_subsidy;
pub use tx_apply::apply_non_coinbase_tx;
pub use weight::tx_weight_and_stats;
