//! Multi-block chain scenarios: maturity, covenant spends through full
//! block connection, and chainstate hash stability.

use std::collections::HashMap;

use rubin_core::codec::write_compact_size;
use rubin_core::constants::{
    COINBASE_MATURITY, COINBASE_PREVOUT_VOUT, COINBASE_SEQUENCE, COV_TYPE_ANCHOR,
    COV_TYPE_MULTISIG, COV_TYPE_P2PK, COV_TYPE_TIMELOCK_V1, COV_TYPE_HTLC, LOCK_MODE_HEIGHT,
    ML_DSA_87_PUBKEY_BYTES, ML_DSA_87_SIG_BYTES, SUITE_ID_ML_DSA_87, SUITE_ID_SENTINEL,
};
use rubin_core::crypto::CryptoProvider;
use rubin_core::crypto::testing::AcceptAllProvider;
use rubin_core::error::ErrorCode;
use rubin_core::merkle::{merkle_root_txids, witness_commitment_hash, witness_merkle_root_wtxids};
use rubin_core::types::{BlockHeader, Outpoint, Tx, TxInput, TxOutput, UtxoEntry, WitnessItem};

use rubin_consensus::chainstate::{InMemoryChainState, connect_block_in_memory, utxo_set_hash};
use rubin_consensus::params::ValidationParams;
use rubin_consensus::subsidy::block_subsidy;

const TARGET: [u8; 32] = [0xff; 32];
const PREV: [u8; 32] = [0x22; 32];

fn provider() -> AcceptAllProvider {
    AcceptAllProvider
}

fn ml_pubkey(byte: u8) -> Vec<u8> {
    vec![byte; ML_DSA_87_PUBKEY_BYTES]
}

fn ml_witness(byte: u8) -> WitnessItem {
    WitnessItem {
        suite_id: SUITE_ID_ML_DSA_87,
        pubkey: ml_pubkey(byte),
        signature: vec![0u8; ML_DSA_87_SIG_BYTES],
    }
}

fn p2pk_covenant(byte: u8) -> Vec<u8> {
    let mut data = vec![SUITE_ID_ML_DSA_87];
    data.extend_from_slice(&provider().sha3_256(&ml_pubkey(byte)));
    data
}

fn p2pk_output(value: u64, byte: u8) -> TxOutput {
    TxOutput {
        value,
        covenant_type: COV_TYPE_P2PK,
        covenant_data: p2pk_covenant(byte),
    }
}

fn coinbase_tx(height: u32, rest: &[Tx], extra_outputs: Vec<TxOutput>) -> Tx {
    let p = provider();
    let mut wtxids = vec![[0u8; 32]];
    for tx in rest {
        wtxids.push(tx.wtxid(&p).unwrap());
    }
    let wroot = witness_merkle_root_wtxids(&p, &wtxids).unwrap();
    let commit = witness_commitment_hash(&p, wroot);

    let mut outputs = extra_outputs;
    outputs.push(TxOutput {
        value: 0,
        covenant_type: COV_TYPE_ANCHOR,
        covenant_data: commit.to_vec(),
    });

    Tx {
        version: 1,
        tx_kind: 0,
        tx_nonce: 0,
        inputs: vec![TxInput {
            prev_txid: [0u8; 32],
            prev_vout: COINBASE_PREVOUT_VOUT,
            script_sig: vec![],
            sequence: COINBASE_SEQUENCE,
        }],
        outputs,
        locktime: height,
        da_commit: None,
        da_chunk: None,
        witness: vec![],
        da_payload: vec![],
    }
}

fn build_block_bytes(txs: &[Tx]) -> Vec<u8> {
    let p = provider();
    let txids: Vec<[u8; 32]> = txs.iter().map(|tx| tx.txid(&p).unwrap()).collect();
    let header = BlockHeader {
        version: 1,
        prev_block_hash: PREV,
        merkle_root: merkle_root_txids(&p, &txids).unwrap(),
        timestamp: 1,
        target: TARGET,
        nonce: 9,
    };
    let mut bytes = header.wire_bytes().to_vec();
    write_compact_size(txs.len() as u64, &mut bytes);
    for tx in txs {
        bytes.extend_from_slice(&tx.wire_bytes().unwrap());
    }
    bytes
}

fn connect_at(
    state: &mut InMemoryChainState,
    txs: &[Tx],
    height: u64,
) -> Result<rubin_consensus::ConnectBlockSummary, rubin_core::ConsensusError> {
    connect_block_in_memory(
        &provider(),
        &ValidationParams::default(),
        &build_block_bytes(txs),
        Some(PREV),
        Some(TARGET),
        height,
        None,
        state,
    )
}

fn spend(nonce: u64, outpoint: Outpoint, outputs: Vec<TxOutput>, witness: Vec<WitnessItem>) -> Tx {
    Tx {
        version: 1,
        tx_kind: 0,
        tx_nonce: nonce,
        inputs: vec![TxInput {
            prev_txid: outpoint.txid,
            prev_vout: outpoint.vout,
            script_sig: vec![],
            sequence: 0,
        }],
        outputs,
        locktime: 0,
        da_commit: None,
        da_chunk: None,
        witness,
        da_payload: vec![],
    }
}

// --- Coinbase maturity across real blocks ---

#[test]
fn coinbase_payout_matures_after_one_hundred_blocks() {
    let subsidy = block_subsidy(1, 0);
    let mut state = InMemoryChainState::default();

    // Block 1 pays the subsidy to a P2PK key.
    let cb1 = coinbase_tx(1, &[], vec![p2pk_output(subsidy, 0x31)]);
    let cb1_txid = cb1.txid(&provider()).unwrap();
    connect_at(&mut state, &[cb1], 1).expect("block 1");

    let payout = Outpoint {
        txid: cb1_txid,
        vout: 0,
    };
    let attempt = |state: &mut InMemoryChainState, height: u64| {
        let tx = spend(
            9,
            payout.clone(),
            vec![p2pk_output(subsidy, 0x32)],
            vec![ml_witness(0x31)],
        );
        let cb = coinbase_tx(height as u32, std::slice::from_ref(&tx), vec![]);
        connect_at(state, &[cb, tx], height)
    };

    // One block too early: immature.
    let err = attempt(&mut state.clone(), COINBASE_MATURITY).unwrap_err();
    assert_eq!(err.code, ErrorCode::TxCoinbaseImmature);

    // At creation height + 100: spendable.
    attempt(&mut state, 1 + COINBASE_MATURITY).expect("mature spend");
    assert!(!state.utxos.contains_key(&payout));
}

// --- Covenant spends end to end ---

#[test]
fn multisig_two_of_three_spend_connects() {
    let p = provider();
    let signers = [0x41u8, 0x42, 0x43];
    let mut keys: Vec<[u8; 32]> = signers.iter().map(|b| p.sha3_256(&ml_pubkey(*b))).collect();
    keys.sort_unstable();

    let mut covenant_data = vec![2u8, 3u8];
    for key in &keys {
        covenant_data.extend_from_slice(key);
    }

    let op = Outpoint {
        txid: [0x40; 32],
        vout: 0,
    };
    let mut state = InMemoryChainState::default();
    state.utxos.insert(
        op.clone(),
        UtxoEntry {
            value: 500,
            covenant_type: COV_TYPE_MULTISIG,
            covenant_data,
            creation_height: 0,
            created_by_coinbase: false,
        },
    );

    // Sign in slots 0 and 2; slot 1 is a sentinel.
    let witness_for = |key: &[u8; 32]| {
        signers
            .iter()
            .find(|b| p.sha3_256(&ml_pubkey(**b)) == *key)
            .map(|b| ml_witness(*b))
            .unwrap()
    };
    let witness = vec![
        witness_for(&keys[0]),
        WitnessItem {
            suite_id: SUITE_ID_SENTINEL,
            pubkey: vec![],
            signature: vec![],
        },
        witness_for(&keys[2]),
    ];

    let tx = spend(5, op, vec![p2pk_output(490, 0x44)], witness);
    let cb = coinbase_tx(0, std::slice::from_ref(&tx), vec![]);
    let summary = connect_at(&mut state, &[cb, tx], 0).expect("2-of-3 satisfied");
    assert_eq!(summary.sum_fees, 10);
}

#[test]
fn htlc_claim_spend_connects() {
    let p = provider();
    let claim_byte = 0x51;
    let refund_byte = 0x52;
    let preimage = b"swap-secret";

    let mut covenant_data = Vec::new();
    covenant_data.extend_from_slice(&p.sha3_256(preimage));
    covenant_data.push(LOCK_MODE_HEIGHT);
    covenant_data.extend_from_slice(&1_000u64.to_le_bytes());
    covenant_data.extend_from_slice(&p.sha3_256(&ml_pubkey(claim_byte)));
    covenant_data.extend_from_slice(&p.sha3_256(&ml_pubkey(refund_byte)));

    let op = Outpoint {
        txid: [0x50; 32],
        vout: 0,
    };
    let mut state = InMemoryChainState::default();
    state.utxos.insert(
        op.clone(),
        UtxoEntry {
            value: 300,
            covenant_type: COV_TYPE_HTLC,
            covenant_data,
            creation_height: 0,
            created_by_coinbase: false,
        },
    );

    let mut selector_sig = vec![0x00];
    selector_sig.extend_from_slice(&(preimage.len() as u16).to_le_bytes());
    selector_sig.extend_from_slice(preimage);
    let selector = WitnessItem {
        suite_id: SUITE_ID_SENTINEL,
        pubkey: p.sha3_256(&ml_pubkey(claim_byte)).to_vec(),
        signature: selector_sig,
    };

    let tx = spend(
        6,
        op,
        vec![p2pk_output(300, 0x53)],
        vec![selector, ml_witness(claim_byte)],
    );
    let cb = coinbase_tx(0, std::slice::from_ref(&tx), vec![]);
    // Claim works well before the refund lock height.
    connect_at(&mut state, &[cb, tx], 0).expect("claim path");
}

#[test]
fn timelock_spend_waits_for_height() {
    let op = Outpoint {
        txid: [0x60; 32],
        vout: 0,
    };
    let mut covenant_data = vec![LOCK_MODE_HEIGHT];
    covenant_data.extend_from_slice(&50u64.to_le_bytes());

    let seeded = || {
        let mut state = InMemoryChainState::default();
        state.utxos.insert(
            op.clone(),
            UtxoEntry {
                value: 80,
                covenant_type: COV_TYPE_TIMELOCK_V1,
                covenant_data: covenant_data.clone(),
                creation_height: 0,
                created_by_coinbase: false,
            },
        );
        state
    };

    let sentinel = WitnessItem {
        suite_id: SUITE_ID_SENTINEL,
        pubkey: vec![],
        signature: vec![],
    };
    let tx = spend(7, op.clone(), vec![p2pk_output(80, 0x61)], vec![sentinel]);

    let cb = coinbase_tx(49, std::slice::from_ref(&tx), vec![]);
    let err = connect_at(&mut seeded(), &[cb, tx.clone()], 49).unwrap_err();
    assert_eq!(err.code, ErrorCode::TxTimelockNotMet);

    let cb = coinbase_tx(50, std::slice::from_ref(&tx), vec![]);
    connect_at(&mut seeded(), &[cb, tx], 50).expect("height lock reached");
}

// --- Chainstate hash stability ---

#[test]
fn utxo_set_hash_agrees_across_histories() {
    // Two states that end with the same UTXOs must hash identically no
    // matter how their maps were populated.
    let p = provider();
    let subsidy = block_subsidy(1, 0);

    let cb1 = coinbase_tx(1, &[], vec![p2pk_output(subsidy, 0x71)]);
    let cb1_txid = cb1.txid(&p).unwrap();

    let mut connected = InMemoryChainState::default();
    connect_at(&mut connected, &[cb1], 1).expect("block 1");

    let mut rebuilt = InMemoryChainState::default();
    rebuilt.already_generated = subsidy;
    rebuilt.utxos.insert(
        Outpoint {
            txid: cb1_txid,
            vout: 0,
        },
        UtxoEntry {
            value: subsidy,
            covenant_type: COV_TYPE_P2PK,
            covenant_data: p2pk_covenant(0x71),
            creation_height: 1,
            created_by_coinbase: true,
        },
    );

    assert_eq!(connected, rebuilt);
    assert_eq!(
        utxo_set_hash(&p, &connected.utxos),
        utxo_set_hash(&p, &rebuilt.utxos)
    );
}

#[test]
fn utxo_set_hash_distinguishes_states() {
    let p = provider();
    let mut a = HashMap::new();
    a.insert(
        Outpoint {
            txid: [1u8; 32],
            vout: 0,
        },
        UtxoEntry {
            value: 10,
            covenant_type: COV_TYPE_P2PK,
            covenant_data: p2pk_covenant(0x01),
            creation_height: 0,
            created_by_coinbase: false,
        },
    );
    let mut b = a.clone();
    b.get_mut(&Outpoint {
        txid: [1u8; 32],
        vout: 0,
    })
    .unwrap()
    .value = 11;
    assert_ne!(utxo_set_hash(&p, &a), utxo_set_hash(&p, &b));
}
