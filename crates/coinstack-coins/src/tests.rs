use crate::coin::CoinEntry;
use crate::compressor::MAX_MONEY;
use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, OutPoint, PubkeyHash, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};

pub(crate) fn p2pkh_script(hash: [u8; 20]) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(hash))
}

pub(crate) fn txout(sats: u64) -> TxOut {
    TxOut {
        value: Amount::from_sat(sats),
        script_pubkey: p2pkh_script([0xab; 20]),
    }
}

/// A minimal non-coinbase transaction with the given outputs.
pub(crate) fn dummy_tx(output: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: bitcoin::Txid::from_byte_array([0x01; 32]),
                vout: 0,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output,
    }
}

/// A random entry with a mix of spent, unspent and variously scripted
/// outputs. May be pruned.
pub(crate) fn random_entry() -> CoinEntry {
    let len = fastrand::usize(0..24);
    let outputs = (0..len)
        .map(|_| {
            if fastrand::bool() {
                return None;
            }
            let mut script = vec![0u8; fastrand::usize(1..40)];
            fastrand::fill(&mut script);
            if script[0] == 0x6a {
                // Keep clear of OP_RETURN, which construction would null out.
                script[0] = 0x51;
            }
            Some(TxOut {
                value: Amount::from_sat(fastrand::u64(..=MAX_MONEY)),
                script_pubkey: ScriptBuf::from_bytes(script),
            })
        })
        .collect();
    CoinEntry::new(
        fastrand::bool(),
        outputs,
        fastrand::u32(..1_000_000),
        if fastrand::bool() { 1 } else { 2 },
    )
}
