//! Spend undo data for chain reorganizations.
//!
//! Every spend through the cache yields an [`UndoRecord`]. Replaying the
//! records of a block in reverse order puts the coin set back exactly as it
//! was before the block connected.

use bitcoin::TxOut;
use serde::{Deserialize, Serialize};

/// Data captured at spend time, sufficient to reverse that spend later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoRecord {
    /// The output as it was immediately before the spend.
    pub prev_out: TxOut,
    /// Entry-level metadata, present only on the spend that left the entry
    /// with no unspent outputs. Rewinding encounters that record first and
    /// uses it to recreate the entry the store no longer holds.
    pub meta: Option<SpentCoinMeta>,
}

/// The fields of a coin entry that its outputs alone cannot reconstruct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentCoinMeta {
    pub is_coinbase: bool,
    pub height: u32,
    pub tx_version: u32,
}

impl UndoRecord {
    /// Serialize to bytes for storage alongside the block that spent it.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("UndoRecord serialization should not fail")
    }

    /// Deserialize from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::{Amount, ScriptBuf};

    #[test]
    fn test_undo_record_roundtrip() {
        let undo = UndoRecord {
            prev_out: TxOut {
                value: Amount::from_sat(5_000_000_000),
                script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
            },
            meta: Some(SpentCoinMeta {
                is_coinbase: true,
                height: 91_722,
                tx_version: 1,
            }),
        };

        let decoded = UndoRecord::decode(&undo.encode()).unwrap();
        assert_eq!(decoded, undo);

        let partial = UndoRecord {
            meta: None,
            ..undo.clone()
        };
        assert_eq!(UndoRecord::decode(&partial.encode()).unwrap(), partial);
    }
}
