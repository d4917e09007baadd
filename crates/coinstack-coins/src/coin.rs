//! The per-transaction unspent output record.

use crate::codec;
use crate::compressor::MAX_SCRIPT_SIZE;
use crate::error::Error;
use bitcoin::{Amount, Script, Transaction, TxOut};

/// Pruned form of a transaction: its metadata plus whichever outputs are
/// still unspent.
///
/// `outputs` is index-aligned with the creating transaction's output list;
/// a `None` slot is a spent output. Trailing `None` slots are always
/// trimmed, so an entry whose outputs are all spent holds an empty vector.
/// Such an entry is *pruned* and is represented in a store by absence, never
/// by serialized bytes.
#[derive(Debug, Clone, Default)]
pub struct CoinEntry {
    /// Whether the creating transaction was a coinbase.
    pub is_coinbase: bool,
    /// Unspent outputs; spent outputs are `None`, trailing `None`s are trimmed.
    pub outputs: Vec<Option<TxOut>>,
    /// Height of the block that confirmed the creating transaction.
    pub height: u32,
    /// Version of the creating transaction, retained because output
    /// compression rules may depend on it.
    pub tx_version: u32,
}

fn is_unspendable(script: &Script) -> bool {
    script.is_op_return() || script.len() > MAX_SCRIPT_SIZE
}

impl CoinEntry {
    /// Create an entry, clearing provably unspendable outputs and trimming.
    pub fn new(is_coinbase: bool, outputs: Vec<Option<TxOut>>, height: u32, tx_version: u32) -> Self {
        let mut entry = Self {
            is_coinbase,
            outputs,
            height,
            tx_version,
        };
        entry.clear_unspendable();
        entry
    }

    /// Build the entry for a freshly confirmed transaction.
    pub fn from_tx(tx: &Transaction, height: u32) -> Self {
        Self::new(
            tx.is_coinbase(),
            tx.output.iter().cloned().map(Some).collect(),
            height,
            tx.version.0 as u32,
        )
    }

    /// Trim spent outputs off the end of the vector.
    pub fn cleanup(&mut self) {
        while matches!(self.outputs.last(), Some(None)) {
            self.outputs.pop();
        }
    }

    /// Null out outputs whose script can never be satisfied. Runs at
    /// construction; cleared outputs are never resurrected.
    pub fn clear_unspendable(&mut self) {
        for output in &mut self.outputs {
            if output
                .as_ref()
                .is_some_and(|txout| is_unspendable(&txout.script_pubkey))
            {
                *output = None;
            }
        }
        self.cleanup();
    }

    /// Whether the output at `vout` exists and is unspent.
    pub fn is_available(&self, vout: u32) -> bool {
        self.outputs
            .get(vout as usize)
            .is_some_and(|output| output.is_some())
    }

    /// Whether every output is spent. Only non-pruned entries may be
    /// serialized; a pruned entry is stored as absence.
    pub fn is_pruned(&self) -> bool {
        self.outputs.iter().all(|output| output.is_none())
    }

    /// Take the output at `vout`, trimming afterwards. Returns `None` if the
    /// output does not exist or is already spent, leaving the entry unchanged.
    pub fn spend_output(&mut self, vout: u32) -> Option<TxOut> {
        let taken = self.outputs.get_mut(vout as usize)?.take()?;
        self.cleanup();
        Some(taken)
    }

    /// Number of unspent outputs.
    pub fn unspent_count(&self) -> usize {
        self.outputs.iter().flatten().count()
    }

    /// Sum of the unspent output amounts.
    pub fn total_value(&self) -> Amount {
        Amount::from_sat(
            self.outputs
                .iter()
                .flatten()
                .map(|txout| txout.value.to_sat())
                .sum(),
        )
    }

    /// Serialize to the compact storage format.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut data = Vec::new();
        codec::serialize_into(self, &mut data)?;
        Ok(data)
    }

    /// Decode from the compact storage format.
    pub fn decode(mut bytes: &[u8]) -> Result<Self, Error> {
        codec::deserialize_from(&mut bytes)
    }
}

impl PartialEq for CoinEntry {
    fn eq(&self, other: &Self) -> bool {
        // Pruned entries are a single canonical "gone" value.
        if self.is_pruned() && other.is_pruned() {
            return true;
        }
        self.is_coinbase == other.is_coinbase
            && self.height == other.height
            && self.tx_version == other.tx_version
            && self.outputs == other.outputs
    }
}

impl Eq for CoinEntry {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{p2pkh_script, txout};
    use bitcoin::ScriptBuf;

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut entry = CoinEntry {
            is_coinbase: false,
            outputs: vec![Some(txout(1_000)), None, None],
            height: 10,
            tx_version: 1,
        };
        entry.cleanup();
        assert_eq!(entry.outputs.len(), 1);
        let trimmed = entry.clone();
        entry.cleanup();
        assert_eq!(entry, trimmed);
    }

    #[test]
    fn test_pruned_entries_compare_equal() {
        let a = CoinEntry::new(true, vec![None, None], 100, 1);
        let b = CoinEntry::new(false, Vec::new(), 42, 2);
        assert!(a.is_pruned());
        assert_eq!(a, b);
        assert_ne!(a, CoinEntry::new(false, vec![Some(txout(1))], 42, 2));
    }

    #[test]
    fn test_unspendable_outputs_cleared_at_construction() {
        let op_return = TxOut {
            value: Amount::from_sat(0),
            script_pubkey: ScriptBuf::from_bytes(vec![0x6a, 0x01, 0xaa]),
        };
        let entry = CoinEntry::new(
            false,
            vec![Some(txout(5_000)), Some(op_return)],
            77,
            1,
        );
        assert_eq!(entry.outputs.len(), 1);
        assert!(entry.is_available(0));
        assert!(!entry.is_available(1));
    }

    #[test]
    fn test_spend_output_trims_to_pruned() {
        let mut entry = CoinEntry::new(
            false,
            vec![Some(txout(1_000)), Some(txout(2_000))],
            5,
            1,
        );

        let spent = entry.spend_output(0).unwrap();
        assert_eq!(spent.value.to_sat(), 1_000);
        assert!(!entry.is_pruned());
        assert_eq!(entry.outputs, vec![None, Some(txout(2_000))]);

        entry.spend_output(1).unwrap();
        assert!(entry.outputs.is_empty());
        assert!(entry.is_pruned());

        // Spending again changes nothing.
        assert!(entry.spend_output(1).is_none());
        assert!(entry.spend_output(9).is_none());
    }

    #[test]
    fn test_from_tx_records_metadata() {
        let tx = crate::tests::dummy_tx(vec![txout(50_000), txout(1)]);
        let entry = CoinEntry::from_tx(&tx, 203_998);
        assert_eq!(entry.height, 203_998);
        assert_eq!(entry.tx_version, 2);
        assert_eq!(entry.unspent_count(), 2);
        assert_eq!(entry.total_value(), Amount::from_sat(50_001));
        assert!(!entry.is_coinbase);
        assert_eq!(entry.outputs[0].as_ref().unwrap().script_pubkey, p2pkh_script([0xab; 20]));
    }
}
