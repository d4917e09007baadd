//! In-memory reference backend.
//!
//! A `BTreeMap`-backed [`CoinsStore`] with deterministic iteration order,
//! used by the test suite and handy as a scaffolding backend while wiring a
//! real persistent engine underneath.

use crate::stats::{CoinsStats, compute_stats};
use crate::store::CoinsStore;
use crate::Result;
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Txid};
use coinstack_coins::CoinEntry;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
pub struct MemoryStore {
    coins: BTreeMap<Txid, CoinEntry>,
    best_block: BlockHash,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            coins: BTreeMap::new(),
            best_block: BlockHash::all_zeros(),
        }
    }

    /// Number of stored (non-pruned) entries.
    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }
}

impl CoinsStore for MemoryStore {
    fn get(&mut self, txid: &Txid) -> Result<Option<CoinEntry>> {
        Ok(self.coins.get(txid).cloned())
    }

    fn set(&mut self, txid: Txid, entry: CoinEntry) -> Result<()> {
        if entry.is_pruned() {
            self.coins.remove(&txid);
        } else {
            self.coins.insert(txid, entry);
        }
        Ok(())
    }

    fn contains(&mut self, txid: &Txid) -> Result<bool> {
        Ok(self.coins.contains_key(txid))
    }

    fn best_block(&mut self) -> Result<BlockHash> {
        Ok(self.best_block)
    }

    fn set_best_block(&mut self, hash: BlockHash) -> Result<()> {
        self.best_block = hash;
        Ok(())
    }

    fn batch_write(
        &mut self,
        changes: HashMap<Txid, CoinEntry>,
        best_block: BlockHash,
    ) -> Result<()> {
        tracing::trace!("Applying batch of {} changes", changes.len());
        for (txid, entry) in changes {
            if entry.is_pruned() {
                self.coins.remove(&txid);
            } else {
                self.coins.insert(txid, entry);
            }
        }
        self.best_block = best_block;
        Ok(())
    }

    fn stats(&mut self) -> Result<CoinsStats> {
        compute_stats(self.best_block, self.coins.iter())
    }
}
