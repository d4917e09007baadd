//! The backing-store contract and the pass-through decorator.

use crate::stats::CoinsStats;
use crate::Result;
use bitcoin::{BlockHash, Txid};
use coinstack_coins::CoinEntry;
use std::collections::HashMap;

/// Contract for anything that can hold the coin set: the persistent engine,
/// an in-memory map, or another layer stacked on one of those.
///
/// Pruned entries are represented by absence, so `get` cannot distinguish
/// "fully spent" from "never existed". Methods take `&mut self` even for
/// reads because caching implementations populate internal state on lookup;
/// this also makes the single-writer contract explicit in the signatures.
pub trait CoinsStore {
    /// Retrieve the coin entry for `txid`, or `None` for
    /// pruned-or-never-existed.
    fn get(&mut self, txid: &Txid) -> Result<Option<CoinEntry>>;

    /// Insert or overwrite the entry for `txid`. Setting a pruned entry is
    /// equivalent to deleting it.
    fn set(&mut self, txid: Txid, entry: CoinEntry) -> Result<()>;

    /// Cheap existence probe. May conservatively report `true` for records
    /// that are fully spent but not yet compacted away.
    fn contains(&mut self, txid: &Txid) -> Result<bool>;

    /// Hash of the chain tip this store's content is consistent with.
    fn best_block(&mut self) -> Result<BlockHash>;

    /// Update the best-block marker.
    fn set_best_block(&mut self, hash: BlockHash) -> Result<()>;

    /// Apply every change and the best-block update as one atomic unit:
    /// all or nothing. Pruned values are deletions.
    fn batch_write(
        &mut self,
        changes: HashMap<Txid, CoinEntry>,
        best_block: BlockHash,
    ) -> Result<()>;

    /// Full-scan statistics over the coin set, for auditing and integrity
    /// checks. Expensive; not a hot-path operation.
    fn stats(&mut self) -> Result<CoinsStats>;
}

/// Pass-through store forwarding every operation to a replaceable backend.
///
/// Upper layers hold the `DelegatingStore` and stay valid across
/// [`DelegatingStore::rebind`], which atomically redirects all subsequent
/// calls to a different backend.
pub struct DelegatingStore<'a> {
    base: &'a mut dyn CoinsStore,
}

impl<'a> DelegatingStore<'a> {
    pub fn new(base: &'a mut dyn CoinsStore) -> Self {
        Self { base }
    }

    /// Swap the backend targeted by subsequent calls.
    pub fn rebind(&mut self, base: &'a mut dyn CoinsStore) {
        tracing::debug!("Rebinding delegating store to a new backend");
        self.base = base;
    }
}

impl CoinsStore for DelegatingStore<'_> {
    fn get(&mut self, txid: &Txid) -> Result<Option<CoinEntry>> {
        self.base.get(txid)
    }

    fn set(&mut self, txid: Txid, entry: CoinEntry) -> Result<()> {
        self.base.set(txid, entry)
    }

    fn contains(&mut self, txid: &Txid) -> Result<bool> {
        self.base.contains(txid)
    }

    fn best_block(&mut self) -> Result<BlockHash> {
        self.base.best_block()
    }

    fn set_best_block(&mut self, hash: BlockHash) -> Result<()> {
        self.base.set_best_block(hash)
    }

    fn batch_write(
        &mut self,
        changes: HashMap<Txid, CoinEntry>,
        best_block: BlockHash,
    ) -> Result<()> {
        self.base.batch_write(changes, best_block)
    }

    fn stats(&mut self) -> Result<CoinsStats> {
        self.base.stats()
    }
}
