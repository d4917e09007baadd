//! The write-back memory cache over a backing store.

use crate::error::Error;
use crate::stats::CoinsStats;
use crate::store::CoinsStore;
use crate::undo::{SpentCoinMeta, UndoRecord};
use crate::Result;
use bitcoin::{Amount, BlockHash, OutPoint, Transaction, TxIn, TxOut, Txid};
use coinstack_coins::CoinEntry;
use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;

/// One overlay slot: the cached entry plus whether it diverged from the
/// backend since the last flush.
#[derive(Debug, Clone)]
struct CachedCoins {
    entry: CoinEntry,
    dirty: bool,
}

/// Sparse in-memory overlay over any [`CoinsStore`].
///
/// All mutations stay local and are visible to every reader of this cache,
/// while the backend sees nothing until [`CoinsCache::flush`] pushes the
/// accumulated changes as one atomic batch. Dropping an unflushed cache
/// forgets its mutations; that is the contract, not an accident — callers
/// needing durability must flush.
///
/// Entries spent down to nothing stay in the overlay as dirty pruned
/// placeholders until flush, so the backend delete happens atomically with
/// everything else.
///
/// Caches stack: a `CoinsCache` is itself a [`CoinsStore`], and its
/// `batch_write` merges a child's flush into this overlay.
pub struct CoinsCache<'a> {
    base: &'a mut dyn CoinsStore,
    best_block: Option<BlockHash>,
    coins: HashMap<Txid, CachedCoins>,
}

impl<'a> CoinsCache<'a> {
    pub fn new(base: &'a mut dyn CoinsStore) -> Self {
        Self {
            base,
            best_block: None,
            coins: HashMap::new(),
        }
    }

    /// Overlay lookup, pulling a copy up from the backend on miss.
    fn fetch(&mut self, txid: &Txid) -> Result<Option<&mut CachedCoins>> {
        match self.coins.entry(*txid) {
            MapEntry::Occupied(slot) => Ok(Some(slot.into_mut())),
            MapEntry::Vacant(slot) => match self.base.get(txid)? {
                Some(entry) => Ok(Some(slot.insert(CachedCoins {
                    entry,
                    dirty: false,
                }))),
                None => Ok(None),
            },
        }
    }

    fn load_best_block(&mut self) -> Result<BlockHash> {
        match self.best_block {
            Some(hash) => Ok(hash),
            None => {
                let hash = self.base.best_block()?;
                self.best_block = Some(hash);
                Ok(hash)
            }
        }
    }

    /// Mutable handle into the overlay entry for `txid`.
    ///
    /// Fetch-or-fail, not fetch-or-create: registering a brand-new
    /// transaction goes through [`CoinsStore::set`]. Check
    /// [`CoinsStore::contains`] first when absence is expected. The entry
    /// is marked dirty as a side effect of handing out the handle.
    pub fn get_mut(&mut self, txid: &Txid) -> Result<&mut CoinEntry> {
        let cached = self.fetch(txid)?.ok_or(Error::NotFound(*txid))?;
        cached.dirty = true;
        Ok(&mut cached.entry)
    }

    /// Spend one output, returning the undo data that reverses it.
    ///
    /// Fails with [`Error::NotFound`] if no entry exists and with
    /// [`Error::AlreadySpent`] if the target output is gone; the entry is
    /// left unchanged in both cases. When the spend empties the entry, the
    /// undo record additionally captures the entry metadata so a rewind can
    /// recreate it from nothing.
    pub fn spend(&mut self, txid: &Txid, vout: u32) -> Result<UndoRecord> {
        let cached = match self.fetch(txid)? {
            Some(cached) if !cached.entry.is_pruned() => cached,
            _ => return Err(Error::NotFound(*txid)),
        };

        let Some(prev_out) = cached.entry.spend_output(vout) else {
            return Err(Error::AlreadySpent(OutPoint { txid: *txid, vout }));
        };
        cached.dirty = true;

        let meta = cached.entry.is_pruned().then(|| SpentCoinMeta {
            is_coinbase: cached.entry.is_coinbase,
            height: cached.entry.height,
            tx_version: cached.entry.tx_version,
        });

        Ok(UndoRecord { prev_out, meta })
    }

    /// Reverse a spend previously recorded by [`CoinsCache::spend`].
    ///
    /// Records must be applied in reverse spend order: the record carrying
    /// entry metadata is the one whose spend emptied the entry, and rewind
    /// reaches it first, recreating the entry before the remaining records
    /// put back its other outputs.
    pub fn unspend(&mut self, txid: &Txid, vout: u32, undo: UndoRecord) -> Result<()> {
        let UndoRecord { prev_out, meta } = undo;
        let idx = vout as usize;

        match self.fetch(txid)? {
            Some(cached) if !cached.entry.is_pruned() => {
                if meta.is_some() {
                    return Err(Error::UndoInconsistent(
                        "metadata present for an entry the store still holds",
                    ));
                }
                if cached.entry.is_available(vout) {
                    return Err(Error::UndoInconsistent(
                        "restored output is already unspent",
                    ));
                }
                if cached.entry.outputs.len() <= idx {
                    cached.entry.outputs.resize(idx + 1, None);
                }
                cached.entry.outputs[idx] = Some(prev_out);
                cached.dirty = true;
            }
            Some(cached) => {
                // Dirty pruned placeholder: recreate the entry in place.
                let Some(meta) = meta else {
                    return Err(Error::UndoInconsistent(
                        "missing metadata for an entry the store no longer holds",
                    ));
                };
                let mut outputs = vec![None; idx + 1];
                outputs[idx] = Some(prev_out);
                cached.entry = CoinEntry {
                    is_coinbase: meta.is_coinbase,
                    outputs,
                    height: meta.height,
                    tx_version: meta.tx_version,
                };
                cached.dirty = true;
            }
            None => {
                let Some(meta) = meta else {
                    return Err(Error::UndoInconsistent(
                        "missing metadata for an entry the store no longer holds",
                    ));
                };
                let mut outputs = vec![None; idx + 1];
                outputs[idx] = Some(prev_out);
                self.coins.insert(
                    *txid,
                    CachedCoins {
                        entry: CoinEntry {
                            is_coinbase: meta.is_coinbase,
                            outputs,
                            height: meta.height,
                            tx_version: meta.tx_version,
                        },
                        dirty: true,
                    },
                );
            }
        }
        Ok(())
    }

    /// Push all accumulated mutations into the backend as one atomic batch
    /// together with the best-block update.
    ///
    /// On success the overlay keeps its non-pruned entries as a warm cache
    /// with dirty flags cleared, and pruned placeholders are evicted. On
    /// failure the overlay is untouched, so the flush can be retried.
    pub fn flush(&mut self) -> Result<()> {
        let best_block = self.load_best_block()?;

        let mut changes = HashMap::new();
        for (txid, cached) in &self.coins {
            if cached.dirty {
                changes.insert(*txid, cached.entry.clone());
            }
        }
        let dirty = changes.len();

        self.base.batch_write(changes, best_block)?;

        self.coins.retain(|_, cached| {
            cached.dirty = false;
            !cached.entry.is_pruned()
        });
        tracing::debug!(
            "Flushed {dirty} dirty entries, {} left resident",
            self.coins.len()
        );
        Ok(())
    }

    /// Number of overlay entries, for memory-pressure decisions made by
    /// whoever schedules flushes. This cache never flushes on its own.
    pub fn cache_size(&self) -> usize {
        self.coins.len()
    }

    /// The output an input refers to, as visible through this cache.
    pub fn output_for(&mut self, input: &TxIn) -> Result<TxOut> {
        let outpoint = input.previous_output;
        let entry = self
            .get(&outpoint.txid)?
            .ok_or(Error::NotFound(outpoint.txid))?;
        entry
            .outputs
            .get(outpoint.vout as usize)
            .and_then(|output| output.clone())
            .ok_or(Error::AlreadySpent(outpoint))
    }

    /// Total amount of all outputs referenced by `tx`'s inputs. Zero for a
    /// coinbase, which creates value instead of moving it.
    pub fn value_in(&mut self, tx: &Transaction) -> Result<Amount> {
        if tx.is_coinbase() {
            return Ok(Amount::ZERO);
        }
        let mut total = 0u64;
        for input in &tx.input {
            total += self.output_for(input)?.value.to_sat();
        }
        Ok(Amount::from_sat(total))
    }

    /// Whether every output referenced by `tx`'s inputs exists and is
    /// unspent in this view.
    pub fn have_inputs(&mut self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        for input in &tx.input {
            let outpoint = input.previous_output;
            let Some(entry) = self.get(&outpoint.txid)? else {
                return Ok(false);
            };
            if !entry.is_available(outpoint.vout) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Age-weighted input value of `tx` at `height`: the sum of
    /// `amount * (height - coin.height)` over its inputs, divided by the
    /// transaction's serialized size.
    pub fn priority(&mut self, tx: &Transaction, height: u32) -> Result<f64> {
        if tx.is_coinbase() {
            return Ok(0.0);
        }
        let mut age_weighted_value = 0.0;
        for input in &tx.input {
            let outpoint = input.previous_output;
            let entry = self
                .get(&outpoint.txid)?
                .ok_or(Error::NotFound(outpoint.txid))?;
            let txout = entry
                .outputs
                .get(outpoint.vout as usize)
                .and_then(|output| output.as_ref())
                .ok_or(Error::AlreadySpent(outpoint))?;
            if entry.height < height {
                age_weighted_value +=
                    txout.value.to_sat() as f64 * f64::from(height - entry.height);
            }
        }
        Ok(age_weighted_value / tx.total_size() as f64)
    }
}

impl CoinsStore for CoinsCache<'_> {
    fn get(&mut self, txid: &Txid) -> Result<Option<CoinEntry>> {
        Ok(self.fetch(txid)?.and_then(|cached| {
            if cached.entry.is_pruned() {
                None
            } else {
                Some(cached.entry.clone())
            }
        }))
    }

    fn set(&mut self, txid: Txid, entry: CoinEntry) -> Result<()> {
        self.coins.insert(txid, CachedCoins { entry, dirty: true });
        Ok(())
    }

    // A dirty pruned placeholder still reports true until flush evicts it;
    // the probe is allowed to overreport for fully spent records.
    fn contains(&mut self, txid: &Txid) -> Result<bool> {
        Ok(self.fetch(txid)?.is_some())
    }

    fn best_block(&mut self) -> Result<BlockHash> {
        self.load_best_block()
    }

    fn set_best_block(&mut self, hash: BlockHash) -> Result<()> {
        self.best_block = Some(hash);
        Ok(())
    }

    // A child cache flushing into this one: adopt its entries as local
    // dirty state, to be persisted by this cache's own flush.
    fn batch_write(
        &mut self,
        changes: HashMap<Txid, CoinEntry>,
        best_block: BlockHash,
    ) -> Result<()> {
        for (txid, entry) in changes {
            self.coins.insert(txid, CachedCoins { entry, dirty: true });
        }
        self.best_block = Some(best_block);
        Ok(())
    }

    // The overlay is excluded on purpose: auditing runs against flushed
    // state.
    fn stats(&mut self) -> Result<CoinsStats> {
        self.base.stats()
    }
}
