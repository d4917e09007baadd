//! Aggregate statistics over a whole coin set.

use bitcoin::hashes::Hash;
use bitcoin::{Amount, BlockHash, Txid};
use coinstack_coins::CoinEntry;
use sha2::{Digest, Sha256};

/// Snapshot of the coin set as a whole, produced by a full scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinsStats {
    /// Chain tip the scanned content is consistent with.
    pub best_block: BlockHash,
    /// Number of transactions with at least one unspent output.
    pub transactions: u64,
    /// Total number of unspent outputs.
    pub transaction_outputs: u64,
    /// Total serialized size of all entries, keys included.
    pub serialized_size: u64,
    /// SHA-256 over the best block and every serialized entry, in
    /// iteration order. Two stores with equal content and iteration order
    /// hash identically.
    pub hash_serialized: [u8; 32],
    /// Sum of all unspent output amounts.
    pub total_amount: Amount,
}

/// Fold a store's entries into a [`CoinsStats`].
///
/// Backends implement [`crate::CoinsStore::stats`] by feeding their own
/// iteration through this; the order must be deterministic for the content
/// hash to be comparable across stores.
pub fn compute_stats<'a, I>(best_block: BlockHash, entries: I) -> crate::Result<CoinsStats>
where
    I: IntoIterator<Item = (&'a Txid, &'a CoinEntry)>,
{
    let mut hasher = Sha256::new();
    hasher.update(best_block.as_byte_array());

    let mut transactions = 0u64;
    let mut transaction_outputs = 0u64;
    let mut serialized_size = 0u64;
    let mut total_amount = 0u64;

    for (txid, entry) in entries {
        let encoded = entry.encode()?;
        hasher.update(txid.as_byte_array());
        hasher.update(&encoded);
        transactions += 1;
        transaction_outputs += entry.unspent_count() as u64;
        serialized_size += (Txid::LEN + encoded.len()) as u64;
        total_amount += entry.total_value().to_sat();
    }

    Ok(CoinsStats {
        best_block,
        transactions,
        transaction_outputs,
        serialized_size,
        hash_serialized: hasher.finalize().into(),
        total_amount: Amount::from_sat(total_amount),
    })
}
