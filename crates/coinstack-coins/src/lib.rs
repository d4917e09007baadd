//! Unspent transaction output records and their on-disk codec.
//!
//! A [`CoinEntry`] captures, for one transaction, which of its outputs are
//! still spendable together with the metadata needed to validate a later
//! spend (confirmation height, coinbase flag, transaction version). The
//! serialized form is a dense bit-packed format: a varint header encodes the
//! coinbase flag and the spentness of the first two outputs, a spentness
//! bitmask covers the rest, and each surviving output is stored with a
//! compressed amount and script.
//!
//! Decoding is the exact inverse of encoding for every entry with at least
//! one unspent output. Entries with no unspent outputs ("pruned") are never
//! serialized; their absence from the store is the canonical representation.

mod codec;
mod coin;
mod compressor;
mod error;
mod serialize;
#[cfg(test)]
mod tests;

pub use codec::{deserialize_from, serialize_into};
pub use coin::CoinEntry;
pub use compressor::{compress_amount, decompress_amount, read_txout, write_txout};
pub use error::Error;
pub use serialize::{read_varint, write_varint};

/// Result type for coin codec operations.
pub type Result<T> = std::result::Result<T, Error>;
