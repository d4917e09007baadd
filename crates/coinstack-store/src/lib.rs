//! Layered storage abstraction for unspent transaction output records.
//!
//! The [`CoinsStore`] trait is the narrow contract a backing store has to
//! satisfy: point lookups and writes keyed by transaction id, a single
//! best-block marker, and an atomic bulk write. The persistent key-value
//! engine behind it lives outside this crate.
//!
//! On top of that contract sit two composable layers:
//!
//! - [`DelegatingStore`] forwards every operation to a replaceable backend,
//!   so holders keep a stable handle while the actual store is swapped out
//!   underneath (e.g. during a reindex).
//! - [`CoinsCache`] is a write-back overlay: validation code mutates coin
//!   entries in memory, spends produce [`UndoRecord`]s for later
//!   reorganizations, and an explicit [`CoinsCache::flush`] pushes all
//!   accumulated changes into the backend as one atomic batch.
//!
//! Layers stack arbitrarily: a cache can sit on a delegating store that is
//! itself bound to another cache.
//!
//! Nothing here is internally synchronized. Every mutating path takes
//! `&mut self`; a single logical writer per store instance is the caller's
//! responsibility.

mod cache;
mod error;
mod mem;
mod stats;
mod store;
mod undo;

pub use cache::CoinsCache;
pub use error::Error;
pub use mem::MemoryStore;
pub use stats::{CoinsStats, compute_stats};
pub use store::{CoinsStore, DelegatingStore};
pub use undo::{SpentCoinMeta, UndoRecord};

/// Result type for coin storage operations.
pub type Result<T> = std::result::Result<T, Error>;
