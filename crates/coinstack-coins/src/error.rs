//! Error types for the coin codec.

/// Errors that can occur while encoding or decoding coin entries.
///
/// All of these indicate either a caller contract violation
/// ([`Error::SerializePruned`], [`Error::AmountOutOfRange`]) or corrupted
/// input data. None of them are retried or repaired here; callers decide
/// whether to abort or discard the offending record.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the underlying byte source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Attempted to serialize an entry with no unspent outputs.
    #[error("cannot serialize a pruned coin entry")]
    SerializePruned,

    /// A varint did not fit the expected integer width.
    #[error("varint exceeds the supported integer range")]
    VarIntOverflow,

    /// An output amount above the maximum money supply.
    #[error("amount {0} is outside the valid money range")]
    AmountOutOfRange(u64),

    /// A raw script longer than consensus allows; such outputs are
    /// unspendable and must never have been stored.
    #[error("script of {0} bytes exceeds the maximum script size")]
    OversizedScript(usize),

    /// A compressed pay-to-pubkey script carrying an invalid public key.
    #[error("invalid public key in compressed script")]
    InvalidPubkey,

    /// A decoded entry with zero unspent outputs; the pruned state is
    /// represented by absence, so such bytes cannot come from a valid store.
    #[error("decoded coin entry has no unspent outputs")]
    NoUnspentOutputs,

    /// The spentness bitmask implies an absurd number of outputs.
    #[error("spentness bitmask implies {0} outputs, above the supported maximum")]
    TooManyOutputs(usize),
}
