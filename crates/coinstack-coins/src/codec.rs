//! Bit-packed storage codec for [`CoinEntry`].
//!
//! Layout: `varint(tx_version) | varint(header_code) | spentness bitmask |
//! compressed txouts | varint(height)`.
//!
//! The header code packs the coinbase flag (bit 1) and the spentness of the
//! first two outputs (bits 2 and 4). The higher bits hold the number of
//! non-zero bytes in the bitmask that covers outputs from index 2 onward;
//! when neither of the first two outputs is unspent the count is stored
//! minus one, since the bitmask is then guaranteed non-empty. Only bytes up
//! to the last non-zero one are written: an all-zero byte inside that range
//! represents eight spent outputs without being counted, and trailing zero
//! bytes are dropped entirely.

use crate::coin::CoinEntry;
use crate::compressor::{read_txout, write_txout};
use crate::error::Error;
use crate::serialize::{read_u8, read_varint, write_varint};
use std::io::{Read, Write};

/// Upper bound on the output count implied by a decoded bitmask, far above
/// anything a valid transaction can produce. Keeps a malformed zero-run from
/// growing the availability vector without bound.
const MAX_DECODED_OUTPUTS: usize = 1_000_000;

/// Number of bitmask bytes to write (up to the last non-zero one) and the
/// count of non-zero bytes among them.
fn mask_sizes(entry: &CoinEntry) -> (usize, usize) {
    let mut last_used_byte = 0;
    let mut nonzero_bytes = 0;
    let mut b = 0;
    while 2 + b * 8 < entry.outputs.len() {
        if (0..8).any(|i| entry.is_available((2 + b * 8 + i) as u32)) {
            last_used_byte = b + 1;
            nonzero_bytes += 1;
        }
        b += 1;
    }
    (last_used_byte, nonzero_bytes)
}

/// Serialize a non-pruned entry into `writer`.
///
/// Serializing a pruned entry is a contract violation: the pruned state is
/// represented by absence from the store, so this fails with
/// [`Error::SerializePruned`] rather than emitting bytes.
pub fn serialize_into<W: Write>(entry: &CoinEntry, writer: &mut W) -> Result<(), Error> {
    let (mask_bytes, nonzero_bytes) = mask_sizes(entry);
    let first = entry.is_available(0);
    let second = entry.is_available(1);
    if !first && !second && nonzero_bytes == 0 {
        return Err(Error::SerializePruned);
    }

    let header_code = 8 * (nonzero_bytes - usize::from(!first && !second))
        + usize::from(entry.is_coinbase)
        + if first { 2 } else { 0 }
        + if second { 4 } else { 0 };

    write_varint(writer, entry.tx_version as u64)?;
    write_varint(writer, header_code as u64)?;

    for b in 0..mask_bytes {
        let mut avail = 0u8;
        for i in 0..8 {
            if entry.is_available((2 + b * 8 + i) as u32) {
                avail |= 1 << i;
            }
        }
        writer.write_all(&[avail])?;
    }

    for txout in entry.outputs.iter().flatten() {
        write_txout(writer, txout)?;
    }

    write_varint(writer, entry.height as u64)?;
    Ok(())
}

/// Exact inverse of [`serialize_into`].
///
/// Malformed input is reported as an error, never a panic: truncated
/// streams, overflowing varints, oversized scripts, bitmasks implying an
/// absurd output count, and byte strings that decode to an entry with no
/// unspent outputs are all rejected.
pub fn deserialize_from<R: Read>(reader: &mut R) -> Result<CoinEntry, Error> {
    let tx_version =
        u32::try_from(read_varint(reader)?).map_err(|_| Error::VarIntOverflow)?;
    let header_code = read_varint(reader)?;

    let is_coinbase = header_code & 1 != 0;
    let mut available = vec![header_code & 2 != 0, header_code & 4 != 0];
    // When neither of the first two outputs is unspent, one non-zero byte
    // was borrowed from the stored count.
    let mut remaining_nonzero = header_code / 8 + u64::from(header_code & 6 == 0);

    while remaining_nonzero > 0 {
        if available.len() > MAX_DECODED_OUTPUTS {
            return Err(Error::TooManyOutputs(available.len()));
        }
        let avail = read_u8(reader)?;
        for p in 0..8 {
            available.push(avail & (1 << p) != 0);
        }
        if avail != 0 {
            remaining_nonzero -= 1;
        }
    }

    let mut outputs = Vec::with_capacity(available.len());
    for present in &available {
        outputs.push(if *present {
            Some(read_txout(reader)?)
        } else {
            None
        });
    }

    let height = u32::try_from(read_varint(reader)?).map_err(|_| Error::VarIntOverflow)?;

    let mut entry = CoinEntry {
        is_coinbase,
        outputs,
        height,
        tx_version,
    };
    if entry.is_pruned() {
        return Err(Error::NoUnspentOutputs);
    }
    entry.cleanup();
    Ok(entry)
}
