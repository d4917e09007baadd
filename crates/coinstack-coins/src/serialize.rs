//! Variable-length integer encoding used by the coin storage format.
//!
//! This is the storage varint (MSB base-128, with a +1 applied to every
//! continuation step so that each length has a single canonical encoding),
//! not the compact-size integer used on the wire.

use crate::error::Error;
use std::io::{Read, Write};

/// Serialize `n` as a storage varint.
pub fn write_varint<W: Write>(writer: &mut W, mut n: u64) -> std::io::Result<()> {
    let mut tmp = [0u8; 10];
    let mut len = 0;
    loop {
        tmp[len] = (n & 0x7f) as u8 | if len > 0 { 0x80 } else { 0x00 };
        if n <= 0x7f {
            break;
        }
        n = (n >> 7) - 1;
        len += 1;
    }
    for i in (0..=len).rev() {
        writer.write_all(&tmp[i..=i])?;
    }
    Ok(())
}

/// Deserialize a storage varint, rejecting values that overflow `u64`.
pub fn read_varint<R: Read>(reader: &mut R) -> Result<u64, Error> {
    let mut n: u64 = 0;
    loop {
        let ch = read_u8(reader)?;
        if n > u64::MAX >> 7 {
            return Err(Error::VarIntOverflow);
        }
        n = (n << 7) | u64::from(ch & 0x7f);
        if ch & 0x80 != 0 {
            if n == u64::MAX {
                return Err(Error::VarIntOverflow);
            }
            n += 1;
        } else {
            return Ok(n);
        }
    }
}

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(n: u64) -> Vec<u8> {
        let mut data = Vec::new();
        write_varint(&mut data, n).unwrap();
        assert_eq!(read_varint(&mut data.as_slice()).unwrap(), n);
        data
    }

    #[test]
    fn test_varint_known_encodings() {
        assert_eq!(roundtrip(0), vec![0x00]);
        assert_eq!(roundtrip(0x7f), vec![0x7f]);
        // The +1 continuation rule makes 128 encode as 80 00, not 81 00.
        assert_eq!(roundtrip(128), vec![0x80, 0x00]);
        assert_eq!(roundtrip(600), vec![0x83, 0x58]);
        assert_eq!(roundtrip(203_998), vec![0x8b, 0xb8, 0x5e]);
        assert_eq!(roundtrip(120_891), vec![0x86, 0xaf, 0x3b]);
    }

    #[test]
    fn test_varint_roundtrip_random() {
        for _ in 0..1000 {
            roundtrip(fastrand::u64(..));
        }
        roundtrip(u64::MAX);
    }

    #[test]
    fn test_varint_truncated_input() {
        // Continuation bit set but the stream ends.
        assert!(matches!(
            read_varint(&mut [0x80u8].as_slice()),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_varint_overflow_rejected() {
        // Eleven maximal continuation bytes cannot fit in a u64.
        let data = [0xffu8; 11];
        assert!(matches!(
            read_varint(&mut data.as_slice()),
            Err(Error::VarIntOverflow)
        ));
    }
}
