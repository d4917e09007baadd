//! Compact txout representation: compressed amounts and compressed scripts.
//!
//! Amounts are packed by factoring out powers of ten; the common script
//! templates (P2PKH, P2SH, P2PK) collapse to a one-byte tag plus hash or
//! key material, and everything else is stored raw behind a length varint
//! offset by the number of special script tags.

use crate::error::Error;
use crate::serialize::{read_varint, write_varint};
use bitcoin::hashes::Hash;
use bitcoin::{Amount, PubkeyHash, PublicKey, Script, ScriptBuf, ScriptHash, TxOut, opcodes};
use std::io::{Read, Write};

pub(crate) const MAX_MONEY: u64 = 21_000_000 * 100_000_000;
pub(crate) const MAX_SCRIPT_SIZE: usize = 10_000;

const NUM_SPECIAL_SCRIPTS: u64 = 6;

// Constants for opcodes
const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_EQUAL: u8 = 0x87;

/// Pack an amount by splitting off its trailing decimal zeros.
///
/// Defined only for `0 <= n <= MAX_MONEY`; [`write_txout`] range-checks
/// before calling.
pub fn compress_amount(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut e = 0u64;
    let mut n = n;
    while n % 10 == 0 && e < 9 {
        n /= 10;
        e += 1;
    }
    if e < 9 {
        let d = n % 10;
        n /= 10;
        1 + (n * 9 + d - 1) * 10 + e
    } else {
        1 + (n - 1) * 10 + 9
    }
}

/// Exact inverse of [`compress_amount`].
pub fn decompress_amount(x: u64) -> u64 {
    if x == 0 {
        return 0;
    }
    let mut x = x - 1;
    let e = x % 10;
    x /= 10;
    let mut n = if e < 9 {
        let d = (x % 9) + 1;
        x /= 9;
        x * 10 + d
    } else {
        x + 1
    };
    for _ in 0..e {
        n *= 10;
    }
    n
}

fn to_key_id(script: &[u8]) -> Option<[u8; 20]> {
    if script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&script[3..23]);
        Some(hash)
    } else {
        None
    }
}

fn to_script_id(script: &[u8]) -> Option<[u8; 20]> {
    if script.len() == 23 && script[0] == OP_HASH160 && script[1] == 20 && script[22] == OP_EQUAL {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&script[2..22]);
        Some(hash)
    } else {
        None
    }
}

enum Pubkey {
    Compressed([u8; 33]),
    Uncompressed([u8; 65]),
}

fn to_pubkey(script: &[u8]) -> Option<Pubkey> {
    if script.len() == 35
        && script[0] == 33
        && script[34] == OP_CHECKSIG
        && (script[1] == 0x02 || script[1] == 0x03)
    {
        let mut pubkey = [0u8; 33];
        pubkey.copy_from_slice(&script[1..34]);
        Some(Pubkey::Compressed(pubkey))
    } else if script.len() == 67 && script[0] == 65 && script[66] == OP_CHECKSIG && script[1] == 0x04
    {
        // If not fully valid, it would not be compressible.
        let is_fully_valid = Script::from_bytes(script).p2pk_public_key().is_some();
        if is_fully_valid {
            let mut pubkey = [0u8; 65];
            pubkey.copy_from_slice(&script[1..66]);
            Some(Pubkey::Uncompressed(pubkey))
        } else {
            None
        }
    } else {
        None
    }
}

fn compress_script(script: &[u8]) -> Option<Vec<u8>> {
    if let Some(hash) = to_key_id(script) {
        let mut out = Vec::with_capacity(21);
        out.push(0x00);
        out.extend(hash);
        Some(out)
    } else if let Some(hash) = to_script_id(script) {
        let mut out = Vec::with_capacity(21);
        out.push(0x01);
        out.extend(hash);
        Some(out)
    } else if let Some(pubkey) = to_pubkey(script) {
        let mut out = Vec::with_capacity(33);
        match pubkey {
            Pubkey::Compressed(compressed) => {
                out.push(compressed[0]);
                out.extend_from_slice(&compressed[1..33]);
            }
            Pubkey::Uncompressed(uncompressed) => {
                out.push(0x04 | (uncompressed[64] & 0x01));
                out.extend_from_slice(&uncompressed[1..33]);
            }
        }
        Some(out)
    } else {
        None
    }
}

fn write_script<W: Write>(writer: &mut W, script: &Script) -> Result<(), Error> {
    if let Some(compressed) = compress_script(script.as_bytes()) {
        writer.write_all(&compressed)?;
        return Ok(());
    }
    write_varint(writer, script.len() as u64 + NUM_SPECIAL_SCRIPTS)?;
    writer.write_all(script.as_bytes())?;
    Ok(())
}

fn read_script<R: Read>(reader: &mut R) -> Result<ScriptBuf, Error> {
    let size = read_varint(reader)?;
    match size {
        0x00 => {
            // P2PKH
            let mut bytes = [0u8; 20];
            reader.read_exact(&mut bytes)?;
            Ok(ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(bytes)))
        }
        0x01 => {
            // P2SH
            let mut bytes = [0u8; 20];
            reader.read_exact(&mut bytes)?;
            Ok(ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(bytes)))
        }
        0x02 | 0x03 => {
            // P2PK (compressed)
            let mut bytes = [0u8; 32];
            reader.read_exact(&mut bytes)?;

            let mut script_bytes = Vec::with_capacity(35);
            script_bytes.push(opcodes::all::OP_PUSHBYTES_33.to_u8());
            script_bytes.push(size as u8);
            script_bytes.extend_from_slice(&bytes);
            script_bytes.push(opcodes::all::OP_CHECKSIG.to_u8());

            Ok(ScriptBuf::from_bytes(script_bytes))
        }
        0x04 | 0x05 => {
            // P2PK (uncompressed); the stored key is the compressed form,
            // so decompress it through secp256k1.
            let mut bytes = [0u8; 32];
            reader.read_exact(&mut bytes)?;

            let mut compressed_pubkey_bytes = Vec::with_capacity(33);
            compressed_pubkey_bytes.push((size - 2) as u8);
            compressed_pubkey_bytes.extend_from_slice(&bytes);

            let compressed_pubkey = PublicKey::from_slice(&compressed_pubkey_bytes)
                .map_err(|_| Error::InvalidPubkey)?;
            let uncompressed = compressed_pubkey.inner.serialize_uncompressed();

            let mut script_bytes = Vec::with_capacity(67);
            script_bytes.push(opcodes::all::OP_PUSHBYTES_65.to_u8());
            script_bytes.extend_from_slice(&uncompressed);
            script_bytes.push(opcodes::all::OP_CHECKSIG.to_u8());

            Ok(ScriptBuf::from_bytes(script_bytes))
        }
        _ => {
            let size = (size - NUM_SPECIAL_SCRIPTS) as usize;
            // Unspendable outputs are cleared before storage, so an
            // oversized script can only come from a corrupted record.
            if size > MAX_SCRIPT_SIZE {
                return Err(Error::OversizedScript(size));
            }
            let mut bytes = vec![0u8; size];
            reader.read_exact(&mut bytes)?;
            Ok(ScriptBuf::from_bytes(bytes))
        }
    }
}

/// Write one txout as compressed amount varint followed by compressed script.
pub fn write_txout<W: Write>(writer: &mut W, txout: &TxOut) -> Result<(), Error> {
    let sats = txout.value.to_sat();
    if sats > MAX_MONEY {
        return Err(Error::AmountOutOfRange(sats));
    }
    write_varint(writer, compress_amount(sats))?;
    write_script(writer, &txout.script_pubkey)
}

/// Exact inverse of [`write_txout`].
pub fn read_txout<R: Read>(reader: &mut R) -> Result<TxOut, Error> {
    let value = Amount::from_sat(decompress_amount(read_varint(reader)?));
    let script_pubkey = read_script(reader)?;
    Ok(TxOut {
        value,
        script_pubkey,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_amount_random() {
        for _ in 0..1000 {
            let n = fastrand::u64(..=MAX_MONEY);
            assert_eq!(n, decompress_amount(compress_amount(n)));
        }
    }

    #[test]
    fn test_compress_amount_known_values() {
        assert_eq!(compress_amount(0), 0);
        assert_eq!(compress_amount(60_000_000_000), 600);
        assert_eq!(decompress_amount(600), 60_000_000_000);
        assert_eq!(decompress_amount(2_114_333_561), 234_925_952);
        assert_eq!(decompress_amount(compress_amount(MAX_MONEY)), MAX_MONEY);
    }

    fn roundtrip_script(script: ScriptBuf) -> usize {
        let mut data = Vec::new();
        write_script(&mut data, &script).unwrap();
        let decoded = read_script(&mut data.as_slice()).unwrap();
        assert_eq!(decoded, script);
        data.len()
    }

    #[test]
    fn test_p2pkh_compresses_to_21_bytes() {
        let mut hash = [0u8; 20];
        fastrand::fill(&mut hash);
        let script = ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(hash));
        assert_eq!(roundtrip_script(script), 21);
    }

    #[test]
    fn test_p2sh_compresses_to_21_bytes() {
        let mut hash = [0u8; 20];
        fastrand::fill(&mut hash);
        let script = ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(hash));
        assert_eq!(roundtrip_script(script), 21);
    }

    #[test]
    fn test_p2pk_compressed_roundtrip() {
        // Any 33-byte key with an 02/03 prefix is compressible; validity is
        // only checked for uncompressed keys.
        let mut key = [0u8; 33];
        fastrand::fill(&mut key);
        key[0] = 0x02;

        let mut script_bytes = vec![33u8];
        script_bytes.extend_from_slice(&key);
        script_bytes.push(OP_CHECKSIG);

        assert_eq!(roundtrip_script(ScriptBuf::from_bytes(script_bytes)), 33);
    }

    #[test]
    fn test_p2pk_uncompressed_roundtrip() {
        // secp256k1 generator point, a well-known valid public key.
        let key = hex::decode(
            "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798\
             483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8",
        )
        .unwrap();

        let mut script_bytes = vec![65u8];
        script_bytes.extend_from_slice(&key);
        script_bytes.push(OP_CHECKSIG);

        assert_eq!(roundtrip_script(ScriptBuf::from_bytes(script_bytes)), 33);
    }

    #[test]
    fn test_raw_script_stored_verbatim() {
        // OP_TRUE does not match any special template.
        let len = roundtrip_script(ScriptBuf::from_bytes(vec![0x51]));
        assert_eq!(len, 2);
    }

    #[test]
    fn test_oversized_script_rejected() {
        let mut data = Vec::new();
        write_varint(&mut data, MAX_SCRIPT_SIZE as u64 + 1 + NUM_SPECIAL_SCRIPTS).unwrap();
        data.resize(data.len() + 32, 0);
        assert!(matches!(
            read_script(&mut data.as_slice()),
            Err(Error::OversizedScript(_))
        ));
    }

    #[test]
    fn test_txout_amount_out_of_range() {
        let txout = TxOut {
            value: Amount::from_sat(MAX_MONEY + 1),
            script_pubkey: ScriptBuf::new(),
        };
        let mut data = Vec::new();
        assert!(matches!(
            write_txout(&mut data, &txout),
            Err(Error::AmountOutOfRange(_))
        ));
    }
}
