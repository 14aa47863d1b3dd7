// Fixed-layout per-item record header: 12 bytes of cleartext nonce followed
// by 92 bytes of encrypted header, immediately followed by the payload.
//
// Grounded on the original `vault.py`'s `Record` class,
// which packs the same five fields with `struct.pack('<12s64sQq', ...)`.
// Rust has no direct analogue of Python's `struct` format strings, so the
// fields are packed/unpacked by hand with `to_le_bytes`/`from_le_bytes`.

use std::io::{self, Read};

use crate::cipher::{CipherFactory, NONCE_LEN};
use crate::error::{Result, VaultError};

/// Width in bytes of the on-disk `name` field.
pub const NAME_LEN: usize = 64;
/// Size in bytes of the encrypted header block (everything but `rec_nonce`).
pub const HEADER_LEN: usize = NONCE_LEN + NAME_LEN + 8 + 8;
/// Total on-disk size of one record: cleartext `rec_nonce` plus the encrypted header.
pub const RECORD_LEN: usize = NONCE_LEN + HEADER_LEN;

/// One entry describing one stored item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Nonce used to encrypt this record's own header.
    pub rec_nonce: [u8; NONCE_LEN],
    /// Nonce used to encrypt this record's payload.
    pub nonce: [u8; NONCE_LEN],
    /// Item name; an empty name denotes a tombstoned entry.
    pub name: String,
    /// Byte length of the (ciphertext, equal to plaintext) payload.
    pub data_size: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Byte offset of the first payload byte within the backing buffer.
    /// Populated on load/store, not part of the on-disk encoding.
    pub data_ptr: u64,
}

impl Record {
    /// Builds a new in-memory `Record` with `data_ptr` left at zero.
    ///
    /// Fails if `name`, once UTF-8 encoded, does not fit the 64-byte field.
    pub fn new(
        rec_nonce: [u8; NONCE_LEN],
        nonce: [u8; NONCE_LEN],
        name: String,
        data_size: u64,
        timestamp: i64,
    ) -> Result<Self> {
        if name.len() > NAME_LEN {
            return Err(VaultError::NameTooLong(name));
        }

        Ok(Self {
            rec_nonce,
            nonce,
            name,
            data_size,
            timestamp,
            data_ptr: 0,
        })
    }

    /// Reports whether this record has been tombstoned ([`crate::vault::Vault::delete`]).
    pub fn is_tombstoned(&self) -> bool {
        self.name.is_empty()
    }

    /// Serializes the record to its 104-byte on-disk form, encrypting the
    /// 92-byte header with a fresh cipher keyed by `rec_nonce`.
    pub fn dump(&self, factory: &CipherFactory) -> Result<[u8; RECORD_LEN]> {
        let name_bytes = self.name.as_bytes();
        if name_bytes.len() > NAME_LEN {
            return Err(VaultError::NameTooLong(self.name.clone()));
        }

        let mut header = [0u8; HEADER_LEN];
        header[0..NONCE_LEN].copy_from_slice(&self.nonce);
        header[NONCE_LEN..NONCE_LEN + name_bytes.len()].copy_from_slice(name_bytes);
        header[NONCE_LEN + NAME_LEN..NONCE_LEN + NAME_LEN + 8]
            .copy_from_slice(&self.data_size.to_le_bytes());
        header[NONCE_LEN + NAME_LEN + 8..HEADER_LEN].copy_from_slice(&self.timestamp.to_le_bytes());

        factory.renew(&self.rec_nonce).encrypt(&mut header[..]);

        let mut out = [0u8; RECORD_LEN];
        out[0..NONCE_LEN].copy_from_slice(&self.rec_nonce);
        out[NONCE_LEN..].copy_from_slice(&header);

        Ok(out)
    }

    /// Reads one record from the current position of `r`.
    ///
    /// Returns `Ok(None)` at a clean end-of-stream (no bytes available before
    /// the `rec_nonce` field), signalling that the scan is complete. Any
    /// other short read, or a name that fails to decode as UTF-8, is reported
    /// as [`VaultError::CorruptionOrBadPassword`] -- the two are
    /// indistinguishable without a MAC.
    ///
    /// `data_ptr` is left at zero; the caller (the record-table scan in
    /// [`crate::vault::Vault`]) knows the buffer's current offset and fills it in.
    pub fn load<R: Read>(r: &mut R, factory: &CipherFactory) -> Result<Option<Self>> {
        let mut rec_nonce = [0u8; NONCE_LEN];
        if !read_or_eof(r, &mut rec_nonce)? {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        r.read_exact(&mut header)
            .map_err(|_| VaultError::CorruptionOrBadPassword)?;

        factory.renew(&rec_nonce).decrypt(&mut header);

        let nonce: [u8; NONCE_LEN] = header[0..NONCE_LEN].try_into().unwrap();

        let name_raw = &header[NONCE_LEN..NONCE_LEN + NAME_LEN];
        let trimmed_len = name_raw
            .iter()
            .rposition(|&b| b != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        let name = String::from_utf8(name_raw[..trimmed_len].to_vec())
            .map_err(|_| VaultError::CorruptionOrBadPassword)?;

        let data_size = u64::from_le_bytes(
            header[NONCE_LEN + NAME_LEN..NONCE_LEN + NAME_LEN + 8]
                .try_into()
                .unwrap(),
        );
        let timestamp = i64::from_le_bytes(header[NONCE_LEN + NAME_LEN + 8..HEADER_LEN].try_into().unwrap());

        Ok(Some(Self {
            rec_nonce,
            nonce,
            name,
            data_size,
            timestamp,
            data_ptr: 0,
        }))
    }
}

/// Fills `buf` completely or returns `Ok(false)` if the stream was already at
/// EOF before any byte was read. A short read that starts but does not
/// complete `buf` is an I/O error, not a clean EOF.
fn read_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short record"));
        }
        filled += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_then_load_round_trips() {
        let factory = CipherFactory::new(b"pw");
        let rec = Record::new([1; NONCE_LEN], [2; NONCE_LEN], "greet".to_string(), 12, 1700000000)
            .unwrap();

        let bytes = rec.dump(&factory).unwrap();
        let mut cursor = std::io::Cursor::new(bytes.to_vec());
        let loaded = Record::load(&mut cursor, &factory).unwrap().unwrap();

        assert_eq!(loaded.rec_nonce, rec.rec_nonce);
        assert_eq!(loaded.nonce, rec.nonce);
        assert_eq!(loaded.name, rec.name);
        assert_eq!(loaded.data_size, rec.data_size);
        assert_eq!(loaded.timestamp, rec.timestamp);
    }

    #[test]
    fn empty_stream_yields_none() {
        let factory = CipherFactory::new(b"pw");
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(Record::load(&mut cursor, &factory).unwrap().is_none());
    }

    #[test]
    fn truncated_stream_is_corruption() {
        let factory = CipherFactory::new(b"pw");
        let rec = Record::new([1; NONCE_LEN], [2; NONCE_LEN], "x".to_string(), 0, 0).unwrap();
        let bytes = rec.dump(&factory).unwrap();

        let mut cursor = std::io::Cursor::new(bytes[..RECORD_LEN - 10].to_vec());
        assert!(matches!(
            Record::load(&mut cursor, &factory),
            Err(VaultError::CorruptionOrBadPassword)
        ));
    }

    #[test]
    fn name_over_64_bytes_is_rejected() {
        let name = "x".repeat(65);
        assert!(matches!(
            Record::new([0; NONCE_LEN], [0; NONCE_LEN], name, 0, 0),
            Err(VaultError::NameTooLong(_))
        ));
    }

    #[test]
    fn tombstoned_record_has_empty_name() {
        let rec = Record::new([0; NONCE_LEN], [0; NONCE_LEN], String::new(), 0, 0).unwrap();
        assert!(rec.is_tombstoned());
    }
}
