//! Binary secret record format.
//!
//! Every secret lives in its own file with this little-endian layout:
//!
//! ```text
//! [format tag: i32][payload version: i32][ticks: i64][key hash: 32 bytes][ct_len: i32][ciphertext]
//! ```
//!
//! - **Format tag**: identifies the fixed header layout (currently `2`;
//!   layout `1` was a bare ciphertext with no header at all).
//! - **Payload version**: how the ciphertext was sealed; older payloads
//!   are migrated forward on read.
//! - **Ticks**: last write time in 100-nanosecond ticks since
//!   0001-01-01T00:00:00Z.
//! - **Key hash**: HMAC of the logical key; must match the key used to
//!   look the file up.
//! - **Ciphertext length** followed by exactly that many bytes.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};

use crate::crypto::KEY_LEN;
use crate::errors::{KioskVaultError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Header layout tag written at the start of every record.
pub const FORMAT_VERSION: i32 = 2;

/// Current payload version.  Bump this and add a branch in the vault's
/// sealing code to migrate every secret on its next read.
pub const CURRENT_PAYLOAD_VERSION: i32 = 2;

/// Oldest payload version the vault can still open.
pub const MIN_PAYLOAD_VERSION: i32 = 1;

/// File extension for secret records.
pub const RECORD_EXTENSION: &str = "secret";

/// Fixed-size header: 4 (tag) + 4 (payload version) + 8 (ticks) + 32 (hash) + 4 (len).
pub const HEADER_LEN: usize = 4 + 4 + 8 + KEY_LEN + 4;

/// Byte offset of the key hash within the header.
pub const KEY_HASH_OFFSET: usize = 16;

/// Ticks between 0001-01-01 and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

// ---------------------------------------------------------------------------
// SecretRecord
// ---------------------------------------------------------------------------

/// One decoded secret file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub format_version: i32,
    pub payload_version: i32,
    pub updated_at: DateTime<Utc>,
    pub key_hash: [u8; KEY_LEN],
    pub ciphertext: Vec<u8>,
}

impl SecretRecord {
    /// Serialize the record to its on-disk bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let ct_len = i32::try_from(self.ciphertext.len()).map_err(|_| {
            KioskVaultError::SerializationError(format!(
                "ciphertext length {} exceeds i32::MAX",
                self.ciphertext.len()
            ))
        })?;

        let mut buf = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        buf.extend_from_slice(&self.format_version.to_le_bytes());
        buf.extend_from_slice(&self.payload_version.to_le_bytes());
        buf.extend_from_slice(&to_ticks(self.updated_at).to_le_bytes());
        buf.extend_from_slice(&self.key_hash);
        buf.extend_from_slice(&ct_len.to_le_bytes());
        buf.extend_from_slice(&self.ciphertext);
        Ok(buf)
    }

    /// Parse on-disk bytes.  Any structural problem is an
    /// `InvalidRecordFormat` error; nothing is decrypted here.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(KioskVaultError::InvalidRecordFormat(format!(
                "file is {} bytes, header needs {HEADER_LEN}",
                data.len()
            )));
        }

        let format_version = read_i32(data, 0)?;
        if format_version != FORMAT_VERSION {
            return Err(KioskVaultError::InvalidRecordFormat(format!(
                "unsupported format tag {format_version}, expected {FORMAT_VERSION}"
            )));
        }

        let payload_version = read_i32(data, 4)?;
        let ticks = i64::from_le_bytes(
            data[8..16]
                .try_into()
                .map_err(|_| KioskVaultError::InvalidRecordFormat("bad timestamp".into()))?,
        );
        let updated_at = from_ticks(ticks).ok_or_else(|| {
            KioskVaultError::InvalidRecordFormat(format!("timestamp {ticks} out of range"))
        })?;

        let mut key_hash = [0u8; KEY_LEN];
        key_hash.copy_from_slice(&data[KEY_HASH_OFFSET..KEY_HASH_OFFSET + KEY_LEN]);

        let ct_len_i32 = read_i32(data, KEY_HASH_OFFSET + KEY_LEN)?;
        let ct_len = usize::try_from(ct_len_i32).map_err(|_| {
            KioskVaultError::InvalidRecordFormat(format!("negative ciphertext length {ct_len_i32}"))
        })?;
        if HEADER_LEN + ct_len != data.len() {
            return Err(KioskVaultError::InvalidRecordFormat(format!(
                "ciphertext length {ct_len} does not match file size {}",
                data.len()
            )));
        }

        Ok(Self {
            format_version,
            payload_version,
            updated_at,
            key_hash,
            ciphertext: data[HEADER_LEN..].to_vec(),
        })
    }
}

fn read_i32(data: &[u8], offset: usize) -> Result<i32> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| KioskVaultError::InvalidRecordFormat(format!("truncated at {offset}")))?;
    Ok(i32::from_le_bytes(bytes))
}

/// Convert a UTC timestamp to 100-ns ticks since 0001-01-01.
pub fn to_ticks(at: DateTime<Utc>) -> i64 {
    let hundred_ns = at.timestamp() * 10_000_000 + i64::from(at.timestamp_subsec_nanos() / 100);
    hundred_ns + UNIX_EPOCH_TICKS
}

/// Inverse of `to_ticks`.  Returns `None` for values chrono cannot hold.
pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let since_epoch = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = since_epoch.div_euclid(10_000_000);
    let nanos = u32::try_from(since_epoch.rem_euclid(10_000_000) * 100).ok()?;
    Utc.timestamp_opt(secs, nanos).single()
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Write a record file **atomically**.
///
/// The bytes go to a uniquely named, owner-only temp file in the same
/// directory, which is then renamed over the target so readers never
/// see a half-written record.  Concurrent writers each get their own
/// temp file; the last rename wins.
pub fn write_record_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
