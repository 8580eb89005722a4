//! The four garbage-collected catalogues named in spec.md §3:
//! directory-name table, file-mask table, password table, and
//! dir-config-id table.
//!
//! The spec describes file-mask records as variable-length ("length
//! field followed by pattern bytes"). We keep that on-disk shape —
//! every record still carries an explicit length prefix — but bound
//! the pattern to a fixed maximum so the record stays fixed-size and
//! can share `RecordTable`'s uniform compaction logic with the other
//! three catalogues (spec §4.2 phase 8 describes identical
//! lock/locate/memmove-compact/decrement/resize handling for all four,
//! which is the behavior this crate's `RecordTable` factors out; an
//! unbounded variable-length arena would need its own compaction path
//! with no spec-mandated behavior difference to justify the extra
//! complexity). This is recorded as a resolved Open Question in
//! `DESIGN.md`.

use bytes::{Buf, BufMut};

use crate::shared::table::Record;
use crate::types::fixedstr::{read_fixed, write_fixed};

pub const DIR_NAME_LEN: usize = 256;
pub const FILE_MASK_MAX_LEN: usize = 64;
pub const CREDENTIAL_KEY_LEN: usize = 64;
pub const PASSWORD_LEN: usize = 64;
pub const DIR_CONFIG_NAME_LEN: usize = 64;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirNameRecord {
    pub dir_name: String,
}

impl Record for DirNameRecord {
    const SIZE: usize = DIR_NAME_LEN;

    fn read(buf: &[u8]) -> Self {
        Self {
            dir_name: read_fixed(buf),
        }
    }

    fn write(&self, buf: &mut [u8]) {
        write_fixed(buf, self.dir_name.as_bytes());
    }
}

pub type DirNameTable = crate::shared::table::RecordTable<DirNameRecord>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileMaskRecord {
    pub pattern: String,
}

impl Record for FileMaskRecord {
    // 2-byte length prefix + fixed pattern slot, per spec §3.
    const SIZE: usize = 2 + FILE_MASK_MAX_LEN;

    fn read(buf: &[u8]) -> Self {
        let mut b = buf;
        let len = b.get_u16_le() as usize;
        let len = len.min(FILE_MASK_MAX_LEN);
        let pattern = String::from_utf8_lossy(&b[..len]).into_owned();
        Self { pattern }
    }

    fn write(&self, buf: &mut [u8]) {
        let mut b = buf;
        let bytes = self.pattern.as_bytes();
        let len = bytes.len().min(FILE_MASK_MAX_LEN);
        b.put_u16_le(len as u16);
        write_fixed(b, &bytes[..len]);
    }
}

pub type FileMaskTable = crate::shared::table::RecordTable<FileMaskRecord>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PasswordRecord {
    pub credential_key: String, // "user@realhost"
    pub password: String,       // opaque ciphertext/secret; not handled here
}

impl Record for PasswordRecord {
    const SIZE: usize = CREDENTIAL_KEY_LEN + PASSWORD_LEN;

    fn read(buf: &[u8]) -> Self {
        let (key_buf, rest) = buf.split_at(CREDENTIAL_KEY_LEN);
        Self {
            credential_key: read_fixed(key_buf),
            password: read_fixed(rest),
        }
    }

    fn write(&self, buf: &mut [u8]) {
        let (key_buf, rest) = buf.split_at_mut(CREDENTIAL_KEY_LEN);
        write_fixed(key_buf, self.credential_key.as_bytes());
        write_fixed(rest, self.password.as_bytes());
    }
}

pub type PasswordTable = crate::shared::table::RecordTable<PasswordRecord>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirConfigRecord {
    pub name: String,
}

impl Record for DirConfigRecord {
    const SIZE: usize = DIR_CONFIG_NAME_LEN;

    fn read(buf: &[u8]) -> Self {
        Self {
            name: read_fixed(buf),
        }
    }

    fn write(&self, buf: &mut [u8]) {
        write_fixed(buf, self.name.as_bytes());
    }
}

pub type DirConfigTable = crate::shared::table::RecordTable<DirConfigRecord>;

/// Schemes that carry no password, per spec §4.2 phase 8: "Credentials
/// are not removed for schemes that have no password (local, plain
/// SMTP, WMO, MAP, DFAX, EXEC)."
pub const PASSWORDLESS_SCHEMES: &[&str] = &["file", "smtp", "wmo", "map", "dfax", "exec"];

pub fn scheme_of(recipient: &str) -> &str {
    recipient.splitn(2, "://").next().unwrap_or("")
}

pub fn scheme_has_password(scheme: &str) -> bool {
    !PASSWORDLESS_SCHEMES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(scheme))
}
