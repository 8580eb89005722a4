//! On-disk layout shared by every persistent table: a fixed header word
//! followed by a packed record array.
//!
//! Grounded on `spec.md` §3 and §6: "a 4-byte little-endian count; 3
//! version/flag bytes; padding to an offset constant; then the record
//! array." The teacher has no analogue for this (it keeps all state
//! in-process), so the byte layout here is original to this crate but
//! the *style* — small `#[repr(C)]`-adjacent structs with explicit
//! `read`/`write` methods over a byte slice, no `unsafe` transmutes —
//! follows the conservative, panic-documented style of the teacher's
//! `wire::decoder`.

use std::mem::size_of;

/// Byte offset at which the record array begins in every table file.
/// Chosen so the header (4 + 3 + 1 pad = 8 bytes) plus this constant's
/// slack leaves room for future header fields without relayout; kept as
/// a named constant per spec §3 ("alignment padding to a defined offset
/// constant").
pub const HEADER_ALIGN: usize = 8;

/// Offset of the version byte within the header, per spec §6:
/// "version byte at header offset `SIZEOF_INT + 3`".
pub const VERSION_BYTE_OFFSET: usize = size_of::<u32>() + 3;

/// Current on-disk version. A mismatch on attach is a fatal
/// version-verification failure (spec §4.2 phase 1, §7 "Fatal init").
pub const CURRENT_VERSION: u8 = 1;

/// Byte offset, within the job-id catalogue file, of the catalogue
/// structure lock (spec §5: "header byte 1 = catalogue structure
/// lock").
pub const CATALOGUE_STRUCT_LOCK_OFFSET: u64 = 1;

/// Offset added to a host record's lock base for the total-file-count
/// range lock (spec §5: "`lock_offset + LOCK_TFC` = host
/// total-file-count").
pub const LOCK_TFC: u64 = 0;

/// Offset added to a host record's lock base for the error-counter
/// range lock (spec §5: "`lock_offset + LOCK_EC` = host
/// error-counter").
pub const LOCK_EC: u64 = 8;

/// Offset used for the post-transfer exec critical section (spec §5).
pub const LOCK_EXEC: u64 = 16;

/// Number of bytes guarded by each of the fine-grained host locks
/// above; each protects a single counter-sized range.
pub const LOCK_RANGE_LEN: u64 = 8;

/// Fixed-size header shared by all tables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub count: u32,
    pub version: u8,
    pub flags: [u8; 2],
    pub page_size: u32,
}

impl Header {
    pub const SIZE: usize = HEADER_ALIGN;

    pub fn new(count: u32, version: u8) -> Self {
        Self {
            count,
            version,
            flags: [0, 0],
            page_size: page_size(),
        }
    }

    /// Parses a header from the first `HEADER_ALIGN` bytes of `buf`.
    pub fn read(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let count = u32::from_le_bytes(buf[0..4].try_into().ok()?);
        let version = buf[4];
        let flags = [buf[5], buf[6]];
        // page_size is stored starting at VERSION_BYTE_OFFSET + 1 in the
        // remaining header bytes; with HEADER_ALIGN == 8 there are not
        // enough bytes left for a full u32, so page_size is tracked
        // separately for tables that need it (FSA) via a trailing word
        // immediately after the header, not inside it. Tables that
        // don't need it leave this zero.
        let _ = buf[7];
        Some(Self {
            count,
            version,
            flags,
            page_size: page_size(),
        })
    }

    pub fn write(&self, buf: &mut [u8]) {
        assert!(buf.len() >= Self::SIZE, "buffer too small for header");
        buf[0..4].copy_from_slice(&self.count.to_le_bytes());
        buf[4] = self.version;
        buf[5] = self.flags[0];
        buf[6] = self.flags[1];
        buf[7] = 0; // padding
    }
}

/// Bit in the header flags byte indicating the configuration loader is
/// still writing the job-id catalogue. Spec §4.2: "poll every 100 ms
/// until a status word's `WRITING_JID_STRUCT` bit clears".
pub const WRITING_JID_STRUCT: u8 = 0b0000_0001;

/// Bit in an `FRA` directory record's `dir_flag` indicating the
/// directory is in the error state (spec §3).
pub const DIR_ERROR_SET: u16 = 0b0000_0001;

/// Bit in a queue entry's `special_flag` marking it as a fetch
/// (retrieve) job rather than a send job (spec §3).
pub const FETCH_JOB: u16 = 0b0000_0001;

/// Computes the expected file size for a table with `count` fixed-size
/// records of `record_size` bytes, per spec §4.2's invariant
/// `no_of_job_ids * record_size + header == file_size`.
pub fn expected_size(count: u32, record_size: usize) -> u64 {
    Header::SIZE as u64 + (count as u64) * (record_size as u64)
}

fn page_size() -> u32 {
    // SAFETY: sysconf(_SC_PAGESIZE) takes no pointers and always
    // returns a small positive value on Linux; failure is
    // unobservable here so we fall back to the common 4 KiB page.
    let ps = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if ps > 0 {
        ps as u32
    } else {
        4096
    }
}
