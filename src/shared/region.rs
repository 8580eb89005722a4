//! Opens, sizes, and memory-maps a persistent table file, and exposes
//! the byte-range lock helper for it.
//!
//! Grounded on `memmap2::MmapMut` for the mapping itself (the standard
//! ecosystem crate for this; the reference pack has no direct
//! memory-mapped-shared-table example to imitate, so this follows
//! `memmap2`'s own documented open/map/flush lifecycle) and on the
//! teacher's `Decoder`/`Encoder` pattern of "one small owning type per
//! concern, no global state" for how the type is shaped: a `Region`
//! owns exactly the file handle and the mapping, and every accessor
//! takes `&self`/`&mut self` explicitly rather than reaching for
//! module-level statics (spec.md §9, "Global mutable state").

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use memmap2::MmapMut;

use crate::error::{CoreError, CoreResult};
use crate::shared::layout::{Header, CURRENT_VERSION};
use crate::shared::lock::RangeLock;

/// Number of retries the attach routine makes when the file is smaller
/// than the header claims it should be, per spec §4.2 phase 1: "give up
/// after a bounded retry (20 attempts, 1 s apart)".
pub const ATTACH_RETRY_ATTEMPTS: u32 = 20;
pub const ATTACH_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// An attached, memory-mapped persistent table.
#[derive(Debug)]
pub struct Region {
    path: PathBuf,
    file: File,
    map: MmapMut,
}

impl Region {
    /// Opens `path`, verifying the header version and that the file is
    /// at least `expected_size(header.count, record_size)` bytes,
    /// retrying on a size mismatch per spec §4.2 phase 1.
    pub fn attach(path: impl AsRef<Path>, record_size: usize) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut attempt = 0;
        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|e| CoreError::Attach(path.clone(), e))?;

            let len = file
                .metadata()
                .map_err(|e| CoreError::Attach(path.clone(), e))?
                .len();

            if len < Header::SIZE as u64 {
                return Err(CoreError::Corrupt(format!(
                    "{}: file shorter than header",
                    path.display()
                )));
            }

            // SAFETY: the file is exclusively ours to map for the
            // lifetime of this `Region`; other processes only mutate
            // record bytes under the byte-range locks in `lock.rs`,
            // never the mapping's extent while we hold it mapped.
            let map = unsafe { MmapMut::map_mut(&file) }
                .map_err(|e| CoreError::Attach(path.clone(), e))?;

            let header = Header::read(&map).ok_or_else(|| {
                CoreError::Corrupt(format!("{}: truncated header", path.display()))
            })?;

            if header.version != CURRENT_VERSION {
                return Err(CoreError::VersionMismatch {
                    path: path.clone(),
                    found: header.version,
                    expected: CURRENT_VERSION,
                });
            }

            let expected = crate::shared::layout::expected_size(header.count, record_size);
            if len >= expected {
                return Ok(Self { path, file, map });
            }

            attempt += 1;
            if attempt >= ATTACH_RETRY_ATTEMPTS {
                return Err(CoreError::SizeMismatch {
                    path: path.clone(),
                    found: len,
                    expected,
                });
            }

            tracing::warn!(
                path = %path.display(),
                attempt,
                found = len,
                expected,
                "table smaller than header claims, retrying attach"
            );
            drop(map);
            drop(file);
            thread::sleep(ATTACH_RETRY_INTERVAL);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> Header {
        Header::read(&self.map).expect("header validated at attach")
    }

    pub fn set_count(&mut self, count: u32) {
        let mut header = self.header();
        header.count = count;
        header.write(&mut self.map);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }

    /// Acquires a byte-range write lock on this table's file.
    pub fn lock_range(&self, offset: u64, len: u64) -> CoreResult<RangeLock<'_>> {
        RangeLock::acquire(&self.file, offset, len)
    }

    /// Duplicates the underlying file handle. Used when a lock must
    /// outlive a borrow of this `Region` itself — e.g. a caller that
    /// needs to hold a range lock across a later call that takes
    /// `&mut` the owning table (spec §5's fine-grained counter locks).
    /// POSIX byte-range locks are per-(process, file), so a lock taken
    /// through the duplicate still guards the same bytes.
    pub fn try_clone_file(&self) -> CoreResult<File> {
        self.file
            .try_clone()
            .map_err(|e| CoreError::Attach(self.path.clone(), e))
    }

    /// Flushes dirty pages to disk. Spec §5 calls for an `fsync` on
    /// unmap for any table resized during GC reference cleanup.
    pub fn sync(&self) -> CoreResult<()> {
        self.map
            .flush()
            .map_err(|e| CoreError::Attach(self.path.clone(), e))
    }

    /// Grows or shrinks the backing file and remaps it, used by the
    /// file-mask and password tables, which spec §4.2 phase 8 says
    /// "grow/shrink in fixed steps". Must be called with the
    /// catalogue's structural lock held by the caller.
    pub fn resize(&mut self, new_len: u64) -> CoreResult<()> {
        self.sync()?;
        self.file
            .set_len(new_len)
            .map_err(|e| CoreError::Attach(self.path.clone(), e))?;
        // SAFETY: see `attach`; remapping after `set_len` is the
        // documented way to grow/shrink an `MmapMut`'s extent.
        self.map = unsafe { MmapMut::map_mut(&self.file) }
            .map_err(|e| CoreError::Attach(self.path.clone(), e))?;
        Ok(())
    }
}
