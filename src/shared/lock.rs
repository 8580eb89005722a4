//! Byte-range advisory write locks on shared table files.
//!
//! Grounded on the whole-file `fs2`-style advisory locking used by the
//! `oddjobs` daemon crate's lifecycle module, generalized from a
//! whole-file lock to a byte-range lock using `nix::fcntl::fcntl` with
//! `F_SETLKW`/`F_SETLK`, because spec §5 requires several independent
//! fine-grained locks coexisting on a single file (the catalogue
//! structure lock, `LOCK_TFC`, `LOCK_EC`, `LOCK_EXEC`).

use std::marker::PhantomData;
use std::os::fd::{AsFd, AsRawFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FlockArg};
use nix::libc::{F_WRLCK, SEEK_SET};

use crate::error::{CoreError, CoreResult};

/// An acquired byte-range write lock. Released (best-effort) on drop.
///
/// Holds a raw fd rather than a `BorrowedFd` because `nix = "0.27"`'s
/// `fcntl`/`flock` free functions take `RawFd`, not `AsFd`; the
/// lifetime parameter still ties this lock to the file it was acquired
/// against so the fd can't outlive it.
pub struct RangeLock<'a> {
    fd: RawFd,
    offset: i64,
    len: i64,
    _file: PhantomData<&'a ()>,
}

impl<'a> RangeLock<'a> {
    /// Blocks until an exclusive write lock on `[offset, offset+len)`
    /// is acquired. `len == 0` means "to end of file", matching POSIX
    /// `fcntl` semantics.
    pub fn acquire<F: AsFd>(file: &'a F, offset: u64, len: u64) -> CoreResult<Self> {
        let fd = file.as_fd().as_raw_fd();
        let mut flock = nix::libc::flock {
            l_type: F_WRLCK as i16,
            l_whence: SEEK_SET as i16,
            l_start: offset as i64,
            l_len: len as i64,
            l_pid: 0,
        };

        loop {
            match fcntl(fd, FcntlArg::F_SETLKW(&mut flock)) {
                Ok(_) => {
                    return Ok(Self {
                        fd,
                        offset: offset as i64,
                        len: len as i64,
                        _file: PhantomData,
                    })
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(CoreError::Lock(e)),
            }
        }
    }

    /// Non-blocking variant used by retry loops that want to back off
    /// themselves rather than block in the kernel (spec §7: `EACCES`/
    /// `EAGAIN` on file lock => retry after wait).
    pub fn try_acquire<F: AsFd>(file: &'a F, offset: u64, len: u64) -> CoreResult<Option<Self>> {
        let fd = file.as_fd().as_raw_fd();
        let mut flock = nix::libc::flock {
            l_type: F_WRLCK as i16,
            l_whence: SEEK_SET as i16,
            l_start: offset as i64,
            l_len: len as i64,
            l_pid: 0,
        };

        match fcntl(fd, FcntlArg::F_SETLK(&mut flock)) {
            Ok(_) => Ok(Some(Self {
                fd,
                offset: offset as i64,
                len: len as i64,
                _file: PhantomData,
            })),
            Err(Errno::EACCES) | Err(Errno::EAGAIN) => Ok(None),
            Err(e) => Err(CoreError::Lock(e)),
        }
    }
}

impl Drop for RangeLock<'_> {
    fn drop(&mut self) {
        let mut flock = nix::libc::flock {
            l_type: nix::libc::F_UNLCK as i16,
            l_whence: SEEK_SET as i16,
            l_start: self.offset,
            l_len: self.len,
            l_pid: 0,
        };
        let _ = fcntl(self.fd, FcntlArg::F_SETLK(&mut flock));
    }
}

/// Acquires (blocking) then immediately releases a whole-file lock,
/// used for the coarse start-up lock the GC takes on the job-id
/// catalogue before phase 1 begins (spec §4.2: "acquire a write lock on
/// the first byte of the job-id catalogue").
pub fn lock_first_byte<F: AsFd>(file: &F) -> CoreResult<RangeLock<'_>> {
    RangeLock::acquire(file, crate::shared::layout::CATALOGUE_STRUCT_LOCK_OFFSET, 1)
}

/// Whole-file exclusive lock used only for the daemon's own PID/lock
/// file at start-up (not one of the shared tables).
pub fn try_lock_whole_file<F: AsFd>(file: &F) -> CoreResult<bool> {
    match nix::fcntl::flock(file.as_fd().as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(CoreError::Lock(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;

    #[test]
    fn range_lock_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        file.set_len(64).unwrap();

        let lock = RangeLock::acquire(&file, 8, 4).unwrap();
        drop(lock);

        // A second acquisition after the first is dropped must succeed.
        let lock2 = RangeLock::acquire(&file, 8, 4).unwrap();
        drop(lock2);
    }
}
