//! End-of-process notifier (spec.md §4.3): "writes the child pid (sign
//! encodes 'more data follows') to a fifo."
//!
//! Grounded on `deletelog.rs`'s generic-over-`Write` logger shape: the
//! fifo handle is opened by the caller and passed in, so this stays a
//! pure encode-and-write function with no knowledge of the filesystem
//! path beyond opening it.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use bytes::{BufMut, BytesMut};
use nix::errno::Errno;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

/// Creates `path` as a fifo if nothing is there yet; a no-op if it
/// already exists (spec §7: "`ENOENT` on control fifos (silently
/// open-or-create)"). Used both by `open_or_create_fifo` below and by
/// the async control-pipe reader, which needs the fifo to exist before
/// `tokio::net::unix::pipe` can open its receiving end.
pub fn ensure_fifo_exists(path: impl AsRef<Path>) -> io::Result<()> {
    match mkfifo(path.as_ref(), Mode::from_bits_truncate(0o600)) {
        Ok(()) | Err(Errno::EEXIST) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

/// Opens `path` for writing, creating it as a fifo first if it doesn't
/// exist yet.
pub fn open_or_create_fifo(path: impl AsRef<Path>) -> io::Result<File> {
    let path = path.as_ref();
    match OpenOptions::new().write(true).custom_flags(0).open(path) {
        Ok(f) => Ok(f),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            ensure_fifo_exists(path)?;
            OpenOptions::new().write(true).open(path)
        }
        Err(e) => Err(e),
    }
}

/// Sign-encodes `pid` as "more data follows" (negative) or "this is the
/// last notification" (non-negative) and writes the little-endian `i32`
/// to `writer`.
pub fn write_finished<W: Write>(writer: &mut W, pid: i32, more_data_follows: bool) -> io::Result<()> {
    let encoded = if more_data_follows {
        -pid.abs()
    } else {
        pid.abs()
    };
    let mut buf = BytesMut::with_capacity(4);
    buf.put_i32_le(encoded);
    writer.write_all(&buf)
}
