//! Crate-wide error taxonomy.
//!
//! Per `spec.md` §7, the daemon never bubbles errors up to a caller: it
//! either recovers locally and continues, or it logs and exits. This
//! type exists so the handful of call sites that must distinguish
//! error *kinds* (attach/version/size failures during start-up, lock
//! contention during a command) have one vocabulary, not so that `?`
//! propagates across component boundaries. Modeled on the flat,
//! `thiserror`-derived error enums used throughout the reference pack's
//! multi-module daemons (e.g. `oddjobs`'s `LifecycleError`), generalized
//! from the teacher's two small hand-rolled `enum Error`s in
//! `wire::decoder`/`wire::encoder`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to attach table {0}: {1}")]
    Attach(PathBuf, #[source] io::Error),

    #[error("table {path} version mismatch: found {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        found: u8,
        expected: u8,
    },

    #[error("table {path} too small: found {found} bytes, expected {expected}")]
    SizeMismatch {
        path: PathBuf,
        found: u64,
        expected: u64,
    },

    #[error("corrupt table data: {0}")]
    Corrupt(String),

    #[error("lock error: {0}")]
    Lock(#[source] nix::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("wait barrier timed out after {0:?}")]
    BarrierTimeout(std::time::Duration),
}

pub type CoreResult<T> = Result<T, CoreError>;
