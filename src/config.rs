//! Configuration surface (spec.md §6, supplemented): where the
//! daemon's persisted tables and control fifos live, and the two
//! tunables the GC's staleness window depends on.
//!
//! Grounded on the teacher's `bin/ebeans/args.rs` for the `clap::Parser`
//! shape (short+long flags, doc comments doubling as `--help` text) and
//! on the teacher's `serde_yaml` dependency (already in its `Cargo.toml`)
//! for the on-disk format — the spec deliberately leaves the
//! configuration file format unspecified, so this follows the
//! lowest-ceremony serde format the teacher's own dependency stack
//! already supports.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Daemon configuration, loaded from a YAML file at `--config` and
/// layered with CLI overrides.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Directory holding the persistent tables and control fifos
    /// (spec §6: `fifodir/...`).
    pub fifodir: PathBuf,
    /// Directory holding in-flight staging areas and dedup indices
    /// (spec §6: `file-dir/...`).
    pub file_dir: PathBuf,
    /// `SWITCH_FILE_TIME` in seconds, used with `max_output_log_files`
    /// to compute the GC's staleness window (spec §4.2 phase 3).
    pub switch_file_time_secs: i64,
    /// Number of rotated output-log files the staleness window spans
    /// (spec §4.2 phase 3).
    pub max_output_log_files: i64,
}

/// File and fifo names published under `fifodir` (spec §6 "Persisted
/// files").
pub mod filenames {
    pub const MSG_QUEUE_FILE: &str = "MSG_QUEUE_FILE";
    pub const MSG_CACHE_FILE: &str = "MSG_CACHE_FILE";
    pub const JOB_ID_DATA_FILE: &str = "JOB_ID_DATA_FILE";
    pub const DIR_NAME_FILE: &str = "DIR_NAME_FILE";
    pub const FILE_MASK_FILE: &str = "FILE_MASK_FILE";
    pub const PWB_DATA_FILE: &str = "PWB_DATA_FILE";
    pub const DC_LIST_FILE: &str = "DC_LIST_FILE";
    pub const ACK_QUEUE_FILE: &str = "ACK_QUEUE_FILE";
    pub const FRA_FILE: &str = "FRA_FILE";
    pub const FSA_FILE: &str = "FSA_FILE";
    /// Control fifo carrying delete commands into the dispatcher
    /// (spec §6: "named pipes for delete commands, ...").
    pub const DELETE_COMMAND_FIFO: &str = "delete_command_fifo";
    /// Destination for the delete-log emitter's audit records (spec §6
    /// "Delete-log record"; not itself one of the four named control
    /// fifos, but the same fifo-or-plain-file convention applies).
    pub const DELETE_LOG_FIFO: &str = "delete_log_fifo";
    pub const FINISH_FIFO: &str = "finish_fifo";
    pub const TRANSFER_DEBUG_LOG: &str = "transfer_debug_log";
    pub const RECEIVE_LOG: &str = "receive_log";
}

impl Config {
    /// Loads and parses a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))?;
        Ok(config)
    }

    fn fifo_path(&self, name: &str) -> PathBuf {
        self.fifodir.join(name)
    }

    pub fn queue_file(&self) -> PathBuf {
        self.fifo_path(filenames::MSG_QUEUE_FILE)
    }
    pub fn cache_file(&self) -> PathBuf {
        self.fifo_path(filenames::MSG_CACHE_FILE)
    }
    pub fn jid_file(&self) -> PathBuf {
        self.fifo_path(filenames::JOB_ID_DATA_FILE)
    }
    pub fn dir_name_file(&self) -> PathBuf {
        self.fifo_path(filenames::DIR_NAME_FILE)
    }
    pub fn file_mask_file(&self) -> PathBuf {
        self.fifo_path(filenames::FILE_MASK_FILE)
    }
    pub fn password_file(&self) -> PathBuf {
        self.fifo_path(filenames::PWB_DATA_FILE)
    }
    pub fn dir_config_file(&self) -> PathBuf {
        self.fifo_path(filenames::DC_LIST_FILE)
    }
    pub fn fra_file(&self) -> PathBuf {
        self.fifo_path(filenames::FRA_FILE)
    }
    pub fn fsa_file(&self) -> PathBuf {
        self.fifo_path(filenames::FSA_FILE)
    }
    pub fn delete_command_fifo(&self) -> PathBuf {
        self.fifo_path(filenames::DELETE_COMMAND_FIFO)
    }
    pub fn delete_log_fifo(&self) -> PathBuf {
        self.fifo_path(filenames::DELETE_LOG_FIFO)
    }
    pub fn finish_fifo(&self) -> PathBuf {
        self.fifo_path(filenames::FINISH_FIFO)
    }

    /// The flat directory of `<hex job_id>`-named message files and
    /// `ALTERNATE_FILE.<hex job_id>` sidecars the GC's filesystem sweep
    /// scans (spec §4.2 phase 3, §6).
    pub fn message_dir(&self) -> PathBuf {
        self.fifodir.clone()
    }
}
