//! Component E: the queue mutator — applies a parsed control-pipe
//! command to the queue, FSA, and FRA tables (spec.md §4.1 "Per-command
//! semantics").
//!
//! Grounded on the teacher's habit of a single `apply`-style function
//! per protocol command (see `wire::protocol::Command` and its
//! handling in `bin/ebeans`), generalized here into one `Dispatcher`
//! that owns the tables a command needs and exposes one method per
//! wire command.

use std::path::Path;

use nix::sys::signal::Signal;

use crate::deletelog::{parse_log_tokens, DeleteLog, DeleteLogRecord};
use crate::pipe::protocol::Command;
use crate::types::connection::ConnectionTable;
use crate::types::fra::Fra;
use crate::types::fsa::{self, Fsa};
use crate::types::mdb::MessageCache;
use crate::types::queue::{parse_msg_name, Queue, QueueEntry};
use crate::worker::{self, GlobalCounters};

pub struct Dispatcher<'a, W> {
    pub queue: &'a mut Queue,
    pub fsa: &'a mut Fsa,
    pub fra: &'a mut Fra,
    pub cache: &'a MessageCache,
    pub connections: &'a mut ConnectionTable,
    pub counters: &'a mut GlobalCounters,
    pub deletelog: &'a mut DeleteLog<W>,
    pub file_dir: &'a Path,
}

impl<'a, W: std::io::Write> Dispatcher<'a, W> {
    pub fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::DeleteAllJobsFromHost { host_alias } => {
                self.delete_all_jobs_from_host(&host_alias)
            }
            Command::DeleteMessage { msg_name } => self.delete_message(&msg_name),
            Command::DeleteSingleFile { msg_name, file_name } => {
                self.delete_single_file(&msg_name, &file_name)
            }
            Command::DeleteRetrieve { msg_number, fra_pos } => {
                self.delete_retrieve(msg_number, fra_pos)
            }
            Command::DeleteRetrievesFromDir { dir_alias } => {
                self.delete_retrieves_from_dir(&dir_alias)
            }
        }
    }

    /// Resolves the host alias a queue entry belongs to, via the
    /// message cache for send jobs or the FRA for fetch jobs (spec §3:
    /// "`pos` (index into message cache for send jobs, or into FRA for
    /// fetch jobs)").
    fn entry_host_alias(&self, entry: &QueueEntry) -> Option<String> {
        if entry.is_fetch_job() {
            self.fra.try_get(entry.pos as usize).map(|d| d.host_alias)
        } else {
            self.cache
                .try_get(entry.pos as usize)
                .map(|c| c.host_name)
        }
    }

    /// The shared teardown for one queue entry: signal/reap any live
    /// worker, clear its connection slot, remove staging files under
    /// the delete-log envelope, and compact it out of the queue (spec
    /// §4.1, steps (i)-(v) of delete-all-from-host, shared verbatim by
    /// delete-message).
    fn teardown_entry(&mut self, pos: usize, entry: &QueueEntry) {
        if entry.pid > 0 {
            match worker::kill_and_reap(entry.pid, Signal::SIGINT) {
                worker::ReapOutcome::Reaped | worker::ReapOutcome::AlreadyGone => {
                    self.connections.clear(entry.connect_pos);
                    self.counters.dec_active_transfers();
                }
                worker::ReapOutcome::SignalError(e) => {
                    tracing::warn!(pid = entry.pid, ?e, "failed to signal worker during delete");
                }
                worker::ReapOutcome::WaitMismatch => {
                    tracing::warn!(pid = entry.pid, "wait mismatch during delete, proceeding anyway");
                }
            }
        }

        self.remove_staging_files(entry);

        if let Some(host_alias) = self.entry_host_alias(entry) {
            if let Some(fsa_pos) = fsa::find_by_alias(self.fsa, &host_alias) {
                self.dec_host_jobs_queued(fsa_pos.get());
            }
        }

        self.queue.remove_compact(pos);
    }

    fn remove_staging_files(&mut self, entry: &QueueEntry) {
        let Some(tokens) = parse_msg_name(&entry.msg_name) else {
            tracing::warn!(msg_name = %entry.msg_name, "malformed message name, skipping staging cleanup");
            return;
        };
        let Some((input_time, split_counter, unique_number)) = parse_log_tokens(&tokens) else {
            tracing::warn!(msg_name = %entry.msg_name, "malformed message-name tokens, skipping staging cleanup");
            return;
        };

        let staging_dir = self.file_dir.join(&entry.msg_name);
        let file_size = staging_dir
            .metadata()
            .map(|m| m.len())
            .unwrap_or(0);
        let _ = std::fs::remove_dir_all(&staging_dir);

        let job_id = u32::from_str_radix(&tokens.job_id, 16).unwrap_or(0);
        let dir_id = tokens.dir_num.parse().unwrap_or(0);

        let _ = self.deletelog.emit(&DeleteLogRecord {
            file_size,
            job_id,
            dir_id,
            input_time,
            split_counter,
            unique_number,
            file_name: tokens.filename.clone().unwrap_or_default(),
            file_line: "dispatch.rs:remove_staging_files".into(),
        });
    }

    fn delete_all_jobs_from_host(&mut self, host_alias: &str) {
        let mut matches: Vec<usize> = self
            .queue
            .iter()
            .filter(|(_, e)| self.entry_host_alias(e).as_deref() == Some(host_alias))
            .map(|(pos, _)| pos)
            .collect();
        matches.sort_unstable_by(|a, b| b.cmp(a));

        for pos in matches {
            let entry = self.queue.get(pos);
            self.teardown_entry(pos, &entry);
        }

        if let Some(fsa_pos) = fsa::find_by_alias(self.fsa, host_alias) {
            let mut host = self.fsa.get(fsa_pos.get());
            host.hard_reset();
            self.fsa.set(fsa_pos.get(), &host);
        }
    }

    fn delete_message(&mut self, msg_name: &str) {
        let found = self
            .queue
            .iter()
            .find(|(_, e)| e.msg_name == msg_name)
            .map(|(pos, _)| pos);
        if let Some(pos) = found {
            let entry = self.queue.get(pos);
            self.teardown_entry(pos, &entry);
        }
    }

    fn delete_single_file(&mut self, msg_name: &str, file_name: &str) {
        let found = self
            .queue
            .iter()
            .find(|(_, e)| e.msg_name == msg_name && e.is_pending())
            .map(|(pos, _)| pos);
        let Some(pos) = found else {
            return;
        };
        let mut entry = self.queue.get(pos);

        let path = self.file_dir.join(msg_name).join(file_name);
        let file_size = path.metadata().map(|m| m.len()).unwrap_or(0);
        let _ = std::fs::remove_file(&path);

        entry.files_to_send = entry.files_to_send.saturating_sub(1);
        entry.file_size_to_send = entry.file_size_to_send.saturating_sub(file_size);

        if let Some(tokens) = parse_msg_name(msg_name) {
            if let Some((input_time, split_counter, unique_number)) = parse_log_tokens(&tokens) {
                let job_id = u32::from_str_radix(&tokens.job_id, 16).unwrap_or(0);
                let dir_id = tokens.dir_num.parse().unwrap_or(0);
                let _ = self.deletelog.emit(&DeleteLogRecord {
                    file_size,
                    job_id,
                    dir_id,
                    input_time,
                    split_counter,
                    unique_number,
                    file_name: file_name.to_string(),
                    file_line: "dispatch.rs:delete_single_file".into(),
                });
            }
        }

        let host_fsa_pos = self
            .entry_host_alias(&entry)
            .and_then(|host_alias| fsa::find_by_alias(self.fsa, &host_alias));

        if let Some(fsa_pos) = host_fsa_pos {
            self.dec_host_total_file_count(fsa_pos.get(), file_size);
        }

        if entry.files_to_send == 0 {
            if let Some(fsa_pos) = host_fsa_pos {
                self.dec_host_jobs_queued(fsa_pos.get());
            }
            self.queue.remove_compact(pos);
        } else {
            self.queue.set(pos, &entry);
        }
    }

    /// Decrements a host's `total_file_count`/`total_file_size` under
    /// the total-file-count range lock, clearing `error_counter` and
    /// `total_file_size` if the count lands on zero (spec §4.1:
    /// "decrement the host's totals"; §8: `total_file_count == 0 ⇒
    /// total_file_size == 0`; §5: "`lock_offset + LOCK_TFC` = host
    /// total-file-count").
    fn dec_host_total_file_count(&mut self, fsa_pos: usize, file_size: u64) {
        let offset = fsa::lock_offset(fsa_pos) + crate::shared::layout::LOCK_TFC;

        // The lock must outlive the `&mut self.fsa` borrow that `set()`
        // below needs, so it's taken on a duplicated fd held in a local
        // binding rather than one borrowed from the region itself.
        let file = self.fsa.region().try_clone_file();
        let _guard = match &file {
            Ok(f) => crate::shared::lock::RangeLock::acquire(f, offset, crate::shared::layout::LOCK_RANGE_LEN)
                .map_err(|e| tracing::warn!(?e, "failed to acquire total-file-count lock, updating unlocked"))
                .ok(),
            Err(e) => {
                tracing::warn!(?e, "failed to duplicate fsa handle for locking, updating unlocked");
                None
            }
        };

        let mut host = self.fsa.get(fsa_pos);
        host.total_file_count = host.total_file_count.saturating_sub(1);
        host.total_file_size = host.total_file_size.saturating_sub(file_size);
        if host.total_file_count == 0 {
            host.error_counter = 0;
            host.total_file_size = 0;
        }
        self.fsa.set(fsa_pos, &host);
    }

    /// Decrements a host's `jobs_queued` whenever a queue entry for that
    /// host leaves the queue, whether by full completion (the terminal
    /// case of `delete_single_file`) or by `teardown_entry`'s other
    /// callers (delete-message, delete-retrieve, delete-retrieves-from-
    /// dir; spec §8 scenario 3: "jobs_queued for host decremented").
    fn dec_host_jobs_queued(&mut self, fsa_pos: usize) {
        let mut host = self.fsa.get(fsa_pos);
        host.jobs_queued = host.jobs_queued.saturating_sub(1);
        self.fsa.set(fsa_pos, &host);
    }

    fn delete_retrieve(&mut self, msg_number: f64, fra_pos: usize) {
        let found = self
            .queue
            .iter()
            .find(|(_, e)| e.is_fetch_job() && e.pos as usize == fra_pos && e.msg_number == msg_number)
            .map(|(pos, _)| pos);
        if let Some(pos) = found {
            let entry = self.queue.get(pos);
            self.teardown_entry(pos, &entry);
        }
    }

    fn delete_retrieves_from_dir(&mut self, dir_alias: &str) {
        let Some(fra_pos) = self
            .fra
            .iter()
            .find(|(_, d)| d.dir_alias == dir_alias)
            .map(|(pos, _)| pos)
        else {
            return;
        };

        loop {
            let next = self
                .queue
                .iter()
                .find(|(_, e)| e.is_fetch_job() && e.pos as usize == fra_pos)
                .map(|(pos, _)| pos);
            let Some(pos) = next else { break };
            let entry = self.queue.get(pos);
            self.teardown_entry(pos, &entry);
        }

        let mut dir = self.fra.get(fra_pos);
        dir.reset_after_drain(dir.next_check_time);
        self.fra.set(fra_pos, &dir);
    }
}
