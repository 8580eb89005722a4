//! Component F: the catalogue garbage collector (spec.md §2, §4.2).
//!
//! Runs once at start-up, after the wait barriers in `lifecycle::barriers`
//! clear. Structured as one private method per phase, called in order by
//! `GcContext::run`, mirroring `Dispatcher::apply`'s shape in
//! `dispatch.rs`: a struct of borrowed table handles plus one method per
//! unit of behaviour, nothing held across a call that might compact.

use std::collections::HashSet;
use std::path::Path;
use std::time::UNIX_EPOCH;

use nix::sys::signal::Signal;

use crate::deletelog::{parse_log_tokens, DeleteLog, DeleteLogRecord};
use crate::sort::heapsort_desc;
use crate::types::catalogue::{
    scheme_has_password, scheme_of, DirConfigTable, DirNameTable, FileMaskTable, PasswordTable,
};
use crate::types::connection::ConnectionTable;
use crate::types::dedup::DedupPaths;
use crate::types::fsa::Fsa;
use crate::types::ids::{DirConfigId, DirPos, JobId, MaskId};
use crate::types::jid::{credential_key, JobCatalogue};
use crate::types::mdb::{CacheEntry, MessageCache};
use crate::types::queue::{parse_msg_name, Queue};
use crate::worker::{self, GlobalCounters};

/// Loads a job's cache entry from outside the catalogues when phase 2
/// finds a current job id with no existing cache slot — the
/// configuration loader in the original system, an external
/// collaborator here (spec §4.2 phase 2, §6).
pub trait JobLoader {
    fn load(&mut self, job_id: JobId) -> Option<CacheEntry>;
}

impl<F: FnMut(JobId) -> Option<CacheEntry>> JobLoader for F {
    fn load(&mut self, job_id: JobId) -> Option<CacheEntry> {
        self(job_id)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GcParams {
    /// Unix-epoch seconds treated as "now" for staleness comparisons.
    /// Threaded in explicitly (rather than read from the clock inside
    /// the sweep) so a GC pass is reproducible given the same table
    /// contents and file mtimes.
    pub now: i64,
    pub switch_file_time_secs: i64,
    pub max_output_log_files: i64,
}

impl GcParams {
    fn stale_window(&self) -> i64 {
        self.switch_file_time_secs.saturating_mul(self.max_output_log_files)
    }
}

#[derive(Debug, Default)]
pub struct GcReport {
    pub cache_slots_removed: usize,
    pub jobs_removed: usize,
    pub dirs_removed: usize,
    pub file_masks_removed: usize,
    pub passwords_removed: usize,
    pub dir_configs_removed: usize,
}

struct DeferredRemoval {
    jid_pos: usize,
    dir_id_pos: DirPos,
    file_mask_id: MaskId,
    dir_config_id: DirConfigId,
    credential_key: Option<String>,
}

pub struct GcContext<'a, W> {
    pub queue: &'a mut Queue,
    pub cache: &'a mut MessageCache,
    pub fsa: &'a mut Fsa,
    pub jid: &'a mut JobCatalogue,
    pub dir_names: &'a mut DirNameTable,
    pub file_masks: &'a mut FileMaskTable,
    pub passwords: &'a mut PasswordTable,
    pub dir_configs: &'a mut DirConfigTable,
    pub connections: &'a mut ConnectionTable,
    pub counters: &'a mut GlobalCounters,
    pub deletelog: &'a mut DeleteLog<W>,
    /// Flat per-job files named by hex job id, scanned in phase 3 (spec
    /// §4.2 phase 3 "Scan the message directory").
    pub message_dir: &'a Path,
    /// Per-message staging area, `<msg_name>/<files>` (spec §6).
    pub file_dir: &'a Path,
}

impl<'a, W: std::io::Write> GcContext<'a, W> {
    pub fn run(
        &mut self,
        current_job_ids: &[JobId],
        loader: &mut dyn JobLoader,
        params: GcParams,
    ) -> GcReport {
        self.reconcile_current_list(current_job_ids, loader);

        let stale_window = params.stale_window();
        let mut touched = HashSet::new();
        let mut marked = HashSet::new();
        self.sweep_filesystem(params.now, stale_window, &mut touched, &mut marked);
        self.sweep_cache_consistency(params.now, stale_window, &touched, &mut marked);

        let mut report = GcReport::default();
        let mut dir_candidates = HashSet::new();
        let mut mask_candidates = HashSet::new();
        let mut dirconfig_candidates = HashSet::new();
        let mut password_candidates = HashSet::new();
        let mut removed_job_ids = Vec::new();

        let mut cache_positions_desc: Vec<usize> = marked.into_iter().collect();
        cache_positions_desc.sort_unstable_by(|a, b| b.cmp(a));

        let mut deferred = Vec::new();
        for cache_pos in cache_positions_desc {
            self.removal_loop_step(cache_pos, &mut deferred, &mut removed_job_ids);
            report.cache_slots_removed += 1;
        }

        let mut jid_positions: Vec<usize> = deferred.iter().map(|d| d.jid_pos).collect();
        jid_positions.sort_unstable();
        jid_positions.dedup();
        let mut jid_positions_desc = jid_positions;
        heapsort_desc(&mut jid_positions_desc);
        report.jobs_removed = jid_positions_desc.len();
        self.jid.remove_many_compact(&jid_positions_desc);

        for d in &deferred {
            dir_candidates.insert(d.dir_id_pos);
            mask_candidates.insert(d.file_mask_id);
            dirconfig_candidates.insert(d.dir_config_id);
            if let Some(key) = &d.credential_key {
                password_candidates.insert(key.clone());
            }
        }

        self.reference_count_check(
            &mut dir_candidates,
            &mut mask_candidates,
            &mut dirconfig_candidates,
            &mut password_candidates,
        );

        report.dirs_removed = self.cleanup_dirs(&dir_candidates);
        report.file_masks_removed = self.cleanup_file_masks(&mask_candidates);
        report.dir_configs_removed = self.cleanup_dir_configs(&dirconfig_candidates);
        report.passwords_removed = self.cleanup_passwords(&password_candidates);

        self.cleanup_alternate_files(&removed_job_ids);

        report
    }

    /// Phase 2: current-list reconciliation.
    fn reconcile_current_list(&mut self, current_job_ids: &[JobId], loader: &mut dyn JobLoader) {
        for pos in 0..self.cache.count() as usize {
            let mut c = self.cache.get(pos);
            if c.in_current_fsa {
                c.in_current_fsa = false;
                self.cache.set(pos, &c);
            }
        }

        for &job_id in current_job_ids {
            let found = self
                .cache
                .iter()
                .find(|(_, c)| c.job_id == job_id.0)
                .map(|(pos, _)| pos);

            if let Some(pos) = found {
                let mut c = self.cache.get(pos);
                let repaired = match c.fsa_pos() {
                    Some(fp) => self
                        .fsa
                        .try_get(fp.get())
                        .map(|h| h.host_alias != c.host_name)
                        .unwrap_or(true),
                    None => true,
                };
                if repaired {
                    c.set_fsa_pos(crate::types::fsa::find_by_alias(self.fsa, &c.host_name));
                }
                c.in_current_fsa = true;
                self.cache.set(pos, &c);
            } else if let Some(mut entry) = loader.load(job_id) {
                entry.in_current_fsa = true;
                let _ = self.cache.push(&entry);
            }
        }
    }

    /// Phase 3: filesystem sweep.
    fn sweep_filesystem(
        &mut self,
        now: i64,
        stale_window: i64,
        touched: &mut HashSet<usize>,
        marked: &mut HashSet<usize>,
    ) {
        let entries = match std::fs::read_dir(self.message_dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %self.message_dir.display(), ?e, "failed to scan message directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(job_id) = JobId::parse_hex(name) else {
                continue;
            };
            let Ok(meta) = entry.metadata() else { continue };
            let Ok(modified) = meta.modified() else {
                continue;
            };
            let mtime = modified
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            if now - mtime < stale_window {
                continue;
            }

            let Some(cache_pos) = self
                .cache
                .iter()
                .find(|(_, c)| c.job_id == job_id.0)
                .map(|(pos, _)| pos)
            else {
                continue;
            };
            touched.insert(cache_pos);

            let c = self.cache.get(cache_pos);
            if c.in_current_fsa {
                continue;
            }
            if now - c.last_transfer_time < stale_window {
                continue;
            }
            marked.insert(cache_pos);
        }
    }

    /// Phase 4: cache consistency sweep.
    fn sweep_cache_consistency(
        &mut self,
        now: i64,
        stale_window: i64,
        touched: &HashSet<usize>,
        marked: &mut HashSet<usize>,
    ) {
        for pos in 0..self.cache.count() as usize {
            if touched.contains(&pos) {
                continue;
            }
            let mut c = self.cache.get(pos);

            if !c.in_current_fsa && now - c.last_transfer_time >= stale_window {
                marked.insert(pos);
            }

            if crate::types::fsa::find_by_alias(self.fsa, &c.host_name).is_none()
                && c.fsa_pos().is_some()
            {
                c.set_fsa_pos(None);
                self.cache.set(pos, &c);
            }
        }
    }

    /// Phase 5, one marked cache slot: kill any live worker pointing at
    /// it (spec's phase-5 comment warns not to `break` on the first
    /// match — several queue entries can legitimately point at the same
    /// cache slot, e.g. split files of one message), remove its staging
    /// files under the delete-log envelope, record its job's
    /// cross-references for the deferred catalogue cleanup, then
    /// compact the cache slot out and fix up queue positions above it.
    fn removal_loop_step(
        &mut self,
        cache_pos: usize,
        deferred: &mut Vec<DeferredRemoval>,
        removed_job_ids: &mut Vec<u32>,
    ) {
        let cache_entry = self.cache.get(cache_pos);

        let owning: Vec<usize> = self
            .queue
            .iter()
            .filter(|(_, q)| !q.is_fetch_job() && q.pos as usize == cache_pos)
            .map(|(pos, _)| pos)
            .collect();
        for qpos in owning {
            let entry = self.queue.get(qpos);
            if entry.pid > 0 {
                match worker::kill_and_reap(entry.pid, Signal::SIGINT) {
                    worker::ReapOutcome::Reaped | worker::ReapOutcome::AlreadyGone => {
                        self.connections.clear(entry.connect_pos);
                        self.counters.dec_active_transfers();
                    }
                    worker::ReapOutcome::SignalError(e) => {
                        tracing::warn!(pid = entry.pid, ?e, "failed to signal worker during gc");
                    }
                    worker::ReapOutcome::WaitMismatch => {
                        tracing::warn!(pid = entry.pid, "wait mismatch during gc, proceeding anyway");
                    }
                }
            }
            self.remove_staging_files(&entry);
        }
        // Re-read queue positions after the loop above (no compaction
        // happened yet, so `owning` is still accurate) and remove them
        // from the tail forward so earlier indices stay valid.
        let mut owning_desc: Vec<usize> = self
            .queue
            .iter()
            .filter(|(_, q)| !q.is_fetch_job() && q.pos as usize == cache_pos)
            .map(|(pos, _)| pos)
            .collect();
        owning_desc.sort_unstable_by(|a, b| b.cmp(a));
        for qpos in owning_desc {
            self.queue.remove_compact(qpos);
        }

        let _ = std::fs::remove_file(
            self.message_dir
                .join(format!("{:x}", cache_entry.job_id)),
        );

        if let Some(jid_pos) = self
            .jid
            .iter()
            .find(|(_, j)| j.job_id == cache_entry.job_id)
            .map(|(pos, _)| pos)
        {
            let job = self.jid.get(jid_pos);
            let scheme = scheme_of(&job.recipient);
            let cred_key = if scheme_has_password(scheme) {
                credential_key(&job.recipient)
            } else {
                None
            };
            deferred.push(DeferredRemoval {
                jid_pos,
                dir_id_pos: job.dir_id_pos(),
                file_mask_id: job.file_mask_id(),
                dir_config_id: job.dir_config_id(),
                credential_key: cred_key,
            });
        }

        removed_job_ids.push(cache_entry.job_id);

        self.cache.remove_compact(cache_pos);
        for qpos in 0..self.queue.count() as usize {
            let mut q = self.queue.get(qpos);
            if !q.is_fetch_job() && q.pos as usize > cache_pos {
                q.pos -= 1;
                self.queue.set(qpos, &q);
            }
        }
    }

    /// Shared with `dispatch::Dispatcher::remove_staging_files`: unlink
    /// the staging directory for a queue entry, emitting one delete-log
    /// record per removal (spec §4.1, reused unmodified by GC phase 5).
    fn remove_staging_files(&mut self, entry: &crate::types::queue::QueueEntry) {
        let Some(tokens) = parse_msg_name(&entry.msg_name) else {
            tracing::warn!(msg_name = %entry.msg_name, "malformed message name, skipping staging cleanup");
            return;
        };
        let Some((input_time, split_counter, unique_number)) = parse_log_tokens(&tokens) else {
            tracing::warn!(msg_name = %entry.msg_name, "malformed message name tokens, skipping staging cleanup");
            return;
        };
        let Ok(job_id) = u32::from_str_radix(&tokens.job_id, 16) else {
            return;
        };
        let dir_id = tokens.dir_num.parse().unwrap_or(0);

        let staging_dir = self.file_dir.join(&entry.msg_name);
        let file_size = staging_dir.metadata().map(|m| m.len()).unwrap_or(0);
        let _ = std::fs::remove_dir_all(&staging_dir);

        let _ = self.deletelog.emit(&DeleteLogRecord {
            file_size,
            job_id,
            dir_id,
            input_time,
            split_counter,
            unique_number,
            file_name: tokens.filename.unwrap_or_default(),
            file_line: "gc.rs".into(),
        });
    }

    /// Phase 7: reference-count check. Removes from each candidate set
    /// any id still referenced by a surviving job.
    fn reference_count_check(
        &self,
        dir_candidates: &mut HashSet<DirPos>,
        mask_candidates: &mut HashSet<MaskId>,
        dirconfig_candidates: &mut HashSet<DirConfigId>,
        password_candidates: &mut HashSet<String>,
    ) {
        for (_, job) in self.jid.iter() {
            dir_candidates.remove(&job.dir_id_pos());
            mask_candidates.remove(&job.file_mask_id());
            dirconfig_candidates.remove(&job.dir_config_id());
            if let Some(key) = credential_key(&job.recipient) {
                password_candidates.remove(&key);
            }
        }
    }

    /// Phase 8, directory-name table: also decrements `dir_id_pos` on
    /// every surviving job above a removed position, since the
    /// invariant in spec §8 requires `dir_id_pos[j]` to keep indexing a
    /// live directory record after compaction.
    fn cleanup_dirs(&mut self, positions: &HashSet<DirPos>) -> usize {
        let mut positions_desc: Vec<usize> = positions.iter().map(|p| p.get()).collect();
        positions_desc.sort_unstable_by(|a, b| b.cmp(a));

        for pos in &positions_desc {
            let dedup = DedupPaths::for_dir(self.file_dir, DirPos::new(*pos));
            let _ = std::fs::remove_dir_all(&dedup.store);
            let _ = std::fs::remove_dir_all(&dedup.crc);

            self.dir_names.remove_compact(*pos);
            for jpos in 0..self.jid.count() as usize {
                let mut job = self.jid.get(jpos);
                if job.dir_id_pos as usize > *pos {
                    job.dir_id_pos -= 1;
                    self.jid.set(jpos, &job);
                }
            }
        }
        positions_desc.len()
    }

    /// Phase 8, file-mask table. Same positional-fixup reasoning as
    /// `cleanup_dirs`, applied to `file_mask_id`.
    fn cleanup_file_masks(&mut self, positions: &HashSet<MaskId>) -> usize {
        let mut positions_desc: Vec<usize> = positions.iter().map(|p| p.get()).collect();
        positions_desc.sort_unstable_by(|a, b| b.cmp(a));

        for pos in &positions_desc {
            self.file_masks.remove_compact(*pos);
            for jpos in 0..self.jid.count() as usize {
                let mut job = self.jid.get(jpos);
                if job.file_mask_id as usize > *pos {
                    job.file_mask_id -= 1;
                    self.jid.set(jpos, &job);
                }
            }
        }
        positions_desc.len()
    }

    /// Phase 8, dir-config-id table. Same positional-fixup reasoning.
    fn cleanup_dir_configs(&mut self, positions: &HashSet<DirConfigId>) -> usize {
        let mut positions_desc: Vec<usize> = positions.iter().map(|p| p.get()).collect();
        positions_desc.sort_unstable_by(|a, b| b.cmp(a));

        for pos in &positions_desc {
            self.dir_configs.remove_compact(*pos);
            for jpos in 0..self.jid.count() as usize {
                let mut job = self.jid.get(jpos);
                if job.dir_config_id as usize > *pos {
                    job.dir_config_id -= 1;
                    self.jid.set(jpos, &job);
                }
            }
        }
        positions_desc.len()
    }

    /// Phase 8, password table. Credentials carry no stored index on
    /// job records (recomputed from the recipient URL on demand), so no
    /// fix-up pass is needed after removal.
    fn cleanup_passwords(&mut self, keys: &HashSet<String>) -> usize {
        let mut removed = 0;
        for key in keys {
            let found = self
                .passwords
                .iter()
                .find(|(_, p)| &p.credential_key == key)
                .map(|(pos, _)| pos);
            if let Some(pos) = found {
                self.passwords.remove_compact(pos);
                removed += 1;
            }
        }
        removed
    }

    /// Phase 9: alternate-file cleanup.
    fn cleanup_alternate_files(&mut self, removed_job_ids: &[u32]) {
        for &job_id in removed_job_ids {
            let path = self
                .message_dir
                .join(format!("ALTERNATE_FILE.{job_id:x}"));
            if std::fs::remove_file(&path).is_ok() {
                tracing::debug!(path = %path.display(), "removed alternate-file sidecar");
            }
        }
    }
}
