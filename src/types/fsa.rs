//! FSA — filetransfer status array: host-indexed aggregate counters and
//! per-slot job statuses (spec.md §3, §GLOSSARY).

use bytes::{Buf, BufMut};

use crate::shared::table::Record;
use crate::types::fixedstr::{read_fixed, write_fixed};
use crate::types::ids::PENDING;

pub const HOST_ALIAS_LEN: usize = 8;
pub const HOST_NAME_LEN: usize = 32;
pub const FILE_NAME_LEN: usize = 64;
pub const UNIQUE_NAME_LEN: usize = 16;
pub const ERROR_HISTORY_LEN: usize = 12;
/// `K` in spec.md §3: number of parallel transfer slots tracked per host.
pub const MAX_PARALLEL_TRANSFERS: usize = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectStatus {
    #[default]
    Disconnect,
    Connecting,
    Connected,
}

impl ConnectStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnect,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Disconnect => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobSlot {
    pub pid: i32,
    pub connect_status: ConnectStatus,
    pub file_size_in_use: u64,
    pub file_size_done: u64,
    pub file_name_in_use: String,
    pub unique_name: String,
    pub job_id: u32,
}

impl JobSlot {
    const SIZE: usize = 4 + 1 + 8 + 8 + FILE_NAME_LEN + UNIQUE_NAME_LEN + 4;

    fn read(mut b: &[u8]) -> Self {
        let pid = b.get_i32_le();
        let connect_status = ConnectStatus::from_u8(b.get_u8());
        let file_size_in_use = b.get_u64_le();
        let file_size_done = b.get_u64_le();
        let (name_buf, rest) = b.split_at(FILE_NAME_LEN);
        let file_name_in_use = read_fixed(name_buf);
        b = rest;
        let (uniq_buf, rest) = b.split_at(UNIQUE_NAME_LEN);
        let unique_name = read_fixed(uniq_buf);
        b = rest;
        let job_id = b.get_u32_le();
        Self {
            pid,
            connect_status,
            file_size_in_use,
            file_size_done,
            file_name_in_use,
            unique_name,
            job_id,
        }
    }

    fn write(&self, mut b: &mut [u8]) {
        b.put_i32_le(self.pid);
        b.put_u8(self.connect_status.to_u8());
        b.put_u64_le(self.file_size_in_use);
        b.put_u64_le(self.file_size_done);
        let (name_buf, rest) = b.split_at_mut(FILE_NAME_LEN);
        write_fixed(name_buf, self.file_name_in_use.as_bytes());
        b = rest;
        let (uniq_buf, rest) = b.split_at_mut(UNIQUE_NAME_LEN);
        write_fixed(uniq_buf, self.unique_name.as_bytes());
        b = rest;
        b.put_u32_le(self.job_id);
    }

    /// Resets a slot to its post-kill/clear state (spec §4.1: "clear
    /// the per-slot `proc_id`, `connect_status=DISCONNECT`, zero all
    /// per-slot `no_of_files*`, `file_size*`, `file_name_in_use`, and
    /// `unique_name`").
    pub fn clear(&mut self) {
        self.pid = PENDING;
        self.connect_status = ConnectStatus::Disconnect;
        self.file_size_in_use = 0;
        self.file_size_done = 0;
        self.file_name_in_use.clear();
        self.unique_name.clear();
        self.job_id = 0;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostStatus {
    pub host_alias: String,
    pub host_display_name: String,
    pub total_file_count: u32,
    pub total_file_size: u64,
    pub active_transfers: u32,
    pub allowed_transfers: u32,
    pub error_counter: u32,
    pub error_history: [u16; ERROR_HISTORY_LEN],
    pub jobs_queued: u32,
    pub job_status: [JobSlot; MAX_PARALLEL_TRANSFERS],
}

impl Default for HostStatus {
    fn default() -> Self {
        Self {
            host_alias: String::new(),
            host_display_name: String::new(),
            total_file_count: 0,
            total_file_size: 0,
            active_transfers: 0,
            allowed_transfers: 1,
            error_counter: 0,
            error_history: [0; ERROR_HISTORY_LEN],
            jobs_queued: 0,
            job_status: Default::default(),
        }
    }
}

impl HostStatus {
    /// Invariant from spec §8: counts never negative (guaranteed by
    /// type), `0 <= active_transfers <= allowed_transfers`, and
    /// `total_file_count == 0 => total_file_size == 0`.
    pub fn check_invariants(&self) -> bool {
        self.active_transfers <= self.allowed_transfers
            && (self.total_file_count != 0 || self.total_file_size == 0)
    }

    /// Adjusts `active_transfers` by `delta`, clamped to
    /// `[0, allowed_transfers]` per spec §4.1's signal/reap protocol:
    /// "adjust the host's `active_transfers` (clamped to
    /// `[0, allowed_transfers]`)".
    pub fn adjust_active_transfers(&mut self, delta: i32) {
        let current = self.active_transfers as i64 + delta as i64;
        self.active_transfers = current.clamp(0, self.allowed_transfers as i64) as u32;
    }

    /// Resets every counter and slot to zero/cleared state (spec §4.1
    /// end of Delete-all-from-host: "the host counters are hard-reset").
    pub fn hard_reset(&mut self) {
        self.total_file_count = 0;
        self.total_file_size = 0;
        self.active_transfers = 0;
        self.error_counter = 0;
        self.error_history = [0; ERROR_HISTORY_LEN];
        self.jobs_queued = 0;
        for slot in &mut self.job_status {
            slot.clear();
        }
    }
}

impl Record for HostStatus {
    const SIZE: usize = HOST_ALIAS_LEN
        + HOST_NAME_LEN
        + 4
        + 8
        + 4
        + 4
        + 4
        + ERROR_HISTORY_LEN * 2
        + 4
        + JobSlot::SIZE * MAX_PARALLEL_TRANSFERS;

    fn read(buf: &[u8]) -> Self {
        let mut b = buf;
        let (alias_buf, rest) = b.split_at(HOST_ALIAS_LEN);
        let host_alias = read_fixed(alias_buf);
        b = rest;
        let (name_buf, rest) = b.split_at(HOST_NAME_LEN);
        let host_display_name = read_fixed(name_buf);
        b = rest;

        let total_file_count = b.get_u32_le();
        let total_file_size = b.get_u64_le();
        let active_transfers = b.get_u32_le();
        let allowed_transfers = b.get_u32_le();
        let error_counter = b.get_u32_le();

        let mut error_history = [0u16; ERROR_HISTORY_LEN];
        for slot in &mut error_history {
            *slot = b.get_u16_le();
        }

        let jobs_queued = b.get_u32_le();

        let job_status = std::array::from_fn(|_| {
            let (slot_buf, rest) = b.split_at(JobSlot::SIZE);
            b = rest;
            JobSlot::read(slot_buf)
        });

        Self {
            host_alias,
            host_display_name,
            total_file_count,
            total_file_size,
            active_transfers,
            allowed_transfers,
            error_counter,
            error_history,
            jobs_queued,
            job_status,
        }
    }

    fn write(&self, buf: &mut [u8]) {
        let mut b = buf;
        let (alias_buf, rest) = b.split_at_mut(HOST_ALIAS_LEN);
        write_fixed(alias_buf, self.host_alias.as_bytes());
        b = rest;
        let (name_buf, rest) = b.split_at_mut(HOST_NAME_LEN);
        write_fixed(name_buf, self.host_display_name.as_bytes());
        b = rest;

        b.put_u32_le(self.total_file_count);
        b.put_u64_le(self.total_file_size);
        b.put_u32_le(self.active_transfers);
        b.put_u32_le(self.allowed_transfers);
        b.put_u32_le(self.error_counter);

        for v in &self.error_history {
            b.put_u16_le(*v);
        }

        b.put_u32_le(self.jobs_queued);

        for slot in &self.job_status {
            let (slot_buf, rest) = b.split_at_mut(JobSlot::SIZE);
            slot.write(slot_buf);
            b = rest;
        }
    }
}

pub type Fsa = crate::shared::table::RecordTable<HostStatus>;

/// Byte offset of host `pos`'s record within the FSA file, the base
/// that `LOCK_TFC`/`LOCK_EC` are added to for that host's fine-grained
/// range locks (spec §5).
pub fn lock_offset(pos: usize) -> u64 {
    crate::shared::layout::Header::SIZE as u64 + (pos * HostStatus::SIZE) as u64
}

/// Finds the position of the host with the given alias, if any (used
/// by spec §4.2 phase 2 to repair a cache entry's `fsa_pos` "by alias
/// lookup").
pub fn find_by_alias(fsa: &Fsa, alias: &str) -> Option<crate::types::ids::FsaPos> {
    fsa.iter()
        .find(|(_, h)| h.host_alias == alias)
        .map(|(pos, _)| pos.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_slot_round_trips() {
        let slot = JobSlot {
            pid: 4242,
            connect_status: ConnectStatus::Connected,
            file_size_in_use: 1000,
            file_size_done: 200,
            file_name_in_use: "data.bin".into(),
            unique_name: "u1".into(),
            job_id: 0xdead,
        };
        let mut buf = vec![0u8; JobSlot::SIZE];
        slot.write(&mut buf);
        assert_eq!(JobSlot::read(&buf), slot);
    }

    #[test]
    fn host_status_round_trips_and_checks_invariants() {
        let mut h = HostStatus {
            host_alias: "hostA".into(),
            host_display_name: "Host A".into(),
            total_file_count: 3,
            total_file_size: 9000,
            active_transfers: 1,
            allowed_transfers: 2,
            ..Default::default()
        };
        h.job_status[0].pid = 4242;

        let mut buf = vec![0u8; HostStatus::SIZE];
        h.write(&mut buf);
        let h2 = HostStatus::read(&buf);
        assert_eq!(h2, h);
        assert!(h2.check_invariants());
    }

    #[test]
    fn hard_reset_clears_everything() {
        let mut h = HostStatus {
            total_file_count: 5,
            total_file_size: 500,
            active_transfers: 2,
            error_counter: 3,
            jobs_queued: 4,
            ..Default::default()
        };
        h.job_status[0].pid = 99;
        h.hard_reset();
        assert_eq!(h.total_file_count, 0);
        assert_eq!(h.total_file_size, 0);
        assert_eq!(h.active_transfers, 0);
        assert_eq!(h.error_counter, 0);
        assert_eq!(h.jobs_queued, 0);
        assert_eq!(h.job_status[0].pid, PENDING);
    }
}
