//! FRA — file-retrieve-status array: directory-indexed table for
//! pull-mode transfers (spec.md §3, §GLOSSARY).

use bytes::{Buf, BufMut};

use crate::shared::layout::DIR_ERROR_SET;
use crate::shared::table::Record;
use crate::types::fixedstr::{read_fixed, write_fixed};

pub const DIR_ALIAS_LEN: usize = 8;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirStatus {
    pub dir_alias: String,
    pub host_alias: String,
    pub error_counter: u32,
    pub dir_flag: u16,
    pub queued: u32,
    pub next_check_time: i64,
}

impl DirStatus {
    pub fn error_set(&self) -> bool {
        self.dir_flag & DIR_ERROR_SET != 0
    }

    pub fn clear_error_set(&mut self) {
        self.dir_flag &= !DIR_ERROR_SET;
    }

    /// Spec §8 scenario 4: after all fetch entries for a directory are
    /// removed, `queued = 0`, `error_counter = 0`, `DIR_ERROR_SET`
    /// cleared, and `next_check_time` is recomputed if schedule entries
    /// are configured. The scheduling table itself is an external
    /// collaborator (spec §3: "scheduling entries", opaque here), so
    /// recomputation is represented as a caller-supplied next time.
    pub fn reset_after_drain(&mut self, next_check_time: i64) {
        self.queued = 0;
        self.error_counter = 0;
        self.clear_error_set();
        self.next_check_time = next_check_time;
    }
}

impl Record for DirStatus {
    const SIZE: usize = DIR_ALIAS_LEN + crate::types::fsa::HOST_ALIAS_LEN + 4 + 2 + 4 + 8;

    fn read(buf: &[u8]) -> Self {
        let mut b = buf;
        let (alias_buf, rest) = b.split_at(DIR_ALIAS_LEN);
        let dir_alias = read_fixed(alias_buf);
        b = rest;
        let (host_buf, rest) = b.split_at(crate::types::fsa::HOST_ALIAS_LEN);
        let host_alias = read_fixed(host_buf);
        b = rest;

        let error_counter = b.get_u32_le();
        let dir_flag = b.get_u16_le();
        let queued = b.get_u32_le();
        let next_check_time = b.get_i64_le();

        Self {
            dir_alias,
            host_alias,
            error_counter,
            dir_flag,
            queued,
            next_check_time,
        }
    }

    fn write(&self, buf: &mut [u8]) {
        let mut b = buf;
        let (alias_buf, rest) = b.split_at_mut(DIR_ALIAS_LEN);
        write_fixed(alias_buf, self.dir_alias.as_bytes());
        b = rest;
        let (host_buf, rest) = b.split_at_mut(crate::types::fsa::HOST_ALIAS_LEN);
        write_fixed(host_buf, self.host_alias.as_bytes());
        b = rest;

        b.put_u32_le(self.error_counter);
        b.put_u16_le(self.dir_flag);
        b.put_u32_le(self.queued);
        b.put_i64_le(self.next_check_time);
    }
}

pub type Fra = crate::shared::table::RecordTable<DirStatus>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_status_round_trips() {
        let mut d = DirStatus {
            dir_alias: "in/feed".into(),
            host_alias: "hostA".into(),
            error_counter: 2,
            dir_flag: DIR_ERROR_SET,
            queued: 3,
            next_check_time: 1000,
        };
        let mut buf = vec![0u8; DirStatus::SIZE];
        d.write(&mut buf);
        let d2 = DirStatus::read(&buf);
        assert_eq!(d2, d);
        assert!(d2.error_set());

        d.reset_after_drain(2000);
        assert_eq!(d.queued, 0);
        assert_eq!(d.error_counter, 0);
        assert!(!d.error_set());
        assert_eq!(d.next_check_time, 2000);
    }
}
