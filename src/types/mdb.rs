//! MDB — message cache: catalogue of jobs known to the dispatcher with
//! their host-binding cache (spec.md §3, §GLOSSARY).

use bytes::{Buf, BufMut};

use crate::shared::table::Record;
use crate::types::fixedstr::{read_fixed, write_fixed};
use crate::types::fsa::HOST_ALIAS_LEN;
use crate::types::ids::FsaPos;

/// Sentinel `fsa_pos` meaning "no longer resolves in FSA" (spec §4.2
/// phase 4: "clear `fsa_pos` to a sentinel so subsequent work does not
/// touch FSA").
pub const FSA_POS_NONE: u32 = u32::MAX;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub job_id: u32,
    pub host_name: String,
    pub fsa_pos: u32,
    pub port: u16,
    pub msg_type: u8,
    pub age_limit: u32,
    pub msg_time: i64,
    pub last_transfer_time: i64,
    pub in_current_fsa: bool,
}

impl CacheEntry {
    pub fn fsa_pos(&self) -> Option<FsaPos> {
        if self.fsa_pos == FSA_POS_NONE {
            None
        } else {
            Some(FsaPos::new(self.fsa_pos as usize))
        }
    }

    pub fn set_fsa_pos(&mut self, pos: Option<FsaPos>) {
        self.fsa_pos = pos.map(|p| p.get() as u32).unwrap_or(FSA_POS_NONE);
    }
}

impl Record for CacheEntry {
    const SIZE: usize = 4 + HOST_ALIAS_LEN + 4 + 2 + 1 + 4 + 8 + 8 + 1;

    fn read(buf: &[u8]) -> Self {
        let mut b = buf;
        let job_id = b.get_u32_le();
        let (host_buf, rest) = b.split_at(HOST_ALIAS_LEN);
        let host_name = read_fixed(host_buf);
        b = rest;
        let fsa_pos = b.get_u32_le();
        let port = b.get_u16_le();
        let msg_type = b.get_u8();
        let age_limit = b.get_u32_le();
        let msg_time = b.get_i64_le();
        let last_transfer_time = b.get_i64_le();
        let in_current_fsa = b.get_u8() != 0;

        Self {
            job_id,
            host_name,
            fsa_pos,
            port,
            msg_type,
            age_limit,
            msg_time,
            last_transfer_time,
            in_current_fsa,
        }
    }

    fn write(&self, buf: &mut [u8]) {
        let mut b = buf;
        b.put_u32_le(self.job_id);
        let (host_buf, rest) = b.split_at_mut(HOST_ALIAS_LEN);
        write_fixed(host_buf, self.host_name.as_bytes());
        b = rest;
        b.put_u32_le(self.fsa_pos);
        b.put_u16_le(self.port);
        b.put_u8(self.msg_type);
        b.put_u32_le(self.age_limit);
        b.put_i64_le(self.msg_time);
        b.put_i64_le(self.last_transfer_time);
        b.put_u8(self.in_current_fsa as u8);
    }
}

pub type MessageCache = crate::shared::table::RecordTable<CacheEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_entry_round_trips() {
        let e = CacheEntry {
            job_id: 0xdeadbeef,
            host_name: "hostA".into(),
            fsa_pos: 2,
            port: 21,
            msg_type: 1,
            age_limit: 0,
            msg_time: 1000,
            last_transfer_time: 2000,
            in_current_fsa: true,
        };
        let mut buf = vec![0u8; CacheEntry::SIZE];
        e.write(&mut buf);
        assert_eq!(CacheEntry::read(&buf), e);
        assert_eq!(e.fsa_pos(), Some(FsaPos::new(2)));
    }

    #[test]
    fn sentinel_fsa_pos_is_none() {
        let mut e = CacheEntry::default();
        e.set_fsa_pos(None);
        assert_eq!(e.fsa_pos, FSA_POS_NONE);
        assert_eq!(e.fsa_pos(), None);
        e.set_fsa_pos(Some(FsaPos::new(5)));
        assert_eq!(e.fsa_pos(), Some(FsaPos::new(5)));
    }
}
