//! Queue entry: one unit of work scheduled for a worker (spec.md §3,
//! §GLOSSARY). Exactly one queue entry exists per active message.

use bytes::{Buf, BufMut};

use crate::shared::layout::FETCH_JOB;
use crate::shared::table::Record;
use crate::types::fixedstr::{read_fixed, write_fixed};
use crate::types::ids::PENDING;

pub const MSG_NAME_LEN: usize = 128;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueueEntry {
    pub msg_name: String,
    pub msg_number: f64,
    pub pos: u32,
    pub pid: i32,
    pub connect_pos: i32,
    pub special_flag: u16,
    pub files_to_send: u32,
    pub file_size_to_send: u64,
}

impl QueueEntry {
    pub fn is_fetch_job(&self) -> bool {
        self.special_flag & FETCH_JOB != 0
    }

    pub fn is_pending(&self) -> bool {
        self.pid == PENDING
    }
}

impl Record for QueueEntry {
    const SIZE: usize = MSG_NAME_LEN + 8 + 4 + 4 + 4 + 2 + 4 + 8;

    fn read(buf: &[u8]) -> Self {
        let mut b = buf;
        let (name_buf, rest) = b.split_at(MSG_NAME_LEN);
        let msg_name = read_fixed(name_buf);
        b = rest;

        let msg_number = b.get_f64_le();
        let pos = b.get_u32_le();
        let pid = b.get_i32_le();
        let connect_pos = b.get_i32_le();
        let special_flag = b.get_u16_le();
        let files_to_send = b.get_u32_le();
        let file_size_to_send = b.get_u64_le();

        Self {
            msg_name,
            msg_number,
            pos,
            pid,
            connect_pos,
            special_flag,
            files_to_send,
            file_size_to_send,
        }
    }

    fn write(&self, buf: &mut [u8]) {
        let mut b = buf;
        let (name_buf, rest) = b.split_at_mut(MSG_NAME_LEN);
        write_fixed(name_buf, self.msg_name.as_bytes());
        b = rest;

        b.put_f64_le(self.msg_number);
        b.put_u32_le(self.pos);
        b.put_i32_le(self.pid);
        b.put_i32_le(self.connect_pos);
        b.put_u16_le(self.special_flag);
        b.put_u32_le(self.files_to_send);
        b.put_u64_le(self.file_size_to_send);
    }
}

pub type Queue = crate::shared::table::RecordTable<QueueEntry>;

/// The five `/`- and `_`-separated tokens encoded in a message name per
/// spec §6: `jobid/dirnum/date_unique_splitcounter/filename`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgNameTokens {
    pub job_id: String,
    pub dir_num: String,
    pub date: String,
    pub unique: String,
    pub split_counter: String,
    pub filename: Option<String>,
}

/// Parses a message name into its tokens. Returns `None` if the name
/// doesn't have the expected slash/underscore structure (spec §7: data
/// corruption => discard command, log).
pub fn parse_msg_name(name: &str) -> Option<MsgNameTokens> {
    let mut parts = name.splitn(4, '/');
    let job_id = parts.next()?.to_string();
    let dir_num = parts.next()?.to_string();
    let date_unique_split = parts.next()?;
    let filename = parts.next().map(|s| s.to_string()).filter(|s| !s.is_empty());

    let mut tokens = date_unique_split.splitn(3, '_');
    let date = tokens.next()?.to_string();
    let unique = tokens.next()?.to_string();
    let split_counter = tokens.next()?.to_string();

    Some(MsgNameTokens {
        job_id,
        dir_num,
        date,
        unique,
        split_counter,
        filename,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_entry_round_trips() {
        let e = QueueEntry {
            msg_name: "5a/0/6012a_0001_0/data.bin".into(),
            msg_number: 12345.5,
            pos: 3,
            pid: PENDING,
            connect_pos: -1,
            special_flag: 0,
            files_to_send: 3,
            file_size_to_send: 30000,
        };
        let mut buf = vec![0u8; QueueEntry::SIZE];
        e.write(&mut buf);
        assert_eq!(QueueEntry::read(&buf), e);
        assert!(e.is_pending());
        assert!(!e.is_fetch_job());
    }

    #[test]
    fn parses_well_formed_message_name() {
        let t = parse_msg_name("5a/0/6012a_0001_0/data.bin").unwrap();
        assert_eq!(t.job_id, "5a");
        assert_eq!(t.dir_num, "0");
        assert_eq!(t.date, "6012a");
        assert_eq!(t.unique, "0001");
        assert_eq!(t.split_counter, "0");
        assert_eq!(t.filename.as_deref(), Some("data.bin"));
    }

    #[test]
    fn parses_name_without_trailing_filename() {
        let t = parse_msg_name("5a/0/6012a_0001_0/").unwrap();
        assert_eq!(t.filename, None);
    }

    #[test]
    fn rejects_malformed_name() {
        assert!(parse_msg_name("not-a-message-name").is_none());
        assert!(parse_msg_name("5a/0/bad").is_none());
    }
}
