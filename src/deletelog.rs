//! Component G: the delete-log emitter — writes one audit record per
//! file or message removed (spec.md §2, §6 "Delete-log record").
//!
//! Grounded on the teacher's `wire::encoder::Encoder`: build the
//! outgoing bytes into a reusable `BytesMut` with `bytes::BufMut`, then
//! hand the whole buffer to a single writer call.

use std::io::{self, Write};

use bytes::{BufMut, BytesMut};

/// The character separating the two halves of the trailing `FD<sep>(file
/// line)` annotation (spec §6).
pub const ANNOTATION_SEP: u8 = b':';

/// One removed file or message, per spec §6: "Fixed-size prefix
/// (file-size, job-id, dir-id, input-time, split-counter,
/// unique-number, name-length) plus variable-length file-name, plus a
/// trailing annotation `FD<sep>(file line)`".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteLogRecord {
    pub file_size: u64,
    pub job_id: u32,
    pub dir_id: u32,
    pub input_time: u32,
    pub split_counter: u32,
    pub unique_number: u32,
    pub file_name: String,
    /// The `(file line)` half of the trailing annotation — conventionally
    /// the source location that requested the removal, mirroring the
    /// teacher's habit of tagging log lines with their call site.
    pub file_line: String,
}

impl DeleteLogRecord {
    fn encode(&self, dst: &mut BytesMut) {
        let name = self.file_name.as_bytes();
        dst.reserve(8 + 4 + 4 + 4 + 4 + 4 + 4 + name.len() + 1 + 4 + self.file_line.len() + 1);

        dst.put_u64_le(self.file_size);
        dst.put_u32_le(self.job_id);
        dst.put_u32_le(self.dir_id);
        dst.put_u32_le(self.input_time);
        dst.put_u32_le(self.split_counter);
        dst.put_u32_le(self.unique_number);
        dst.put_u32_le(name.len() as u32);
        dst.put_slice(name);

        dst.put_slice(b"FD");
        dst.put_u8(ANNOTATION_SEP);
        dst.put_u8(b'(');
        dst.put_slice(self.file_line.as_bytes());
        dst.put_slice(b")\n");
    }
}

/// Appends delete-log records to a writer (a fifo or plain file,
/// opened by the caller). One `Logger` per open handle; spec §5 never
/// requires concurrent writers inside the coordinator process.
pub struct DeleteLog<W> {
    writer: W,
    buf: BytesMut,
}

impl<W: Write> DeleteLog<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buf: BytesMut::new(),
        }
    }

    pub fn emit(&mut self, record: &DeleteLogRecord) -> io::Result<()> {
        self.buf.clear();
        record.encode(&mut self.buf);
        self.writer.write_all(&self.buf)
    }
}

/// Extracts the `input_time`, `split_job_counter`, and `unique_number`
/// tokens from a message name, per spec §4.1's "extracting `input_time`,
/// `split_job_counter`, `unique_number` tokens from `msg_name`". Returns
/// `None` if the tokens aren't valid hex (spec §7: malformed
/// message-name tokens => discard command, log).
pub fn parse_log_tokens(tokens: &crate::types::queue::MsgNameTokens) -> Option<(u32, u32, u32)> {
    let input_time = u32::from_str_radix(&tokens.date, 16).ok()?;
    let unique_number = u32::from_str_radix(&tokens.unique, 16).ok()?;
    let split_counter = u32::from_str_radix(&tokens.split_counter, 16).ok()?;
    Some((input_time, split_counter, unique_number))
}
