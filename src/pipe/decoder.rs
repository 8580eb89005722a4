//! Component C: the pipe reader's framing state machine (spec.md
//! §4.1 "Framing protocol").
//!
//! Grounded directly on the teacher's `wire::decoder::Decoder`: a
//! `tokio_util::codec::Decoder` that keeps whatever tail the previous
//! call couldn't parse and resumes from it on the next read, handing
//! `FramedRead` the job of actually calling `read()` and retaining
//! unconsumed bytes across calls (spec's "retains any un-parsed tail
//! from the previous call" falls out of that for free). Unlike the
//! teacher's decoder, there's no `ParseJob` state (no bulk payload
//! follows a command here) and an unrecognised frame does not try to
//! resynchronise mid-stream — spec §4.1 is explicit that the whole
//! buffer is discarded instead.

use bytes::Buf;
use tokio_util::codec;

use super::events::PipeEvent;
use super::protocol::parse_command;

#[derive(Debug, Default)]
pub struct Decoder;

impl codec::Decoder for Decoder {
    type Item = PipeEvent;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let tag = src[0];
        let Some(nul_idx) = src[1..].iter().position(|&b| b == 0) else {
            // Payload lacks a terminator yet; keep the tag+partial
            // payload as the tail for the next call.
            return Ok(None);
        };

        let payload_end = 1 + nul_idx;
        let payload = src[1..payload_end].to_vec();
        src.advance(payload_end + 1);

        match parse_command(tag, &payload) {
            Some(cmd) => Ok(Some(PipeEvent::Command(cmd))),
            None => {
                tracing::warn!(tag, "unrecognised command or malformed payload, discarding buffer");
                src.clear();
                Ok(Some(PipeEvent::Discarded))
            }
        }
    }
}
