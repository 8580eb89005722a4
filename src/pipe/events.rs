//! Items produced by `pipe::decoder::Decoder`.
//!
//! Grounded on the teacher's `wire::events::BeanstalkClientEvent`: a
//! thin enum separating "a full command parsed" from "the decoder had
//! to throw data away".

use super::protocol::Command;

#[derive(Clone, Debug, PartialEq)]
pub enum PipeEvent {
    /// A complete, well-formed command.
    Command(Command),
    /// The decoder encountered an unknown tag or a malformed payload
    /// and discarded the entire buffer (spec §4.1: "commands do not
    /// attempt to re-synchronise mid-stream").
    Discarded,
}
