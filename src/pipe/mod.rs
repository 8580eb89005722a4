//! Component C: the control-pipe reader (spec.md §2, §4.1).

pub mod decoder;
pub mod events;
pub mod protocol;

pub use decoder::Decoder;
pub use events::PipeEvent;
pub use protocol::Command;

use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

/// Wraps a readable pipe handle in the framing decoder, mirroring the
/// teacher's `wire::framed` but receive-only: this pipe has no
/// synchronous response channel (spec §5: "no synchronous responses at
/// this layer").
pub fn framed_read<T: AsyncRead>(stream: T) -> FramedRead<T, Decoder> {
    FramedRead::new(stream, Decoder)
}
