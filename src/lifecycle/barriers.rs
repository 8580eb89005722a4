//! Start-up wait barriers (spec.md §4.2 preamble, §5 "Cancellation /
//! timeouts"): bounded polling loops that block the GC until some
//! externally-maintained condition becomes true.
//!
//! Grounded on `shared::region::Region::attach`'s own retry loop (poll,
//! sleep a fixed interval, give up after a bounded attempt count) —
//! generalized here from "file big enough yet" to an arbitrary
//! predicate so the same shape covers both the `WRITING_JID_STRUCT`
//! barrier and the loader barrier.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{CoreError, CoreResult};
use crate::shared::layout::{Header, WRITING_JID_STRUCT};

/// Poll interval shared by every wait barrier (spec §5: "configurable
/// 100 ms sleep in wait barriers").
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Hard cap on the job-id-catalogue writer barrier (spec §4.2 preamble:
/// "at most 11 s").
pub const JID_WRITER_TIMEOUT: Duration = Duration::from_secs(11);

/// Hard cap on the external loader barrier (spec §5: "180 s for the
/// loader").
pub const LOADER_TIMEOUT: Duration = Duration::from_secs(180);

/// Blocks until `WRITING_JID_STRUCT` clears in the job-id catalogue's
/// header, or `JID_WRITER_TIMEOUT` elapses.
pub fn wait_for_jid_writer(jid_bytes: &[u8]) -> CoreResult<()> {
    wait_until(JID_WRITER_TIMEOUT, || {
        let header = Header::read(jid_bytes).expect("catalogue header always present");
        header.flags[0] & WRITING_JID_STRUCT == 0
    })
}

/// Blocks until `ready` returns `true` or `LOADER_TIMEOUT` elapses,
/// polling at `POLL_INTERVAL`. Used to wait on the external loader
/// collaborator before the catalogue reconciliation phase begins.
pub fn wait_for_loader(ready: impl FnMut() -> bool) -> CoreResult<()> {
    wait_until(LOADER_TIMEOUT, ready)
}

fn wait_until(timeout: Duration, mut ready: impl FnMut() -> bool) -> CoreResult<()> {
    let start = Instant::now();
    loop {
        if ready() {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(CoreError::BarrierTimeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_for_jid_writer_returns_immediately_when_bit_already_clear() {
        let mut buf = [0u8; Header::SIZE];
        let header = Header::new(0, crate::shared::layout::CURRENT_VERSION);
        header.write(&mut buf);
        assert!(wait_for_jid_writer(&buf).is_ok());
    }

    #[test]
    fn wait_for_jid_writer_times_out_while_bit_stays_set() {
        let mut buf = [0u8; Header::SIZE];
        let mut header = Header::new(0, crate::shared::layout::CURRENT_VERSION);
        header.flags[0] = WRITING_JID_STRUCT;
        header.write(&mut buf);

        let result = wait_until(Duration::from_millis(150), || {
            let header = Header::read(&buf).unwrap();
            header.flags[0] & WRITING_JID_STRUCT == 0
        });
        assert!(matches!(result, Err(CoreError::BarrierTimeout(_))));
    }

    #[test]
    fn wait_for_loader_polls_until_ready_flips_true() {
        let mut polls = 0;
        let result = wait_for_loader(|| {
            polls += 1;
            polls >= 2
        });
        assert!(result.is_ok());
    }

    #[test]
    fn wait_until_times_out_when_condition_never_true() {
        let result = wait_until(Duration::from_millis(150), || false);
        assert!(matches!(result, Err(CoreError::BarrierTimeout(_))));
    }
}
