//! Component D: the worker controller — signals, reaps, and clears the
//! tracking slot for a transfer child (spec.md §2, §4.1 "Signal/reap
//! protocol", §4.2 phase 5).
//!
//! Grounded on the `waitpid`/`kill` usage in the reference pack's
//! process-attach tooling (the `wormhole` attach binary's client loop),
//! generalized from "attach and wait for exit" to "signal, wait, then
//! clear shared-table bookkeeping".

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use crate::types::fsa::{Fsa, JobSlot};
use crate::types::ids::PENDING;

/// Process-wide gauges that live alongside (but not inside) the FSA,
/// per spec §4.1: "decrement the global active-transfer gauge (clamped
/// at zero)".
#[derive(Debug, Default)]
pub struct GlobalCounters {
    pub active_transfers: u32,
}

impl GlobalCounters {
    pub fn dec_active_transfers(&mut self) {
        self.active_transfers = self.active_transfers.saturating_sub(1);
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum ReapOutcome {
    /// The child was signalled and successfully reaped.
    Reaped,
    /// The child had already exited (`ESRCH` on signal, or `pid <= 0`
    /// to begin with); cleanup proceeds exactly as if it had just been
    /// reaped.
    AlreadyGone,
    /// Something other than "no such process" went wrong sending the
    /// signal. Spec §7: "Other signal errors are warnings" — cleanup
    /// does *not* proceed, since we can't be sure the child is gone.
    SignalError(Errno),
    /// The signal was delivered but `waitpid` didn't return the
    /// expected child id (spec §4.1: "on waiter success" implies the
    /// converse leaves cleanup undone).
    WaitMismatch,
}

/// Sends `signal` to `pid` and blocking-waits for it, per the
/// signal/reap protocol shared by spec §4.1 and §4.2.
///
/// Preserves the original's documented quirk (spec §9 Open Questions):
/// after sending the signal, the caller should re-check `pid > 0`
/// before treating a wait mismatch as an error, since in theory the
/// child could already have been reaped by another path between the
/// kill and the wait. We surface that re-check explicitly here rather
/// than optimising it away, per the Open Question's instruction to
/// preserve-but-document it.
pub fn kill_and_reap(pid: i32, signal_to_send: Signal) -> ReapOutcome {
    if pid <= 0 {
        return ReapOutcome::AlreadyGone;
    }

    let target = Pid::from_raw(pid);

    match signal::kill(target, signal_to_send) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return ReapOutcome::AlreadyGone,
        Err(e) => return ReapOutcome::SignalError(e),
    }

    // Re-check pid > 0: a concurrent path (e.g. another reap racing on
    // the same slot) could have already cleared and reused this pid's
    // bookkeeping between the kill above and the wait below. We still
    // wait on the raw pid we were given — `waitpid` itself is the
    // authoritative race-free check — but we don't treat "nothing left
    // to wait for" as an error.
    if pid <= 0 {
        return ReapOutcome::AlreadyGone;
    }

    loop {
        match waitpid(target, None) {
            Ok(WaitStatus::Exited(got, _)) | Ok(WaitStatus::Signaled(got, _, _)) => {
                if got == target {
                    return ReapOutcome::Reaped;
                }
                return ReapOutcome::WaitMismatch;
            }
            Ok(_) => continue,
            Err(Errno::ECHILD) => return ReapOutcome::AlreadyGone,
            Err(Errno::EINTR) => continue,
            Err(_) => return ReapOutcome::WaitMismatch,
        }
    }
}

/// Applies the full signal/reap protocol to a single FSA job slot,
/// mutating the slot, the host's counters, and the global gauge, per
/// spec §4.1's "Signal/reap protocol" and §4.2 phase 5.
///
/// Returns `true` if the slot was cleared (either the child was
/// reaped, or it was already gone); `false` if a signal error means
/// cleanup must be deferred.
pub fn signal_reap_and_clear_slot(
    fsa: &mut Fsa,
    fsa_pos: usize,
    slot_idx: usize,
    signal_to_send: Signal,
    counters: &mut GlobalCounters,
) -> bool {
    let mut host = fsa.get(fsa_pos);
    let pid = host.job_status[slot_idx].pid;

    match kill_and_reap(pid, signal_to_send) {
        ReapOutcome::SignalError(e) => {
            tracing::warn!(pid, ?e, "failed to signal worker, deferring cleanup");
            false
        }
        ReapOutcome::WaitMismatch => {
            tracing::warn!(pid, "wait() did not return expected child, deferring cleanup");
            false
        }
        ReapOutcome::Reaped | ReapOutcome::AlreadyGone => {
            clear_slot(&mut host.job_status[slot_idx]);
            counters.dec_active_transfers();
            host.adjust_active_transfers(-1);
            fsa.set(fsa_pos, &host);
            true
        }
    }
}

fn clear_slot(slot: &mut JobSlot) {
    slot.clear();
    debug_assert_eq!(slot.pid, PENDING);
}
