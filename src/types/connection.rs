//! Connection slot: owned by the worker controller (spec.md §3).
//!
//! Unlike the persistent tables, connection slots are process-local
//! bookkeeping for the coordinator's own view of which worker owns
//! which queue entry; they are not memory-mapped, so this is a plain
//! in-memory struct, not a `Record`.

use crate::types::ids::{FraPos, FsaPos};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionSlot {
    pub hostname: String,
    pub host_id: u32,
    pub job_no: u32,
    pub fra_pos: Option<FraPos>,
    pub fsa_pos: Option<FsaPos>,
    pub msg_name: String,
    pub pid: i32,
}

/// Process-local table of active connection slots, indexed by the
/// `connect_pos` integer stored in each queue entry.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    slots: Vec<Option<ConnectionSlot>>,
}

impl ConnectionTable {
    pub fn get(&self, pos: i32) -> Option<&ConnectionSlot> {
        if pos < 0 {
            return None;
        }
        self.slots.get(pos as usize).and_then(|s| s.as_ref())
    }

    pub fn insert(&mut self, slot: ConnectionSlot) -> i32 {
        if let Some((i, free)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.is_none())
        {
            *free = Some(slot);
            i as i32
        } else {
            self.slots.push(Some(slot));
            (self.slots.len() - 1) as i32
        }
    }

    /// Clears the connection slot for `pos`, per spec §4.1: "clears the
    /// connection slot and decrements counters."
    pub fn clear(&mut self, pos: i32) {
        if pos < 0 {
            return;
        }
        if let Some(slot) = self.slots.get_mut(pos as usize) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reuses_freed_slots() {
        let mut table = ConnectionTable::default();
        let a = table.insert(ConnectionSlot {
            hostname: "hostA".into(),
            ..Default::default()
        });
        let b = table.insert(ConnectionSlot {
            hostname: "hostB".into(),
            ..Default::default()
        });
        assert_ne!(a, b);

        table.clear(a);
        assert!(table.get(a).is_none());

        let c = table.insert(ConnectionSlot {
            hostname: "hostC".into(),
            ..Default::default()
        });
        assert_eq!(c, a, "freed slot should be reused");
    }
}
