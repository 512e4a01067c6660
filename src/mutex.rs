//! The named-mutex table. `create_mutex` is fully functional;
//! `open`/`lock`/`unlock`/`close` are documented stubs that return 0 —
//! entry points for future work, not an oversight (see DESIGN.md).

use heapless::String;

use crate::bcp::ProcId;
use crate::consts::{MAX_NAME, NUM_MUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexKind {
    NonRecursive,
    Recursive,
}

impl MutexKind {
    pub fn from_raw(v: i64) -> MutexKind {
        if v == 0 {
            MutexKind::NonRecursive
        } else {
            MutexKind::Recursive
        }
    }
}

#[derive(Debug, Clone)]
struct MutexSlot {
    name: String<MAX_NAME>,
    kind: MutexKind,
    owner: Option<ProcId>,
}

pub struct MutexTable {
    slots: [Option<MutexSlot>; NUM_MUT],
    /// How many of `slots` are occupied.
    in_use: usize,
}

impl MutexTable {
    pub fn new() -> Self {
        MutexTable {
            slots: core::array::from_fn(|_| None),
            in_use: 0,
        }
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn is_full(&self) -> bool {
        self.in_use >= NUM_MUT
    }

    pub fn name_exists(&self, name: &str) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|slot| slot.name.as_str() == name)
    }

    /// Publishes a new mutex into the first free slot. Caller must already
    /// have checked `!is_full()` and `!name_exists(name)`.
    pub fn create(&mut self, name: &str, kind: MutexKind) -> Result<(), ()> {
        let name: String<MAX_NAME> = String::try_from(name).map_err(|_| ())?;
        let slot = self.slots.iter_mut().find(|s| s.is_none()).ok_or(())?;
        *slot = Some(MutexSlot { name, kind, owner: None });
        self.in_use += 1;
        Ok(())
    }
}

impl Default for MutexTable {
    fn default() -> Self {
        Self::new()
    }
}
