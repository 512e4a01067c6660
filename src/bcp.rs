//! The process-control block and the process table.

use crate::hal::{ImageHandle, Regs, StackHandle};

/// Stable identity of a process: its slot index in the BCP table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Unused,
    Ready,
    Running,
    Blocked,
    Terminated,
}

/// Which list (if any) a BCP currently belongs to. Kept alongside `next` so
/// that "at most one list" is a field you can assert on, not an invariant
/// you have to trust the caller maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTag {
    Ready,
    Blocked,
    Off,
}

#[derive(Debug, Clone, Copy)]
pub struct Bcp {
    pub id: ProcId,
    pub state: ProcState,
    pub regs: Regs,
    pub stack: Option<StackHandle>,
    pub mem_image: Option<ImageHandle>,
    pub next: Option<ProcId>,
    pub list_tag: ListTag,
    pub block_start_tick: u64,
    pub block_seconds: u32,
    pub ticks_user: u64,
    pub ticks_system: u64,
    pub quantum_remaining: u32,
    pub blocked_on_read: bool,
    pub mutex_count: u32,
}

impl Bcp {
    /// A free slot. `state == Unused` means no other field is meaningful.
    pub const fn unused(id: usize) -> Self {
        Bcp {
            id: ProcId(id),
            state: ProcState::Unused,
            regs: Regs([0; 16]),
            stack: None,
            mem_image: None,
            next: None,
            list_tag: ListTag::Off,
            block_start_tick: 0,
            block_seconds: 0,
            ticks_user: 0,
            ticks_system: 0,
            quantum_remaining: 0,
            blocked_on_read: false,
            mutex_count: 0,
        }
    }
}
