//! FIFO round-robin scheduling. `pick_next` is the sole producer of "next
//! current"; it does not itself change any BCP's `state` — the caller
//! owns that transition, reading the ready list only.

use spin::Mutex;

use crate::bcp::ProcId;
use crate::consts::TICKS_PER_SLICE;
use crate::crit::CriticalSection;
use crate::hal::{Hal, IntLevel};
use crate::kernel::KernelState;

/// Returns the next process to run, assigning it a fresh quantum. Spins in
/// an idle loop — lowering interrupt level to `NIVEL_1` and halting — for
/// as long as the ready list is empty, re-checking after every interrupt
/// resumption.
pub fn pick_next(hal: &dyn Hal, state: &Mutex<KernelState>) -> ProcId {
    loop {
        {
            let mut st = state.lock();
            if let Some(head) = st.ready.head {
                st.procs[head.0].quantum_remaining = TICKS_PER_SLICE;
                return head;
            }
        }
        let _cs = CriticalSection::enter(hal, IntLevel::Nivel1);
        hal.halt();
    }
}
