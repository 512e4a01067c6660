//! Interrupt handlers and the boot sequence. Handlers are implemented as
//! ordinary `Kernel` methods so tests can call them directly; the
//! free-function trampolines and the single `spin::Once<&'static Kernel>`
//! below exist only so `Hal::install_handler` (which takes a bare `fn()`,
//! no closures) has something to point at when booting on real hardware.
//! Nothing else in the crate touches that global.

use heapless::Vec as HVec;
use spin::Once;

use crate::bcp::{ListTag, ProcId, ProcState};
use crate::consts::{MAX_PROC, TICKS_PER_SEC};
use crate::crit::CriticalSection;
use crate::hal::{IntLevel, Vector};
use crate::kernel::Kernel;

static KERNEL: Once<&'static Kernel> = Once::new();

fn trampoline_arith() {
    if let Some(k) = KERNEL.get() {
        k.arith_exc();
    }
}

fn trampoline_mem() {
    if let Some(k) = KERNEL.get() {
        k.mem_exc();
    }
}

fn trampoline_clock() {
    if let Some(k) = KERNEL.get() {
        k.clock_isr();
    }
}

fn trampoline_terminal() {
    if let Some(k) = KERNEL.get() {
        k.terminal_isr();
    }
}

fn trampoline_syscall() {
    if let Some(k) = KERNEL.get() {
        k.syscall_trap();
    }
}

fn trampoline_soft() {
    if let Some(k) = KERNEL.get() {
        k.soft_isr();
    }
}

impl Kernel {
    /// Installs the six handlers, starts the clock and keyboard, creates
    /// the `"init"` process, and performs the first context switch. Any
    /// return from that switch is a kernel panic.
    pub fn boot(&'static self) -> ! {
        KERNEL.call_once(|| self);
        crate::logger::init(self.hal);

        self.hal.install_handler(Vector::ArithExc, trampoline_arith);
        self.hal.install_handler(Vector::MemExc, trampoline_mem);
        self.hal.install_handler(Vector::Clock, trampoline_clock);
        self.hal.install_handler(Vector::Terminal, trampoline_terminal);
        self.hal.install_handler(Vector::Syscall, trampoline_syscall);
        self.hal.install_handler(Vector::Soft, trampoline_soft);

        self.hal.start_clock(TICKS_PER_SEC);
        self.hal.start_keyboard();

        if self.create_process("init").is_err() {
            self.hal.panic("boot: no encontrado el proceso inicial");
        }

        let next = crate::scheduler::pick_next(self.hal, &self.state);
        let in_regs = {
            let mut st = self.state.lock();
            st.procs[next.0].state = ProcState::Running;
            st.current = Some(next);
            st.procs[next.0].regs
        };

        self.hal.context_switch(None, &in_regs);
        self.hal.panic("boot: S.O. reactivado inesperadamente")
    }

    /// Runs at the highest priority. Accounts the tick to `current`,
    /// requests preemption on quantum exhaustion, advances `tick_count`,
    /// and wakes every blocked process whose sleep deadline has elapsed —
    /// the full-list scan, rather than a head-only check, is what lets
    /// more than one sleeper ever wake (see DESIGN.md).
    pub fn clock_isr(&self) {
        let mut preempt = false;
        {
            let mut st = self.state.lock();
            if let Some(current) = st.current {
                if self.hal.came_from_user_mode() {
                    st.procs[current.0].ticks_user += 1;
                } else {
                    st.procs[current.0].ticks_system += 1;
                }

                if st.procs[current.0].quantum_remaining <= 1 {
                    st.preempt_target = Some(current);
                    preempt = true;
                } else {
                    st.procs[current.0].quantum_remaining -= 1;
                }
            }
            st.tick_count += 1;
        }

        // Raising the software interrupt: on real hardware this posts a
        // request the controller delivers back into `soft_isr` shortly
        // after; here there is nothing else to run first, so it is called
        // directly, with the state lock already released.
        if preempt {
            self.soft_isr();
        }

        let due: HVec<ProcId, MAX_PROC> = {
            let st = self.state.lock();
            let mut due = HVec::new();
            let mut cursor = st.blocked.head;
            while let Some(id) = cursor {
                let bcp = &st.procs[id.0];
                cursor = bcp.next;
                if !bcp.blocked_on_read {
                    let deadline =
                        bcp.block_start_tick + bcp.block_seconds as u64 * TICKS_PER_SEC as u64;
                    if st.tick_count >= deadline {
                        let _ = due.push(id);
                    }
                }
            }
            due
        };

        if !due.is_empty() {
            let _cs = CriticalSection::enter(self.hal, IntLevel::Nivel3);
            let mut st = self.state.lock();
            for id in due {
                st.procs[id.0].state = ProcState::Ready;
                st.blocked.remove_element(&mut st.procs, id);
                st.ready.insert_tail(&mut st.procs, id, ListTag::Ready);
            }
        }
    }

    /// Reads one character, appends it to the ring buffer unless full,
    /// then scans the *entire* blocked list for the first reader, so a
    /// reader is never skipped regardless of its position in the list
    /// (see DESIGN.md).
    pub fn terminal_isr(&self) {
        let c = self.hal.read_port_terminal();
        let _cs = CriticalSection::enter(self.hal, IntLevel::Nivel3);
        let mut st = self.state.lock();

        if !st.term.push(c) {
            return;
        }

        let mut cursor = st.blocked.head;
        while let Some(id) = cursor {
            let next = st.procs[id.0].next;
            if st.procs[id.0].blocked_on_read {
                st.procs[id.0].blocked_on_read = false;
                st.procs[id.0].state = ProcState::Ready;
                st.blocked.remove_element(&mut st.procs, id);
                st.ready.insert_tail(&mut st.procs, id, ListTag::Ready);
                break;
            }
            cursor = next;
        }
    }

    /// Preemption. Only acts if `preempt_target` still names the running
    /// process — the guard that prevents a stale preempt from
    /// double-rotating the ready queue after a voluntary switch already
    /// rotated it.
    pub fn soft_isr(&self) {
        let outgoing = {
            let _cs = CriticalSection::enter(self.hal, IntLevel::Nivel3);
            let mut st = self.state.lock();
            let current = st.current;
            if current.is_some() && st.preempt_target == current {
                st.preempt_target = None;
                let id = current.unwrap();
                st.procs[id.0].state = ProcState::Ready;
                st.ready.remove_element(&mut st.procs, id);
                st.ready.insert_tail(&mut st.procs, id, ListTag::Ready);
                Some(id)
            } else {
                None
            }
        };

        if let Some(id) = outgoing {
            self.switch_from(id);
        }
    }

    /// Terminates the offending process if it came from user mode; an
    /// arithmetic fault inside the kernel is unrecoverable.
    pub fn arith_exc(&self) {
        if !self.hal.came_from_user_mode() {
            self.hal.panic("excepcion aritmetica cuando estaba dentro del kernel");
        }
        let id = self.state.lock().current;
        log::warn!("EXCEPCION ARITMETICA EN PROC {:?}", id.map(|p| p.0));
        self.terminate_current();
    }

    /// Demoted to a user-mode fault when `param_access` is set, even if
    /// the fault happened while the kernel itself was dereferencing the
    /// pointer — that's precisely the window `param_access` exists to
    /// describe.
    pub fn mem_exc(&self) {
        let param_access = self.state.lock().param_access;
        if !param_access && !self.hal.came_from_user_mode() {
            self.hal.panic("excepcion de memoria cuando estaba dentro del kernel");
        }
        let id = self.state.lock().current;
        log::warn!("EXCEPCION DE MEMORIA EN PROC {:?}", id.map(|p| p.0));
        self.terminate_current();
    }

    /// Reads the service number from register 0; out-of-range numbers
    /// return -1 with no other effect.
    pub fn syscall_trap(&self) {
        crate::syscalls::dispatch(self);
    }
}
