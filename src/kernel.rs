//! The kernel instance: process table, ready/blocked lists, terminal
//! buffer, mutex table and the syscall services that operate on them.
//! Modeled as a single state value reached through `&self` rather than a
//! process-global — every method here is directly callable from a test
//! without booting anything.

use spin::Mutex;

use crate::bcp::{Bcp, ListTag, ProcId, ProcState};
use crate::consts::{MAX_PROC, PER_PROC_CAP};
use crate::crit::CriticalSection;
use crate::error::{CreateMutexError, CreateProcessError};
use crate::hal::{Hal, IntLevel, Regs};
use crate::list::BcpList;
use crate::mutex::{MutexKind, MutexTable};
use crate::scheduler;
use crate::term::TerminalBuffer;

pub(crate) struct KernelState {
    pub procs: [Bcp; MAX_PROC],
    pub ready: BcpList,
    pub blocked: BcpList,
    pub current: Option<ProcId>,
    pub tick_count: u64,
    pub preempt_target: Option<ProcId>,
    pub mutexes: MutexTable,
    pub term: TerminalBuffer,
    /// Set while the kernel dereferences a user-supplied pointer, so a
    /// memory fault in that narrow window is attributed to the caller
    /// rather than to the kernel itself.
    pub param_access: bool,
}

impl KernelState {
    fn new() -> Self {
        KernelState {
            procs: core::array::from_fn(Bcp::unused),
            ready: BcpList::new(),
            blocked: BcpList::new(),
            current: None,
            tick_count: 0,
            preempt_target: None,
            mutexes: MutexTable::new(),
            term: TerminalBuffer::new(),
            param_access: false,
        }
    }
}

pub struct Kernel {
    pub(crate) hal: &'static dyn Hal,
    pub(crate) state: Mutex<KernelState>,
}

impl Kernel {
    pub fn new(hal: &'static dyn Hal) -> Self {
        Kernel { hal, state: Mutex::new(KernelState::new()) }
    }

    /// Returns the calling process's own id.
    pub fn get_pid(&self) -> i64 {
        let st = self.state.lock();
        st.current.expect("get_pid: no current process").0 as i64
    }

    /// Allocates a free slot, asks the HAL to load the image and a stack —
    /// unguarded, since nothing else can reach a still-`Unused` slot —
    /// then appends the new BCP to the ready list under `NIVEL_3`.
    pub fn create_process(&self, path: &str) -> Result<ProcId, CreateProcessError> {
        let slot = {
            let st = self.state.lock();
            // A `Terminated` slot is reusable lazily; the scan below
            // treats it the same as a free one.
            (0..MAX_PROC).find(|&i| {
                matches!(st.procs[i].state, ProcState::Unused | ProcState::Terminated)
            })
        }
        .ok_or(CreateProcessError::NoFreeSlot)?;

        let mut entry_pc: u32 = 0;
        let image = self
            .hal
            .create_image(path, &mut entry_pc)
            .ok_or(CreateProcessError::ImageLoadFailed)?;
        let stack = self.hal.create_stack(crate::consts::DEFAULT_STACK_SIZE);

        let mut regs = Regs::default();
        self.hal
            .init_context(image, stack, crate::consts::DEFAULT_STACK_SIZE, entry_pc, &mut regs);

        let id = ProcId(slot);
        {
            let _cs = CriticalSection::enter(self.hal, IntLevel::Nivel3);
            let mut st = self.state.lock();
            st.procs[slot] = Bcp {
                id,
                state: ProcState::Ready,
                regs,
                stack: Some(stack),
                mem_image: Some(image),
                next: None,
                list_tag: ListTag::Off,
                block_start_tick: 0,
                block_seconds: 0,
                ticks_user: 0,
                ticks_system: 0,
                quantum_remaining: 0,
                blocked_on_read: false,
                mutex_count: 0,
            };
            st.ready.insert_tail(&mut st.procs, id, ListTag::Ready);
        }

        log::info!("creado proceso {} desde {}", slot, path);
        Ok(id)
    }

    /// Releases the image, marks the process TERMINATED, drops it from the
    /// ready head under `NIVEL_3`, picks the next process, switches to it
    /// with a null outgoing snapshot, and only then frees the outgoing
    /// stack — it must not be freed while it could still be in use, and it
    /// is live right up until the switch away from it completes. Never
    /// returns — on real hardware control never comes back to a terminated
    /// process.
    pub fn terminate_current(&self) -> ! {
        let id = self.state.lock().current.expect("terminate_current: no current process");

        let image = { self.state.lock().procs[id.0].mem_image.take() };
        if let Some(image) = image {
            self.hal.free_image(image);
        }
        self.state.lock().procs[id.0].state = ProcState::Terminated;

        let stack = {
            let _cs = CriticalSection::enter(self.hal, IntLevel::Nivel3);
            let mut st = self.state.lock();
            st.ready.remove_head(&mut st.procs);
            st.procs[id.0].stack.take()
        };

        let next = scheduler::pick_next(self.hal, &self.state);
        let in_regs = {
            let mut st = self.state.lock();
            st.procs[next.0].state = ProcState::Running;
            st.current = Some(next);
            st.procs[next.0].regs
        };

        self.hal.context_switch(None, &in_regs);
        if let Some(s) = stack {
            self.hal.free_stack(s);
        }
        self.hal.panic("terminate_current: control returned to a terminated process")
    }

    /// Blocks on a time-based deadline and performs a voluntary context
    /// switch.
    pub fn sleep(&self, seconds: u32) {
        let outgoing = {
            let _cs = CriticalSection::enter(self.hal, IntLevel::Nivel3);
            let mut st = self.state.lock();
            let id = st.current.expect("sleep: no current process");
            st.procs[id.0].block_seconds = seconds;
            st.procs[id.0].block_start_tick = st.tick_count;
            st.procs[id.0].blocked_on_read = false;
            st.procs[id.0].state = ProcState::Blocked;
            st.ready.remove_element(&mut st.procs, id);
            st.blocked.insert_tail(&mut st.procs, id, ListTag::Blocked);
            id
        };
        self.switch_from(outgoing);
    }

    /// `has_out_ptr` stands in for "pointer is non-null" — the kernel
    /// never dereferences user memory directly, that's the HAL's job, so
    /// this only needs to know whether to raise `param_access`.
    pub fn times(&self, has_out_ptr: bool) -> (u64, u64, u64) {
        let mut st = self.state.lock();
        if has_out_ptr {
            let _cs = CriticalSection::enter(self.hal, IntLevel::Nivel3);
            st.param_access = true;
        }
        let id = st.current.expect("times: no current process");
        let bcp = &st.procs[id.0];
        (st.tick_count, bcp.ticks_user, bcp.ticks_system)
    }

    /// Blocks on the terminal buffer until a character is available, then
    /// drains one under `NIVEL_2` so the terminal ISR can't interleave
    /// with the shift-down.
    pub fn read_char(&self) -> u8 {
        loop {
            let outgoing = {
                let _cs = CriticalSection::enter(self.hal, IntLevel::Nivel3);
                let mut st = self.state.lock();
                if !st.term.is_empty() {
                    None
                } else {
                    let id = st.current.expect("read_char: no current process");
                    // Re-entering this branch while already Blocked (the
                    // switch returned without the buffer having actually
                    // filled) must not re-splice `id` onto a list it's
                    // already on.
                    if st.procs[id.0].state != ProcState::Blocked {
                        st.procs[id.0].blocked_on_read = true;
                        st.procs[id.0].state = ProcState::Blocked;
                        st.ready.remove_element(&mut st.procs, id);
                        st.blocked.insert_tail(&mut st.procs, id, ListTag::Blocked);
                    }
                    Some(id)
                }
            };
            match outgoing {
                Some(id) => self.switch_from(id),
                None => break,
            }
        }

        let _cs = CriticalSection::enter(self.hal, IntLevel::Nivel3);
        {
            let mut st = self.state.lock();
            st.param_access = true;
        }
        drop(_cs);

        let _cs2 = CriticalSection::enter(self.hal, IntLevel::Nivel2);
        let mut st = self.state.lock();
        st.term.pop().expect("read_char: woke with an empty buffer")
    }

    /// Forwards the buffer to the HAL. No buffering, no blocking.
    pub fn write(&self, buf: &[u8]) {
        self.hal.kernel_write(buf);
    }

    /// Validates the name length, the per-process cap, and global
    /// uniqueness, then blocks on the global cap rather than failing,
    /// re-checking uniqueness each time it wakes.
    pub fn create_mutex(&self, name: &str, kind_raw: i64) -> Result<(), CreateMutexError> {
        if name.len() > crate::consts::MAX_NAME {
            return Err(CreateMutexError::NameTooLong);
        }
        let kind = MutexKind::from_raw(kind_raw);

        loop {
            let outgoing = {
                let _cs = CriticalSection::enter(self.hal, IntLevel::Nivel3);
                let mut st = self.state.lock();

                let id = st.current.expect("create_mutex: no current process");
                if st.procs[id.0].mutex_count as usize >= PER_PROC_CAP {
                    return Err(CreateMutexError::PerProcessCapReached);
                }
                if st.mutexes.name_exists(name) {
                    return Err(CreateMutexError::NameCollision);
                }
                if !st.mutexes.is_full() {
                    st.mutexes.create(name, kind).expect("slot was checked free");
                    st.procs[id.0].mutex_count += 1;
                    log::info!("mutex '{}' creado por proceso {}", name, id.0);
                    return Ok(());
                }

                if st.procs[id.0].state != ProcState::Blocked {
                    st.procs[id.0].state = ProcState::Blocked;
                    st.ready.remove_element(&mut st.procs, id);
                    st.blocked.insert_tail(&mut st.procs, id, ListTag::Blocked);
                }
                id
            };
            self.switch_from(outgoing);
        }
    }

    /// Stub: not yet implemented beyond returning success.
    pub fn open_mutex(&self) -> i64 {
        0
    }

    /// Stub: not yet implemented beyond returning success.
    pub fn lock(&self) -> i64 {
        0
    }

    /// Stub: not yet implemented beyond returning success.
    pub fn unlock(&self) -> i64 {
        0
    }

    /// Stub: not yet implemented beyond returning success.
    pub fn close_mutex(&self) -> i64 {
        0
    }

    /// Voluntary context-switch protocol: pick the next process, update
    /// `current` *before* asking the HAL to switch, and release the
    /// kernel-state lock before the switch itself — the switch may not
    /// return until some other process switches back into this exact call.
    pub(crate) fn switch_from(&self, outgoing: ProcId) {
        let next = scheduler::pick_next(self.hal, &self.state);

        let in_regs = {
            let mut st = self.state.lock();
            st.procs[next.0].state = ProcState::Running;
            st.current = Some(next);
            st.procs[next.0].regs
        };

        let out_ptr: *mut Regs = {
            let mut st = self.state.lock();
            &mut st.procs[outgoing.0].regs as *mut Regs
        };
        // SAFETY: `outgoing` is a valid slot in `procs`, the lock used to
        // obtain the pointer has already been released, and nothing else
        // touches this BCP's regs until the outgoing process is resumed
        // and this call returns.
        self.hal.context_switch(Some(unsafe { &mut *out_ptr }), &in_regs);
    }
}
