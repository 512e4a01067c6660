//! End-to-end scenarios and universal invariants, driven against
//! [`crate::testutil::SimHal`]. Every scenario here constructs its own
//! [`Kernel`] — no shared process-global — so tests can run in parallel
//! without a test-ordering dependency.
//!
//! A couple of these call a service the same way a running process would,
//! but from the test's own thread rather than a second simulated CPU.
//! `SimHal::context_switch` is a no-op (it does not actually transfer
//! control), so a *voluntary* switch (`sleep`, `read_char` on an empty
//! buffer, `create_mutex` on a full table) simply returns to its caller
//! immediately — which is exactly what "some other process's time slice,
//! then control comes back here" looks like when there is no second CPU.
//! For the one case that needs genuine concurrency (a blocked reader
//! woken by an interrupt arriving on a different stack), the blocked side
//! runs on a real OS thread so the terminal ISR can fire while it waits.
//!
//! `terminate_current` is the one call that never returns even in this
//! harness: past the point of no return it calls `Hal::panic` ("any
//! return from this switch is a panic"). Scenarios that reach it run
//! inside `catch_unwind` and assert on kernel state recorded before the
//! panic.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::bcp::{ProcId, ProcState};
use crate::consts::{MAX_PROC, PER_PROC_CAP, TICKS_PER_SLICE};
use crate::kernel::Kernel;
use crate::scheduler;
use crate::testutil::SimHal;

fn make_kernel() -> (&'static Kernel, &'static SimHal) {
    let hal: &'static SimHal = Box::leak(Box::new(SimHal::new()));
    let kernel: &'static Kernel = Box::leak(Box::new(Kernel::new(hal)));
    (kernel, hal)
}

/// Marks `id` as the running process without disturbing list membership.
/// Scenarios that terminate or preempt `id` still require it to already be
/// the ready-list head (the same invariant the real scheduler maintains by
/// construction); scenarios that only read `current` (`sleep`, `times`,
/// `create_mutex`) don't.
fn set_current(kernel: &Kernel, id: ProcId) {
    let mut st = kernel.state.lock();
    st.current = Some(id);
    st.procs[id.0].state = ProcState::Running;
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition never became true");
        std::thread::yield_now();
    }
}

/// Quantum preemption. Two CPU-bound processes, no idle filler needed
/// since the ready list is never empty. With
/// `TICKS_PER_SLICE = 4`, 12 clock ticks must dispatch each process at
/// least once, and — since only a whole quantum can separate them — their
/// accumulated tick counts differ by at most one slice.
#[test]
fn quantum_preemption_round_robins_fairly() {
    let (kernel, hal) = make_kernel();
    hal.set_user_mode(true);

    let a = kernel.create_process("a").unwrap();
    let b = kernel.create_process("b").unwrap();

    let first = scheduler::pick_next(kernel.hal, &kernel.state);
    assert_eq!(first, a);
    set_current(kernel, first);

    for _ in 0..12 {
        kernel.clock_isr();
    }

    let st = kernel.state.lock();
    let ticks = |id: ProcId| st.procs[id.0].ticks_user;
    assert!(ticks(a) > 0, "A never ran");
    assert!(ticks(b) > 0, "B never ran");
    let diff = (ticks(a) as i64 - ticks(b) as i64).abs();
    assert!(diff <= TICKS_PER_SLICE as i64, "ran counts diverged by more than one quantum: {diff}");
}

/// Sleep wake order. A sleeps 2s from tick 10
/// (deadline 30 at `TICKS_PER_SEC = 10`); B sleeps 1s from tick 12
/// (deadline 22). B must wake strictly before A.
#[test]
fn sleep_wakes_in_deadline_order() {
    let (kernel, _hal) = make_kernel();

    let a = kernel.create_process("a").unwrap();
    let idle = kernel.create_process("idle").unwrap();
    let b = kernel.create_process("b").unwrap();
    set_current(kernel, a);

    kernel.state.lock().tick_count = 10;
    kernel.sleep(2);
    assert_eq!(kernel.state.lock().current, Some(idle));

    kernel.state.lock().tick_count = 12;
    set_current(kernel, b);
    kernel.sleep(1);
    assert_eq!(kernel.state.lock().current, Some(idle));

    {
        let st = kernel.state.lock();
        assert_eq!(st.procs[a.0].state, ProcState::Blocked);
        assert_eq!(st.procs[b.0].state, ProcState::Blocked);
    }

    for _ in 0..10 {
        kernel.clock_isr();
    }
    assert_eq!(kernel.state.lock().tick_count, 22);
    {
        let st = kernel.state.lock();
        assert_eq!(st.procs[b.0].state, ProcState::Ready, "B should have woken at tick 22");
        assert_eq!(st.procs[a.0].state, ProcState::Blocked, "A must not wake before tick 30");
    }

    for _ in 0..8 {
        kernel.clock_isr();
    }
    assert_eq!(kernel.state.lock().tick_count, 30);
    assert_eq!(kernel.state.lock().procs[a.0].state, ProcState::Ready, "A should have woken at tick 30");
}

/// Blocking read. A process calling `read_char` on
/// an empty buffer blocks; the terminal ISR delivering a character wakes
/// it, and the syscall returns that exact character.
#[test]
fn read_char_blocks_and_wakes_on_terminal_interrupt() {
    let (kernel, hal) = make_kernel();

    let a = kernel.create_process("a").unwrap();
    let idle = kernel.create_process("idle").unwrap();
    set_current(kernel, a);
    let _ = idle;

    let reader = std::thread::spawn(move || kernel.read_char());

    wait_until(|| {
        let st = kernel.state.lock();
        st.procs[a.0].state == ProcState::Blocked && st.procs[a.0].blocked_on_read
    });

    hal.push_terminal_char(b'x');
    kernel.terminal_isr();

    let c = reader.join().expect("reader thread panicked");
    assert_eq!(c, b'x');
    assert_eq!(kernel.state.lock().procs[a.0].state, ProcState::Ready);
    assert!(!kernel.state.lock().procs[a.0].blocked_on_read);
}

/// `read_char` drains characters in the order the terminal ISR delivered
/// them (FIFO), via the non-blocking path (buffer already non-empty).
#[test]
fn read_char_drains_in_fifo_order() {
    let (kernel, hal) = make_kernel();

    let a = kernel.create_process("a").unwrap();
    set_current(kernel, a);

    hal.push_terminal_char(b'x');
    kernel.terminal_isr();
    hal.push_terminal_char(b'y');
    kernel.terminal_isr();

    assert_eq!(kernel.read_char(), b'x');
    assert_eq!(kernel.read_char(), b'y');
}

/// An arithmetic fault from user mode terminates the offender and its
/// slot becomes reusable on the next `create_process`, and the scheduler
/// carries on with whatever else is ready. Past the point where the
/// outgoing stack is freed, `terminate_current` calls `Hal::panic` if
/// control ever returns to it — under `SimHal`, which cannot actually
/// not-return, it always does, so the assertions that matter are made on
/// state captured before the catch.
#[test]
fn arithmetic_fault_terminates_offender_and_frees_its_slot() {
    let (kernel, hal) = make_kernel();

    let a = kernel.create_process("a").unwrap();
    let idle = kernel.create_process("idle").unwrap();
    set_current(kernel, a);
    hal.set_user_mode(true);

    let result = panic::catch_unwind(AssertUnwindSafe(|| kernel.arith_exc()));
    assert!(result.is_err(), "terminate_current must not return to its caller");

    {
        let st = kernel.state.lock();
        assert_eq!(st.procs[a.0].state, ProcState::Terminated);
        assert_eq!(st.current, Some(idle));
    }

    let reused = kernel.create_process("c").expect("a terminated slot must be reusable");
    assert_eq!(reused, a, "the next create_process should reuse the freed slot");
}

/// A memory fault while `param_access` is set is demoted to a user-mode
/// fault even though the access happened in kernel code — the narrow
/// window `times`/`read_char` open while touching a caller-supplied
/// pointer.
#[test]
fn memory_fault_during_param_access_is_demoted_to_user_fault() {
    let (kernel, hal) = make_kernel();

    let a = kernel.create_process("a").unwrap();
    let idle = kernel.create_process("idle").unwrap();
    set_current(kernel, a);
    hal.set_user_mode(false);
    kernel.times(true);

    let result = panic::catch_unwind(AssertUnwindSafe(|| kernel.mem_exc()));
    assert!(result.is_err());
    let st = kernel.state.lock();
    assert_eq!(st.procs[a.0].state, ProcState::Terminated);
    let _ = idle;
}

/// A memory fault with kernel-mode provenance and no open `param_access`
/// window is an unrecoverable kernel bug: `Hal::panic` directly, never
/// `terminate_current`.
#[test]
fn memory_fault_in_kernel_mode_without_param_access_panics() {
    let (kernel, hal) = make_kernel();
    let a = kernel.create_process("a").unwrap();
    set_current(kernel, a);
    hal.set_user_mode(false);

    let result = panic::catch_unwind(AssertUnwindSafe(|| kernel.mem_exc()));
    assert!(result.is_err());
    // Unlike the demoted case, the process was never marked Terminated —
    // the panic fired before `terminate_current` was ever called.
    assert_eq!(kernel.state.lock().procs[a.0].state, ProcState::Running);
}

/// Mutex name collision. A second `create_mutex`
/// with the same name as an existing one returns the `-3` sentinel.
#[test]
fn mutex_create_rejects_name_collision() {
    let (kernel, _hal) = make_kernel();
    let p = kernel.create_process("p").unwrap();
    let q = kernel.create_process("q").unwrap();

    set_current(kernel, p);
    kernel.create_mutex("m", 0).expect("first create should succeed");

    set_current(kernel, q);
    let err = kernel.create_mutex("m", 0).expect_err("second create must collide");
    assert_eq!(err.syscall_result(), -3);
}

/// `create_mutex` rejects a caller that already holds `PER_PROC_CAP`
/// mutexes with the `-2` sentinel, distinct from the `-3` name-collision
/// and `-1` name-too-long cases.
#[test]
fn mutex_create_rejects_per_process_cap() {
    let (kernel, _hal) = make_kernel();
    let p = kernel.create_process("p").unwrap();
    set_current(kernel, p);

    for i in 0..PER_PROC_CAP {
        kernel.create_mutex(&format!("m{i}"), 0).expect("under the cap should succeed");
    }
    let err = kernel.create_mutex("one-too-many", 0).expect_err("cap must be enforced");
    assert_eq!(err.syscall_result(), -2);
    assert_eq!(kernel.state.lock().procs[p.0].mutex_count as usize, PER_PROC_CAP);
}

/// `create_mutex` rejects a name longer than `MAX_NAME` with the `-1`
/// sentinel, without touching the mutex table at all.
#[test]
fn mutex_create_rejects_name_too_long() {
    let (kernel, _hal) = make_kernel();
    let p = kernel.create_process("p").unwrap();
    set_current(kernel, p);

    let long_name = "x".repeat(crate::consts::MAX_NAME + 1);
    let err = kernel.create_mutex(&long_name, 0).expect_err("overlong name must be rejected");
    assert_eq!(err.syscall_result(), -1);
    assert_eq!(kernel.state.lock().mutexes.in_use(), 0);
}

/// An out-of-range syscall number returns -1 in
/// register 0 and has no other effect.
#[test]
fn syscall_dispatch_rejects_out_of_range_service_number() {
    let (kernel, hal) = make_kernel();
    hal.set_register(0, 999);
    crate::syscalls::dispatch(kernel);
    assert_eq!(hal.register(0), -1);

    hal.set_register(0, -1);
    crate::syscalls::dispatch(kernel);
    assert_eq!(hal.register(0), -1);
}

/// `get_pid` is idempotent for the same process.
#[test]
fn get_pid_is_stable_across_calls() {
    let (kernel, _hal) = make_kernel();
    let a = kernel.create_process("a").unwrap();
    set_current(kernel, a);
    assert_eq!(kernel.get_pid(), kernel.get_pid());
    assert_eq!(kernel.get_pid(), a.0 as i64);
}

/// `ticks_user + ticks_system` summed over every process equals
/// `tick_count` minus the ticks taken while no process was current (idle
/// ticks, before any process has been dispatched in this test).
#[test]
fn tick_accounting_excludes_idle_ticks() {
    let (kernel, hal) = make_kernel();
    hal.set_user_mode(true);

    // Three idle ticks with no current process at all.
    for _ in 0..3 {
        kernel.clock_isr();
    }
    assert_eq!(kernel.state.lock().current, None);

    let a = kernel.create_process("a").unwrap();
    set_current(kernel, a);
    for _ in 0..5 {
        kernel.clock_isr();
    }

    let st = kernel.state.lock();
    let accounted: u64 = st.procs.iter().map(|p| p.ticks_user + p.ticks_system).sum();
    assert_eq!(st.tick_count, 8);
    assert_eq!(accounted, 5);
    assert_eq!(st.tick_count - accounted, 3, "idle ticks must not be attributed to any process");
}

/// `create_process` fails with `NoFreeSlot` once every table slot is
/// occupied by a live (non-terminated) process.
#[test]
fn create_process_fails_once_table_is_full() {
    let (kernel, _hal) = make_kernel();
    for i in 0..MAX_PROC {
        kernel.create_process(&format!("p{i}")).unwrap();
    }
    let err = kernel.create_process("overflow").unwrap_err();
    assert_eq!(err.syscall_result(), -1);
}
