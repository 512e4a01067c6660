//! Compile-time configuration. The core has no environment variables and
//! no configuration files: every tunable here is a plain `const`.

/// Size of the process table. A slot's `state == Unused` means it's free.
pub const MAX_PROC: usize = 16;

/// Clock ticks per simulated second, used by `sleep` and the clock ISR's
/// wake-up deadline arithmetic.
pub const TICKS_PER_SEC: u32 = 10;

/// Ticks granted to a process per round-robin dispatch.
pub const TICKS_PER_SLICE: u32 = 4;

/// Capacity of the terminal ring buffer.
pub const TERM_BUF_SIZE: usize = 16;

/// Number of mutex slots in the whole system.
pub const NUM_MUT: usize = 16;

/// Longest mutex name, in bytes, not counting a terminator.
pub const MAX_NAME: usize = 32;

/// Per-process cap on simultaneously held/created mutexes.
pub const PER_PROC_CAP: usize = 4;

/// Number of entries in the syscall dispatch table.
pub const NSERVICIOS: usize = 12;

/// Default stack size requested from the HAL for a new process.
pub const DEFAULT_STACK_SIZE: usize = 4096;
