//! The hardware abstraction layer contract. Everything below this
//! trait line — CPU register save/restore, the interrupt controller, the
//! clock, the terminal port, the memory-image loader — is an external
//! collaborator; the kernel only ever talks to it through this interface.

/// Ascending interrupt-masking levels. `Nivel3` masks everything,
/// including the clock; `Nivel1` masks almost nothing and is the level the
/// idle loop runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntLevel {
    Nivel1,
    Nivel2,
    Nivel3,
}

/// The six vectors the kernel installs handlers for at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vector {
    ArithExc,
    MemExc,
    Clock,
    Terminal,
    Syscall,
    Soft,
}

/// Opaque owning handle to a loaded memory image. The kernel never
/// interprets its bits, only threads it back through the HAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHandle(pub usize);

/// Opaque owning handle to a process stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackHandle(pub usize);

/// Opaque register snapshot consumed and produced by `context_switch`. The
/// kernel copies it around but never reads or writes individual fields.
#[derive(Debug, Clone, Copy)]
pub struct Regs(pub [u64; 16]);

impl Default for Regs {
    fn default() -> Self {
        Regs([0; 16])
    }
}

/// The HAL contract consumed by the process-control core. An implementor
/// provides the real emulated CPU/interrupt controller/clock in a deployed
/// kernel, or a host-side simulation for tests.
pub trait Hal: Sync {
    /// Sets the interrupt-masking level, returning the prior one.
    fn set_int_level(&self, level: IntLevel) -> IntLevel;

    /// Halts the CPU until the next interrupt.
    fn halt(&self);

    /// Installs a handler for an interrupt vector. Plain `fn()`, no closure
    /// captures — the handler reaches kernel state through whatever static
    /// wiring `boot()` set up.
    fn install_handler(&self, vector: Vector, handler: fn());

    /// Programs the clock to fire `tick_hz` times per simulated second.
    fn start_clock(&self, tick_hz: u32);

    /// Arms the keyboard/terminal input source.
    fn start_keyboard(&self);

    /// Saves the live register state into `out_regs` (if `Some`), then
    /// restores `in_regs`. The terminal form of a context switch passes
    /// `None` for the outgoing snapshot, since there is no BCP left to save
    /// into.
    fn context_switch(&self, out_regs: Option<&mut Regs>, in_regs: &Regs);

    /// Loads an executable image from `path`, writing its entry point into
    /// `entry_pc`. Returns `None` on failure.
    fn create_image(&self, path: &str, entry_pc: &mut u32) -> Option<ImageHandle>;

    /// Releases a memory image obtained from `create_image`.
    fn free_image(&self, handle: ImageHandle);

    /// Allocates a process stack of `size` bytes.
    fn create_stack(&self, size: usize) -> StackHandle;

    /// Releases a stack obtained from `create_stack`.
    fn free_stack(&self, handle: StackHandle);

    /// Builds the initial register snapshot for a process about to run
    /// `entry_pc` on `stack`, for the first time.
    fn init_context(
        &self,
        image: ImageHandle,
        stack: StackHandle,
        stack_size: usize,
        entry_pc: u32,
        regs: &mut Regs,
    );

    /// Reads syscall argument register `i` (register 0 carries the service
    /// number and, on return, the result).
    fn read_register(&self, i: usize) -> i64;

    /// Writes syscall argument/result register `i`.
    fn write_register(&self, i: usize, v: i64);

    /// Reads one character from the terminal port.
    fn read_port_terminal(&self) -> u8;

    /// Whether the trap that is currently being serviced came from user
    /// mode (as opposed to a fault inside the kernel itself).
    fn came_from_user_mode(&self) -> bool;

    /// Unrecoverable kernel fault. Never returns.
    fn panic(&self, msg: &str) -> !;

    /// Raw kernel-side output, with no buffering and no terminal echo.
    fn kernel_write(&self, buf: &[u8]);
}
