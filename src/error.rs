//! Internal error taxonomy. These carry no information the
//! syscall ABI doesn't already expose as a negative return code; they exist
//! only so the service implementations read naturally. Conversion to the
//! wire-level sentinel happens once, at the syscall-dispatch boundary.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateProcessError {
    /// No UNUSED slot in the process table.
    NoFreeSlot,
    /// The HAL's image loader rejected the path.
    ImageLoadFailed,
}

impl CreateProcessError {
    pub const fn syscall_result(self) -> i64 {
        -1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMutexError {
    /// Name longer than `MAX_NAME`.
    NameTooLong,
    /// Caller already holds `PER_PROC_CAP` mutexes.
    PerProcessCapReached,
    /// A mutex with this name already exists.
    NameCollision,
}

impl CreateMutexError {
    pub const fn syscall_result(self) -> i64 {
        match self {
            CreateMutexError::NameTooLong => -1,
            CreateMutexError::PerProcessCapReached => -2,
            CreateMutexError::NameCollision => -3,
        }
    }
}
