//! The scoped critical-section guard. Generalizes the
//! save/raise/work/restore pattern for masking interrupts into a type
//! that restores the prior level on every exit path, including an early
//! `return` or a panic unwinding through it.

use crate::hal::{Hal, IntLevel};

#[must_use = "the critical section ends when this guard is dropped"]
pub struct CriticalSection<'a> {
    hal: &'a dyn Hal,
    prior: IntLevel,
}

impl<'a> CriticalSection<'a> {
    /// Raises the interrupt level to `level`, returning a guard that
    /// restores the prior level on drop.
    pub fn enter(hal: &'a dyn Hal, level: IntLevel) -> Self {
        let prior = hal.set_int_level(level);
        CriticalSection { hal, prior }
    }
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        self.hal.set_int_level(self.prior);
    }
}
