//! A hosted simulation of the HAL, used only by the test suite. Drives
//! every scenario in the test suite without a real timer, PIC, or
//! keyboard.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::vec::Vec;

use spin::Mutex;

use crate::hal::{Hal, ImageHandle, IntLevel, Regs, StackHandle, Vector};

fn vector_index(v: Vector) -> usize {
    match v {
        Vector::ArithExc => 0,
        Vector::MemExc => 1,
        Vector::Clock => 2,
        Vector::Terminal => 3,
        Vector::Syscall => 4,
        Vector::Soft => 5,
    }
}

pub struct SimHal {
    level: Mutex<IntLevel>,
    regs: Mutex<[i64; 8]>,
    user_mode: Mutex<bool>,
    terminal_queue: Mutex<VecDeque<u8>>,
    handlers: Mutex<[Option<fn()>; 6]>,
    next_image: AtomicUsize,
    next_stack: AtomicUsize,
    pub output: Mutex<Vec<u8>>,
    pub halt_count: AtomicUsize,
    pub switch_count: AtomicUsize,
}

impl SimHal {
    pub fn new() -> Self {
        SimHal {
            level: Mutex::new(IntLevel::Nivel1),
            regs: Mutex::new([0; 8]),
            user_mode: Mutex::new(true),
            terminal_queue: Mutex::new(VecDeque::new()),
            handlers: Mutex::new([None; 6]),
            next_image: AtomicUsize::new(0),
            next_stack: AtomicUsize::new(0),
            output: Mutex::new(Vec::new()),
            halt_count: AtomicUsize::new(0),
            switch_count: AtomicUsize::new(0),
        }
    }

    pub fn set_user_mode(&self, user_mode: bool) {
        *self.user_mode.lock() = user_mode;
    }

    pub fn push_terminal_char(&self, c: u8) {
        self.terminal_queue.lock().push_back(c);
    }

    pub fn set_register(&self, i: usize, v: i64) {
        self.regs.lock()[i] = v;
    }

    pub fn register(&self, i: usize) -> i64 {
        self.regs.lock()[i]
    }

    pub fn output_bytes(&self) -> Vec<u8> {
        self.output.lock().clone()
    }

    pub fn handler_installed(&self, v: Vector) -> bool {
        self.handlers.lock()[vector_index(v)].is_some()
    }
}

impl Default for SimHal {
    fn default() -> Self {
        Self::new()
    }
}

impl Hal for SimHal {
    fn set_int_level(&self, level: IntLevel) -> IntLevel {
        let mut cur = self.level.lock();
        let prior = *cur;
        *cur = level;
        prior
    }

    fn halt(&self) {
        self.halt_count.fetch_add(1, Ordering::SeqCst);
    }

    fn install_handler(&self, vector: Vector, handler: fn()) {
        self.handlers.lock()[vector_index(vector)] = Some(handler);
    }

    fn start_clock(&self, _tick_hz: u32) {}

    fn start_keyboard(&self) {}

    fn context_switch(&self, out_regs: Option<&mut Regs>, in_regs: &Regs) {
        self.switch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(out) = out_regs {
            *out = Regs::default();
        }
        let _ = in_regs;
    }

    fn create_image(&self, path: &str, entry_pc: &mut u32) -> Option<ImageHandle> {
        if path.is_empty() {
            return None;
        }
        *entry_pc = 0;
        let id = self.next_image.fetch_add(1, Ordering::SeqCst);
        Some(ImageHandle(id))
    }

    fn free_image(&self, _handle: ImageHandle) {}

    fn create_stack(&self, _size: usize) -> StackHandle {
        let id = self.next_stack.fetch_add(1, Ordering::SeqCst);
        StackHandle(id)
    }

    fn free_stack(&self, _handle: StackHandle) {}

    fn init_context(
        &self,
        _image: ImageHandle,
        _stack: StackHandle,
        _stack_size: usize,
        _entry_pc: u32,
        regs: &mut Regs,
    ) {
        *regs = Regs::default();
    }

    fn read_register(&self, i: usize) -> i64 {
        self.regs.lock()[i]
    }

    fn write_register(&self, i: usize, v: i64) {
        self.regs.lock()[i] = v;
    }

    fn read_port_terminal(&self) -> u8 {
        self.terminal_queue.lock().pop_front().unwrap_or(0)
    }

    fn came_from_user_mode(&self) -> bool {
        *self.user_mode.lock()
    }

    fn panic(&self, msg: &str) -> ! {
        panic!("{msg}");
    }

    fn kernel_write(&self, buf: &[u8]) {
        self.output.lock().extend_from_slice(buf);
    }
}
