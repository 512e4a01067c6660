//! The syscall dispatch table and the argument-marshaling wrappers around
//! each `Kernel` service. This educational kernel runs user and kernel
//! code in a single flat address space, so a syscall argument register
//! that names a user buffer or C string is a plain, dereferenceable
//! pointer, handled with the `unsafe` blocks below rather than hidden
//! behind a false abstraction.

use core::ffi::{c_char, CStr};

use crate::consts::NSERVICIOS;
use crate::kernel::Kernel;

/// Two `int`s, user ticks then system ticks, written back through the
/// caller-supplied pointer.
#[repr(C)]
pub struct TiemposEjec {
    pub usuario: i32,
    pub sistema: i32,
}

type ServiceFn = fn(&Kernel) -> i64;

fn sys_create_process(k: &Kernel) -> i64 {
    let ptr = k.hal.read_register(1) as *const c_char;
    let path = unsafe { CStr::from_ptr(ptr) };
    match path.to_str() {
        Ok(s) => match k.create_process(s) {
            Ok(_) => 0,
            Err(e) => e.syscall_result(),
        },
        Err(_) => -1,
    }
}

fn sys_terminate_process(k: &Kernel) -> i64 {
    k.terminate_current()
}

fn sys_write(k: &Kernel) -> i64 {
    let ptr = k.hal.read_register(1) as *const u8;
    let len = k.hal.read_register(2) as usize;
    let buf = unsafe { core::slice::from_raw_parts(ptr, len) };
    k.write(buf);
    0
}

fn sys_get_pid(k: &Kernel) -> i64 {
    k.get_pid()
}

fn sys_sleep(k: &Kernel) -> i64 {
    let seconds = k.hal.read_register(1) as u32;
    k.sleep(seconds);
    0
}

fn sys_times(k: &Kernel) -> i64 {
    let out_ptr = k.hal.read_register(1);
    let has_out_ptr = out_ptr != 0;
    let (tick_count, ticks_user, ticks_system) = k.times(has_out_ptr);
    if has_out_ptr {
        let out = out_ptr as *mut TiemposEjec;
        unsafe {
            (*out).usuario = ticks_user as i32;
            (*out).sistema = ticks_system as i32;
        }
    }
    tick_count as i64
}

fn sys_create_mutex(k: &Kernel) -> i64 {
    let name_ptr = k.hal.read_register(1) as *const c_char;
    let kind_raw = k.hal.read_register(2);
    let name = unsafe { CStr::from_ptr(name_ptr) };
    match name.to_str() {
        Ok(s) => match k.create_mutex(s, kind_raw) {
            Ok(()) => 0,
            Err(e) => e.syscall_result(),
        },
        Err(_) => -1,
    }
}

fn sys_open_mutex(k: &Kernel) -> i64 {
    k.open_mutex()
}

fn sys_lock(k: &Kernel) -> i64 {
    k.lock()
}

fn sys_unlock(k: &Kernel) -> i64 {
    k.unlock()
}

fn sys_close_mutex(k: &Kernel) -> i64 {
    k.close_mutex()
}

fn sys_read_char(k: &Kernel) -> i64 {
    k.read_char() as i64
}

const SERVICE_TABLE: [ServiceFn; NSERVICIOS] = [
    sys_create_process,
    sys_terminate_process,
    sys_write,
    sys_get_pid,
    sys_sleep,
    sys_times,
    sys_create_mutex,
    sys_open_mutex,
    sys_lock,
    sys_unlock,
    sys_close_mutex,
    sys_read_char,
];

/// Reads the service number from register 0, invokes the matching entry
/// (or returns -1 if out of range), and writes the result back to
/// register 0.
pub fn dispatch(k: &Kernel) {
    let nserv = k.hal.read_register(0);
    let res = if nserv >= 0 && (nserv as usize) < NSERVICIOS {
        SERVICE_TABLE[nserv as usize](k)
    } else {
        -1
    };
    k.hal.write_register(0, res);
}
