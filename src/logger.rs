//! Wires the `log` facade (`log::info!`/`warn!`/`error!`) to the only output
//! primitive the HAL exposes, `kernel_write`. There is no allocator in this
//! crate, so formatting happens into a small fixed-size stack buffer rather
//! than a `String`.

use core::fmt::Write;

use log::{Level, Log, Metadata, Record};
use spin::Once;

use crate::hal::Hal;

const LINE_BUF_SIZE: usize = 160;

struct LineBuf {
    buf: [u8; LINE_BUF_SIZE],
    len: usize,
}

impl LineBuf {
    fn new() -> Self {
        LineBuf { buf: [0; LINE_BUF_SIZE], len: 0 }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Write for LineBuf {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let room = LINE_BUF_SIZE - self.len;
        let take = room.min(bytes.len());
        self.buf[self.len..self.len + take].copy_from_slice(&bytes[..take]);
        self.len += take;
        Ok(())
    }
}

static LOGGER_HAL: Once<&'static dyn Hal> = Once::new();

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let Some(hal) = LOGGER_HAL.get() else { return };
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let mut line = LineBuf::new();
        let _ = write!(line, "[{level}] {}\n", record.args());
        hal.kernel_write(line.as_bytes());
    }

    fn flush(&self) {}
}

/// Installs the kernel logger. Idempotent — safe to call more than once
/// with the same `hal`.
pub fn init(hal: &'static dyn Hal) {
    LOGGER_HAL.call_once(|| hal);
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Info);
}
