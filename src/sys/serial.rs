//! serial — COM1 as the `log` backend
//!
//! Semua `klog!`/`kwarn!`/`kerror!`/`ktrace!` berakhir di sini sebagai satu
//! baris: `[LEVEL] message`.

use core::fmt::Write;
use lazy_static::lazy_static;
use log::{Log, Metadata, Record};
use spin::Mutex;
use uart_16550::SerialPort;

const COM1: u16 = 0x3F8;

lazy_static! {
    static ref SERIAL: Mutex<SerialPort> = {
        let mut port = unsafe { SerialPort::new(COM1) };
        port.init();
        Mutex::new(port)
    };
}

struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // logger juga dipanggil dari handler interrupt
        x86_64::instructions::interrupts::without_interrupts(|| {
            let _ = writeln!(SERIAL.lock(), "[{:5}] {}", record.level(), record.args());
        });
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

/// Pasang logger serial. Panggilan kedua tetap memakai logger pertama.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(crate::config::LOG_LEVEL);
    }
    if cfg!(feature = "trace-syscalls") {
        log::set_max_level(log::LevelFilter::Debug);
    }
}
