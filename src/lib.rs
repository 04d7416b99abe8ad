//! triterm — three terminals, one CPU
//!
//! Inti kernel x86_64 kecil: tabel proses berindeks PID, `execute`/`halt`,
//! round-robin per terminal di atas PIT, remap user slot dan video slot,
//! plus layer file descriptor/syscall.
//!
//! Semua yang menyentuh hardware ada di balik [`sys::mem::Machine`] dan hanya
//! dikompilasi untuk `target_os = "none"`; sisanya bisa di-build dan dites di
//! host.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_os = "none", feature(abi_x86_interrupt))]

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[doc(hidden)]
pub use log as __log;

/// Kernel info log
#[macro_export]
macro_rules! klog {
    ($($arg:tt)*) => { $crate::__log::info!($($arg)*) };
}

/// Kernel warning log
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::__log::warn!($($arg)*) };
}

/// Kernel error log
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => { $crate::__log::error!($($arg)*) };
}

/// Kernel debug log, hanya aktif dengan feature `trace-syscalls`
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {
        if cfg!(feature = "trace-syscalls") {
            $crate::__log::debug!($($arg)*)
        }
    };
}

pub mod config;
pub mod sys;

/// Nyalakan mesin lalu serahkan kontrol ke scheduler.
///
/// Urutan penting: logger dulu supaya langkah berikutnya bisa melapor, GDT
/// sebelum IDT (IDT memakai selector-nya), interrupt paling akhir.
#[cfg(target_os = "none")]
pub fn init(boot_info: &'static bootloader::BootInfo) {
    #[cfg(feature = "serial-log")]
    sys::serial::init();

    sys::arch::gdt::init();
    sys::arch::idt::init();
    if let Err(reason) = sys::arch::boot(boot_info) {
        kerror!("boot stopped: {}", reason);
        halt_forever();
    }
    sys::clk::init();
    sys::arch::pic::init();

    klog!("triterm v{}: {} terminals, {} PID slots", VERSION,
        config::NUM_TERMINALS, config::MAX_PROCS);
}

/// Hentikan CPU selamanya, interrupt mati.
#[cfg(target_os = "none")]
pub fn halt_forever() -> ! {
    x86_64::instructions::interrupts::disable();
    loop {
        x86_64::instructions::hlt();
    }
}

/// Parkir CPU; interrupt tetap masuk.
#[cfg(target_os = "none")]
pub fn hlt_loop() -> ! {
    loop {
        x86_64::instructions::interrupts::enable_and_hlt();
    }
}
