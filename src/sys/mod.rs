//! sys — triterm kernel subsystems
//!
//! Struktur:
//!   mem/      — address-space manager (user slot, video slot) dan `Machine`
//!   proc/     — tabel PID, arena PCB, execute/halt, scheduler terminal
//!   fs/       — kontrak file system dan pembaca boot file system
//!   fd        — tabel handle per proses dan backend-nya
//!   terminal  — line buffer, cursor, virtual RTC per terminal
//!   vga       — render teks ke video page
//!   keyboard  — decode scancode jadi input terminal
//!   syscall/  — dispatcher int 0x80
//!   kernel    — satu objek yang memiliki semua di atas
//!   arch/     — glue x86_64 (GDT, IDT, PIC, context switch), sebagian besar
//!               hanya bare metal

pub mod error;
pub mod fd;
pub mod fs;
pub mod kernel;
pub mod keyboard;
pub mod mem;
pub mod proc;
pub mod syscall;
pub mod terminal;
pub mod vga;

pub mod arch;
pub mod clk;

#[cfg(target_os = "none")]
pub mod serial;

#[cfg(test)]
pub mod sim;

pub use kernel::Kernel;
