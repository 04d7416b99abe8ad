//! proc — process management
//!
//!   - pid:     alokasi PID
//!   - process: PCB dan arena PCB
//!   - exec:    execute / halt / fault di `Kernel`
//!   - sched:   round robin per terminal di `Kernel`

pub mod exec;
pub mod pid;
pub mod process;
pub mod sched;

pub use pid::{Pid, PidTable};
pub use process::{Process, ProcessTable, ResumePoint};

use crate::sys::arch::context::Continuation;
use core::fmt;

/// Titik mulai program yang baru di-load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Launch {
    pub pid:        Pid,
    pub entry:      u64,
    pub user_stack: u64,
}

/// Apa yang harus dilakukan kode yang diinterupsi setelah lock kernel dilepas.
///
/// Core tidak pernah melompat sendiri; core memutuskan, layer arch yang
/// melompat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transfer {
    /// Return to whatever was interrupted
    Continue,
    /// Tidak ada yang bisa jalan; tunggu tick berikutnya
    Idle,
    /// Start a program that has nothing to return to
    Enter(Launch),
    /// Jalankan shell pertama sebuah terminal. `from` = proses yang
    /// di-preempt; resume point scheduler-nya disimpan dulu.
    Bootstrap { from: Option<Pid>, launch: Launch },
    /// Make the parent's pending `execute` return `status`
    ReturnToExecute { pid: Pid, resume: Continuation, status: u32 },
    /// Preempt `from` and resume `to` where it was last preempted
    Switch { from: Pid, to: Pid },
}

/// Exception CPU yang bisa membunuh program user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exception {
    DivideError,
    Debug,
    NonMaskableInterrupt,
    Breakpoint,
    Overflow,
    BoundRangeExceeded,
    InvalidOpcode,
    DeviceNotAvailable,
    InvalidTss,
    SegmentNotPresent,
    StackSegmentFault,
    GeneralProtectionFault,
    PageFault,
    X87FloatingPoint,
    AlignmentCheck,
    SimdFloatingPoint,
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DivideError            => "divide error",
            Self::Debug                  => "debug",
            Self::NonMaskableInterrupt   => "non-maskable interrupt",
            Self::Breakpoint             => "breakpoint",
            Self::Overflow               => "overflow",
            Self::BoundRangeExceeded     => "bound range exceeded",
            Self::InvalidOpcode          => "invalid opcode",
            Self::DeviceNotAvailable     => "device not available",
            Self::InvalidTss             => "invalid TSS",
            Self::SegmentNotPresent      => "segment not present",
            Self::StackSegmentFault      => "stack-segment fault",
            Self::GeneralProtectionFault => "general protection fault",
            Self::PageFault              => "page fault",
            Self::X87FloatingPoint       => "x87 floating-point exception",
            Self::AlignmentCheck         => "alignment check",
            Self::SimdFloatingPoint      => "SIMD floating-point exception",
        };
        f.write_str(name)
    }
}
