//! process — PCB and the PCB arena
//!
//! Arena punya satu slot per PID; slot hanya bermakna selama PID-nya hidup di
//! [`PidTable`]. Parent dirujuk lewat PID, bukan pointer.

use super::pid::{Pid, PidTable};
use crate::config::{ARGS_SIZE, MAX_PROCS};
use crate::sys::arch::context::Continuation;
use crate::sys::fd::HandleTable;

/// Panggilan kernel tertunda yang memiliki sebuah continuation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumePoint {
    /// `execute` milik parent, dilanjutkan oleh `halt` proses ini
    Execute,
    /// Tempat scheduler terakhir kali mem-preempt proses ini
    Scheduler,
}

#[derive(Clone, Debug)]
pub struct Process {
    pub pid:      Pid,
    pub parent:   Option<Pid>,
    pub terminal: usize,
    pub handles:  HandleTable,

    args:         [u8; ARGS_SIZE],
    args_len:     usize,
    exception:    bool,
    video_mapped: bool,
    exec_resume:  Continuation,
    sched_resume: Continuation,
}

impl Process {
    /// PCB baru dengan stdin/stdout terbuka. `args` dipotong supaya muat
    /// bersama NUL-nya.
    pub fn new(pid: Pid, parent: Option<Pid>, terminal: usize, args: &[u8]) -> Self {
        let mut pcb = Self::vacant(pid);
        pcb.parent = parent;
        pcb.terminal = terminal;
        pcb.handles = HandleTable::with_stdio();

        let len = args.len().min(ARGS_SIZE - 1);
        pcb.args[..len].copy_from_slice(&args[..len]);
        pcb.args_len = len;
        pcb
    }

    const fn vacant(pid: Pid) -> Self {
        Self {
            pid,
            parent:       None,
            terminal:     0,
            handles:      HandleTable::new(),
            args:         [0; ARGS_SIZE],
            args_len:     0,
            exception:    false,
            video_mapped: false,
            exec_resume:  Continuation::empty(),
            sched_resume: Continuation::empty(),
        }
    }

    /// Argument string without its NUL
    pub fn args(&self) -> &[u8] {
        &self.args[..self.args_len]
    }

    pub fn exception(&self) -> bool { self.exception }

    pub fn mark_exception(&mut self) {
        self.exception = true;
    }

    pub fn video_mapped(&self) -> bool { self.video_mapped }

    pub fn set_video_mapped(&mut self, mapped: bool) {
        self.video_mapped = mapped;
    }

    pub fn resume_point(&self, kind: ResumePoint) -> &Continuation {
        match kind {
            ResumePoint::Execute   => &self.exec_resume,
            ResumePoint::Scheduler => &self.sched_resume,
        }
    }

    pub fn resume_point_mut(&mut self, kind: ResumePoint) -> &mut Continuation {
        match kind {
            ResumePoint::Execute   => &mut self.exec_resume,
            ResumePoint::Scheduler => &mut self.sched_resume,
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessTable — PID flags + PCB arena
// ---------------------------------------------------------------------------

pub struct ProcessTable {
    pids:  PidTable,
    slots: [Process; MAX_PROCS],
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            pids:  PidTable::new(),
            slots: core::array::from_fn(|i| Process::vacant(Pid::slot(i))),
        }
    }

    pub fn pids(&self) -> &PidTable { &self.pids }

    /// Pesan PID bebas terkecil. Slot tetap kosong sampai `install`.
    pub fn allocate(&mut self) -> Option<Pid> {
        self.pids.allocate()
    }

    pub fn install(&mut self, pcb: Process) {
        debug_assert!(self.pids.is_live(pcb.pid));
        let index = pcb.pid.index();
        self.slots[index] = pcb;
    }

    /// Bebaskan `pid` dan kosongkan slot-nya.
    pub fn release(&mut self, pid: Pid) {
        self.pids.free(pid);
        self.slots[pid.index()] = Process::vacant(pid);
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.pids.is_live(pid).then(|| &self.slots[pid.index()])
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        if self.pids.is_live(pid) {
            Some(&mut self.slots[pid.index()])
        } else {
            None
        }
    }
}

impl Default for ProcessTable {
    fn default() -> Self { Self::new() }
}
