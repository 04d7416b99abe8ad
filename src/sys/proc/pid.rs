//! PID table — fixed set of "in use" flags
//!
//! PID hidup kalau flag-nya set; slot PCB dengan indeks yang sama hanya
//! bermakna selama itu.

use crate::config::MAX_PROCS;
use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(usize);

impl Pid {
    /// `None` kalau `index` di luar tabel
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < MAX_PROCS { Some(Self(index)) } else { None }
    }

    pub const fn index(self) -> usize { self.0 }

    /// Slot `index` of a table already sized to `MAX_PROCS`
    pub(super) const fn slot(index: usize) -> Self {
        debug_assert!(index < MAX_PROCS);
        Self(index)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct PidTable {
    used: [bool; MAX_PROCS],
}

impl PidTable {
    pub const fn new() -> Self {
        Self { used: [false; MAX_PROCS] }
    }

    /// Ambil PID bebas terkecil.
    pub fn allocate(&mut self) -> Option<Pid> {
        let index = self.used.iter().position(|used| !used)?;
        self.used[index] = true;
        Some(Pid(index))
    }

    /// Lepas `pid`. Caller menjamin tidak ada lagi yang merujuk ke sana.
    pub fn free(&mut self, pid: Pid) {
        debug_assert!(self.used[pid.0], "freeing dead pid {}", pid);
        self.used[pid.0] = false;
    }

    pub fn is_live(&self, pid: Pid) -> bool {
        self.used[pid.0]
    }

    pub fn live_count(&self) -> usize {
        self.used.iter().filter(|used| **used).count()
    }

    pub fn is_full(&self) -> bool {
        self.used.iter().all(|used| *used)
    }
}

impl Default for PidTable {
    fn default() -> Self { Self::new() }
}
