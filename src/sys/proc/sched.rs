//! sched — round robin over the terminals, driven by the PIT
//!
//! Cara kerja:
//!   - unit scheduling adalah terminal: tiap tick CPU pindah ke proses
//!     foreground terminal berikutnya
//!   - terminal tanpa proses foreground dapat root shell baru, jadi tiga tick
//!     pertama menyalakan tiga shell

use super::{Pid, Transfer};
use crate::config::{NUM_TERMINALS, SHELL};
use crate::sys::fs::FileSystem;
use crate::sys::kernel::Kernel;
use crate::sys::mem::Machine;

impl<M: Machine, F: FileSystem> Kernel<M, F> {
    /// Satu tick timer. Caller sudah mengirim EOI.
    pub fn tick(&mut self) -> Transfer {
        let current = self.scheduled;
        let Some(from) = self.terminals[current].foreground() else {
            return self.bootstrap(current, None);
        };

        let next = (current + 1) % NUM_TERMINALS;
        if next == current {
            return Transfer::Continue;
        }
        match self.terminals[next].foreground() {
            None => self.bootstrap(next, Some(from)),
            Some(to) => {
                self.scheduled = next;
                self.activate(to);
                ktrace!("sched: tty{} pid {} -> tty{} pid {}", current, from, next, to);
                Transfer::Switch { from, to }
            }
        }
    }

    /// Pasang pandangan CPU milik `pid`: region-nya, video page terminalnya,
    /// user video page dan kernel stack-nya.
    fn activate(&mut self, pid: Pid) {
        let (terminal, video) = match self.procs.get(pid) {
            Some(pcb) => (pcb.terminal, pcb.video_mapped()),
            None => (self.scheduled, false),
        };
        self.space.activate(&mut self.machine, pid, terminal, self.visible, video);
        self.machine.set_kernel_stack(pid);
        if terminal == self.visible {
            let cursor = self.terminals[terminal].cursor;
            self.machine.set_cursor(cursor.x, cursor.y);
        }
    }

    /// Jalankan root shell `terminal`, mem-preempt `from` kalau ada. Kalau
    /// gagal, posisi scheduler dan mapping kembali seperti semula.
    fn bootstrap(&mut self, terminal: usize, from: Option<Pid>) -> Transfer {
        let previous = self.scheduled;
        self.scheduled = terminal;
        self.space.map_video(&mut self.machine, terminal, self.visible);

        match self.spawn(terminal, None, SHELL) {
            Ok(launch) => {
                klog!("tty{}: shell started as pid {}", terminal, launch.pid);
                Transfer::Bootstrap { from, launch }
            }
            Err(err) => {
                kerror!("tty{}: cannot start shell: {}", terminal, err);
                self.scheduled = previous;
                match from {
                    Some(pid) => self.activate(pid),
                    None => self.space.map_video(&mut self.machine, previous, self.visible),
                }
                Transfer::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_PROCS;
    use crate::sys::fs::BootFs;
    use crate::sys::mem::{backing_page, user_region};
    use crate::sys::sim::{standard_fs, ImageBuilder, SimMachine};
    use x86_64::PhysAddr;

    type TestKernel = Kernel<SimMachine, BootFs<'static>>;

    fn kernel() -> TestKernel {
        Kernel::new(SimMachine::new(), standard_fs())
    }

    fn launched(transfer: Transfer) -> Pid {
        match transfer {
            Transfer::Bootstrap { launch, .. } => launch.pid,
            other => panic!("expected bootstrap, got {:?}", other),
        }
    }

    #[test]
    fn first_ticks_boot_one_shell_per_terminal() {
        let mut kernel = kernel();

        let t0 = kernel.tick();
        assert!(matches!(t0, Transfer::Bootstrap { from: None, .. }));
        let p0 = launched(t0);

        let t1 = kernel.tick();
        assert!(matches!(t1, Transfer::Bootstrap { from: Some(p), .. } if p == p0));
        let p1 = launched(t1);
        assert_eq!(kernel.scheduled_terminal(), 1);

        let p2 = launched(kernel.tick());
        assert_eq!(kernel.scheduled_terminal(), 2);

        for (terminal, pid) in [p0, p1, p2].into_iter().enumerate() {
            assert_eq!(kernel.terminal(terminal).foreground(), Some(pid));
            assert_eq!(kernel.processes().get(pid).unwrap().parent, None);
        }

        assert_eq!(kernel.tick(), Transfer::Switch { from: p2, to: p0 });
        assert_eq!(kernel.scheduled_terminal(), 0);
        assert_eq!(kernel.machine().user_slot(), Some(user_region(p0)));
        assert_eq!(kernel.machine().kernel_stack(), Some(p0));
    }

    #[test]
    fn off_screen_terminal_draws_into_backing_page() {
        let mut kernel = kernel();
        kernel.tick();
        kernel.tick();
        assert_eq!(kernel.scheduled_terminal(), 1);
        assert_eq!(kernel.machine().video_slot(), backing_page(1));

        kernel.tick();
        kernel.tick();
        assert_eq!(kernel.machine().video_slot(), PhysAddr::new(crate::config::VGA_PHYS));
    }

    #[test]
    fn switch_follows_foreground_child() {
        let mut kernel = kernel();
        let shell0 = launched(kernel.tick());
        let child = kernel.execute(b"counter").unwrap().pid;
        let shell1 = launched(kernel.tick());
        let shell2 = launched(kernel.tick());
        assert_eq!(kernel.processes().get(shell1).unwrap().terminal, 1);

        assert_eq!(kernel.tick(), Transfer::Switch { from: shell2, to: child });
        assert_ne!(child, shell0);
        assert_eq!(kernel.machine().user_slot(), Some(user_region(child)));
    }

    #[test]
    fn failed_bootstrap_keeps_position() {
        let fs = ImageBuilder::new().directory(".").build();
        let mut kernel = Kernel::new(SimMachine::new(), fs);
        assert_eq!(kernel.tick(), Transfer::Continue);
        assert_eq!(kernel.scheduled_terminal(), 0);
        assert_eq!(kernel.processes().pids().live_count(), 0);
        assert!(!kernel.machine().is_stale());
    }

    #[test]
    fn full_table_defers_later_terminals() {
        let mut kernel = kernel();
        let shell0 = launched(kernel.tick());
        for _ in 1..MAX_PROCS {
            kernel.execute(b"counter").unwrap();
        }
        let running = kernel.current().unwrap();

        assert_eq!(kernel.tick(), Transfer::Continue);
        assert_eq!(kernel.scheduled_terminal(), 0);
        assert_eq!(kernel.machine().user_slot(), Some(user_region(running)));
        assert_eq!(kernel.machine().video_slot(), PhysAddr::new(crate::config::VGA_PHYS));
        assert!(kernel.processes().pids().is_live(shell0));
    }
}
