//! mem — address-space manager
//!
//! Hanya tiga mapping yang berubah setelah boot:
//!   - user slot: virtual `USER_BASE`, 4 MiB, di-back region fisik milik PID
//!     yang sedang jalan
//!   - video slot: virtual `VIDEO_SLOT`, satu page, di-back page VGA kalau
//!     terminal yang dijadwalkan sedang tampil, selain itu backing page-nya
//!   - user video page: virtual `USER_VIDEO`, hanya ada untuk proses yang
//!     memanggil `vidmap`, di-back page yang sama dengan video slot
//!
//! Setiap penulisan ke salah satunya diikuti TLB flush sebelum ada kode yang
//! jalan di range itu.

#[cfg(target_os = "none")]
pub mod frame;
#[cfg(target_os = "none")]
pub mod paging;

use crate::config::{
    BACKING_PHYS, KERNEL_END, KERNEL_STACK_SIZE, MAX_PROCS, NUM_TERMINALS, PAGE_SIZE,
    USER_BASE, USER_REGION_SIZE, VGA_PHYS,
};
use crate::sys::proc::Pid;
use core::ops::Range;
use x86_64::PhysAddr;

// ---------------------------------------------------------------------------
// Machine — batas ke hardware
// ---------------------------------------------------------------------------

/// Yang dibutuhkan core dari MMU, TSS dan layar.
///
/// `map_*` hanya menulis entry; belum tentu terlihat sampai
/// [`Machine::flush_tlb`] jalan.
pub trait Machine {
    /// Back the user slot with the 4 MiB region at `region`.
    fn map_user_region(&mut self, region: PhysAddr);
    /// Back the kernel video slot with `page`.
    fn map_video_slot(&mut self, page: PhysAddr);
    /// Back the user video page with `page`, or unmap it.
    fn map_user_video(&mut self, page: Option<PhysAddr>);
    /// Invalidate every cached translation.
    fn flush_tlb(&mut self);

    /// The user slot through the active mapping.
    fn user_memory(&mut self) -> &mut [u8];
    /// A physical video page through the kernel's own mapping.
    fn video_page(&mut self, page: PhysAddr) -> &mut [u8];

    /// Ring-0 stack for the next user→kernel transition.
    fn set_kernel_stack(&mut self, pid: Pid);
    /// Move the hardware text cursor (on-screen terminal only).
    fn set_cursor(&mut self, x: usize, y: usize);
}

// ---------------------------------------------------------------------------
// Layout — fungsi murni dari PID / indeks terminal
// ---------------------------------------------------------------------------

/// Physical region backing the user slot for `pid`
pub fn user_region(pid: Pid) -> PhysAddr {
    PhysAddr::new(KERNEL_END + pid.index() as u64 * USER_REGION_SIZE)
}

/// Letak PCB `pid`: dasar slot kernel stack-nya
pub fn pcb_address(pid: Pid) -> PhysAddr {
    PhysAddr::new(KERNEL_END - (pid.index() as u64 + 1) * KERNEL_STACK_SIZE)
}

/// Top of the kernel stack slot for `pid`
pub fn kernel_stack_top(pid: Pid) -> PhysAddr {
    PhysAddr::new(KERNEL_END - pid.index() as u64 * KERNEL_STACK_SIZE)
}

/// Page tempat terminal menggambar: VGA kalau tampil, selain itu backing page
pub fn video_backing(terminal: usize, visible: usize) -> PhysAddr {
    debug_assert!(terminal < NUM_TERMINALS);
    if terminal == visible {
        PhysAddr::new(VGA_PHYS)
    } else {
        backing_page(terminal)
    }
}

/// Backing page owned by `terminal` while it is off screen
pub fn backing_page(terminal: usize) -> PhysAddr {
    PhysAddr::new(BACKING_PHYS + terminal as u64 * PAGE_SIZE)
}

/// Range fisik yang menampung user region semua PID
pub fn user_regions() -> Range<u64> {
    KERNEL_END..KERNEL_END + MAX_PROCS as u64 * USER_REGION_SIZE
}

/// Apakah range `usable` bersama-sama menutup seluruh `wanted` tanpa celah
pub fn covers(usable: impl Iterator<Item = Range<u64>> + Clone, wanted: Range<u64>) -> bool {
    let mut covered = wanted.start;
    while covered < wanted.end {
        match usable.clone().find(|range| range.contains(&covered)) {
            Some(range) => covered = range.end,
            None => return false,
        }
    }
    true
}

/// Apakah `[addr, addr + len)` ada di dalam user slot
pub fn in_user_slot(addr: u64, len: usize) -> bool {
    let end = match addr.checked_add(len as u64) {
        Some(end) => end,
        None => return false,
    };
    addr >= USER_BASE && end <= USER_BASE + USER_REGION_SIZE
}

// ---------------------------------------------------------------------------
// AddressSpace — apa yang sedang ter-map
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressSpace {
    user:       Option<Pid>,
    video:      PhysAddr,
    user_video: Option<PhysAddr>,
}

impl AddressSpace {
    /// State awal: user slot kosong, video slot di page VGA.
    pub fn new<M: Machine>(machine: &mut M) -> Self {
        let space = Self {
            user:       None,
            video:      PhysAddr::new(VGA_PHYS),
            user_video: None,
        };
        machine.map_video_slot(space.video);
        machine.map_user_video(None);
        machine.flush_tlb();
        space
    }

    /// PID whose region currently backs the user slot
    pub fn user(&self) -> Option<Pid> { self.user }

    /// Physical page behind the video slot
    pub fn video(&self) -> PhysAddr { self.video }

    /// Physical page behind the user video page, if present
    pub fn user_video(&self) -> Option<PhysAddr> { self.user_video }

    /// Remap user slot ke region `pid` lalu flush.
    pub fn map_user<M: Machine>(&mut self, machine: &mut M, pid: Pid) {
        self.user = Some(pid);
        machine.map_user_region(user_region(pid));
        machine.flush_tlb();
    }

    /// Remap video slot untuk `terminal` lalu flush. User video page ikut
    /// kalau sedang ada.
    pub fn map_video<M: Machine>(&mut self, machine: &mut M, terminal: usize, visible: usize) {
        self.video = video_backing(terminal, visible);
        machine.map_video_slot(self.video);
        if self.user_video.is_some() {
            self.user_video = Some(self.video);
            machine.map_user_video(self.user_video);
        }
        machine.flush_tlb();
    }

    /// Make the user video page present (or not) on top of the video slot.
    pub fn set_user_video<M: Machine>(&mut self, machine: &mut M, present: bool) {
        self.user_video = present.then_some(self.video);
        machine.map_user_video(self.user_video);
        machine.flush_tlb();
    }

    /// Switch penuh untuk scheduler: user slot, video slot dan user video
    /// page berubah, lalu satu kali flush.
    pub fn activate<M: Machine>(
        &mut self,
        machine: &mut M,
        pid: Pid,
        terminal: usize,
        visible: usize,
        user_video: bool,
    ) {
        self.user = Some(pid);
        self.video = video_backing(terminal, visible);
        self.user_video = user_video.then_some(self.video);

        machine.map_user_region(user_region(pid));
        machine.map_video_slot(self.video);
        machine.map_user_video(self.user_video);
        machine.flush_tlb();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::sim::SimMachine;

    fn pid(i: usize) -> Pid { Pid::from_index(i).unwrap() }

    #[test]
    fn layout_is_pid_indexed() {
        assert_eq!(user_region(pid(0)).as_u64(), 0x0080_0000);
        assert_eq!(user_region(pid(2)).as_u64(), 0x0100_0000);
        assert_eq!(pcb_address(pid(0)).as_u64(), 0x007F_E000);
        assert_eq!(pcb_address(pid(1)).as_u64(), 0x007F_C000);
        assert_eq!(kernel_stack_top(pid(1)).as_u64(), 0x007F_E000);
    }

    #[test]
    fn video_backing_is_distinct_per_terminal() {
        for visible in 0..NUM_TERMINALS {
            let pages: [PhysAddr; NUM_TERMINALS] =
                core::array::from_fn(|t| video_backing(t, visible));
            let on_screen = pages.iter().filter(|p| p.as_u64() == VGA_PHYS).count();
            assert_eq!(on_screen, 1);
            for a in 0..NUM_TERMINALS {
                for b in a + 1..NUM_TERMINALS {
                    assert_ne!(pages[a], pages[b]);
                }
            }
        }
    }

    #[test]
    fn user_slot_bounds() {
        assert!(in_user_slot(USER_BASE, 4));
        assert!(in_user_slot(USER_BASE + USER_REGION_SIZE - 4, 4));
        assert!(!in_user_slot(USER_BASE + USER_REGION_SIZE - 3, 4));
        assert!(!in_user_slot(USER_BASE - 1, 1));
        assert!(!in_user_slot(u64::MAX, 2));
    }

    #[test]
    fn user_regions_need_gapless_usable_memory() {
        let wanted = user_regions();
        assert_eq!(wanted, 0x0080_0000..0x0200_0000);

        let whole = [0x0010_0000..0x0800_0000];
        assert!(covers(whole.iter().cloned(), wanted.clone()));

        let split = [0x0070_0000..0x0100_0000, 0x0100_0000..0x0300_0000];
        assert!(covers(split.iter().cloned(), wanted.clone()));

        let hole = [0x0010_0000..0x00F0_0000, 0x0100_0000..0x0800_0000];
        assert!(!covers(hole.iter().cloned(), wanted.clone()));

        let short = [0x0010_0000..0x01FF_F000];
        assert!(!covers(short.iter().cloned(), wanted.clone()));
        assert!(!covers(core::iter::empty(), wanted));
    }

    #[test]
    fn remap_flushes_and_is_idempotent() {
        let mut machine = SimMachine::new();
        let mut space = AddressSpace::new(&mut machine);

        space.map_user(&mut machine, pid(3));
        assert!(!machine.is_stale());
        let first = machine.user_slot();

        space.map_user(&mut machine, pid(3));
        assert_eq!(machine.user_slot(), first);
        assert_eq!(first, Some(user_region(pid(3))));
        assert_eq!(space.user(), Some(pid(3)));
    }

    #[test]
    fn user_video_follows_video_slot() {
        let mut machine = SimMachine::new();
        let mut space = AddressSpace::new(&mut machine);

        space.set_user_video(&mut machine, true);
        assert_eq!(machine.user_video(), Some(PhysAddr::new(VGA_PHYS)));

        space.map_video(&mut machine, 2, 0);
        assert_eq!(machine.video_slot(), backing_page(2));
        assert_eq!(machine.user_video(), Some(backing_page(2)));

        space.set_user_video(&mut machine, false);
        assert_eq!(machine.user_video(), None);
    }
}
