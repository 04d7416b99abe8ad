//! paging — `Machine` on real x86_64 page tables
//!
//! User slot = dua page 2 MiB; video slot dan user video page masing-masing
//! satu page 4 KiB. Table induknya dibuat sekali saat boot, jadi remap
//! berikutnya hanya menulis ulang entry daun dan tidak pernah alokasi.

use super::frame::BootFrameAllocator;
use super::Machine;
use crate::config::{PAGE_SIZE, USER_BASE, USER_REGION_SIZE, USER_VIDEO, VIDEO_SLOT};
use crate::sys::arch;
use crate::sys::proc::Pid;
use x86_64::instructions::port::Port;
use x86_64::instructions::tlb;
use x86_64::registers::control::Cr3;
use x86_64::structures::paging::mapper::{MapToError, UnmapError};
use x86_64::structures::paging::{
    FrameAllocator, Mapper, OffsetPageTable, Page, PageSize, PageTable, PageTableFlags,
    PhysFrame, Size2MiB, Size4KiB,
};
use x86_64::{PhysAddr, VirtAddr};

const USER_FLAGS: PageTableFlags = PageTableFlags::from_bits_truncate(
    PageTableFlags::PRESENT.bits()
    | PageTableFlags::WRITABLE.bits()
    | PageTableFlags::USER_ACCESSIBLE.bits()
);

const KERNEL_FLAGS: PageTableFlags = PageTableFlags::from_bits_truncate(
    PageTableFlags::PRESENT.bits()
    | PageTableFlags::WRITABLE.bits()
);

const CRTC_INDEX: u16 = 0x3D4;
const CRTC_DATA:  u16 = 0x3D5;

/// Remap saat runtime tidak boleh butuh table baru.
struct NoFrames;

unsafe impl FrameAllocator<Size4KiB> for NoFrames {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        None
    }
}

pub struct X86Machine {
    mapper:      OffsetPageTable<'static>,
    phys_offset: VirtAddr,
}

impl X86Machine {
    /// Ambil alih page table aktif dan bangun table induk untuk tiga range
    /// yang bisa di-remap.
    ///
    /// # Safety
    ///
    /// Seluruh memori fisik harus ter-map di `phys_offset`, dan hanya boleh
    /// ada satu `X86Machine`.
    pub unsafe fn new(
        phys_offset: VirtAddr,
        frames: &mut BootFrameAllocator,
    ) -> Result<Self, MapToError<Size4KiB>> {
        let (level_4, _) = Cr3::read();
        let table: *mut PageTable = (phys_offset + level_4.start_address().as_u64()).as_mut_ptr();
        let mut machine = Self {
            mapper: OffsetPageTable::new(&mut *table, phys_offset),
            phys_offset,
        };
        machine.prepare_user_slot(frames)?;
        machine.prepare_page(USER_VIDEO, USER_FLAGS, frames)?;
        machine.prepare_page(VIDEO_SLOT, KERNEL_FLAGS, frames)?;
        tlb::flush_all();
        Ok(machine)
    }

    /// Buat P3/P2 untuk user slot; slot-nya sendiri mulai tanpa mapping.
    unsafe fn prepare_user_slot(
        &mut self,
        frames: &mut BootFrameAllocator,
    ) -> Result<(), MapToError<Size4KiB>> {
        let base = user_page(0);
        if self.mapper.translate_page(base).is_ok() {
            return Ok(());
        }
        let scratch = PhysFrame::<Size2MiB>::containing_address(PhysAddr::new(0));
        match self.mapper.map_to(base, scratch, USER_FLAGS, frames) {
            Ok(flush) => flush.ignore(),
            Err(err) => return Err(huge_error(err)),
        }
        if let Ok((_, flush)) = self.mapper.unmap(base) {
            flush.ignore();
        }
        Ok(())
    }

    /// Create the page tables above the 4 KiB page at `addr`, keeping any
    /// mapping that is already there.
    unsafe fn prepare_page(
        &mut self,
        addr: u64,
        flags: PageTableFlags,
        frames: &mut BootFrameAllocator,
    ) -> Result<(), MapToError<Size4KiB>> {
        let page = Page::<Size4KiB>::containing_address(VirtAddr::new(addr));
        if self.mapper.translate_page(page).is_ok() {
            return Ok(());
        }
        let frame = PhysFrame::containing_address(PhysAddr::new(addr));
        self.mapper.map_to(page, frame, flags, frames)?.ignore();
        Ok(())
    }

    fn remap_small(&mut self, addr: u64, target: Option<PhysAddr>, flags: PageTableFlags) {
        let page = Page::<Size4KiB>::containing_address(VirtAddr::new(addr));
        match self.mapper.unmap(page) {
            Ok((_, flush)) => flush.ignore(),
            Err(UnmapError::PageNotMapped) => {}
            Err(err) => kerror!("paging: unmap {:#x}: {:?}", addr, err),
        }
        let Some(target) = target else { return };
        let frame = PhysFrame::containing_address(target);
        match unsafe { self.mapper.map_to(page, frame, flags, &mut NoFrames) } {
            Ok(flush) => flush.ignore(),
            Err(err) => kerror!("paging: map {:#x} -> {:#x}: {:?}", addr, target.as_u64(), err),
        }
    }
}

fn user_page(index: u64) -> Page<Size2MiB> {
    Page::containing_address(VirtAddr::new(USER_BASE + index * Size2MiB::SIZE))
}

fn huge_error(err: MapToError<Size2MiB>) -> MapToError<Size4KiB> {
    match err {
        MapToError::FrameAllocationFailed => MapToError::FrameAllocationFailed,
        MapToError::ParentEntryHugePage   => MapToError::ParentEntryHugePage,
        MapToError::PageAlreadyMapped(f)  => MapToError::PageAlreadyMapped(
            PhysFrame::containing_address(f.start_address()),
        ),
    }
}

impl Machine for X86Machine {
    fn map_user_region(&mut self, region: PhysAddr) {
        for index in 0..USER_REGION_SIZE / Size2MiB::SIZE {
            let page = user_page(index);
            match self.mapper.unmap(page) {
                Ok((_, flush)) => flush.ignore(),
                Err(UnmapError::PageNotMapped) => {}
                Err(err) => kerror!("paging: unmap user slot: {:?}", err),
            }
            let frame = PhysFrame::<Size2MiB>::containing_address(region + index * Size2MiB::SIZE);
            match unsafe { self.mapper.map_to(page, frame, USER_FLAGS, &mut NoFrames) } {
                Ok(flush) => flush.ignore(),
                Err(err) => kerror!("paging: map user slot -> {:#x}: {:?}", region.as_u64(), err),
            }
        }
    }

    fn map_video_slot(&mut self, page: PhysAddr) {
        self.remap_small(VIDEO_SLOT, Some(page), KERNEL_FLAGS);
    }

    fn map_user_video(&mut self, page: Option<PhysAddr>) {
        self.remap_small(USER_VIDEO, page, USER_FLAGS);
    }

    fn flush_tlb(&mut self) {
        tlb::flush_all();
    }

    fn user_memory(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(USER_BASE as *mut u8, USER_REGION_SIZE as usize) }
    }

    fn video_page(&mut self, page: PhysAddr) -> &mut [u8] {
        let virt = self.phys_offset + page.as_u64();
        unsafe { core::slice::from_raw_parts_mut(virt.as_mut_ptr::<u8>(), PAGE_SIZE as usize) }
    }

    fn set_kernel_stack(&mut self, pid: Pid) {
        arch::gdt::set_kernel_stack(arch::stack_top(pid));
    }

    fn set_cursor(&mut self, x: usize, y: usize) {
        let position = (y * crate::sys::vga::COLUMNS + x) as u16;
        unsafe {
            let mut index: Port<u8> = Port::new(CRTC_INDEX);
            let mut data: Port<u8> = Port::new(CRTC_DATA);
            index.write(0x0F);
            data.write((position & 0xFF) as u8);
            index.write(0x0E);
            data.write((position >> 8) as u8);
        }
    }
}
