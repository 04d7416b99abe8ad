//! frame — physical frames for the few page tables the kernel creates
//!
//! Hanya dipakai saat boot, untuk membangun table perantara di bawah user
//! slot dan user video page. Frame di dalam user region per PID tidak pernah
//! dibagikan.

use super::{covers, user_regions};
use bootloader::bootinfo::{MemoryMap, MemoryRegion, MemoryRegionType};
use x86_64::structures::paging::{FrameAllocator, PhysFrame, Size4KiB};
use x86_64::PhysAddr;

const FRAME_SIZE: u64 = 4096;

/// Apakah firmware melaporkan seluruh range user region sebagai RAM usable
pub fn user_regions_available(memory_map: &MemoryMap) -> bool {
    let usable = memory_map
        .iter()
        .filter(|r| r.region_type == MemoryRegionType::Usable)
        .map(|r| r.range.start_addr()..r.range.end_addr());
    covers(usable, user_regions())
}

/// Bump allocator over the usable regions of the bootloader's memory map.
pub struct BootFrameAllocator {
    memory_map:     &'static MemoryMap,
    next_region:    usize,
    current_region: Option<&'static MemoryRegion>,
    next_frame:     u64,
}

impl BootFrameAllocator {
    /// # Safety
    ///
    /// Every region the map marks `Usable` must really be unused.
    pub unsafe fn new(memory_map: &'static MemoryMap) -> Self {
        let mut allocator = Self {
            memory_map,
            next_region:    0,
            current_region: None,
            next_frame:     0,
        };
        allocator.advance_to_usable_region();
        allocator
    }

    fn advance_to_usable_region(&mut self) {
        while let Some(region) = self.memory_map.get(self.next_region) {
            self.next_region += 1;
            if region.region_type == MemoryRegionType::Usable {
                self.current_region = Some(region);
                self.next_frame = region.range.start_addr();
                return;
            }
        }
        self.current_region = None;
    }
}

unsafe impl FrameAllocator<Size4KiB> for BootFrameAllocator {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        let reserved = user_regions();
        loop {
            let region = self.current_region?;

            if self.next_frame < region.range.end_addr() {
                let frame_addr = self.next_frame;
                if reserved.contains(&frame_addr) {
                    self.next_frame = reserved.end;
                    continue;
                }
                self.next_frame += FRAME_SIZE;

                // frame 0 tidak pernah jadi page table
                if frame_addr == 0 {
                    continue;
                }
                return Some(PhysFrame::containing_address(PhysAddr::new(frame_addr)));
            }

            self.advance_to_usable_region();
        }
    }
}
