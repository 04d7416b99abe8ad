//! sim — host stand-ins for the hardware, used by the tests
//!
//! `SimMachine` keeps physical memory in plain vectors and models the three
//! remappable translations, including the rule that nothing may touch the
//! user slot between a remap and the next flush.

use crate::config::{
    KERNEL_END, MAX_PROCS, NUM_TERMINALS, PAGE_SIZE, USER_REGION_SIZE, VGA_PHYS,
};
use crate::sys::fs::bootfs::{BLOCK_SIZE, DENTRY_SIZE};
use crate::sys::fs::BootFs;
use crate::sys::mem::Machine;
use crate::sys::proc::Pid;
use crate::sys::vga::COLUMNS;
use x86_64::PhysAddr;

pub struct SimMachine {
    regions:      Vec<Option<Vec<u8>>>,
    pages:        Vec<Vec<u8>>,
    user_slot:    Option<PhysAddr>,
    video_slot:   PhysAddr,
    user_video:   Option<PhysAddr>,
    stale:        bool,
    flushes:      usize,
    kernel_stack: Option<Pid>,
    cursor:       (usize, usize),
}

impl SimMachine {
    pub fn new() -> Self {
        Self {
            regions:      vec![None; MAX_PROCS],
            pages:        vec![vec![0; PAGE_SIZE as usize]; 1 + NUM_TERMINALS],
            user_slot:    None,
            video_slot:   PhysAddr::new(VGA_PHYS),
            user_video:   None,
            stale:        false,
            flushes:      0,
            kernel_stack: None,
            cursor:       (0, 0),
        }
    }

    pub fn is_stale(&self) -> bool { self.stale }
    pub fn flushes(&self) -> usize { self.flushes }
    pub fn user_slot(&self) -> Option<PhysAddr> { self.user_slot }
    pub fn video_slot(&self) -> PhysAddr { self.video_slot }
    pub fn user_video(&self) -> Option<PhysAddr> { self.user_video }
    pub fn kernel_stack(&self) -> Option<Pid> { self.kernel_stack }
    pub fn cursor(&self) -> (usize, usize) { self.cursor }

    /// Read-only view of a video page
    pub fn page(&self, page: PhysAddr) -> &[u8] {
        &self.pages[page_index(page)]
    }

    /// Characters of one text row of `page`, trailing blanks removed
    pub fn row_text(&self, page: PhysAddr, row: usize) -> String {
        let bytes = &self.page(page)[row * COLUMNS * 2..(row + 1) * COLUMNS * 2];
        let text: String = bytes.iter().step_by(2).map(|&b| b as char).collect();
        text.trim_end_matches([' ', '\0']).to_string()
    }

    /// Physical region of `pid`, allocated on first use
    pub fn region(&mut self, pid: Pid) -> &mut [u8] {
        self.regions[pid.index()].get_or_insert_with(|| vec![0; USER_REGION_SIZE as usize])
    }
}

fn page_index(page: PhysAddr) -> usize {
    let offset = page.as_u64().checked_sub(VGA_PHYS).expect("page below VGA");
    let index = (offset / PAGE_SIZE) as usize;
    assert!(index <= NUM_TERMINALS, "no video page at {:#x}", page.as_u64());
    index
}

impl Default for SimMachine {
    fn default() -> Self { Self::new() }
}

impl Machine for SimMachine {
    fn map_user_region(&mut self, region: PhysAddr) {
        self.user_slot = Some(region);
        self.stale = true;
    }

    fn map_video_slot(&mut self, page: PhysAddr) {
        self.video_slot = page;
        self.stale = true;
    }

    fn map_user_video(&mut self, page: Option<PhysAddr>) {
        self.user_video = page;
        self.stale = true;
    }

    fn flush_tlb(&mut self) {
        self.stale = false;
        self.flushes += 1;
    }

    fn user_memory(&mut self) -> &mut [u8] {
        assert!(!self.stale, "user slot touched before TLB flush");
        let region = self.user_slot.expect("user slot unmapped");
        let index = ((region.as_u64() - KERNEL_END) / USER_REGION_SIZE) as usize;
        self.regions[index].get_or_insert_with(|| vec![0; USER_REGION_SIZE as usize])
    }

    fn video_page(&mut self, page: PhysAddr) -> &mut [u8] {
        &mut self.pages[page_index(page)]
    }

    fn set_kernel_stack(&mut self, pid: Pid) {
        self.kernel_stack = Some(pid);
    }

    fn set_cursor(&mut self, x: usize, y: usize) {
        self.cursor = (x, y);
    }
}

// ---------------------------------------------------------------------------
// ImageBuilder — boot file system images for tests
// ---------------------------------------------------------------------------

enum Entry {
    Directory(String),
    Device(String),
    File(String, Vec<u8>),
}

#[derive(Default)]
pub struct ImageBuilder {
    entries: Vec<Entry>,
}

/// Minimal little-endian ELF32 executable header followed by `body`
pub fn elf_image(entry: u32, body: &[u8]) -> Vec<u8> {
    let mut image = vec![0u8; 52];
    image[..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
    image[4] = 1; // ELFCLASS32
    image[5] = 1; // little endian
    image[6] = 1; // EV_CURRENT
    image[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    image[18..20].copy_from_slice(&3u16.to_le_bytes()); // EM_386
    image[20..24].copy_from_slice(&1u32.to_le_bytes());
    image[24..28].copy_from_slice(&entry.to_le_bytes());
    image[40..42].copy_from_slice(&52u16.to_le_bytes());
    image.extend_from_slice(body);
    image
}

impl ImageBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn directory(mut self, name: &str) -> Self {
        self.entries.push(Entry::Directory(name.into()));
        self
    }

    pub fn device(mut self, name: &str) -> Self {
        self.entries.push(Entry::Device(name.into()));
        self
    }

    pub fn file(mut self, name: &str, content: &[u8]) -> Self {
        self.entries.push(Entry::File(name.into(), content.to_vec()));
        self
    }

    pub fn program(self, name: &str, entry: u32) -> Self {
        let body = name.as_bytes().to_vec();
        self.file(name, &elf_image(entry, &body))
    }

    /// Lay the image out and leak it for the `'static` reader.
    pub fn build(self) -> BootFs<'static> {
        let files: Vec<&Vec<u8>> = self
            .entries
            .iter()
            .filter_map(|e| match e {
                Entry::File(_, content) => Some(content),
                _ => None,
            })
            .collect();
        let num_inodes = files.len();
        let num_blocks: usize = files.iter().map(|c| c.len().div_ceil(BLOCK_SIZE)).sum();

        let mut image = vec![0u8; (1 + num_inodes + num_blocks) * BLOCK_SIZE];
        put_u32(&mut image, 0, self.entries.len());
        put_u32(&mut image, 4, num_inodes);
        put_u32(&mut image, 8, num_blocks);

        let mut next_inode = 0;
        let mut next_block = 0;
        for (i, entry) in self.entries.iter().enumerate() {
            let at = 64 + i * DENTRY_SIZE;
            let (name, kind, inode) = match entry {
                Entry::Directory(name) => (name, 1, 0),
                Entry::Device(name) => (name, 0, 0),
                Entry::File(name, content) => {
                    let inode = next_inode;
                    next_inode += 1;
                    let base = (1 + inode) * BLOCK_SIZE;
                    put_u32(&mut image, base, content.len());
                    for (slot, chunk) in content.chunks(BLOCK_SIZE).enumerate() {
                        put_u32(&mut image, base + 4 + slot * 4, next_block);
                        let data = (1 + num_inodes + next_block) * BLOCK_SIZE;
                        image[data..data + chunk.len()].copy_from_slice(chunk);
                        next_block += 1;
                    }
                    (name, 2, inode)
                }
            };
            image[at..at + name.len()].copy_from_slice(name.as_bytes());
            put_u32(&mut image, at + 32, kind);
            put_u32(&mut image, at + 36, inode);
        }

        let image: &'static [u8] = Box::leak(image.into_boxed_slice());
        BootFs::new(image).expect("builder produced a valid image")
    }
}

fn put_u32(image: &mut [u8], at: usize, value: usize) {
    image[at..at + 4].copy_from_slice(&(value as u32).to_le_bytes());
}

/// The file set most kernel tests run against
pub fn standard_fs() -> BootFs<'static> {
    ImageBuilder::new()
        .directory(".")
        .device("rtc")
        .program("shell", 0x0804_8100)
        .program("ls", 0x0804_8200)
        .program("counter", 0x0804_8300)
        .program("testprint", 0x0804_8400)
        .file("frame0.txt", b"/\\/\\/\\ fish\n")
        .file("notes", b"not a program")
        .file("stub", &[0x7F, b'E', b'L', b'F'])
        .build()
}
