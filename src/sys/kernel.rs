//! kernel — the one object that owns every subsystem
//!
//! `Kernel` memegang machine, file system, arena PCB, tiga terminal dan state
//! address space. Siklus hidup proses ada di `proc::exec`, scheduler di
//! `proc::sched`; file ini berisi konstruksi, descriptor, akses memori user
//! dan input terminal.
//!
//! Tidak ada yang melompat di sini. Operasi yang mengakhiri alur kontrol saat
//! ini mengembalikan [`Transfer`](crate::sys::proc::Transfer) untuk layer arch.

use crate::config::{
    COPY_CHUNK, NUM_TERMINALS, PAGE_SIZE, TAB_WIDTH, USER_BASE, USER_VIDEO, VGA_PHYS,
};
use crate::sys::arch::context::Continuation;
use crate::sys::error::SysError;
use crate::sys::fd::{Handle, Io, Resource};
use crate::sys::fs::FileSystem;
use crate::sys::keyboard::KeyInput;
use crate::sys::mem::{backing_page, in_user_slot, AddressSpace, Machine};
use crate::sys::proc::{Pid, ProcessTable, ResumePoint};
use crate::sys::terminal::{Cursor, Terminal};
use crate::sys::vga::Screen;
use x86_64::PhysAddr;

pub struct Kernel<M: Machine, F: FileSystem> {
    pub(crate) machine:   M,
    pub(crate) fs:        F,
    pub(crate) procs:     ProcessTable,
    pub(crate) terminals: [Terminal; NUM_TERMINALS],
    /// Terminal yang proses foreground-nya memegang CPU
    pub(crate) scheduled: usize,
    /// Terminal yang tampil di layar fisik
    pub(crate) visible:   usize,
    pub(crate) space:     AddressSpace,
}

impl<M: Machine, F: FileSystem> Kernel<M, F> {
    /// State awal: belum ada proses, terminal 0 dijadwalkan dan tampil,
    /// semua video page kosong.
    pub fn new(mut machine: M, fs: F) -> Self {
        let space = AddressSpace::new(&mut machine);
        let mut kernel = Self {
            machine,
            fs,
            procs:     ProcessTable::new(),
            terminals: core::array::from_fn(|_| Terminal::new()),
            scheduled: 0,
            visible:   0,
            space,
        };

        kernel.blank_page(PhysAddr::new(VGA_PHYS));
        for terminal in 0..NUM_TERMINALS {
            kernel.blank_page(backing_page(terminal));
        }
        kernel.machine.set_cursor(0, 0);
        kernel
    }

    fn blank_page(&mut self, page: PhysAddr) {
        let mut cursor = Cursor::default();
        Screen::new(self.machine.video_page(page), &mut cursor).clear();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn machine(&self) -> &M { &self.machine }

    pub fn machine_mut(&mut self) -> &mut M { &mut self.machine }

    pub fn fs(&self) -> &F { &self.fs }

    pub fn processes(&self) -> &ProcessTable { &self.procs }

    pub fn terminal(&self, index: usize) -> &Terminal { &self.terminals[index] }

    pub fn scheduled_terminal(&self) -> usize { self.scheduled }

    pub fn visible_terminal(&self) -> usize { self.visible }

    pub fn address_space(&self) -> &AddressSpace { &self.space }

    /// Proses yang memegang CPU: foreground terminal yang dijadwalkan
    pub fn current(&self) -> Option<Pid> {
        self.terminals[self.scheduled].foreground()
    }

    /// Tempat salah satu konteks kernel `pid` yang disimpan. Layer arch
    /// menulis lewat sini selama proses tertunda.
    pub fn resume_point_mut(&mut self, pid: Pid, kind: ResumePoint) -> Option<&mut Continuation> {
        self.procs.get_mut(pid).map(|pcb| pcb.resume_point_mut(kind))
    }

    // -----------------------------------------------------------------------
    // Descriptors
    // -----------------------------------------------------------------------

    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize, SysError> {
        let pid = self.current().ok_or(SysError::BadDescriptor)?;
        let pcb = self.procs.get_mut(pid).ok_or(SysError::BadDescriptor)?;
        let handle = pcb.handles.get_mut(fd)?;
        let mut io = Io {
            fs:       &self.fs,
            terminal: &mut self.terminals[self.scheduled],
            video:    self.machine.video_page(self.space.video()),
        };
        handle.read(&mut io, buf)
    }

    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize, SysError> {
        let pid = self.current().ok_or(SysError::BadDescriptor)?;
        let pcb = self.procs.get_mut(pid).ok_or(SysError::BadDescriptor)?;
        let handle = pcb.handles.get_mut(fd)?;
        let mut io = Io {
            fs:       &self.fs,
            terminal: &mut self.terminals[self.scheduled],
            video:    self.machine.video_page(self.space.video()),
        };
        let written = handle.write(&mut io, buf)?;

        if handle.resource == Resource::Stdout && self.scheduled == self.visible {
            let cursor = self.terminals[self.scheduled].cursor;
            self.machine.set_cursor(cursor.x, cursor.y);
        }
        Ok(written)
    }

    /// Buka `name` di slot bebas terkecil mulai dari 2.
    pub fn open(&mut self, name: &[u8]) -> Result<usize, SysError> {
        let pid = self.current().ok_or(SysError::BadDescriptor)?;
        let dentry = self.fs.resolve_by_name(name).ok_or(SysError::NotFound)?;
        let pcb = self.procs.get_mut(pid).ok_or(SysError::BadDescriptor)?;
        let fd = pcb.handles.free_slot().ok_or(SysError::TooManyOpenFiles)?;

        let mut handle = Handle::new(Resource::for_kind(dentry.kind), dentry.inode);
        let mut io = Io {
            fs:       &self.fs,
            terminal: &mut self.terminals[self.scheduled],
            video:    self.machine.video_page(self.space.video()),
        };
        handle.open(&mut io)?;
        pcb.handles.install(fd, handle);
        ktrace!("open: pid {} fd {} -> {:?}", pid, fd, handle.resource);
        Ok(fd)
    }

    /// Tutup descriptor user. stdin dan stdout tetap terbuka sampai `halt`.
    pub fn close(&mut self, fd: usize) -> Result<(), SysError> {
        if fd < 2 {
            return Err(SysError::BadDescriptor);
        }
        let pid = self.current().ok_or(SysError::BadDescriptor)?;
        let pcb = self.procs.get_mut(pid).ok_or(SysError::BadDescriptor)?;
        let handle = pcb.handles.get_mut(fd)?;
        let mut io = Io {
            fs:       &self.fs,
            terminal: &mut self.terminals[self.scheduled],
            video:    self.machine.video_page(self.space.video()),
        };
        handle.close(&mut io)?;
        pcb.handles.take(fd);
        Ok(())
    }

    /// Tutup semua descriptor `pid`, termasuk stdio.
    pub(crate) fn close_all(&mut self, pid: Pid) {
        let Some(pcb) = self.procs.get_mut(pid) else { return };
        let terminal = pcb.terminal;
        for fd in 0..crate::config::MAX_HANDLES {
            let Some(mut handle) = pcb.handles.take(fd) else { continue };
            let mut io = Io {
                fs:       &self.fs,
                terminal: &mut self.terminals[terminal],
                video:    self.machine.video_page(self.space.video()),
            };
            if let Err(err) = handle.close(&mut io) {
                kwarn!("halt: pid {} fd {} close failed: {}", pid, fd, err);
            }
        }
    }

    /// Salin string argumen caller beserta NUL-nya ke `out`, dipotong ke
    /// `out.len()` seperti `strncpy`. Mengembalikan jumlah byte yang disalin.
    pub fn get_arguments(&self, out: &mut [u8]) -> Result<usize, SysError> {
        let pid = self.current().ok_or(SysError::NoArguments)?;
        let args = self.procs.get(pid).ok_or(SysError::NoArguments)?.args();
        if args.is_empty() {
            return Err(SysError::NoArguments);
        }
        let n = args.len().min(out.len());
        out[..n].copy_from_slice(&args[..n]);
        if let Some(nul) = out.get_mut(args.len()) {
            *nul = 0;
            return Ok(args.len() + 1);
        }
        Ok(n)
    }

    /// Beri caller user video page dan tulis alamatnya ke `dest`.
    pub fn map_video_memory(&mut self, dest: u64) -> Result<(), SysError> {
        if !in_user_slot(dest, 4) {
            return Err(SysError::BadAddress);
        }
        let pid = self.current().ok_or(SysError::BadAddress)?;
        let pcb = self.procs.get_mut(pid).ok_or(SysError::BadAddress)?;
        pcb.set_video_mapped(true);
        self.space.set_user_video(&mut self.machine, true);
        self.copy_to_user(dest, &(USER_VIDEO as u32).to_le_bytes())
    }

    // -----------------------------------------------------------------------
    // User memory
    // -----------------------------------------------------------------------

    fn user_range(&mut self, addr: u64, len: usize) -> Result<&mut [u8], SysError> {
        if addr == 0 || !in_user_slot(addr, len) || self.space.user().is_none() {
            return Err(SysError::BadAddress);
        }
        let start = (addr - USER_BASE) as usize;
        Ok(&mut self.machine.user_memory()[start..start + len])
    }

    pub fn copy_from_user(&mut self, addr: u64, out: &mut [u8]) -> Result<(), SysError> {
        let src = self.user_range(addr, out.len())?;
        out.copy_from_slice(src);
        Ok(())
    }

    pub fn copy_to_user(&mut self, addr: u64, data: &[u8]) -> Result<(), SysError> {
        let dst = self.user_range(addr, data.len())?;
        dst.copy_from_slice(data);
        Ok(())
    }

    /// Salin string user ber-NUL ke `out`, tanpa NUL-nya. String yang lebih
    /// panjang dari `out` dipotong; ujung user slot juga mengakhiri string.
    pub fn copy_string_from_user(&mut self, addr: u64, out: &mut [u8]) -> Result<usize, SysError> {
        if addr == 0 || !in_user_slot(addr, 1) {
            return Err(SysError::BadAddress);
        }
        let available = (USER_BASE + crate::config::USER_REGION_SIZE - addr) as usize;
        let src = self.user_range(addr, available.min(out.len()))?;
        let len = src.iter().position(|&b| b == 0).unwrap_or(src.len());
        out[..len].copy_from_slice(&src[..len]);
        Ok(len)
    }

    // -----------------------------------------------------------------------
    // Terminal input and display
    // -----------------------------------------------------------------------

    /// Satu ketukan untuk terminal yang tampil: edit line-nya lalu echo.
    pub fn key_input(&mut self, key: KeyInput) {
        if let KeyInput::SwitchTerminal(index) = key {
            self.switch_screen(index);
            return;
        }

        let terminal = &mut self.terminals[self.visible];
        let page = self.machine.video_page(PhysAddr::new(VGA_PHYS));
        let mut screen = Screen::new(page, &mut terminal.cursor);
        match key {
            KeyInput::Char(byte) => {
                if terminal.input.push(byte) {
                    screen.put(byte);
                }
            }
            KeyInput::Enter => {
                if terminal.input.submit() {
                    screen.put(b'\n');
                }
            }
            KeyInput::Backspace => {
                if terminal.input.backspace() {
                    screen.put(0x08);
                }
            }
            KeyInput::Tab => {
                for _ in 0..TAB_WIDTH {
                    if terminal.input.push(b' ') {
                        screen.put(b' ');
                    }
                }
            }
            KeyInput::ClearScreen => screen.clear(),
            KeyInput::SwitchTerminal(_) => {}
        }

        let cursor = self.terminals[self.visible].cursor;
        self.machine.set_cursor(cursor.x, cursor.y);
    }

    /// Satu interrupt RTC fisik, diteruskan ke semua virtual RTC.
    pub fn rtc_tick(&mut self) {
        for terminal in &mut self.terminals {
            terminal.rtc.tick();
        }
    }

    /// Tampilkan terminal `index` di layar fisik.
    ///
    /// Isi layar dipindah lewat backing page; setelah itu video slot di-remap
    /// untuk terminal yang sedang dijadwalkan, karena page-nya bisa berpindah
    /// antara VGA dan backing.
    pub fn switch_screen(&mut self, index: usize) {
        if index >= NUM_TERMINALS || index == self.visible {
            return;
        }
        let vga = PhysAddr::new(VGA_PHYS);
        self.copy_page(vga, backing_page(self.visible));
        self.copy_page(backing_page(index), vga);
        self.visible = index;

        let cursor = self.terminals[index].cursor;
        self.machine.set_cursor(cursor.x, cursor.y);
        self.space.map_video(&mut self.machine, self.scheduled, self.visible);
        klog!("tty{} on screen", index);
    }

    fn copy_page(&mut self, from: PhysAddr, to: PhysAddr) {
        let mut chunk = [0u8; COPY_CHUNK];
        for start in (0..PAGE_SIZE as usize).step_by(COPY_CHUNK) {
            let end = start + COPY_CHUNK;
            chunk.copy_from_slice(&self.machine.video_page(from)[start..end]);
            self.machine.video_page(to)[start..end].copy_from_slice(&chunk);
        }
    }
}
