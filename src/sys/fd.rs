//! fd — per-process handle table and the backends behind it
//!
//! Slot 0 = stdin dan slot 1 = stdout sejak PCB dibuat; `open` mengisi slot
//! 2..8. Tiap handle menyebut backend-nya lewat [`Resource`]; semua backend
//! berbagi satu tabel kemampuan, bukan function pointer per handle.

use crate::config::{FILENAME_SIZE, FIRST_FREE_HANDLE, MAX_HANDLES};
use crate::sys::error::SysError;
use crate::sys::fs::{FileKind, FileSystem};
use crate::sys::terminal::Terminal;
use crate::sys::vga::Screen;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Stdin,
    Stdout,
    Rtc,
    Directory,
    File,
}

impl Resource {
    pub fn for_kind(kind: FileKind) -> Self {
        match kind {
            FileKind::Device    => Self::Rtc,
            FileKind::Directory => Self::Directory,
            FileKind::Regular   => Self::File,
        }
    }

    pub fn readable(self) -> bool {
        !matches!(self, Self::Stdout)
    }

    pub fn writable(self) -> bool {
        matches!(self, Self::Stdout | Self::Rtc)
    }
}

/// Yang boleh disentuh backend selama melayani satu panggilan: file system,
/// terminal milik caller, dan page tempat terminal itu sedang menggambar.
pub struct Io<'a> {
    pub fs:       &'a dyn FileSystem,
    pub terminal: &'a mut Terminal,
    pub video:    &'a mut [u8],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handle {
    pub resource: Resource,
    pub inode:    u32,
    /// Offset byte untuk file, indeks entry untuk direktori
    pub position: usize,
}

impl Handle {
    pub const fn new(resource: Resource, inode: u32) -> Self {
        Self { resource, inode, position: 0 }
    }

    pub fn open(&mut self, io: &mut Io) -> Result<(), SysError> {
        if self.resource == Resource::Rtc {
            io.terminal.rtc.reset();
        }
        Ok(())
    }

    pub fn close(&mut self, io: &mut Io) -> Result<(), SysError> {
        if self.resource == Resource::Rtc {
            io.terminal.rtc.reset();
        }
        Ok(())
    }

    pub fn read(&mut self, io: &mut Io, buf: &mut [u8]) -> Result<usize, SysError> {
        if !self.resource.readable() {
            return Err(SysError::Unsupported);
        }
        match self.resource {
            Resource::Stdin => io.terminal.input.take_line(buf).ok_or(SysError::WouldBlock),
            Resource::Rtc => {
                if io.terminal.rtc.poll() { Ok(0) } else { Err(SysError::WouldBlock) }
            }
            Resource::Directory => {
                let Some(dentry) = io.fs.resolve_by_index(self.position) else {
                    return Ok(0);
                };
                let name = dentry.name();
                let n = name.len().min(buf.len()).min(FILENAME_SIZE);
                buf[..n].copy_from_slice(&name[..n]);
                self.position += 1;
                Ok(n)
            }
            Resource::File => {
                let n = io.fs.read_content(self.inode, self.position, buf)?;
                self.position += n;
                Ok(n)
            }
            Resource::Stdout => Err(SysError::Unsupported),
        }
    }

    pub fn write(&mut self, io: &mut Io, buf: &[u8]) -> Result<usize, SysError> {
        if !self.resource.writable() {
            return Err(SysError::Unsupported);
        }
        match self.resource {
            Resource::Stdout => {
                let mut screen = Screen::new(io.video, &mut io.terminal.cursor);
                Ok(screen.write(buf))
            }
            Resource::Rtc => {
                let raw: [u8; 4] = buf
                    .get(..4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(SysError::InvalidArgument)?;
                let hz = i32::from_le_bytes(raw);
                let hz = u32::try_from(hz).map_err(|_| SysError::InvalidArgument)?;
                io.terminal.rtc.set_frequency(hz)?;
                Ok(0)
            }
            _ => Err(SysError::Unsupported),
        }
    }
}

// ---------------------------------------------------------------------------
// HandleTable
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct HandleTable {
    slots: [Option<Handle>; MAX_HANDLES],
}

impl HandleTable {
    /// All slots closed
    pub const fn new() -> Self {
        Self { slots: [None; MAX_HANDLES] }
    }

    pub fn with_stdio() -> Self {
        let mut table = Self::new();
        table.slots[0] = Some(Handle::new(Resource::Stdin, 0));
        table.slots[1] = Some(Handle::new(Resource::Stdout, 0));
        table
    }

    pub fn is_open(&self, fd: usize) -> bool {
        matches!(self.slots.get(fd), Some(Some(_)))
    }

    pub fn get_mut(&mut self, fd: usize) -> Result<&mut Handle, SysError> {
        self.slots.get_mut(fd).and_then(Option::as_mut).ok_or(SysError::BadDescriptor)
    }

    /// Slot tertutup pertama setelah pasangan stdio.
    pub fn free_slot(&self) -> Option<usize> {
        (FIRST_FREE_HANDLE..MAX_HANDLES).find(|&fd| self.slots[fd].is_none())
    }

    pub fn install(&mut self, fd: usize, handle: Handle) {
        debug_assert!(self.slots[fd].is_none());
        self.slots[fd] = Some(handle);
    }

    pub fn take(&mut self, fd: usize) -> Option<Handle> {
        self.slots.get_mut(fd).and_then(Option::take)
    }

    /// Descriptors currently open, lowest first
    pub fn open_fds(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_HANDLES).filter(move |&fd| self.slots[fd].is_some())
    }
}

impl Default for HandleTable {
    fn default() -> Self { Self::new() }
}
