//! fs — read-only file-system collaborator
//!
//! Core kernel hanya butuh lookup lewat nama atau indeks dan read per range
//! byte; [`bootfs::BootFs`] menyediakannya di atas boot image.

pub mod bootfs;

use crate::config::FILENAME_SIZE;
use crate::sys::error::SysError;

pub use bootfs::BootFs;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// The RTC device file
    Device,
    Directory,
    Regular,
}

impl FileKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Device),
            1 => Some(Self::Directory),
            2 => Some(Self::Regular),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dentry {
    pub name:  [u8; FILENAME_SIZE],
    pub kind:  FileKind,
    pub inode: u32,
}

impl Dentry {
    /// Nama tanpa NUL di belakang (nama selebar penuh tidak punya NUL)
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(FILENAME_SIZE);
        &self.name[..len]
    }
}

pub trait FileSystem {
    /// Lookup nama persis; nama yang lebih panjang dari dentry tidak pernah cocok.
    fn resolve_by_name(&self, name: &[u8]) -> Option<Dentry>;
    /// The `index`-th directory entry, `None` past the end.
    fn resolve_by_index(&self, index: usize) -> Option<Dentry>;
    /// Salin byte file mulai dari `offset`. `Ok(0)` di akhir file atau lewat.
    fn read_content(&self, inode: u32, offset: usize, buf: &mut [u8]) -> Result<usize, SysError>;
    fn content_length(&self, inode: u32) -> Option<usize>;
}
