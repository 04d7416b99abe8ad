//! bootfs — reader for the boot file system image
//!
//! Layout image, blok 4 KiB, semua integer little endian:
//!
//!   block 0         boot block: dir count, inode count, data block count,
//!                   52 reserved bytes, then 63 dentries of 64 bytes
//!                   (name[32], type u32, inode u32, 24 reserved)
//!   blocks 1..=N    inodes: length u32, then up to 1023 data block indices
//!   blocks N+1..    data blocks
//!
//! Reader tidak pernah menyalin image; setiap lookup di-decode di tempat.

use super::{Dentry, FileKind, FileSystem};
use crate::config::FILENAME_SIZE;
use crate::sys::error::SysError;

pub const BLOCK_SIZE:  usize = 4096;
pub const DENTRY_SIZE: usize = 64;
pub const MAX_DENTRIES: usize = 63;
const DENTRY_BASE:     usize = 64;
const BLOCKS_PER_INODE: usize = BLOCK_SIZE / 4 - 1;

#[derive(Clone, Copy)]
pub struct BootFs<'a> {
    image: &'a [u8],
}

impl<'a> BootFs<'a> {
    /// Cek jumlah di header terhadap ukuran image.
    pub fn new(image: &'a [u8]) -> Result<Self, SysError> {
        if image.len() < BLOCK_SIZE {
            return Err(SysError::Io);
        }
        let fs = Self { image };
        let blocks = 1 + fs.num_inodes() + fs.num_data_blocks();
        if fs.num_dentries() > MAX_DENTRIES || image.len() < blocks * BLOCK_SIZE {
            return Err(SysError::Io);
        }
        Ok(fs)
    }

    /// File system tanpa entry sama sekali.
    pub const fn empty() -> BootFs<'static> {
        BootFs { image: &[] }
    }

    fn word(&self, at: usize) -> usize {
        match self.image.get(at..at + 4) {
            Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize,
            None => 0,
        }
    }

    pub fn num_dentries(&self) -> usize { self.word(0) }

    pub fn num_inodes(&self) -> usize { self.word(4) }

    pub fn num_data_blocks(&self) -> usize { self.word(8) }

    fn dentry(&self, index: usize) -> Option<Dentry> {
        if index >= self.num_dentries().min(MAX_DENTRIES) {
            return None;
        }
        let at = DENTRY_BASE + index * DENTRY_SIZE;
        let raw = self.image.get(at..at + DENTRY_SIZE)?;

        let mut name = [0u8; FILENAME_SIZE];
        name.copy_from_slice(&raw[..FILENAME_SIZE]);
        let kind = FileKind::from_raw(self.word(at + FILENAME_SIZE) as u32)?;
        let inode = self.word(at + FILENAME_SIZE + 4) as u32;
        Some(Dentry { name, kind, inode })
    }

    fn inode_base(&self, inode: u32) -> Option<usize> {
        let inode = inode as usize;
        (inode < self.num_inodes()).then(|| (inode + 1) * BLOCK_SIZE)
    }

    fn data_block(&self, index: usize) -> Option<&'a [u8]> {
        if index >= self.num_data_blocks() {
            return None;
        }
        let at = (1 + self.num_inodes() + index) * BLOCK_SIZE;
        self.image.get(at..at + BLOCK_SIZE)
    }
}

impl FileSystem for BootFs<'_> {
    fn resolve_by_name(&self, name: &[u8]) -> Option<Dentry> {
        if name.is_empty() || name.len() > FILENAME_SIZE {
            return None;
        }
        (0..self.num_dentries()).filter_map(|i| self.dentry(i)).find(|d| d.name() == name)
    }

    fn resolve_by_index(&self, index: usize) -> Option<Dentry> {
        self.dentry(index)
    }

    fn read_content(&self, inode: u32, offset: usize, buf: &mut [u8]) -> Result<usize, SysError> {
        let base = self.inode_base(inode).ok_or(SysError::Io)?;
        let length = self.word(base);
        if offset >= length {
            return Ok(0);
        }

        let wanted = buf.len().min(length - offset);
        let mut done = 0;
        while done < wanted {
            let pos = offset + done;
            let slot = pos / BLOCK_SIZE;
            if slot >= BLOCKS_PER_INODE {
                return Err(SysError::Io);
            }
            let block = self.data_block(self.word(base + 4 + slot * 4)).ok_or(SysError::Io)?;
            let start = pos % BLOCK_SIZE;
            let n = (BLOCK_SIZE - start).min(wanted - done);
            buf[done..done + n].copy_from_slice(&block[start..start + n]);
            done += n;
        }
        Ok(done)
    }

    fn content_length(&self, inode: u32) -> Option<usize> {
        self.inode_base(inode).map(|base| self.word(base))
    }
}
