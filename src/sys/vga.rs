//! vga — text rendering into an 80x25 video page
//!
//! Bekerja di page mana saja (buffer VGA atau backing page terminal); page
//! mana yang dipakai urusan caller.

use crate::sys::terminal::Cursor;

pub const COLUMNS: usize = 80;
pub const ROWS:    usize = 25;
/// Light grey on black
const ATTRIBUTE: u8 = 0x07;
const BACKSPACE: u8 = 0x08;

/// Bytes occupied by one screen
pub const SCREEN_BYTES: usize = COLUMNS * ROWS * 2;

pub struct Screen<'a> {
    page:   &'a mut [u8],
    cursor: &'a mut Cursor,
}

impl<'a> Screen<'a> {
    pub fn new(page: &'a mut [u8], cursor: &'a mut Cursor) -> Self {
        debug_assert!(page.len() >= SCREEN_BYTES);
        Self { page, cursor }
    }

    /// Render `bytes`, NUL dilewati. Mengembalikan jumlah yang digambar.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let mut drawn = 0;
        for &byte in bytes.iter().filter(|&&b| b != 0) {
            self.put(byte);
            drawn += 1;
        }
        drawn
    }

    pub fn put(&mut self, byte: u8) {
        match byte {
            b'\n' => self.newline(),
            BACKSPACE => self.erase(),
            _ => {
                let (x, y) = (self.cursor.x, self.cursor.y);
                self.set_cell(x, y, byte);
                self.cursor.x += 1;
                if self.cursor.x == COLUMNS {
                    self.newline();
                }
            }
        }
    }

    /// Kosongkan page dan kembalikan cursor ke pojok kiri atas.
    pub fn clear(&mut self) {
        for y in 0..ROWS {
            self.clear_row(y);
        }
        *self.cursor = Cursor::default();
    }

    fn newline(&mut self) {
        self.cursor.x = 0;
        if self.cursor.y + 1 < ROWS {
            self.cursor.y += 1;
        } else {
            self.scroll();
        }
    }

    fn erase(&mut self) {
        if self.cursor.x > 0 {
            self.cursor.x -= 1;
        } else if self.cursor.y > 0 {
            self.cursor.y -= 1;
            self.cursor.x = COLUMNS - 1;
        } else {
            return;
        }
        let (x, y) = (self.cursor.x, self.cursor.y);
        self.set_cell(x, y, b' ');
    }

    fn scroll(&mut self) {
        let row = COLUMNS * 2;
        self.page.copy_within(row..SCREEN_BYTES, 0);
        self.clear_row(ROWS - 1);
    }

    fn clear_row(&mut self, y: usize) {
        for x in 0..COLUMNS {
            self.set_cell(x, y, b' ');
        }
    }

    fn set_cell(&mut self, x: usize, y: usize, byte: u8) {
        let at = (y * COLUMNS + x) * 2;
        self.page[at] = byte;
        self.page[at + 1] = ATTRIBUTE;
    }
}
