//! terminal — per-terminal state
//!
//! Tiap terminal punya line buffer, cursor teks, virtual RTC dan PID proses
//! foreground-nya sendiri.

use crate::config::{LINE_SIZE, RTC_BASE_HZ, RTC_DEFAULT_HZ};
use crate::sys::error::SysError;
use crate::sys::proc::Pid;

// ---------------------------------------------------------------------------
// LineBuffer — cooked keyboard input
// ---------------------------------------------------------------------------

/// Ketukan terkumpul di sini sampai Enter; line yang selesai (dengan `\n`)
/// menunggu satu read stdin. Ketukan yang datang selama line menunggu
/// dibuang.
#[derive(Clone, Debug)]
pub struct LineBuffer {
    buf:   [u8; LINE_SIZE],
    len:   usize,
    ready: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self { buf: [0; LINE_SIZE], len: 0, ready: false }
    }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn is_ready(&self) -> bool { self.ready }

    /// Tambah satu byte printable. Satu slot selalu disisakan untuk `\n`.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.ready || self.len >= LINE_SIZE - 1 {
            return false;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.ready || self.len == 0 {
            return false;
        }
        self.len -= 1;
        true
    }

    /// Tutup line dengan `\n` dan tandai siap.
    pub fn submit(&mut self) -> bool {
        if self.ready {
            return false;
        }
        self.buf[self.len] = b'\n';
        self.len += 1;
        self.ready = true;
        true
    }

    /// Serahkan line yang siap ke pembaca, `None` selama masih diketik.
    /// `out` yang pendek memotong dan sisa line dibuang. `out` kosong tidak
    /// mengambil apa-apa.
    pub fn take_line(&mut self, out: &mut [u8]) -> Option<usize> {
        if out.is_empty() {
            return Some(0);
        }
        if !self.ready {
            return None;
        }
        let n = out.len().min(self.len);
        out[..n].copy_from_slice(&self.buf[..n]);
        self.clear();
        Some(n)
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.ready = false;
    }
}

impl Default for LineBuffer {
    fn default() -> Self { Self::new() }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub x: usize,
    pub y: usize,
}

// ---------------------------------------------------------------------------
// VirtualRtc — per-terminal rate divider over the 1024 Hz RTC
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct VirtualRtc {
    frequency: u32,
    counter:   u32,
    pending:   bool,
    armed:     bool,
}

impl VirtualRtc {
    pub const fn new() -> Self {
        Self { frequency: RTC_DEFAULT_HZ, counter: 0, pending: false, armed: false }
    }

    pub fn frequency(&self) -> u32 { self.frequency }

    /// Kembali ke rate default tanpa tick tertunda.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Terima pangkat dua dari 2 Hz sampai rate fisik.
    pub fn set_frequency(&mut self, hz: u32) -> Result<(), SysError> {
        if !hz.is_power_of_two() || !(2..=RTC_BASE_HZ).contains(&hz) {
            return Err(SysError::InvalidArgument);
        }
        self.frequency = hz;
        self.counter = 0;
        Ok(())
    }

    /// One physical RTC interrupt.
    pub fn tick(&mut self) {
        self.counter += 1;
        if self.counter >= RTC_BASE_HZ / self.frequency {
            self.counter = 0;
            self.pending = true;
        }
    }

    /// Sisi pembaca: panggilan pertama hanya arm dan tidak melapor apa-apa;
    /// panggilan berikutnya `true` kalau sudah ada tick virtual sejak arm.
    pub fn poll(&mut self) -> bool {
        if !self.armed {
            self.armed = true;
            self.pending = false;
            return false;
        }
        if self.pending {
            self.armed = false;
            self.pending = false;
            return true;
        }
        false
    }
}

impl Default for VirtualRtc {
    fn default() -> Self { Self::new() }
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct Terminal {
    pub input:  LineBuffer,
    pub cursor: Cursor,
    pub rtc:    VirtualRtc,
    foreground: Option<Pid>,
}

impl Terminal {
    pub const fn new() -> Self {
        Self {
            input:      LineBuffer::new(),
            cursor:     Cursor { x: 0, y: 0 },
            rtc:        VirtualRtc::new(),
            foreground: None,
        }
    }

    /// Proses yang saat ini memiliki input dan layar terminal ini
    pub fn foreground(&self) -> Option<Pid> { self.foreground }

    pub(crate) fn set_foreground(&mut self, pid: Option<Pid>) {
        self.foreground = pid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_waits_for_enter() {
        let mut line = LineBuffer::new();
        for &b in b"ls" {
            assert!(line.push(b));
        }
        let mut out = [0u8; 16];
        assert_eq!(line.take_line(&mut out), None);

        assert!(line.submit());
        assert_eq!(line.take_line(&mut out), Some(3));
        assert_eq!(&out[..3], b"ls\n");
        assert!(line.is_empty());
        assert!(!line.is_ready());
    }

    #[test]
    fn keystrokes_dropped_while_line_waits() {
        let mut line = LineBuffer::new();
        line.push(b'a');
        line.submit();
        assert!(!line.push(b'b'));
        assert!(!line.backspace());

        let mut out = [0u8; 4];
        assert_eq!(line.take_line(&mut out), Some(2));
        assert_eq!(&out[..2], b"a\n");
    }

    #[test]
    fn full_line_keeps_room_for_newline() {
        let mut line = LineBuffer::new();
        let accepted = (0..LINE_SIZE + 5).filter(|_| line.push(b'x')).count();
        assert_eq!(accepted, LINE_SIZE - 1);
        assert!(line.submit());
        assert_eq!(line.len(), LINE_SIZE);
    }

    #[test]
    fn short_read_truncates_and_discards() {
        let mut line = LineBuffer::new();
        for &b in b"hello" {
            line.push(b);
        }
        line.submit();
        let mut out = [0u8; 2];
        assert_eq!(line.take_line(&mut out), Some(2));
        assert_eq!(&out, b"he");
        assert!(line.is_empty());
    }

    #[test]
    fn empty_read_leaves_line_in_place() {
        let mut line = LineBuffer::new();
        line.push(b'x');
        assert_eq!(line.take_line(&mut []), Some(0));
        line.submit();
        assert_eq!(line.take_line(&mut []), Some(0));
        assert!(line.is_ready());

        let mut out = [0u8; 4];
        assert_eq!(line.take_line(&mut out), Some(2));
        assert_eq!(&out[..2], b"x\n");
    }

    #[test]
    fn backspace_on_empty_line_is_ignored() {
        let mut line = LineBuffer::new();
        assert!(!line.backspace());
        line.push(b'x');
        assert!(line.backspace());
        assert!(line.is_empty());
    }

    #[test]
    fn rtc_rejects_bad_rates() {
        let mut rtc = VirtualRtc::new();
        assert_eq!(rtc.set_frequency(3), Err(SysError::InvalidArgument));
        assert_eq!(rtc.set_frequency(1), Err(SysError::InvalidArgument));
        assert_eq!(rtc.set_frequency(2048), Err(SysError::InvalidArgument));
        assert_eq!(rtc.frequency(), RTC_DEFAULT_HZ);
        assert_eq!(rtc.set_frequency(512), Ok(()));
        assert_eq!(rtc.frequency(), 512);
    }

    #[test]
    fn rtc_fires_at_virtual_rate() {
        let mut rtc = VirtualRtc::new();
        rtc.set_frequency(256).unwrap();
        assert!(!rtc.poll()); // arms

        for _ in 0..3 {
            rtc.tick();
        }
        assert!(!rtc.poll());
        rtc.tick();
        assert!(rtc.poll());

        // tick sebelum arm ulang tidak dihitung
        for _ in 0..4 {
            rtc.tick();
        }
        assert!(!rtc.poll());
    }
}
