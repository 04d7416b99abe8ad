//! config — compile-time layout and tuning constants for triterm
//!
//! Semua alamat di bawah adalah fungsi murni dari angka-angka ini; tidak ada
//! bagian layout yang ditentukan saat runtime.

use log::LevelFilter;

// ---------------------------------------------------------------------------
// Process & terminal table sizes
// ---------------------------------------------------------------------------

/// Jumlah maksimum proses hidup (slot PID)
pub const MAX_PROCS:     usize = 6;
/// Jumlah terminal virtual yang berbagi satu layar
pub const NUM_TERMINALS: usize = 3;
/// Open-handle slots per process (0 = stdin, 1 = stdout)
pub const MAX_HANDLES:   usize = 8;
/// Slot handle pertama yang boleh dipakai `open`
pub const FIRST_FREE_HANDLE: usize = 2;

// ---------------------------------------------------------------------------
// Physical layout
// ---------------------------------------------------------------------------

/// Akhir region kernel; user region mulai dari sini
pub const KERNEL_END:        u64 = 0x0080_0000; // 8 MiB
/// Satu slot kernel stack per PID, PCB ada di dasarnya
pub const KERNEL_STACK_SIZE: u64 = 0x2000;      // 8 KiB
/// Physical user region per PID
pub const USER_REGION_SIZE:  u64 = 0x0040_0000; // 4 MiB

/// Page size for the video mappings
pub const PAGE_SIZE: u64 = 0x1000;

/// Buffer teks VGA fisik (yang benar-benar tampil)
pub const VGA_PHYS:     u64 = 0x000B_8000;
/// Backing page terminal, masing-masing satu page setelah page VGA
pub const BACKING_PHYS: u64 = VGA_PHYS + PAGE_SIZE;

// ---------------------------------------------------------------------------
// Virtual layout
// ---------------------------------------------------------------------------

/// Virtual base of the user slot
pub const USER_BASE:      u64 = 0x0800_0000; // 128 MiB
/// Offset di dalam user slot tempat image program di-load
pub const PROGRAM_OFFSET: u64 = 0x0004_8000;
/// Initial user stack pointer (last word of the user slot)
pub const USER_STACK_TOP: u64 = USER_BASE + USER_REGION_SIZE - 4;
/// Kernel-visible video slot (always this virtual page)
pub const VIDEO_SLOT:     u64 = VGA_PHYS;
/// Page handed out by `vidmap`
pub const USER_VIDEO:     u64 = 0x08C0_0000; // 140 MiB

// ---------------------------------------------------------------------------
// Executables
// ---------------------------------------------------------------------------

/// Byte offset of the 32-bit entry point inside the image header
pub const ENTRY_OFFSET:    usize = 24;
/// Status yang dilaporkan ke parent kalau child mati karena exception
pub const EXCEPTION_STATUS: u32  = 256;
/// Program yang dijalankan sebagai root setiap terminal
pub const SHELL: &[u8] = b"shell";

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

/// File name length in the boot file system
pub const FILENAME_SIZE: usize = 32;
/// Terminal line buffer (including the trailing newline)
pub const LINE_SIZE:     usize = 128;
/// Argument buffer stored in each PCB (including the NUL)
pub const ARGS_SIZE:     usize = 128;
/// Longest command line `execute` looks at
pub const COMMAND_SIZE:  usize = 128;
/// Jumlah spasi untuk satu ketukan tab
pub const TAB_WIDTH:     usize = 4;
/// Bounce buffer kernel untuk salinan antara memori user dan backend
pub const COPY_CHUNK:    usize = 512;

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Scheduler tick rate (PIT channel 0)
pub const PIT_HZ:          u32 = 100;
/// Physical RTC interrupt rate
pub const RTC_BASE_HZ:     u32 = 1024;
/// Virtual RTC rate after `open`
pub const RTC_DEFAULT_HZ:  u32 = 2;

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Level maksimum yang diteruskan logger serial
pub const LOG_LEVEL: LevelFilter = LevelFilter::Info;
