//! syscall — `int 0x80` dispatcher
//!
//! Argumen datang sebagai nilai register mentah (ebx, ecx, edx). Setiap
//! pointer user dicek terhadap user slot sebelum dipakai, dan data berpindah
//! antara memori user dan backend lewat bounce buffer kernel. Kegagalan apa
//! pun sampai ke user sebagai `-1`.

pub mod number;

use crate::config::{ARGS_SIZE, COMMAND_SIZE, COPY_CHUNK, FILENAME_SIZE};
use crate::sys::error::SysError;
use crate::sys::fs::FileSystem;
use crate::sys::kernel::Kernel;
use crate::sys::mem::{in_user_slot, Machine};
use crate::sys::proc::{Launch, Transfer};

/// Apa yang dilakukan stub entry setelah dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Put this in the caller's eax and return to it
    Return(isize),
    /// Belum ada hasil; tunggu interrupt lalu dispatch lagi
    Block,
    /// Run the child; the caller's `execute` returns when it halts
    Execute(Launch),
    /// Caller sudah tidak ada; jalankan transfer
    Transfer(Transfer),
}

pub fn dispatch<M: Machine, F: FileSystem>(
    kernel: &mut Kernel<M, F>,
    call:   usize,
    arg1:   usize,
    arg2:   usize,
    arg3:   usize,
) -> Outcome {
    ktrace!("syscall {}({:#x}, {:#x}, {:#x}) from {:?}",
        number::name(call), arg1, arg2, arg3, kernel.current());

    let result = match call {
        number::HALT    => return Outcome::Transfer(kernel.halt(arg1 as u8)),
        number::EXECUTE => return execute(kernel, arg1 as u64),
        number::READ    => read(kernel, arg1, arg2 as u64, arg3),
        number::WRITE   => write(kernel, arg1, arg2 as u64, arg3),
        number::OPEN    => open(kernel, arg1 as u64),
        number::CLOSE   => kernel.close(arg1).map(|()| 0),
        number::GETARGS => getargs(kernel, arg1 as u64, arg2),
        number::VIDMAP  => kernel.map_video_memory(arg1 as u64).map(|()| 0),
        number::SET_HANDLER | number::SIGRETURN => Err(SysError::Unsupported),
        _ => {
            kwarn!("syscall: unknown number {}", call);
            Err(SysError::InvalidArgument)
        }
    };

    match result {
        Ok(value) => Outcome::Return(value as isize),
        Err(SysError::WouldBlock) => Outcome::Block,
        Err(err) => {
            ktrace!("syscall {} failed: {}", number::name(call), err);
            Outcome::Return(err.as_status())
        }
    }
}

/// Panjang dari user adalah 32-bit signed; yang negatif ditolak.
fn length(raw: usize) -> Result<usize, SysError> {
    usize::try_from(raw as u32 as i32).map_err(|_| SysError::InvalidArgument)
}

fn user_buffer(addr: u64, len: usize) -> Result<(), SysError> {
    if addr == 0 || !in_user_slot(addr, len) {
        return Err(SysError::BadAddress);
    }
    Ok(())
}

fn execute<M: Machine, F: FileSystem>(kernel: &mut Kernel<M, F>, addr: u64) -> Outcome {
    let mut line = [0u8; COMMAND_SIZE];
    let len = match kernel.copy_string_from_user(addr, &mut line) {
        Ok(len) => len,
        Err(err) => return Outcome::Return(err.as_status()),
    };
    match kernel.execute(&line[..len]) {
        Ok(launch) => Outcome::Execute(launch),
        Err(err) => {
            kwarn!("execute: {}", err);
            Outcome::Return(SysError::from(err).as_status())
        }
    }
}

/// Isi buffer user per chunk; chunk yang pendek mengakhiri read.
fn read<M: Machine, F: FileSystem>(
    kernel: &mut Kernel<M, F>,
    fd:     usize,
    buf:    u64,
    raw:    usize,
) -> Result<usize, SysError> {
    let len = length(raw)?;
    user_buffer(buf, len)?;

    let mut chunk = [0u8; COPY_CHUNK];
    let mut total = 0;
    loop {
        let want = (len - total).min(COPY_CHUNK);
        let got = match kernel.read(fd, &mut chunk[..want]) {
            Ok(got) => got,
            Err(_) if total > 0 => break,
            Err(err) => return Err(err),
        };
        kernel.copy_to_user(buf + total as u64, &chunk[..got])?;
        total += got;
        if got < want || total == len {
            break;
        }
    }
    Ok(total)
}

fn write<M: Machine, F: FileSystem>(
    kernel: &mut Kernel<M, F>,
    fd:     usize,
    buf:    u64,
    raw:    usize,
) -> Result<usize, SysError> {
    let len = length(raw)?;
    user_buffer(buf, len)?;

    let mut chunk = [0u8; COPY_CHUNK];
    let mut offset = 0;
    let mut total = 0;
    loop {
        let n = (len - offset).min(COPY_CHUNK);
        kernel.copy_from_user(buf + offset as u64, &mut chunk[..n])?;
        match kernel.write(fd, &chunk[..n]) {
            Ok(written) => total += written,
            Err(_) if offset > 0 => break,
            Err(err) => return Err(err),
        }
        offset += n;
        if offset >= len {
            break;
        }
    }
    Ok(total)
}

fn open<M: Machine, F: FileSystem>(kernel: &mut Kernel<M, F>, addr: u64) -> Result<usize, SysError> {
    // satu byte cadangan supaya nama kepanjangan tidak cocok dengan versi terpotong
    let mut name = [0u8; FILENAME_SIZE + 1];
    let len = kernel.copy_string_from_user(addr, &mut name)?;
    kernel.open(&name[..len])
}

fn getargs<M: Machine, F: FileSystem>(
    kernel: &mut Kernel<M, F>,
    buf:    u64,
    raw:    usize,
) -> Result<usize, SysError> {
    let len = length(raw)?;
    user_buffer(buf, len)?;

    let mut args = [0u8; ARGS_SIZE];
    let written = kernel.get_arguments(&mut args[..len.min(ARGS_SIZE)])?;
    kernel.copy_to_user(buf, &args[..written])?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SHELL, USER_BASE, USER_VIDEO, VGA_PHYS};
    use crate::sys::fs::BootFs;
    use crate::sys::sim::{standard_fs, SimMachine};
    use x86_64::PhysAddr;

    type TestKernel = Kernel<SimMachine, BootFs<'static>>;

    const SCRATCH: u64 = USER_BASE + 0x1000;
    const OUT: u64 = USER_BASE + 0x2000;

    fn booted() -> TestKernel {
        let mut kernel = Kernel::new(SimMachine::new(), standard_fs());
        kernel.spawn(0, None, SHELL).unwrap();
        kernel
    }

    fn put_str(kernel: &mut TestKernel, addr: u64, s: &[u8]) {
        kernel.copy_to_user(addr, s).unwrap();
        kernel.copy_to_user(addr + s.len() as u64, &[0]).unwrap();
    }

    fn call(kernel: &mut TestKernel, n: usize, a: u64, b: u64, c: u64) -> Outcome {
        dispatch(kernel, n, a as usize, b as usize, c as usize)
    }

    #[test]
    fn write_to_stdout_draws_on_screen() {
        let mut kernel = booted();
        kernel.copy_to_user(SCRATCH, b"hi\0there").unwrap();
        let out = call(&mut kernel, number::WRITE, 1, SCRATCH, 8);
        assert_eq!(out, Outcome::Return(7));
        assert_eq!(kernel.machine().row_text(PhysAddr::new(VGA_PHYS), 0), "hithere");
        assert_eq!(kernel.machine().cursor(), (7, 0));
    }

    #[test]
    fn bad_pointers_and_lengths_fail() {
        let mut kernel = booted();
        assert_eq!(call(&mut kernel, number::READ, 0, 0, 10), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::WRITE, 1, 0, 10), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::WRITE, 1, SCRATCH, 0xFFFF_FFFF), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::WRITE, 1, 0x1000, 4), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::OPEN, 0, 0, 0), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::EXECUTE, 0, 0, 0), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::VIDMAP, 0x40, 0, 0), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::GETARGS, 0, 10, 0), Outcome::Return(-1));
    }

    #[test]
    fn unsupported_and_unknown_calls_fail() {
        let mut kernel = booted();
        assert_eq!(call(&mut kernel, number::SET_HANDLER, 1, SCRATCH, 0), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::SIGRETURN, 0, 0, 0), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, 0, 0, 0, 0), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, 42, 0, 0, 0), Outcome::Return(-1));
    }

    #[test]
    fn open_read_close_file() {
        let mut kernel = booted();
        put_str(&mut kernel, SCRATCH, b"frame0.txt");
        let fd = match call(&mut kernel, number::OPEN, SCRATCH, 0, 0) {
            Outcome::Return(fd) => fd,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(fd, 2);

        assert_eq!(call(&mut kernel, number::READ, 2, OUT, 1000), Outcome::Return(12));
        let mut text = [0u8; 12];
        kernel.copy_from_user(OUT, &mut text).unwrap();
        assert_eq!(&text, b"/\\/\\/\\ fish\n");
        assert_eq!(call(&mut kernel, number::READ, 2, OUT, 1000), Outcome::Return(0));

        assert_eq!(call(&mut kernel, number::CLOSE, 2, 0, 0), Outcome::Return(0));
        assert_eq!(call(&mut kernel, number::CLOSE, 2, 0, 0), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::READ, 2, OUT, 4), Outcome::Return(-1));
    }

    #[test]
    fn stdio_cannot_be_closed() {
        let mut kernel = booted();
        assert_eq!(call(&mut kernel, number::CLOSE, 0, 0, 0), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::CLOSE, 1, 0, 0), Outcome::Return(-1));
        assert_eq!(call(&mut kernel, number::CLOSE, 8, 0, 0), Outcome::Return(-1));
    }

    #[test]
    fn open_fills_slots_up_to_seven() {
        let mut kernel = booted();
        put_str(&mut kernel, SCRATCH, b".");
        for expected in 2..8 {
            assert_eq!(call(&mut kernel, number::OPEN, SCRATCH, 0, 0), Outcome::Return(expected));
        }
        assert_eq!(call(&mut kernel, number::OPEN, SCRATCH, 0, 0), Outcome::Return(-1));

        put_str(&mut kernel, SCRATCH, b"nosuchfile");
        assert_eq!(call(&mut kernel, number::CLOSE, 4, 0, 0), Outcome::Return(0));
        assert_eq!(call(&mut kernel, number::OPEN, SCRATCH, 0, 0), Outcome::Return(-1));
    }

    #[test]
    fn stdin_read_blocks_then_returns_line() {
        let mut kernel = booted();
        assert_eq!(call(&mut kernel, number::READ, 0, OUT, 128), Outcome::Block);

        for &b in b"ls" {
            kernel.key_input(crate::sys::keyboard::KeyInput::Char(b));
        }
        kernel.key_input(crate::sys::keyboard::KeyInput::Enter);
        assert_eq!(call(&mut kernel, number::READ, 0, OUT, 128), Outcome::Return(3));
        let mut line = [0u8; 3];
        kernel.copy_from_user(OUT, &mut line).unwrap();
        assert_eq!(&line, b"ls\n");
    }

    #[test]
    fn rtc_read_blocks_until_virtual_tick() {
        let mut kernel = booted();
        put_str(&mut kernel, SCRATCH, b"rtc");
        let Outcome::Return(fd) = call(&mut kernel, number::OPEN, SCRATCH, 0, 0) else {
            panic!("open rtc failed");
        };
        kernel.copy_to_user(OUT, &512i32.to_le_bytes()).unwrap();
        assert_eq!(call(&mut kernel, number::WRITE, fd as u64, OUT, 4), Outcome::Return(0));

        assert_eq!(call(&mut kernel, number::READ, fd as u64, OUT, 4), Outcome::Block);
        kernel.rtc_tick();
        assert_eq!(call(&mut kernel, number::READ, fd as u64, OUT, 4), Outcome::Block);
        kernel.rtc_tick();
        assert_eq!(call(&mut kernel, number::READ, fd as u64, OUT, 4), Outcome::Return(0));
    }

    #[test]
    fn execute_and_halt_through_dispatch() {
        let mut kernel = booted();
        let shell = kernel.current().unwrap();
        put_str(&mut kernel, SCRATCH, b"ls  frame0.txt");

        let child = match call(&mut kernel, number::EXECUTE, SCRATCH, 0, 0) {
            Outcome::Execute(launch) => launch.pid,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(kernel.current(), Some(child));

        assert_eq!(call(&mut kernel, number::GETARGS, OUT, 32, 0), Outcome::Return(0));
        let mut args = [0u8; 11];
        kernel.copy_from_user(OUT, &mut args).unwrap();
        assert_eq!(&args, b"frame0.txt\0");

        match call(&mut kernel, number::HALT, 0x1_2A, 0, 0) {
            Outcome::Transfer(Transfer::ReturnToExecute { pid, status, .. }) => {
                assert_eq!(pid, shell);
                assert_eq!(status, 0x2A);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn execute_failure_returns_minus_one() {
        let mut kernel = booted();
        put_str(&mut kernel, SCRATCH, b"nosuch");
        assert_eq!(call(&mut kernel, number::EXECUTE, SCRATCH, 0, 0), Outcome::Return(-1));
        put_str(&mut kernel, SCRATCH, b"   ");
        assert_eq!(call(&mut kernel, number::EXECUTE, SCRATCH, 0, 0), Outcome::Return(-1));
    }

    #[test]
    fn vidmap_stores_page_address() {
        let mut kernel = booted();
        assert_eq!(call(&mut kernel, number::VIDMAP, OUT, 0, 0), Outcome::Return(0));
        let mut raw = [0u8; 4];
        kernel.copy_from_user(OUT, &mut raw).unwrap();
        assert_eq!(u32::from_le_bytes(raw) as u64, USER_VIDEO);
        assert_eq!(kernel.machine().user_video(), Some(PhysAddr::new(VGA_PHYS)));
    }

    #[test]
    fn long_file_read_spans_chunks() {
        let fs = crate::sys::sim::ImageBuilder::new()
            .program("shell", 0x0804_8000)
            .file("big", &[b'z'; 2000])
            .build();
        let mut kernel = Kernel::new(SimMachine::new(), fs);
        kernel.spawn(0, None, SHELL).unwrap();
        put_str(&mut kernel, SCRATCH, b"big");
        assert_eq!(call(&mut kernel, number::OPEN, SCRATCH, 0, 0), Outcome::Return(2));
        assert_eq!(call(&mut kernel, number::READ, 2, OUT, 1500), Outcome::Return(1500));
        assert_eq!(call(&mut kernel, number::READ, 2, OUT, 1500), Outcome::Return(500));
    }
}
