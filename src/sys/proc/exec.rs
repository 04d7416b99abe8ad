//! exec — execute, halt and exception kills
//!
//! `execute` memvalidasi semua yang bisa gagal sebelum menyentuh state;
//! setelah PID diambil, sisa langkahnya tidak bisa gagal. `halt` membongkar
//! dengan urutan terbalik dan menyerahkan status ke `execute` parent yang
//! sedang tertunda.

use super::{Exception, Launch, Pid, Process, ResumePoint, Transfer};
use crate::config::{
    COMMAND_SIZE, EXCEPTION_STATUS, FILENAME_SIZE, PROGRAM_OFFSET, SHELL, USER_REGION_SIZE,
    USER_STACK_TOP,
};
use crate::sys::error::ExecError;
use crate::sys::fs::FileSystem;
use crate::sys::kernel::Kernel;
use crate::sys::mem::Machine;
use object::elf::{FileHeader32, ELFMAG};
use object::LittleEndian;

/// Ukuran header image yang diperiksa `execute`
const HEADER_SIZE: usize = core::mem::size_of::<FileHeader32<LittleEndian>>();

/// Image terbesar yang muat antara offset load dan word stack
const MAX_IMAGE: usize = (USER_REGION_SIZE - PROGRAM_OFFSET) as usize - 4;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// `"name  arg string  "` → nama (dipotong selebar nama file) dan string
/// argumen yang sudah di-trim
#[derive(Debug, PartialEq, Eq)]
pub struct Command<'a> {
    pub name: &'a [u8],
    pub args: &'a [u8],
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a [u8]) -> Result<Self, ExecError> {
        let line = &line[..line.len().min(COMMAND_SIZE)];
        let end = line.iter().position(|&b| b == 0 || b == b'\n').unwrap_or(line.len());
        let line = trim_spaces(&line[..end]);

        let split = line.iter().position(|&b| b == b' ').unwrap_or(line.len());
        let (name, rest) = line.split_at(split);
        if name.is_empty() {
            return Err(ExecError::EmptyCommand);
        }
        let name = &name[..name.len().min(FILENAME_SIZE)];
        Ok(Self { name, args: trim_spaces(rest) })
    }
}

fn trim_spaces(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| b != b' ').map_or(start, |i| i + 1);
    &bytes[start..end]
}

// ---------------------------------------------------------------------------
// Executable image
// ---------------------------------------------------------------------------

/// File yang lolos cek executable
#[derive(Clone, Copy, Debug)]
struct Program {
    inode:  u32,
    length: usize,
    entry:  u64,
}

impl Program {
    fn inspect<F: FileSystem>(fs: &F, inode: u32) -> Result<Self, ExecError> {
        let length = fs.content_length(inode).ok_or(ExecError::NotExecutable)?;
        if length > MAX_IMAGE {
            return Err(ExecError::NotExecutable);
        }

        let mut header = [0u8; HEADER_SIZE];
        match fs.read_content(inode, 0, &mut header) {
            Ok(n) if n == HEADER_SIZE => {}
            _ => return Err(ExecError::NotExecutable),
        }
        let (header, _) = object::pod::from_bytes::<FileHeader32<LittleEndian>>(&header)
            .map_err(|()| ExecError::NotExecutable)?;
        if header.e_ident.magic != ELFMAG {
            return Err(ExecError::NotExecutable);
        }

        Ok(Self { inode, length, entry: u64::from(header.e_entry.get(LittleEndian)) })
    }
}

// ---------------------------------------------------------------------------
// Kernel: execute / halt / fault
// ---------------------------------------------------------------------------

fn display(bytes: &[u8]) -> &str {
    core::str::from_utf8(bytes).unwrap_or("<non-utf8>")
}

impl<M: Machine, F: FileSystem> Kernel<M, F> {
    /// Jalankan `command` sebagai child proses saat ini di terminal yang
    /// sedang dijadwalkan. `execute` milik caller tertunda sampai child halt.
    pub fn execute(&mut self, command: &[u8]) -> Result<Launch, ExecError> {
        let terminal = self.scheduled;
        let parent = self.current();
        let launch = self.spawn(terminal, parent, command)?;
        klog!("exec: pid {} on tty{} (parent {:?})", launch.pid, terminal, parent.map(Pid::index));
        Ok(launch)
    }

    /// Parse, validasi, alokasi, lalu commit. Setiap `Err` membiarkan kernel
    /// persis seperti sebelumnya.
    pub(crate) fn spawn(
        &mut self,
        terminal: usize,
        parent: Option<Pid>,
        command: &[u8],
    ) -> Result<Launch, ExecError> {
        let command = Command::parse(command)?;
        let dentry = self.fs.resolve_by_name(command.name).ok_or(ExecError::NoSuchProgram)?;
        let program = Program::inspect(&self.fs, dentry.inode)?;
        let pid = self.procs.allocate().ok_or(ExecError::ProcessTableFull)?;

        self.procs.install(Process::new(pid, parent, terminal, command.args));
        self.terminals[terminal].set_foreground(Some(pid));

        if self.space.user_video().is_some() {
            self.space.set_user_video(&mut self.machine, false);
        }
        self.space.map_user(&mut self.machine, pid);
        self.load(&program);
        self.machine.set_kernel_stack(pid);

        ktrace!("spawn: {} as pid {}, entry {:#x}", display(command.name), pid, program.entry);
        Ok(Launch { pid, entry: program.entry, user_stack: USER_STACK_TOP })
    }

    fn load(&mut self, program: &Program) {
        let start = PROGRAM_OFFSET as usize;
        let image = &mut self.machine.user_memory()[start..start + program.length];
        match self.fs.read_content(program.inode, 0, image) {
            Ok(n) if n == program.length => {}
            Ok(n) => kwarn!("exec: short load, {} of {} bytes", n, program.length),
            Err(err) => kerror!("exec: load failed: {}", err),
        }
    }

    /// Akhiri proses saat ini dengan `status`.
    ///
    /// Root shell diganti shell baru di terminal yang sama. Proses lain
    /// menyerahkan CPU ke parent-nya, yang `execute`-nya kembali dengan
    /// status tersebut (atau 256 setelah exception).
    pub fn halt(&mut self, status: u8) -> Transfer {
        let terminal = self.scheduled;
        let Some(pid) = self.current() else {
            kerror!("halt: nothing running on tty{}", terminal);
            return Transfer::Idle;
        };
        let Some(pcb) = self.procs.get(pid) else {
            kerror!("halt: tty{} foreground pid {} is dead", terminal, pid);
            return Transfer::Idle;
        };
        let status = if pcb.exception() { EXCEPTION_STATUS } else { u32::from(status) };
        let resume = *pcb.resume_point(ResumePoint::Execute);

        let Some(parent) = pcb.parent else {
            self.close_all(pid);
            self.procs.release(pid);
            self.terminals[terminal].set_foreground(None);
            klog!("halt: root shell pid {} on tty{} exited ({}), restarting", pid, terminal, status);
            return match self.spawn(terminal, None, SHELL) {
                Ok(launch) => Transfer::Enter(launch),
                Err(err) => {
                    kerror!("halt: cannot restart shell on tty{}: {}", terminal, err);
                    Transfer::Idle
                }
            };
        };

        let parent_video = self.procs.get(parent).map_or(false, Process::video_mapped);
        self.space.activate(&mut self.machine, parent, terminal, self.visible, parent_video);
        self.close_all(pid);
        self.machine.set_kernel_stack(parent);
        self.procs.release(pid);
        self.terminals[terminal].set_foreground(Some(parent));

        ktrace!("halt: pid {} -> parent {} status {}", pid, parent, status);
        Transfer::ReturnToExecute { pid: parent, resume, status }
    }

    /// Bunuh proses saat ini karena `exception`; parent melihat status 256.
    pub fn fault(&mut self, exception: Exception) -> Transfer {
        let Some(pid) = self.current() else {
            kerror!("fault: {} with nothing running", exception);
            return Transfer::Idle;
        };
        if let Some(pcb) = self.procs.get_mut(pid) {
            pcb.mark_exception();
        }
        kwarn!("pid {} killed: {}", pid, exception);
        self.halt(0)
    }
}
