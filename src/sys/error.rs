//! error — failure kinds reported by the kernel core
//!
//! Program user hanya pernah melihat `-1`; variant-nya ada untuk log dan tes
//! di host.

use core::fmt;

/// Alasan `execute` menolak command line. Semua variant dilaporkan sebelum
/// state kernel berubah.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecError {
    EmptyCommand,
    NoSuchProgram,
    NotExecutable,
    ProcessTableFull,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::EmptyCommand     => "empty command",
            Self::NoSuchProgram    => "no such program",
            Self::NotExecutable    => "not an executable",
            Self::ProcessTableFull => "process table full",
        };
        f.write_str(msg)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SysError {
    /// Descriptor out of range, not open, or not closable
    BadDescriptor,
    /// User pointer null or outside the user slot
    BadAddress,
    InvalidArgument,
    NotFound,
    TooManyOpenFiles,
    /// Direction not bound for this descriptor kind
    Unsupported,
    /// Belum ada yang bisa dikembalikan; ulangi setelah interrupt berikutnya
    WouldBlock,
    NoArguments,
    Io,
    Exec(ExecError),
}

impl SysError {
    /// Value placed in the user's return register.
    pub fn as_status(self) -> isize {
        -1
    }
}

impl From<ExecError> for SysError {
    fn from(err: ExecError) -> Self {
        Self::Exec(err)
    }
}

impl fmt::Display for SysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadDescriptor    => f.write_str("bad descriptor"),
            Self::BadAddress       => f.write_str("bad address"),
            Self::InvalidArgument  => f.write_str("invalid argument"),
            Self::NotFound         => f.write_str("not found"),
            Self::TooManyOpenFiles => f.write_str("too many open files"),
            Self::Unsupported      => f.write_str("operation not supported"),
            Self::WouldBlock       => f.write_str("would block"),
            Self::NoArguments      => f.write_str("no arguments"),
            Self::Io               => f.write_str("i/o error"),
            Self::Exec(err)        => write!(f, "execute: {}", err),
        }
    }
}
