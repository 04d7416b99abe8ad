//! Syscall numbers (eax on `int 0x80`)

pub const HALT:        usize = 1;
pub const EXECUTE:     usize = 2;
pub const READ:        usize = 3;
pub const WRITE:       usize = 4;
pub const OPEN:        usize = 5;
pub const CLOSE:       usize = 6;
pub const GETARGS:     usize = 7;
pub const VIDMAP:      usize = 8;
pub const SET_HANDLER: usize = 9;
pub const SIGRETURN:   usize = 10;

pub fn name(number: usize) -> &'static str {
    match number {
        HALT        => "halt",
        EXECUTE     => "execute",
        READ        => "read",
        WRITE       => "write",
        OPEN        => "open",
        CLOSE       => "close",
        GETARGS     => "getargs",
        VIDMAP      => "vidmap",
        SET_HANDLER => "set_handler",
        SIGRETURN   => "sigreturn",
        _           => "unknown",
    }
}
