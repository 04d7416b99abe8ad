//! context — saved kernel execution points and the jumps between them
//!
//! [`Continuation`] = register callee-saved + stack pointer dari panggilan
//! kernel yang belum kembali. `rsp` yang disimpan menunjuk ke return address
//! panggilan itu, jadi melanjutkannya cukup: restore register, load `rsp`,
//! `ret`.
//!
//! Layout (offset yang dipakai asm di bawah):
//!   rsp=0, r15=8, r14=16, r13=24, r12=32, rbp=40, rbx=48

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Continuation {
    rsp: u64,
    r15: u64,
    r14: u64,
    r13: u64,
    r12: u64,
    rbp: u64,
    rbx: u64,
}

impl Continuation {
    pub const fn empty() -> Self {
        Self { rsp: 0, r15: 0, r14: 0, r13: 0, r12: 0, rbp: 0, rbx: 0 }
    }

    /// Apakah slot ini pernah diisi
    pub fn is_set(&self) -> bool {
        self.rsp != 0
    }
}

#[cfg(target_os = "none")]
pub use self::imp::*;

#[cfg(target_os = "none")]
mod imp {
    use super::Continuation;

    /// Simpan caller ke `slot`, lalu turun ke ring 3 di `entry`.
    ///
    /// Kembali dengan `value` saat nanti ada yang memanggil [`resume`] pada
    /// `slot` (atau [`switch`] ke sana).
    #[unsafe(naked)]
    pub unsafe extern "sysv64" fn enter_user(
        slot:       *mut Continuation, // rdi
        entry:      u64,               // rsi
        user_stack: u64,               // rdx
        user_code:  u64,               // rcx
        user_data:  u64,               // r8
    ) -> u64 {
        core::arch::naked_asm!(
            "mov [rdi + 0],  rsp",
            "mov [rdi + 8],  r15",
            "mov [rdi + 16], r14",
            "mov [rdi + 24], r13",
            "mov [rdi + 32], r12",
            "mov [rdi + 40], rbp",
            "mov [rdi + 48], rbx",
            "mov ax, r8w",
            "mov ds, ax",
            "mov es, ax",
            // iretq frame
            "push r8",        // SS
            "push rdx",       // RSP
            "push 0x202",     // RFLAGS, IF set
            "push rcx",       // CS
            "push rsi",       // RIP
            "xor eax, eax",
            "xor ebx, ebx",
            "xor ecx, ecx",
            "xor edx, edx",
            "xor esi, esi",
            "xor edi, edi",
            "xor ebp, ebp",
            "xor r8d, r8d",
            "iretq",
        );
    }

    /// Turun ke ring 3 di `entry` tanpa titik kembali.
    #[unsafe(naked)]
    pub unsafe extern "sysv64" fn enter_user_detached(
        entry:      u64, // rdi
        user_stack: u64, // rsi
        user_code:  u64, // rdx
        user_data:  u64, // rcx
    ) -> ! {
        core::arch::naked_asm!(
            "mov ax, cx",
            "mov ds, ax",
            "mov es, ax",
            "push rcx",       // SS
            "push rsi",       // RSP
            "push 0x202",     // RFLAGS
            "push rdx",       // CS
            "push rdi",       // RIP
            "xor eax, eax",
            "xor ebx, ebx",
            "xor ecx, ecx",
            "xor edx, edx",
            "xor esi, esi",
            "xor edi, edi",
            "xor ebp, ebp",
            "iretq",
        );
    }

    /// Buat panggilan yang tersimpan di `slot` kembali dengan `value`.
    ///
    /// `slot` boleh berada di stack yang ditinggalkan: isinya dibaca penuh
    /// sebelum `rsp` pindah.
    #[unsafe(naked)]
    pub unsafe extern "sysv64" fn resume(slot: *const Continuation, value: u64) -> ! {
        core::arch::naked_asm!(
            "mov r15, [rdi + 8]",
            "mov r14, [rdi + 16]",
            "mov r13, [rdi + 24]",
            "mov r12, [rdi + 32]",
            "mov rbp, [rdi + 40]",
            "mov rbx, [rdi + 48]",
            "mov rax, rsi",
            "mov rsp, [rdi + 0]",
            "ret",
        );
    }

    /// Simpan caller ke `from` lalu lanjutkan `to`. Kembali saat ada yang
    /// melanjutkan `from`.
    #[unsafe(naked)]
    pub unsafe extern "sysv64" fn switch(from: *mut Continuation, to: *const Continuation) {
        core::arch::naked_asm!(
            "mov [rdi + 0],  rsp",
            "mov [rdi + 8],  r15",
            "mov [rdi + 16], r14",
            "mov [rdi + 24], r13",
            "mov [rdi + 32], r12",
            "mov [rdi + 40], rbp",
            "mov [rdi + 48], rbx",
            "mov r15, [rsi + 8]",
            "mov r14, [rsi + 16]",
            "mov r13, [rsi + 24]",
            "mov r12, [rsi + 32]",
            "mov rbp, [rsi + 40]",
            "mov rbx, [rsi + 48]",
            "xor eax, eax",
            "mov rsp, [rsi + 0]",
            "ret",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_asm_offsets() {
        assert_eq!(core::mem::size_of::<Continuation>(), 7 * 8);
        assert!(!Continuation::empty().is_set());
        assert_eq!(Continuation::default(), Continuation::empty());
    }
}
