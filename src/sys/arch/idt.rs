//! IDT — exception, IRQ and `int 0x80` gates
//!
//! Exception dari ring 3 membunuh proses yang sedang jalan; exception yang
//! sama di ring 0 berarti bug kernel dan langsung panic. Handler IRQ kirim
//! EOI ke PIC dulu sebelum bisa ditinggal lewat context switch.

use super::gdt::DOUBLE_FAULT_IST;
use super::pic::{self, IRQ_KEYBOARD, IRQ_RTC, IRQ_TIMER};
use super::{perform, with_kernel};
use crate::sys::clk;
use crate::sys::keyboard::KeyDecoder;
use crate::sys::proc::{Exception, Transfer};
use lazy_static::lazy_static;
use spin::Mutex;
use x86_64::instructions::port::Port;
use x86_64::registers::control::Cr2;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};
use x86_64::{PrivilegeLevel, VirtAddr};

pub const SYSCALL_VECTOR: usize = 0x80;

const KEYBOARD_DATA: u16 = 0x60;

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();

        idt.divide_error.set_handler_fn(divide_error_handler);
        idt.debug.set_handler_fn(debug_handler);
        idt.non_maskable_interrupt.set_handler_fn(nmi_handler);
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        idt.overflow.set_handler_fn(overflow_handler);
        idt.bound_range_exceeded.set_handler_fn(bound_range_handler);
        idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
        idt.device_not_available.set_handler_fn(device_not_available_handler);
        idt.invalid_tss.set_handler_fn(invalid_tss_handler);
        idt.segment_not_present.set_handler_fn(segment_not_present_handler);
        idt.stack_segment_fault.set_handler_fn(stack_segment_handler);
        idt.general_protection_fault.set_handler_fn(general_protection_handler);
        idt.page_fault.set_handler_fn(page_fault_handler);
        idt.x87_floating_point.set_handler_fn(x87_handler);
        idt.alignment_check.set_handler_fn(alignment_check_handler);
        idt.simd_floating_point.set_handler_fn(simd_handler);
        unsafe {
            idt.double_fault
                .set_handler_fn(double_fault_handler)
                .set_stack_index(DOUBLE_FAULT_IST);
        }

        idt[pic::irq_vector(IRQ_TIMER) as usize].set_handler_fn(timer_handler);
        idt[pic::irq_vector(IRQ_KEYBOARD) as usize].set_handler_fn(keyboard_handler);
        idt[pic::irq_vector(IRQ_RTC) as usize].set_handler_fn(rtc_handler);

        unsafe {
            idt[SYSCALL_VECTOR]
                .set_handler_addr(VirtAddr::new(syscall_entry as usize as u64))
                .set_privilege_level(PrivilegeLevel::Ring3);
        }

        idt
    };

    static ref KEYBOARD: Mutex<KeyDecoder> = Mutex::new(KeyDecoder::new());
}

pub fn init() {
    IDT.load();
}

// ---------------------------------------------------------------------------
// Exceptions
// ---------------------------------------------------------------------------

fn from_user(frame: &InterruptStackFrame) -> bool {
    frame.code_segment & 3 == 3
}

fn user_exception(frame: &InterruptStackFrame, exception: Exception) {
    if !from_user(frame) {
        panic!("{} in kernel at {:#x}", exception, frame.instruction_pointer.as_u64());
    }
    let transfer = with_kernel(|kernel| kernel.fault(exception)).unwrap_or(Transfer::Idle);
    perform(transfer);
}

macro_rules! exception_handler {
    ($name:ident, $exception:expr) => {
        extern "x86-interrupt" fn $name(frame: InterruptStackFrame) {
            user_exception(&frame, $exception);
        }
    };
    ($name:ident, $exception:expr, error_code) => {
        extern "x86-interrupt" fn $name(frame: InterruptStackFrame, code: u64) {
            ktrace!("{} error code {:#x}", $exception, code);
            user_exception(&frame, $exception);
        }
    };
}

exception_handler!(divide_error_handler,         Exception::DivideError);
exception_handler!(debug_handler,                Exception::Debug);
exception_handler!(nmi_handler,                  Exception::NonMaskableInterrupt);
exception_handler!(breakpoint_handler,           Exception::Breakpoint);
exception_handler!(overflow_handler,             Exception::Overflow);
exception_handler!(bound_range_handler,          Exception::BoundRangeExceeded);
exception_handler!(invalid_opcode_handler,       Exception::InvalidOpcode);
exception_handler!(device_not_available_handler, Exception::DeviceNotAvailable);
exception_handler!(invalid_tss_handler,          Exception::InvalidTss, error_code);
exception_handler!(segment_not_present_handler,  Exception::SegmentNotPresent, error_code);
exception_handler!(stack_segment_handler,        Exception::StackSegmentFault, error_code);
exception_handler!(general_protection_handler,   Exception::GeneralProtectionFault, error_code);
exception_handler!(x87_handler,                  Exception::X87FloatingPoint);
exception_handler!(alignment_check_handler,      Exception::AlignmentCheck, error_code);
exception_handler!(simd_handler,                 Exception::SimdFloatingPoint);

extern "x86-interrupt" fn page_fault_handler(frame: InterruptStackFrame, code: PageFaultErrorCode) {
    kwarn!("page fault at {:#x} ({:?})", Cr2::read().as_u64(), code);
    user_exception(&frame, Exception::PageFault);
}

extern "x86-interrupt" fn double_fault_handler(frame: InterruptStackFrame, _code: u64) -> ! {
    panic!("double fault at {:#x}", frame.instruction_pointer.as_u64());
}

// ---------------------------------------------------------------------------
// IRQs
// ---------------------------------------------------------------------------

extern "x86-interrupt" fn timer_handler(_frame: InterruptStackFrame) {
    pic::eoi(IRQ_TIMER);
    let transfer = with_kernel(|kernel| kernel.tick()).unwrap_or(Transfer::Continue);
    perform(transfer);
}

extern "x86-interrupt" fn keyboard_handler(_frame: InterruptStackFrame) {
    let scancode: u8 = unsafe { Port::new(KEYBOARD_DATA).read() };
    let key = KEYBOARD.lock().feed(scancode);
    if let Some(key) = key {
        with_kernel(|kernel| kernel.key_input(key));
    }
    pic::eoi(IRQ_KEYBOARD);
}

extern "x86-interrupt" fn rtc_handler(_frame: InterruptStackFrame) {
    clk::acknowledge_rtc();
    with_kernel(|kernel| kernel.rtc_tick());
    pic::eoi(IRQ_RTC);
}

// ---------------------------------------------------------------------------
// int 0x80
// ---------------------------------------------------------------------------

/// Gate syscall. Kode user jalan di compatibility mode 32-bit dan mengirim
/// eax = nomor, ebx/ecx/edx = argumen; hasilnya kembali lewat eax. Register
/// lain yang terlihat oleh user tidak berubah.
///
/// Saat masuk, frame CPU 40 byte di atas stack yang align 16; sembilan push
/// di bawah mengembalikan alignment untuk `call`.
#[unsafe(naked)]
unsafe extern "sysv64" fn syscall_entry() {
    core::arch::naked_asm!(
        "push rbx",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "mov r8, rdx",
        "mov edx, ecx",
        "mov ecx, r8d",
        "mov esi, ebx",
        "mov edi, eax",
        "call {dispatch}",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "iretq",
        dispatch = sym super::syscall_dispatch,
    );
}
