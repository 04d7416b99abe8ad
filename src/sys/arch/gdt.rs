//! GDT — Global Descriptor Table
//!
//! Isi: kernel code/data, user code 32-bit (compatibility mode, program user
//! berupa image i386), user data, dan TSS. Stack ring-0 di TSS ditulis ulang
//! setiap ganti proses; double fault punya stack IST sendiri.

use core::ptr::{addr_of, addr_of_mut};
use lazy_static::lazy_static;
use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};
use x86_64::instructions::tables::load_tss;
use x86_64::structures::gdt::{
    Descriptor, DescriptorFlags, GlobalDescriptorTable, SegmentSelector,
};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

/// Stack untuk fault yang tidak bisa percaya stack saat ini
const IST_STACK_SIZE: usize = 16 * 1024;

pub const DOUBLE_FAULT_IST: u16 = 0;

/// Ditulis oleh `set_kernel_stack`; CPU membaca `privilege_stack_table[0]`
/// setiap transisi ring 3 → ring 0.
static mut TSS: TaskStateSegment = TaskStateSegment::new();

#[repr(align(16))]
struct IstStack([u8; IST_STACK_SIZE]);

static mut DOUBLE_FAULT_STACK: IstStack = IstStack([0; IST_STACK_SIZE]);

pub struct SegmentSelectors {
    pub tss:    SegmentSelector,
    pub k_code: SegmentSelector,
    pub k_data: SegmentSelector,
    pub u_code: SegmentSelector,
    pub u_data: SegmentSelector,
}

lazy_static! {
    pub static ref GDT: (GlobalDescriptorTable, SegmentSelectors) = {
        let mut gdt = GlobalDescriptorTable::new();

        let k_code = gdt.add_entry(Descriptor::kernel_code_segment());
        let k_data = gdt.add_entry(Descriptor::kernel_data_segment());
        let u_code = gdt.add_entry(Descriptor::UserSegment(DescriptorFlags::USER_CODE32.bits()));
        let u_data = gdt.add_entry(Descriptor::user_data_segment());
        let tss    = gdt.add_entry(Descriptor::tss_segment(unsafe { &*addr_of!(TSS) }));

        (gdt, SegmentSelectors { tss, k_code, k_data, u_code, u_data })
    };
}

/// Load GDT, lalu muat ulang segment register dan task register.
pub fn init() {
    unsafe {
        let top = VirtAddr::from_ptr(addr_of!(DOUBLE_FAULT_STACK)) + IST_STACK_SIZE as u64;
        (*addr_of_mut!(TSS)).interrupt_stack_table[DOUBLE_FAULT_IST as usize] = top;
    }

    GDT.0.load();
    unsafe {
        CS::set_reg(GDT.1.k_code);
        DS::set_reg(GDT.1.k_data);
        ES::set_reg(GDT.1.k_data);
        SS::set_reg(GDT.1.k_data);
        load_tss(GDT.1.tss);
    }
}

/// Stack yang dipakai CPU saat kode user masuk ke kernel
pub fn set_kernel_stack(top: VirtAddr) {
    unsafe {
        (*addr_of_mut!(TSS)).privilege_stack_table[0] = top;
    }
}

/// Selector ring 3 `(code, data)` dalam bentuk mentah untuk `iretq`
pub fn user_selectors() -> (u64, u64) {
    (u64::from(GDT.1.u_code.0), u64::from(GDT.1.u_data.0))
}
