//! arch — x86_64 glue
//!
//!   - context: titik eksekusi kernel yang disimpan dan lompatan antar titik
//!   - gdt:     segment, TSS, stack ring-0 per proses
//!   - idt:     gate exception, IRQ dan syscall
//!   - pic:     setup 8259 dan EOI
//!
//! Selain `context::Continuation` dan aritmetika `pic`, semuanya hanya ada
//! di bare metal. Objek kernel tinggal di satu static di balik spin lock;
//! lock selalu dilepas sebelum [`Transfer`] dijalankan, karena kebanyakan
//! transfer tidak pernah kembali ke kode yang memegangnya.

pub mod context;
pub mod pic;

#[cfg(target_os = "none")]
pub mod gdt;
#[cfg(target_os = "none")]
pub mod idt;

#[cfg(target_os = "none")]
pub use self::bare::*;

#[cfg(target_os = "none")]
mod bare {
    use super::context::{self, Continuation};
    use super::gdt;
    use crate::config::{KERNEL_STACK_SIZE, MAX_PROCS};
    use crate::sys::fs::BootFs;
    use crate::sys::kernel::Kernel;
    use crate::sys::mem::frame::{self, BootFrameAllocator};
    use crate::sys::mem::user_regions;
    use crate::sys::mem::paging::X86Machine;
    use crate::sys::proc::{Launch, Pid, ResumePoint, Transfer};
    use crate::sys::syscall::{dispatch, Outcome};
    use bootloader::BootInfo;
    use core::ptr::addr_of;
    use spin::{Mutex, Once};
    use x86_64::instructions::interrupts;
    use x86_64::VirtAddr;

    pub type MachineKernel = Kernel<X86Machine, BootFs<'static>>;

    static KERNEL: Once<Mutex<MachineKernel>> = Once::new();

    // -----------------------------------------------------------------------
    // Kernel stack, satu per PID
    // -----------------------------------------------------------------------

    #[repr(align(16))]
    struct KernelStack([u8; KERNEL_STACK_SIZE as usize]);

    static mut KERNEL_STACKS: [KernelStack; MAX_PROCS] =
        [const { KernelStack([0; KERNEL_STACK_SIZE as usize]) }; MAX_PROCS];

    /// Puncak stack ring-0 milik `pid`
    pub fn stack_top(pid: Pid) -> VirtAddr {
        let base = unsafe { addr_of!(KERNEL_STACKS[pid.index()]) };
        VirtAddr::from_ptr(base) + KERNEL_STACK_SIZE
    }

    // -----------------------------------------------------------------------
    // Boot
    // -----------------------------------------------------------------------

    #[cfg(feature = "embedded-fs")]
    static FS_IMAGE: &[u8] = include_bytes!(env!("TRITERM_FS_IMAGE"));
    #[cfg(not(feature = "embedded-fs"))]
    static FS_IMAGE: &[u8] = &[];

    /// Bangun machine page table dan objek kernel. Harus jalan sebelum PIC
    /// membuka IRQ timer. Kalau `Err`, tidak ada yang terpasang dan caller
    /// tidak boleh lanjut.
    pub fn boot(boot_info: &'static BootInfo) -> Result<(), &'static str> {
        if !frame::user_regions_available(&boot_info.memory_map) {
            kerror!("mem: user regions {:#x?} not all reported usable", user_regions());
            return Err("user regions unavailable");
        }

        let phys_offset = VirtAddr::new(boot_info.physical_memory_offset);
        let mut frames = unsafe { BootFrameAllocator::new(&boot_info.memory_map) };
        let machine = unsafe { X86Machine::new(phys_offset, &mut frames) }.map_err(|err| {
            kerror!("mem: cannot prepare page tables: {:?}", err);
            "page tables"
        })?;

        let fs = match BootFs::new(FS_IMAGE) {
            Ok(fs) => {
                klog!("fs: {} entries, {} inodes", fs.num_dentries(), fs.num_inodes());
                fs
            }
            Err(err) => {
                kwarn!("fs: no usable boot image ({}), starting empty", err);
                BootFs::empty()
            }
        };

        KERNEL.call_once(|| Mutex::new(Kernel::new(machine, fs)));
        Ok(())
    }

    /// Jalankan `f` pada kernel dengan interrupt mati. `None` sebelum `boot`.
    pub fn with_kernel<R>(f: impl FnOnce(&mut MachineKernel) -> R) -> Option<R> {
        let kernel = KERNEL.get()?;
        Some(interrupts::without_interrupts(|| f(&mut kernel.lock())))
    }

    fn resume_slot(pid: Pid, kind: ResumePoint) -> Option<*mut Continuation> {
        with_kernel(|kernel| {
            kernel.resume_point_mut(pid, kind).map(|slot| slot as *mut Continuation)
        })
        .flatten()
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    /// Jalankan keputusan core. Hanya kembali untuk `Continue`, dan untuk
    /// `Bootstrap`/`Switch` setelah proses yang di-preempt dilanjutkan lagi.
    pub fn perform(transfer: Transfer) {
        let (user_code, user_data) = gdt::user_selectors();
        match transfer {
            Transfer::Continue => {}
            Transfer::Idle => crate::hlt_loop(),
            Transfer::Enter(launch) | Transfer::Bootstrap { from: None, launch } => unsafe {
                context::enter_user_detached(launch.entry, launch.user_stack, user_code, user_data)
            },
            Transfer::Bootstrap { from: Some(from), launch } => {
                let Some(slot) = resume_slot(from, ResumePoint::Scheduler) else {
                    kerror!("sched: pid {} has no PCB", from);
                    return;
                };
                unsafe {
                    context::enter_user(slot, launch.entry, launch.user_stack, user_code, user_data);
                }
            }
            Transfer::ReturnToExecute { resume, status, .. } => unsafe {
                context::resume(&resume, u64::from(status))
            },
            Transfer::Switch { from, to } => {
                let (Some(from_slot), Some(to_slot)) = (
                    resume_slot(from, ResumePoint::Scheduler),
                    resume_slot(to, ResumePoint::Scheduler),
                ) else {
                    kerror!("sched: switch {} -> {} without PCBs", from, to);
                    return;
                };
                if !unsafe { (*to_slot).is_set() } {
                    kerror!("sched: pid {} was never preempted", to);
                    return;
                }
                unsafe { context::switch(from_slot, to_slot) };
            }
        }
    }

    /// Jalankan child yang baru di-execute; kembali dengan status exit-nya
    /// setelah child halt.
    fn run_child(launch: Launch) -> isize {
        let Some(slot) = resume_slot(launch.pid, ResumePoint::Execute) else {
            return -1;
        };
        let (user_code, user_data) = gdt::user_selectors();
        let status = unsafe {
            context::enter_user(slot, launch.entry, launch.user_stack, user_code, user_data)
        };
        status as isize
    }

    /// Dipanggil stub `int 0x80` dengan eax, ebx, ecx, edx milik caller.
    pub extern "sysv64" fn syscall_dispatch(
        call: usize,
        arg1: usize,
        arg2: usize,
        arg3: usize,
    ) -> isize {
        loop {
            let outcome = with_kernel(|kernel| dispatch(kernel, call, arg1, arg2, arg3))
                .unwrap_or(Outcome::Return(-1));
            match outcome {
                Outcome::Return(value) => return value,
                Outcome::Block => {
                    interrupts::enable_and_hlt();
                    interrupts::disable();
                }
                Outcome::Execute(launch) => return run_child(launch),
                Outcome::Transfer(transfer) => {
                    perform(transfer);
                    return -1;
                }
            }
        }
    }
}
