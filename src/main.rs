#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod boot {
    use bootloader::{entry_point, BootInfo};
    use core::panic::PanicInfo;
    use triterm::{halt_forever, hlt_loop, kerror};

    entry_point!(kernel_main);

    fn kernel_main(boot_info: &'static BootInfo) -> ! {
        triterm::init(boot_info);
        // tick timer pertama menjalankan shell terminal 0
        hlt_loop();
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        if let Some(loc) = info.location() {
            kerror!("PANIC at {}:{}:{}: {}", loc.file(), loc.line(), loc.column(), info.message());
        } else {
            kerror!("PANIC: {}", info);
        }
        halt_forever();
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!(
        "triterm {} is a bare-metal kernel; build it for an x86_64 `none` target and boot the image",
        triterm::VERSION
    );
}
