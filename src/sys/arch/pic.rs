//! PIC — the two chained 8259s
//!
//! Master di vektor 32, slave di 40. Hanya IRQ yang dipakai kernel yang
//! dibuka: timer (0), keyboard (1), cascade (2) dan RTC (8); sisanya tetap
//! di-mask supaya IRQ liar tidak masuk ke gate yang kosong.

pub const PIC_MASTER_OFFSET: u8 = 32;
pub const PIC_SLAVE_OFFSET:  u8 = PIC_MASTER_OFFSET + 8;

pub const IRQ_TIMER:    u8 = 0;
pub const IRQ_KEYBOARD: u8 = 1;
pub const IRQ_CASCADE:  u8 = 2;
pub const IRQ_RTC:      u8 = 8;

/// IRQ yang dilayani kernel
pub const ENABLED_IRQS: [u8; 4] = [IRQ_TIMER, IRQ_KEYBOARD, IRQ_CASCADE, IRQ_RTC];

/// Vektor IDT untuk `irq`
pub const fn irq_vector(irq: u8) -> u8 {
    PIC_MASTER_OFFSET + irq
}

/// Mask `(master, slave)`: bit set = IRQ diblok
pub fn irq_masks(enabled: &[u8]) -> (u8, u8) {
    let (mut master, mut slave) = (0xFFu8, 0xFFu8);
    for &irq in enabled {
        match irq {
            0..=7  => master &= !(1 << irq),
            8..=15 => slave &= !(1 << (irq - 8)),
            _ => {}
        }
    }
    (master, slave)
}

#[cfg(target_os = "none")]
pub use self::hw::{eoi, init};

#[cfg(target_os = "none")]
mod hw {
    use super::*;
    use pic8259::ChainedPics;
    use spin::Mutex;

    static PICS: Mutex<ChainedPics> = Mutex::new(unsafe {
        ChainedPics::new(PIC_MASTER_OFFSET, PIC_SLAVE_OFFSET)
    });

    /// Remap, pasang mask, lalu nyalakan interrupt. Objek kernel harus
    /// sudah ada: tick pertama langsung menjalankan shell.
    pub fn init() {
        let (master, slave) = irq_masks(&ENABLED_IRQS);
        unsafe {
            let mut pics = PICS.lock();
            pics.initialize();
            pics.write_masks(master, slave);
        }
        klog!("pic: masks master {:#04x} slave {:#04x}", master, slave);
        x86_64::instructions::interrupts::enable();
    }

    /// EOI untuk `irq`; slave ikut diberi tahu kalau perlu
    pub fn eoi(irq: u8) {
        unsafe {
            PICS.lock().notify_end_of_interrupt(irq_vector(irq));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_follow_offsets() {
        assert_eq!(irq_vector(IRQ_TIMER), 32);
        assert_eq!(irq_vector(IRQ_KEYBOARD), 33);
        assert_eq!(irq_vector(IRQ_RTC), PIC_SLAVE_OFFSET);
    }

    #[test]
    fn only_served_irqs_are_unmasked() {
        assert_eq!(irq_masks(&ENABLED_IRQS), (0b1111_1000, 0b1111_1110));
        assert_eq!(irq_masks(&[]), (0xFF, 0xFF));
        assert_eq!(irq_masks(&[15, 99]), (0xFF, 0x7F));
    }
}
