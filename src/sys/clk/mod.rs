//! clk — the two hardware clocks
//!
//!   - PIT channel 0 di `PIT_HZ`: tick scheduler (IRQ 0)
//!   - interrupt periodik CMOS RTC di `RTC_BASE_HZ`: sumber virtual RTC
//!     semua terminal (IRQ 8)
//!
//! Aritmetika register berupa fungsi biasa supaya bisa dicek di host; hanya
//! `init` dan `acknowledge_rtc` yang menyentuh port.

use bit_field::BitField;

/// PIT input clock
const PIT_BASE_HZ: u32 = 1_193_182;

/// Reload value for PIT channel 0
pub fn pit_divisor(hz: u32) -> u16 {
    (PIT_BASE_HZ / hz).clamp(1, u16::MAX as u32) as u16
}

/// RTC rate selector for `hz`: the periodic rate is `32768 >> (rate - 1)`.
/// `None` unless `hz` is a power of two the RTC can produce.
pub fn rtc_rate(hz: u32) -> Option<u8> {
    if !hz.is_power_of_two() || !(2..=8192).contains(&hz) {
        return None;
    }
    Some((16 - hz.trailing_zeros()) as u8)
}

/// Register A with its rate bits (0..4) replaced
pub fn with_rate(register_a: u8, rate: u8) -> u8 {
    let mut value = register_a;
    value.set_bits(0..4, rate);
    value
}

/// Register B with the periodic-interrupt enable bit (6) set
pub fn with_periodic_interrupt(register_b: u8) -> u8 {
    let mut value = register_b;
    value.set_bit(6, true);
    value
}

#[cfg(target_os = "none")]
pub use self::hw::{acknowledge_rtc, init};

#[cfg(target_os = "none")]
mod hw {
    use super::*;
    use crate::config::{PIT_HZ, RTC_BASE_HZ};
    use x86_64::instructions::port::Port;

    const CMOS_ADDRESS: u16 = 0x70;
    const CMOS_DATA:    u16 = 0x71;
    /// NMI disabled while the register is selected
    const REG_A: u8 = 0x8A;
    const REG_B: u8 = 0x8B;
    const REG_C: u8 = 0x0C;

    fn cmos_read(reg: u8) -> u8 {
        unsafe {
            let mut addr: Port<u8> = Port::new(CMOS_ADDRESS);
            let mut data: Port<u8> = Port::new(CMOS_DATA);
            addr.write(reg);
            data.read()
        }
    }

    fn cmos_write(reg: u8, value: u8) {
        unsafe {
            let mut addr: Port<u8> = Port::new(CMOS_ADDRESS);
            let mut data: Port<u8> = Port::new(CMOS_DATA);
            addr.write(reg);
            data.write(value);
        }
    }

    /// Program kedua clock. Interrupt harus masih mati.
    pub fn init() {
        let divisor = pit_divisor(PIT_HZ);
        unsafe {
            let mut cmd: Port<u8> = Port::new(0x43);
            let mut ch0: Port<u8> = Port::new(0x40);
            cmd.write(0x36); // channel 0, lobyte/hibyte, mode 3
            ch0.write((divisor & 0xFF) as u8);
            ch0.write((divisor >> 8) as u8);
        }

        match rtc_rate(RTC_BASE_HZ) {
            Some(rate) => {
                let a = cmos_read(REG_A);
                cmos_write(REG_A, with_rate(a, rate));
                let b = cmos_read(REG_B);
                cmos_write(REG_B, with_periodic_interrupt(b));
                acknowledge_rtc();
            }
            None => kerror!("clk: RTC cannot run at {} Hz", RTC_BASE_HZ),
        }
        klog!("clk: PIT {} Hz, RTC {} Hz", PIT_HZ, RTC_BASE_HZ);
    }

    /// Baca register C; RTC tidak mengirim interrupt lagi sebelum ini jalan.
    pub fn acknowledge_rtc() {
        cmos_read(REG_C);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pit_divisor_for_scheduler_rate() {
        assert_eq!(pit_divisor(100), 11931);
        assert_eq!(pit_divisor(1), u16::MAX);
    }

    #[test]
    fn rtc_rate_selector() {
        assert_eq!(rtc_rate(1024), Some(6));
        assert_eq!(rtc_rate(2), Some(15));
        assert_eq!(rtc_rate(8192), Some(3));
        assert_eq!(rtc_rate(1000), None);
        assert_eq!(rtc_rate(16384), None);
    }

    #[test]
    fn register_bits() {
        assert_eq!(with_rate(0x26, 6), 0x26);
        assert_eq!(with_rate(0xFF, 6), 0xF6);
        assert_eq!(with_periodic_interrupt(0x02), 0x42);
    }
}
