//! COM1 serial output (§4.A `serial_putc`, §6 "serial receives a mirrored
//! ASCII debug stream").
//!
//! Structurally identical to the teacher's `kernel/src/serial.rs`: a
//! `lazy_static` `Mutex<SerialPort>` guarded with `without_interrupts`.
//! UEFI firmware normally owns COM1 itself before `ExitBootServices`, but
//! once the loader has the console it's free to reinitialize the 16550
//! the same way a kernel would.

use core::fmt;

use lazy_static::lazy_static;
use spin::Mutex;
use uart_16550::SerialPort;

/// Standard COM1 I/O port.
const SERIAL_IO_PORT: u16 = 0x3F8;

lazy_static! {
    static ref SERIAL1: Mutex<SerialPort> = {
        let mut port = unsafe { SerialPort::new(SERIAL_IO_PORT) };
        port.init();
        Mutex::new(port)
    };
}

/// Force initialization; safe to call more than once.
pub fn init() {
    let _ = SERIAL1.lock();
}

/// Emit one byte, bounded-spinning on the line-status register if the
/// transmit holding register is not yet empty (§4.A: "all blocking calls
/// have bounded spin on serial").
pub fn putc(b: u8) {
    #[cfg(target_arch = "x86_64")]
    {
        use x86_64::instructions::port::Port;
        const MAX_SPINS: u32 = 100_000;
        let mut lsr: Port<u8> = Port::new(SERIAL_IO_PORT + 5);
        let mut spins = 0;
        while spins < MAX_SPINS {
            let status = unsafe { lsr.read() };
            if status & 0x20 != 0 {
                break;
            }
            spins += 1;
        }
    }
    let mut data = [b];
    write_bytes(&mut data);
}

fn write_bytes(bytes: &mut [u8]) {
    #[cfg(target_arch = "x86_64")]
    {
        use x86_64::instructions::interrupts;
        interrupts::without_interrupts(|| {
            let mut port = SERIAL1.lock();
            for b in bytes.iter() {
                port.send(*b);
            }
        });
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        let mut port = SERIAL1.lock();
        for b in bytes.iter() {
            port.send(*b);
        }
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    #[cfg(target_arch = "x86_64")]
    x86_64::instructions::interrupts::without_interrupts(|| {
        let _ = SERIAL1.lock().write_fmt(args);
    });
    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = SERIAL1.lock().write_fmt(args);
    }
}

/// Mirror of `println!` that writes to COM1 only.
#[macro_export]
macro_rules! serial_println {
    () => { $crate::serial::_print(format_args!("\n")) };
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!("{}\n", format_args!($($arg)*)))
    };
}
