//! Mirrored console/serial output (§6: "serial receives a mirrored ASCII
//! debug stream"). `con_println!` writes to both the UEFI text-output
//! protocol and COM1; `serial_println!` (re-exported from
//! `llmk_firmware`) writes to COM1 alone, for diagnostics not meant for
//! the user-facing console.

use core::fmt::Write;

use uefi::system;

pub use llmk_firmware::serial_println;

/// Write one line to the UEFI console and mirror it to COM1.
pub fn println(line: &str) {
    system::with_stdout(|stdout| {
        let _ = stdout.write_str(line);
        let _ = stdout.write_str("\r\n");
    });
    for b in line.bytes() {
        llmk_firmware::serial::putc(b);
    }
    llmk_firmware::serial::putc(b'\n');
}

/// `con_println!("fmt", args...)`, mirroring to both devices.
#[macro_export]
macro_rules! con_println {
    ($($arg:tt)*) => {
        $crate::console::println(&alloc::format!($($arg)*))
    };
}

/// Stream raw UTF-8 bytes to the console without a trailing newline,
/// used by the decoder loop's `emit` callback so token pieces land
/// exactly as produced.
pub fn stream(bytes: &[u8]) {
    if let Ok(s) = core::str::from_utf8(bytes) {
        system::with_stdout(|stdout| {
            let _ = stdout.write_str(s);
        });
    }
    for &b in bytes {
        llmk_firmware::serial::putc(b);
    }
}
