//! Entry point (§3 Lifecycle: "firmware hands control to the
//! application... the application probes CPU features, opens the boot
//! volume, reads `repl.cfg`, then enters the REPL"). Grounded on
//! `uefi`'s conventional `#[entry]` + `boot::open_protocol_exclusive`
//! idiom; the panic handler and global allocator come from the `uefi`
//! crate's `panic_handler`/`alloc` features per this crate's Cargo.toml,
//! the same way the firmware crate leans on `uart_16550`/`lazy_static`
//! instead of hand-rolling a serial driver.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]

extern crate alloc;

mod config;
mod console;
mod error;
mod model;
mod repl;
mod session;
mod source;
mod tokenizer;

use alloc::string::String;
use alloc::vec::Vec;

use llmk_firmware::serial_println;
use uefi::prelude::*;
use uefi::proto::media::file::Directory;
use uefi::proto::media::fs::SimpleFileSystem;

use crate::config::Config;
use crate::session::Session;

#[entry]
fn main() -> Status {
    if uefi::helpers::init().is_err() {
        return Status::DEVICE_ERROR;
    }

    llmk_firmware::serial::init();
    let features = llmk_firmware::cpu::probe_and_enable();
    serial_println!("llmk-efi: cpu features avx2_usable={}", features.avx2_usable());

    let mut root = match open_root_directory() {
        Ok(root) => root,
        Err(e) => {
            serial_println!("llmk-efi: no filesystem on boot volume: {e:?}");
            return Status::DEVICE_ERROR;
        }
    };

    let cfg = read_config(&mut root);
    let mut session = Session::new(features.avx2_usable(), cfg);

    console::println("llmk-efi ready. type /help for commands.");
    let code = repl::run(&mut root, &mut session);

    match code {
        0 => Status::SUCCESS,
        2 => Status::DEVICE_ERROR,
        _ => Status::LOAD_ERROR,
    }
}

fn open_root_directory() -> uefi::Result<Directory> {
    let handle = uefi::boot::image_handle();
    let mut fs = uefi::boot::open_protocol_exclusive::<SimpleFileSystem>(handle)?;
    fs.open_volume()
}

/// Reads `repl.cfg` off the boot volume (§6 "Config file"). Absence of
/// the file is not an error — the session simply starts with defaults.
fn read_config(root: &mut Directory) -> Config {
    let mode = llmk_firmware::file::Fat83Mode::PreferLong;
    let mut file = match llmk_firmware::file::open(root, "repl.cfg", mode) {
        Ok(f) => f,
        Err(_) => return Config::default(),
    };

    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    while file.read_exact(&mut byte).is_ok() {
        bytes.push(byte[0]);
    }

    let text = String::from_utf8_lossy(&bytes);
    Config::parse(&text)
}
