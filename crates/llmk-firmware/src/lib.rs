//! Firmware Shim (Component A).
//!
//! Every resource the rest of llmk-efi needs — file I/O, pool memory, wall
//! clock, serial bytes, CPU feature enablement — is acquired directly
//! through UEFI boot/runtime services. This crate is the only one that
//! touches `uefi::table::boot::BootServices` or raw CPU state; everything
//! above it (gguf, kernels, engine, governance) talks to narrow traits so
//! it can be exercised on the host in tests.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod cpu;
pub mod file;
pub mod pool;
pub mod serial;
pub mod time;

pub use cpu::{CpuFeatures, MemoryTier};
pub use file::{Fat83Mode, FileError, FirmwareFile};
pub use pool::Arena;
