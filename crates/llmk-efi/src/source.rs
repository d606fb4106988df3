//! Bridges a firmware-opened file to the [`llmk_gguf::Source`] trait.
//! This is the one crate allowed to depend on both `llmk-firmware` and
//! `llmk-gguf`, per that trait's own doc comment.

use llmk_gguf::{GgufError, Result, Source};
use llmk_firmware::file::FirmwareFile;

pub struct FirmwareSource {
    file: FirmwareFile,
}

impl FirmwareSource {
    pub fn new(file: FirmwareFile) -> Self {
        FirmwareSource { file }
    }
}

impl Source for FirmwareSource {
    /// A short read here is always `Corrupt`, never silently retried —
    /// §7: "a short read on a GGUF body is treated as Corrupt because
    /// offsets are authoritative."
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let offset = self.file.pos();
        self.file.read_exact(buf).map_err(|_| GgufError::Corrupt { offset })
    }

    fn pos(&self) -> u64 {
        self.file.pos()
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.file.seek(pos).map_err(|_| GgufError::Corrupt { offset: pos })
    }
}
