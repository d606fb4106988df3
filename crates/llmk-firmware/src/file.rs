//! File open/read/seek through the UEFI Simple File System protocol, plus
//! the 8.3-alias fallback for FAT drivers that reject a long filename
//! open (§4.A).
//!
//! Grounded in shape on the teacher's `kernel/src/vfs/fat32.rs` (short/long
//! name handling, directory enumeration) even though that module talks to
//! a block device directly rather than through firmware protocols — the
//! 8.3 alias construction rule below follows the same upper-case/tilde
//! convention FAT32 itself uses, per §4.A.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use uefi::proto::media::file::{Directory, File, FileAttribute, FileInfo, FileMode, FileType, RegularFile};
use uefi::{CStr16, Char16};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    NotFound,
    NotAFile,
    Io,
}

/// `fat83_force` config flag (§4.A): when set, the alias open is
/// preferred even if the long-name open would also have succeeded. Used
/// by tests to exercise the fallback path deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fat83Mode {
    #[default]
    PreferLong,
    ForceAlias,
}

/// An open regular file plus the read cursor the [`llmk_gguf`]-style
/// `Source` trait needs. The actual `Source` impl lives in `llmk-efi`,
/// which is the crate allowed to depend on both `llmk-firmware` and
/// `llmk-gguf`.
pub struct FirmwareFile {
    inner: RegularFile,
    pos: u64,
}

impl FirmwareFile {
    fn from_regular(inner: RegularFile) -> Self {
        FirmwareFile { inner, pos: 0 }
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), FileError> {
        let n = self.inner.read(buf).map_err(|_| FileError::Io)?;
        if n != buf.len() {
            return Err(FileError::Io);
        }
        self.pos += n as u64;
        Ok(())
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn seek(&mut self, pos: u64) -> Result<(), FileError> {
        self.inner.set_position(pos).map_err(|_| FileError::Io)?;
        self.pos = pos;
        Ok(())
    }
}

/// Build the FAT 8.3 alias for `leaf` per §4.A: `UPPER(first six
/// alphanumeric chars) + "~N" + UPPER(.ext)`, trying `N` from 1 to 9.
fn eight_dot_three_candidates(leaf: &str) -> Vec<String> {
    let (stem, ext) = match leaf.rfind('.') {
        Some(i) => (&leaf[..i], &leaf[i + 1..]),
        None => (leaf, ""),
    };
    let alnum: String = stem.chars().filter(|c| c.is_ascii_alphanumeric()).take(6).collect();
    let base = alnum.to_ascii_uppercase();
    let ext_upper = ext.to_ascii_uppercase();

    (1..=9u8)
        .map(|n| {
            if ext_upper.is_empty() {
                alloc::format!("{base}~{n}")
            } else {
                alloc::format!("{base}~{n}.{ext_upper}")
            }
        })
        .collect()
}

fn to_utf16(s: &str, buf: &mut Vec<u16>) -> *const Char16 {
    buf.clear();
    buf.extend(s.encode_utf16());
    buf.push(0);
    buf.as_ptr() as *const Char16
}

/// Open `path` relative to `root`, falling back to an 8.3 alias when the
/// long-name open fails and the directory enumeration finds a leaf that
/// matches one of the candidate aliases (§4.A).
///
/// `path` is a single path component (the loader only ever opens
/// top-level files like `model.gguf`, `tokenizer.bin`, `repl.cfg`).
pub fn open(root: &mut Directory, path: &str, mode: Fat83Mode) -> Result<FirmwareFile, FileError> {
    let mut name_buf = Vec::new();

    let try_long = |root: &mut Directory, name_buf: &mut Vec<u16>| -> Option<RegularFile> {
        let ptr = to_utf16(path, name_buf);
        let cstr = unsafe { CStr16::from_ptr(ptr) };
        let handle = root.open(cstr, FileMode::Read, FileAttribute::empty()).ok()?;
        match handle.into_type().ok()? {
            FileType::Regular(f) => Some(f),
            FileType::Dir(_) => None,
        }
    };

    if mode == Fat83Mode::PreferLong {
        if let Some(f) = try_long(root, &mut name_buf) {
            return Ok(FirmwareFile::from_regular(f));
        }
    }

    // Long-name open failed (or alias preferred): enumerate the directory
    // looking for the requested leaf, then retry with whichever 8.3 alias
    // matches.
    let candidates = eight_dot_three_candidates(path);
    let mut found_alias: Option<String> = None;
    let mut found_long = false;

    {
        let mut entry_buf = alloc::vec![0u8; 512];
        loop {
            let info = match root.read_entry(&mut entry_buf) {
                Ok(Some(info)) => info,
                Ok(None) => break,
                Err(_) => return Err(FileError::Io),
            };
            let entry_name = file_info_name(info);
            if entry_name.eq_ignore_ascii_case(path) {
                found_long = true;
            }
            if candidates.iter().any(|c| entry_name.eq_ignore_ascii_case(c)) {
                found_alias = Some(entry_name);
            }
        }
        let _ = root.reset_entry_readout();
    }

    if mode == Fat83Mode::PreferLong && found_long {
        if let Some(f) = try_long(root, &mut name_buf) {
            return Ok(FirmwareFile::from_regular(f));
        }
    }

    if let Some(alias) = found_alias {
        if let Some(f) = try_long_named(root, &alias, &mut name_buf) {
            return Ok(FirmwareFile::from_regular(f));
        }
    }

    Err(FileError::NotFound)
}

fn try_long_named(root: &mut Directory, name: &str, name_buf: &mut Vec<u16>) -> Option<RegularFile> {
    let ptr = to_utf16(name, name_buf);
    let cstr = unsafe { CStr16::from_ptr(ptr) };
    let handle = root.open(cstr, FileMode::Read, FileAttribute::empty()).ok()?;
    match handle.into_type().ok()? {
        FileType::Regular(f) => Some(f),
        FileType::Dir(_) => None,
    }
}

fn file_info_name(info: &FileInfo) -> String {
    info.file_name().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_candidates_uppercase_and_truncate() {
        let c = eight_dot_three_candidates("llama2-7b-q8.gguf");
        assert_eq!(c[0], "LLAMA2~1.GGUF");
        assert_eq!(c[8], "LLAMA2~9.GGUF");
    }

    #[test]
    fn alias_candidates_skip_non_alnum() {
        let c = eight_dot_three_candidates("my model!!.bin");
        assert!(c[0].starts_with("MYMODE~1"));
    }

    #[test]
    fn alias_candidates_handle_no_extension() {
        let c = eight_dot_three_candidates("reallylongname");
        assert_eq!(c[0], "REALLY~1");
    }
}
