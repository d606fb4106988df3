//! Governance laws: the hard limits and policy flags `decide` checks
//! (§3 "Governance state"). Defaults mirror `djibion_init` in the
//! original source (`djibion-engine/core/djibion.c`) exactly, down to
//! the byte budgets.

use alloc::string::String;

#[derive(Debug, Clone)]
pub struct Laws {
    pub max_fs_write_bytes: u32,
    pub max_snap_bytes: u32,
    pub max_oo_cycles: u32,

    pub allow_fs_delete: bool,
    pub allow_fs_write: bool,
    pub allow_snap_load: bool,
    pub allow_snap_save: bool,
    pub allow_cfg_write: bool,
    pub allow_autorun: bool,
    pub allow_oo_exec: bool,
    pub allow_oo_auto: bool,
    pub allow_oo_persist: bool,

    /// Restricts filesystem mutations to this prefix (ASCII, `\`-separated
    /// paths). Empty means no prefix restriction. Capped at 64 bytes in
    /// the original C struct; kept here as an owned `String` since we're
    /// no longer fighting a fixed-size C buffer.
    pub fs_mut_prefix: String,
}

impl Default for Laws {
    fn default() -> Self {
        Laws {
            max_fs_write_bytes: 64 * 1024,
            max_snap_bytes: 256 * 1024 * 1024,
            max_oo_cycles: 16,

            allow_fs_delete: false,
            allow_fs_write: true,
            allow_snap_load: true,
            allow_snap_save: true,
            allow_cfg_write: true,
            allow_autorun: true,
            allow_oo_exec: true,
            allow_oo_auto: true,
            allow_oo_persist: true,

            fs_mut_prefix: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_original_engine_init() {
        let laws = Laws::default();
        assert_eq!(laws.max_fs_write_bytes, 65536);
        assert_eq!(laws.max_snap_bytes, 256 * 1024 * 1024);
        assert_eq!(laws.max_oo_cycles, 16);
        assert!(!laws.allow_fs_delete);
        assert!(laws.allow_fs_write);
        assert!(laws.fs_mut_prefix.is_empty());
    }
}
