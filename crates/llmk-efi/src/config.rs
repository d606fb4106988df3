//! `repl.cfg` parsing (§6): ASCII `key=value` lines, `#` comments,
//! unrecognized keys ignored. No `serde`/`toml` — a hand-rolled line
//! scanner, matching the teacher's own ASCII protocol parsers
//! (`kernel/src/jarvis/mentor.rs::handle_config`, which does the same
//! `prefix=value` splitting for `MENTOR:CONFIG:` lines).

use alloc::string::{String, ToString};

#[derive(Debug, Clone)]
pub struct Config {
    pub splash_ms: u32,
    pub overlay: bool,
    pub overlay_top: u32,
    pub overlay_max_w: u32,
    pub overlay_h: u32,
    pub overlay_digits: bool,
    pub overlay_time: bool,
    pub overlay_time_mode: String,
    pub diopion_mode: String,
    pub diopion_profile: String,
    pub fat83_force: bool,
    pub oo_enable: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            splash_ms: 0,
            overlay: false,
            overlay_top: 0,
            overlay_max_w: 0,
            overlay_h: 0,
            overlay_digits: false,
            overlay_time: false,
            overlay_time_mode: String::new(),
            diopion_mode: String::new(),
            diopion_profile: String::new(),
            fat83_force: false,
            oo_enable: true,
        }
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "on" | "yes")
}

impl Config {
    /// Parse `repl.cfg`'s text (already read whole into memory). Lines
    /// starting with `#` and blank lines are skipped; any key this
    /// application doesn't act on (overlay geometry, diopion profile
    /// names, the `oo_*` family beyond `oo_enable`) is still recognized
    /// per §6 but has no behavioral effect here — those subsystems are
    /// external collaborators (§1).
    pub fn parse(text: &str) -> Self {
        let mut cfg = Config::default();
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "splash_ms" => cfg.splash_ms = value.parse().unwrap_or(cfg.splash_ms),
                "overlay" => cfg.overlay = parse_bool(value),
                "overlay_top" => cfg.overlay_top = value.parse().unwrap_or(cfg.overlay_top),
                "overlay_max_w" => cfg.overlay_max_w = value.parse().unwrap_or(cfg.overlay_max_w),
                "overlay_h" => cfg.overlay_h = value.parse().unwrap_or(cfg.overlay_h),
                "overlay_digits" => cfg.overlay_digits = parse_bool(value),
                "overlay_time" => cfg.overlay_time = parse_bool(value),
                "overlay_time_mode" => cfg.overlay_time_mode = value.to_string(),
                "diopion_mode" => cfg.diopion_mode = value.to_string(),
                "diopion_profile" => cfg.diopion_profile = value.to_string(),
                "fat83_force" => cfg.fat83_force = parse_bool(value),
                "oo_enable" => cfg.oo_enable = parse_bool(value),
                _ => {} // unrecognized keys ignored, per §6
            }
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_keys() {
        let cfg = Config::parse("splash_ms=1500\noverlay=true\nfat83_force=1\n# comment\n\n");
        assert_eq!(cfg.splash_ms, 1500);
        assert!(cfg.overlay);
        assert!(cfg.fat83_force);
    }

    #[test]
    fn unrecognized_keys_are_ignored_not_errors() {
        let cfg = Config::parse("totally_unknown_key=weird\nsplash_ms=5\n");
        assert_eq!(cfg.splash_ms, 5);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let cfg = Config::parse("not_a_kv_line\nsplash_ms=7\n");
        assert_eq!(cfg.splash_ms, 7);
    }
}
