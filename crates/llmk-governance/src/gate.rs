//! The governance gate itself (§3, §4.G): mode, counters, and the
//! `decide` rule table transcribed from `djibion_decide`
//! (`djibion-engine/core/djibion.c`).

use alloc::string::ToString;

use crate::action::Action;
use crate::decision::{Check, Decision, Triangle, Verdict};
use crate::laws::Laws;
use crate::paths::{build_prefixed_path, has_dotdot, starts_with_ci};

/// Whether a REJECT/FREEZE verdict is actually enforced by the caller.
/// `decide` itself is mode-agnostic; the session driver reads `mode` to
/// decide whether to honor the verdict it gets back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Off,
    Observe,
    Enforce,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Enforce
    }
}

#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub total: u32,
    pub rejected: u32,
    pub transformed: u32,
}

#[derive(Debug, Clone)]
pub struct GovernanceGate {
    pub mode: Mode,
    pub laws: Laws,
    pub counters: Counters,
}

impl Default for GovernanceGate {
    fn default() -> Self {
        GovernanceGate { mode: Mode::default(), laws: Laws::default(), counters: Counters::default() }
    }
}

fn reject(risk: u8, triangle: Triangle, reason: &str) -> Decision {
    Decision { verdict: Verdict::Reject, triangle, risk, reason: reason.to_string(), transformed_arg0: None }
}

fn transform(risk: u8, triangle: Triangle, reason: &str, new_arg0: alloc::string::String) -> Decision {
    Decision { verdict: Verdict::Transform, triangle, risk, reason: reason.to_string(), transformed_arg0: Some(new_arg0) }
}

fn dotdot_check() -> Triangle {
    Triangle { sense: Check::PASS, structure: Check::fail(10), reality: Check::PASS }
}

impl GovernanceGate {
    pub fn new(mode: Mode, laws: Laws) -> Self {
        GovernanceGate { mode, laws, counters: Counters::default() }
    }

    /// Evaluate `action` against the current laws. `arg0` is the
    /// action's path-shaped argument (ignored by `OoExec`/`OoAuto`/
    /// `CfgWrite`); `arg1` is a byte count or cycle count depending on
    /// the action.
    pub fn decide(&mut self, action: Action, arg0: &str, arg1: u32) -> Decision {
        self.counters.total += 1;
        let laws = &self.laws;

        let decision = match action {
            Action::None => Decision::allow(5),

            Action::FsWrite | Action::FsAppend => {
                if has_dotdot(arg0) {
                    reject(80, dotdot_check(), "path contains '..'")
                } else if !laws.allow_fs_write {
                    reject(70, Triangle { sense: Check::fail(5), ..Triangle::default() }, "fs write disabled by laws")
                } else if laws.max_fs_write_bytes != 0 && arg1 > laws.max_fs_write_bytes {
                    reject(
                        60,
                        Triangle { reality: Check::fail(15), ..Triangle::default() },
                        "fs write exceeds max bytes",
                    )
                } else if !starts_with_ci(arg0, &laws.fs_mut_prefix) {
                    transform(
                        55,
                        Triangle { structure: Check::fail(50), ..Triangle::default() },
                        "fs write outside allowed prefix",
                        build_prefixed_path(&laws.fs_mut_prefix, arg0),
                    )
                } else {
                    Decision::allow(35)
                }
            }

            Action::FsRm => {
                if has_dotdot(arg0) {
                    reject(70, dotdot_check(), "path contains '..'")
                } else if !laws.allow_fs_delete {
                    reject(70, Triangle { sense: Check::fail(5), ..Triangle::default() }, "fs delete disabled by laws")
                } else if !starts_with_ci(arg0, &laws.fs_mut_prefix) {
                    // no silent redirection of deletes: reject, never transform
                    reject(
                        70,
                        Triangle { structure: Check::fail(10), ..Triangle::default() },
                        "fs delete outside allowed prefix",
                    )
                } else {
                    Decision::allow(70)
                }
            }

            Action::FsCp | Action::FsMv => {
                if has_dotdot(arg0) {
                    reject(80, dotdot_check(), "path contains '..'")
                } else if !laws.allow_fs_write {
                    reject(70, Triangle { sense: Check::fail(5), ..Triangle::default() }, "fs write disabled by laws")
                } else if action == Action::FsMv && !laws.allow_fs_delete {
                    reject(
                        75,
                        Triangle { sense: Check::fail(5), ..Triangle::default() },
                        "fs move disabled (delete not allowed)",
                    )
                } else if !starts_with_ci(arg0, &laws.fs_mut_prefix) {
                    let reason = if action == Action::FsMv { "fs move outside allowed prefix" } else { "fs copy outside allowed prefix" };
                    transform(
                        55,
                        Triangle { structure: Check::fail(50), ..Triangle::default() },
                        reason,
                        build_prefixed_path(&laws.fs_mut_prefix, arg0),
                    )
                } else {
                    Decision::allow(45)
                }
            }

            Action::SnapLoad => {
                if !laws.allow_snap_load {
                    reject(65, Triangle { sense: Check::fail(5), ..Triangle::default() }, "snapshot load disabled by laws")
                } else if has_dotdot(arg0) {
                    reject(80, dotdot_check(), "path contains '..'")
                } else if !starts_with_ci(arg0, &laws.fs_mut_prefix) {
                    transform(
                        50,
                        Triangle { structure: Check::fail(50), ..Triangle::default() },
                        "snapshot load outside allowed prefix",
                        build_prefixed_path(&laws.fs_mut_prefix, arg0),
                    )
                } else {
                    Decision::allow(25)
                }
            }

            Action::SnapSave => {
                if !laws.allow_snap_save {
                    reject(70, Triangle { sense: Check::fail(5), ..Triangle::default() }, "snapshot save disabled by laws")
                } else if laws.max_snap_bytes != 0 && arg1 > laws.max_snap_bytes {
                    reject(
                        65,
                        Triangle { reality: Check::fail(15), ..Triangle::default() },
                        "snapshot save exceeds max bytes",
                    )
                } else if has_dotdot(arg0) {
                    reject(85, dotdot_check(), "path contains '..'")
                } else if !starts_with_ci(arg0, &laws.fs_mut_prefix) {
                    transform(
                        55,
                        Triangle { structure: Check::fail(50), ..Triangle::default() },
                        "snapshot save outside allowed prefix",
                        build_prefixed_path(&laws.fs_mut_prefix, arg0),
                    )
                } else {
                    Decision::allow(40)
                }
            }

            Action::OoExec => {
                if !laws.allow_oo_exec {
                    reject(65, Triangle { sense: Check::fail(5), ..Triangle::default() }, "oo exec disabled by laws")
                } else if laws.max_oo_cycles != 0 && arg1 > laws.max_oo_cycles {
                    reject(
                        55,
                        Triangle { reality: Check::fail(20), ..Triangle::default() },
                        "oo exec exceeds max cycles",
                    )
                } else {
                    Decision::allow(30)
                }
            }

            Action::OoAuto => {
                if !laws.allow_oo_auto {
                    reject(65, Triangle { sense: Check::fail(5), ..Triangle::default() }, "oo auto disabled by laws")
                } else if laws.max_oo_cycles != 0 && arg1 > laws.max_oo_cycles {
                    reject(
                        55,
                        Triangle { reality: Check::fail(20), ..Triangle::default() },
                        "oo auto exceeds max cycles",
                    )
                } else {
                    Decision::allow(30)
                }
            }

            Action::OoSave => {
                if !laws.allow_oo_persist {
                    reject(70, Triangle { sense: Check::fail(5), ..Triangle::default() }, "oo persist disabled by laws")
                } else if has_dotdot(arg0) {
                    reject(85, dotdot_check(), "path contains '..'")
                } else if !starts_with_ci(arg0, &laws.fs_mut_prefix) {
                    transform(
                        55,
                        Triangle { structure: Check::fail(50), ..Triangle::default() },
                        "oo save outside allowed prefix",
                        build_prefixed_path(&laws.fs_mut_prefix, arg0),
                    )
                } else {
                    Decision::allow(35)
                }
            }

            Action::OoLoad => {
                if !laws.allow_oo_persist {
                    reject(70, Triangle { sense: Check::fail(5), ..Triangle::default() }, "oo persist disabled by laws")
                } else if has_dotdot(arg0) {
                    reject(85, dotdot_check(), "path contains '..'")
                } else if !starts_with_ci(arg0, &laws.fs_mut_prefix) {
                    transform(
                        55,
                        Triangle { structure: Check::fail(50), ..Triangle::default() },
                        "oo load outside allowed prefix",
                        build_prefixed_path(&laws.fs_mut_prefix, arg0),
                    )
                } else {
                    Decision::allow(40)
                }
            }

            Action::Autorun => {
                if !laws.allow_autorun {
                    reject(65, Triangle { sense: Check::fail(5), ..Triangle::default() }, "autorun disabled by laws")
                } else if has_dotdot(arg0) {
                    reject(80, dotdot_check(), "path contains '..'")
                } else if !starts_with_ci(arg0, &laws.fs_mut_prefix) {
                    transform(
                        50,
                        Triangle { structure: Check::fail(50), ..Triangle::default() },
                        "autorun outside allowed prefix",
                        build_prefixed_path(&laws.fs_mut_prefix, arg0),
                    )
                } else {
                    Decision::allow(35)
                }
            }

            Action::CfgWrite => {
                if !laws.allow_cfg_write {
                    reject(75, Triangle { sense: Check::fail(5), ..Triangle::default() }, "config write disabled by laws")
                } else {
                    Decision::allow(40)
                }
            }
        };

        match decision.verdict {
            Verdict::Reject | Verdict::Freeze => self.counters.rejected += 1,
            Verdict::Transform => self.counters.transformed += 1,
            Verdict::Allow => {}
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    #[test]
    fn scenario_3_fs_write_outside_prefix_transforms() {
        let mut laws = Laws::default();
        laws.fs_mut_prefix = String::from("work\\");
        let mut gate = GovernanceGate::new(Mode::Enforce, laws);

        let d = gate.decide(Action::FsWrite, "C:\\Windows\\evil.txt", 1024);

        assert_eq!(d.verdict, Verdict::Transform);
        assert_eq!(d.transformed_arg0.as_deref(), Some("work\\evil.txt"));
        assert_eq!(d.risk, 55);
        assert!(d.reason.contains("outside allowed prefix"));
    }

    #[test]
    fn idempotent_when_already_under_prefix() {
        let mut laws = Laws::default();
        laws.fs_mut_prefix = String::from("work\\");
        let mut gate = GovernanceGate::new(Mode::Enforce, laws);

        let d = gate.decide(Action::FsWrite, "work\\evil.txt", 1024);
        assert_eq!(d.verdict, Verdict::Allow);
        assert!(d.transformed_arg0.is_none());
    }

    #[test]
    fn path_traversal_always_rejected() {
        let mut gate = GovernanceGate::new(Mode::Enforce, Laws::default());
        let d = gate.decide(Action::FsWrite, "work\\..\\evil.txt", 1024);
        assert_eq!(d.verdict, Verdict::Reject);
        assert!(!d.triangle.structure.ok);
    }

    #[test]
    fn fs_delete_disabled_by_default() {
        let mut gate = GovernanceGate::new(Mode::Enforce, Laws::default());
        let d = gate.decide(Action::FsRm, "work\\x.txt", 0);
        assert_eq!(d.verdict, Verdict::Reject);
    }

    #[test]
    fn fs_delete_outside_prefix_rejects_not_transforms() {
        let mut laws = Laws::default();
        laws.allow_fs_delete = true;
        laws.fs_mut_prefix = String::from("work\\");
        let mut gate = GovernanceGate::new(Mode::Enforce, laws);
        let d = gate.decide(Action::FsRm, "C:\\Windows\\evil.txt", 0);
        assert_eq!(d.verdict, Verdict::Reject);
    }

    #[test]
    fn cfg_write_allowed_by_default() {
        let mut gate = GovernanceGate::new(Mode::Enforce, Laws::default());
        let d = gate.decide(Action::CfgWrite, "", 0);
        assert_eq!(d.verdict, Verdict::Allow);
    }

    #[test]
    fn oo_exec_exceeding_max_cycles_rejects() {
        let mut gate = GovernanceGate::new(Mode::Enforce, Laws::default());
        let d = gate.decide(Action::OoExec, "", 100);
        assert_eq!(d.verdict, Verdict::Reject);
    }

    #[test]
    fn zero_cap_means_unlimited_for_byte_and_cycle_budgets() {
        let mut laws = Laws::default();
        laws.max_fs_write_bytes = 0;
        laws.max_snap_bytes = 0;
        laws.max_oo_cycles = 0;
        let mut gate = GovernanceGate::new(Mode::Enforce, laws);

        let write = gate.decide(Action::FsWrite, "", u32::MAX);
        assert_eq!(write.verdict, Verdict::Allow);

        let snap = gate.decide(Action::SnapSave, "", u32::MAX);
        assert_eq!(snap.verdict, Verdict::Allow);

        let exec = gate.decide(Action::OoExec, "", u32::MAX);
        assert_eq!(exec.verdict, Verdict::Allow);

        let auto = gate.decide(Action::OoAuto, "", u32::MAX);
        assert_eq!(auto.verdict, Verdict::Allow);
    }

    #[test]
    fn counters_are_monotonic_across_calls() {
        let mut gate = GovernanceGate::new(Mode::Enforce, Laws::default());
        let before = gate.counters.clone();
        gate.decide(Action::FsWrite, "work\\..\\evil.txt", 1024);
        assert_eq!(gate.counters.total, before.total + 1);
        assert!(gate.counters.rejected >= before.rejected);
        assert!(gate.counters.transformed >= before.transformed);
    }

    #[test]
    fn none_action_is_low_risk_allow() {
        let mut gate = GovernanceGate::new(Mode::Enforce, Laws::default());
        let d = gate.decide(Action::None, "", 0);
        assert_eq!(d.verdict, Verdict::Allow);
        assert_eq!(d.risk, 5);
    }
}
