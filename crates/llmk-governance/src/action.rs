//! The side effects the session driver may ask the gate about (§4.G).

/// One externally requested side effect. `None` is the no-op default used
/// by callers that just want a risk-free pass-through (e.g. read-only
/// REPL commands never call [`crate::gate::decide`] at all, but a uniform
/// `Action` makes batching/logging simpler than an `Option<Action>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,

    FsWrite,
    FsAppend,
    FsRm,
    FsCp,
    FsMv,

    SnapLoad,
    SnapSave,

    OoExec,
    OoAuto,
    OoSave,
    OoLoad,

    Autorun,
    CfgWrite,
}
