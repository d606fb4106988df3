//! The verdict and supporting triangulated-check types `decide` returns
//! (§3 "A Decision carries...").

use alloc::string::String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Transform,
    Reject,
    Freeze,
}

/// One leg of the triangle: whether it passed, and a confidence score
/// 0..100. All three legs start `ok=true, score=100` and a failing rule
/// knocks one leg down (§4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Check {
    pub ok: bool,
    pub score: u8,
}

impl Check {
    pub const PASS: Check = Check { ok: true, score: 100 };

    pub fn fail(score: u8) -> Self {
        Check { ok: false, score }
    }
}

impl Default for Check {
    fn default() -> Self {
        Check::PASS
    }
}

/// `sense` = is the action even permitted in principle; `structure` = is
/// the request well-formed (no path traversal, no malformed bio-code);
/// `reality` = does it fit within the resource budgets actually available.
#[derive(Debug, Clone, Copy, Default)]
pub struct Triangle {
    pub sense: Check,
    pub structure: Check,
    pub reality: Check,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub verdict: Verdict,
    pub triangle: Triangle,
    pub risk: u8,
    pub reason: String,
    /// Set only on [`Verdict::Transform`]: the rewritten `arg0` the caller
    /// should use instead of the one it requested.
    pub transformed_arg0: Option<String>,
}

impl Decision {
    pub(crate) fn allow(risk: u8) -> Self {
        Decision {
            verdict: Verdict::Allow,
            triangle: Triangle::default(),
            risk,
            reason: String::new(),
            transformed_arg0: None,
        }
    }
}
