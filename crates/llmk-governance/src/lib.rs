//! The Djibion governance gate (§4.G): classifies session-driver side
//! effects into an `Action`, evaluates them against a set of `Laws`
//! through a triangulated sense/structure/reality check, and returns a
//! `Decision` the caller can honor or ignore depending on `Mode`.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod action;
mod biocode;
mod decision;
mod gate;
mod laws;
mod paths;

pub use action::Action;
pub use biocode::{djb2, parse as parse_biocode, Intent, IntentKind, InvalidBiocode};
pub use decision::{Check, Decision, Triangle, Verdict};
pub use gate::{Counters, GovernanceGate, Mode};
pub use laws::Laws;
