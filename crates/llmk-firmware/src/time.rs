//! Wall clock (§4.A `wall_us`), sourced from the UEFI runtime services
//! `GetTime` call.

use uefi::runtime;

/// Microseconds since midnight, local to whatever timezone the firmware's
/// RTC reports. Used only for diagnostics (e.g. burst-override bookkeeping
/// in the session driver) — inference itself has no wallclock timeouts
/// (§5: "There are no wallclock timeouts on inference").
pub fn wall_us() -> u64 {
    match runtime::get_time() {
        Ok(t) => {
            let h = t.hour() as u64;
            let m = t.minute() as u64;
            let s = t.second() as u64;
            let ns = t.nanosecond() as u64;
            ((h * 3600 + m * 60 + s) * 1_000_000) + ns / 1_000
        }
        Err(_) => 0,
    }
}
