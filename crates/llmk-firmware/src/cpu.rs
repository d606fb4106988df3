//! CPUID/XCR0 feature probing and AVX state enablement (§4.A).
//!
//! Grounded on the teacher's own CPU capability scan
//! (`kernel/src/cpu/mod.rs::CpuCapabilities::detect`) and its AVX-enable
//! sequence (`kernel/src/cpu/simd.rs::enable_avx`), generalized here to
//! also read back XCR0 after attempting to set it (the teacher only ever
//! writes CR4/XCR0 and trusts the write; we need to know whether it
//! actually stuck, since an AVX2 kernel issued on hardware that silently
//! rejected OSXSAVE would fault).

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::{__cpuid, __cpuid_count};

/// CPU feature flags relevant to kernel dispatch (§4.A: "issue CPUID
/// leaves 0, 1, 7 to set flags").
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuFeatures {
    pub sse2: bool,
    pub sse4_1: bool,
    pub avx: bool,
    pub avx2: bool,
    pub fma: bool,
    pub avx512f: bool,
}

impl CpuFeatures {
    /// AVX2 is usable by the math kernels only once both CPUID and the
    /// XCR0 YMM-state bits agree it's safe.
    pub fn avx2_usable(&self) -> bool {
        self.avx2 && self.fma && self.avx
    }
}

/// Conventional-memory tier, derived from the EFI memory map total at
/// boot. Thresholds are exactly those named in §4.A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTier {
    Low,
    Med,
    High,
    Ultra,
}

impl MemoryTier {
    pub fn from_conventional_bytes(total: u64) -> Self {
        const MIB: u64 = 1024 * 1024;
        const GIB: u64 = 1024 * MIB;
        if total < 256 * MIB {
            MemoryTier::Low
        } else if total < GIB {
            MemoryTier::Med
        } else if total < 4 * GIB {
            MemoryTier::High
        } else {
            MemoryTier::Ultra
        }
    }
}

#[cfg(target_arch = "x86_64")]
fn xcr0() -> u64 {
    unsafe {
        let mut eax: u32;
        let mut edx: u32;
        core::arch::asm!("xgetbv", in("ecx") 0u32, out("eax") eax, out("edx") edx, options(nomem, nostack));
        ((edx as u64) << 32) | eax as u64
    }
}

#[cfg(target_arch = "x86_64")]
unsafe fn set_xcr0(value: u64) {
    core::arch::asm!(
        "xsetbv",
        in("ecx") 0u32,
        in("eax") (value & 0xFFFF_FFFF) as u32,
        in("edx") (value >> 32) as u32,
        options(nostack),
    );
}

#[cfg(target_arch = "x86_64")]
unsafe fn enable_osxsave_in_cr4() {
    let mut cr4: u64;
    core::arch::asm!("mov {}, cr4", out(reg) cr4, options(nomem, nostack));
    cr4 |= 1 << 18; // OSXSAVE
    core::arch::asm!("mov cr4, {}", in(reg) cr4, options(nostack));
}

/// Probe CPUID leaves 0/1/7, then best-effort enable OSXSAVE + XCR0 AVX
/// state if CPUID says AVX is present but the OS hasn't turned it on yet.
/// Per §4.A: "AVX bits are only set when OSXSAVE is present *and* XCR0 has
/// bits 1 and 2; if absent, attempt to set CR4.OSXSAVE and XCR0 best-effort
/// before re-reading."
#[cfg(target_arch = "x86_64")]
pub fn probe_and_enable() -> CpuFeatures {
    let leaf0 = unsafe { __cpuid(0) };
    let max_leaf = leaf0.eax;

    let mut features = CpuFeatures::default();
    if max_leaf < 1 {
        return features;
    }

    let leaf1 = unsafe { __cpuid(1) };
    features.sse2 = leaf1.edx & (1 << 26) != 0;
    features.sse4_1 = leaf1.ecx & (1 << 19) != 0;
    let cpuid_avx = leaf1.ecx & (1 << 28) != 0;
    features.fma = leaf1.ecx & (1 << 12) != 0;
    let osxsave = leaf1.ecx & (1 << 27) != 0;

    if max_leaf >= 7 {
        let leaf7 = unsafe { __cpuid_count(7, 0) };
        features.avx2 = leaf7.ebx & (1 << 5) != 0;
        features.avx512f = leaf7.ebx & (1 << 16) != 0;
    }

    let xcr0_has_avx_state = |v: u64| v & 0b110 == 0b110;

    let mut have_avx_state = cpuid_avx && osxsave && xcr0_has_avx_state(xcr0());
    if cpuid_avx && !have_avx_state {
        unsafe {
            enable_osxsave_in_cr4();
            set_xcr0(0b111); // x87 | SSE | AVX
        }
        have_avx_state = xcr0_has_avx_state(xcr0());
    }

    features.avx = have_avx_state;
    if !have_avx_state {
        features.avx2 = false;
        features.fma = false;
    }

    features
}

#[cfg(not(target_arch = "x86_64"))]
pub fn probe_and_enable() -> CpuFeatures {
    CpuFeatures::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_tier_thresholds() {
        assert_eq!(MemoryTier::from_conventional_bytes(1), MemoryTier::Low);
        assert_eq!(MemoryTier::from_conventional_bytes(256 * 1024 * 1024), MemoryTier::Med);
        assert_eq!(MemoryTier::from_conventional_bytes(1024 * 1024 * 1024), MemoryTier::High);
        assert_eq!(MemoryTier::from_conventional_bytes(4u64 * 1024 * 1024 * 1024), MemoryTier::Ultra);
    }

    #[test]
    fn avx2_usable_requires_all_three_bits() {
        let f = CpuFeatures { sse2: true, sse4_1: true, avx: true, avx2: true, fma: false, avx512f: false };
        assert!(!f.avx2_usable());
        let f2 = CpuFeatures { fma: true, ..f };
        assert!(f2.avx2_usable());
    }
}
