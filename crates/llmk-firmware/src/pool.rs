//! Pool allocation (§4.A `alloc_pool`/`free_pool`, design notes: "Pool
//! allocations become a single arena owned by the session driver;
//! `free_pool` is called only at shutdown, so a bump allocator with
//! explicit reset between models is a faithful replacement").
//!
//! The `uefi` crate's `alloc` feature installs `#[global_allocator]` on
//! top of `EFI_BOOT_SERVICES.AllocatePool`/`FreePool`, the same relation
//! the teacher has between its kernel heap (`kernel/src/memory/heap.rs`,
//! a `linked_list_allocator::LockedHeap`) and `alloc::alloc::{alloc,
//! dealloc}`. `Arena` is the thin wrapper the session driver holds for the
//! weight buffer: one pool allocation, freed exactly once, with an
//! explicit `reset` hook for `/load` replacing an already-loaded model.

use alloc::vec::Vec;

/// An owned, page-aligned-enough byte buffer backed by the global pool
/// allocator. Not a true bump arena (the underlying allocator is
/// `uefi`'s), but it gives the session driver the single
/// allocate-once/free-once lifecycle the design notes call for.
pub struct Arena {
    buf: Vec<u8>,
}

impl Arena {
    pub fn with_capacity(bytes: usize) -> Self {
        Arena { buf: Vec::with_capacity(bytes) }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn resize(&mut self, new_len: usize, value: u8) {
        self.buf.resize(new_len, value);
    }

    /// Drop the contents and release pool memory back to firmware. Called
    /// on `unload_model`/`/reset`, matching `free_pool` being called "only
    /// at shutdown" for a given model instance.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.buf.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_frees_capacity() {
        let mut a = Arena::with_capacity(4096);
        a.resize(4096, 0);
        assert_eq!(a.len(), 4096);
        a.reset();
        assert_eq!(a.len(), 0);
    }
}
