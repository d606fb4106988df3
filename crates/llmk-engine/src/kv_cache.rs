//! The per-layer, per-position key/value cache (§3, GLOSSARY "KV cache").
//!
//! Grounded on the teacher's own `KVCache` in
//! `kernel/src/jarvis/inference.rs`, but laid out as one flat buffer per
//! tensor (`layers * seq_len * kv_dim`) instead of a `Vec<Vec<f32>>` per
//! layer — the flat layout matches §3's activation-state description and
//! avoids a second level of indirection on every attention step.

use alloc::vec;
use alloc::vec::Vec;

pub struct KvCache {
    pub n_layers: usize,
    pub seq_len: usize,
    pub kv_dim: usize,
    k: Vec<f32>,
    v: Vec<f32>,
}

impl KvCache {
    pub fn new(n_layers: usize, seq_len: usize, kv_dim: usize) -> Self {
        let len = n_layers * seq_len * kv_dim;
        KvCache { n_layers, seq_len, kv_dim, k: vec![0.0; len], v: vec![0.0; len] }
    }

    fn offset(&self, layer: usize, pos: usize) -> usize {
        (layer * self.seq_len + pos) * self.kv_dim
    }

    pub fn key_mut(&mut self, layer: usize, pos: usize) -> &mut [f32] {
        let off = self.offset(layer, pos);
        &mut self.k[off..off + self.kv_dim]
    }

    pub fn value_mut(&mut self, layer: usize, pos: usize) -> &mut [f32] {
        let off = self.offset(layer, pos);
        &mut self.v[off..off + self.kv_dim]
    }

    pub fn key(&self, layer: usize, pos: usize) -> &[f32] {
        let off = self.offset(layer, pos);
        &self.k[off..off + self.kv_dim]
    }

    pub fn value(&self, layer: usize, pos: usize) -> &[f32] {
        let off = self.offset(layer, pos);
        &self.v[off..off + self.kv_dim]
    }

    /// Cleared on `/reset` (§3 Lifecycle); reused across turns otherwise.
    pub fn clear(&mut self) {
        self.k.iter_mut().for_each(|x| *x = 0.0);
        self.v.iter_mut().for_each(|x| *x = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_at_one_position_do_not_alias_another() {
        let mut cache = KvCache::new(2, 4, 3);
        cache.key_mut(0, 1).copy_from_slice(&[1.0, 2.0, 3.0]);
        cache.key_mut(0, 2).copy_from_slice(&[9.0, 9.0, 9.0]);
        assert_eq!(cache.key(0, 1), &[1.0, 2.0, 3.0]);
        assert_eq!(cache.key(1, 1), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut cache = KvCache::new(1, 2, 2);
        cache.key_mut(0, 0).copy_from_slice(&[1.0, 1.0]);
        cache.clear();
        assert_eq!(cache.key(0, 0), &[0.0, 0.0]);
    }
}
