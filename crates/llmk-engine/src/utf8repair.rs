//! UTF-8 tail buffering and mojibake repair for streamed detokenizer
//! output.
//!
//! The detokenizer yields one piece per sampled token; a multi-byte
//! character can land split across two pieces, so incomplete trailing
//! bytes are held back until the next `feed` (or until `flush` at end of
//! turn) instead of being emitted broken. The repair table mirrors the
//! "ÔÇÖ"-style smart-punctuation mojibake this generation's output has
//! been seen to produce.

use alloc::vec::Vec;

const MAX_TAIL: usize = 5;

/// Six known CP437-triplet artifacts, rewritten to their intended
/// three-byte UTF-8 punctuation before the console conversion to UTF-16.
/// The ASCII comment shows the mojibake string as it appears when a
/// terminal misrenders it.
const MOJIBAKE_TABLE: [([u8; 6], [u8; 3]); 6] = [
    ([0xC3, 0x94, 0xC3, 0x87, 0xC3, 0x96], [0xE2, 0x80, 0x99]), // "ÔÇÖ" -> '
    ([0xC3, 0x94, 0xC3, 0x87, 0xC2, 0xA3], [0xE2, 0x80, 0x9C]), // "ÔÇ£" -> "
    ([0xC3, 0x94, 0xC3, 0x87, 0xC3, 0x98], [0xE2, 0x80, 0x9D]), // "ÔÇØ" -> "
    ([0xC3, 0x94, 0xC3, 0x87, 0xC3, 0xB6], [0xE2, 0x80, 0x94]), // "ÔÇö" -> --
    ([0xC3, 0x94, 0xC3, 0x87, 0xC2, 0xAA], [0xE2, 0x80, 0xA6]), // "ÔÇª" -> ...
    ([0xC3, 0x94, 0xC3, 0x87, 0xC2, 0x92], [0xE2, 0x80, 0x93]), // "ÔÇÆ" -> -
];

pub struct Utf8Repair {
    tail: Vec<u8>,
}

impl Utf8Repair {
    pub fn new() -> Self {
        Utf8Repair { tail: Vec::with_capacity(MAX_TAIL) }
    }

    /// Feed the next detokenized piece; appends any newly-complete,
    /// repaired bytes to `out` and retains an incomplete trailing
    /// sequence (at most `MAX_TAIL` bytes) for the next call.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        self.tail.extend_from_slice(chunk);

        let complete_len = match core::str::from_utf8(&self.tail) {
            Ok(_) => self.tail.len(),
            Err(e) => match e.error_len() {
                // Trailing bytes look like the start of a multi-byte
                // sequence that hasn't arrived yet.
                None => e.valid_up_to(),
                // A genuinely invalid sequence: emit up to it so we
                // never drop or duplicate a byte, pass it through
                // unrepaired rather than stalling the tail forever.
                Some(_) => self.tail.len(),
            },
        };

        repair_into(&self.tail[..complete_len], out);
        self.tail.drain(..complete_len);
        debug_assert!(self.tail.len() <= MAX_TAIL);
    }

    /// End-of-turn flush (§4.F step 4): whatever remains in the tail is
    /// emitted as-is and the tail is cleared.
    pub fn flush(&mut self, out: &mut Vec<u8>) {
        repair_into(&self.tail, out);
        self.tail.clear();
    }

    pub fn tail_len(&self) -> usize {
        self.tail.len()
    }
}

impl Default for Utf8Repair {
    fn default() -> Self {
        Self::new()
    }
}

fn repair_into(bytes: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    'outer: while i < bytes.len() {
        if i + 6 <= bytes.len() {
            for (src, dst) in MOJIBAKE_TABLE.iter() {
                if &bytes[i..i + 6] == src {
                    out.extend_from_slice(dst);
                    i += 6;
                    continue 'outer;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_multibyte_character_is_reassembled_across_feeds() {
        let euro = "€".as_bytes(); // E2 82 AC
        let mut repair = Utf8Repair::new();
        let mut out = Vec::new();
        repair.feed(&euro[..1], &mut out);
        assert!(out.is_empty());
        repair.feed(&euro[1..], &mut out);
        assert_eq!(out, euro);
    }

    #[test]
    fn flush_emits_whatever_tail_remains() {
        let mut repair = Utf8Repair::new();
        let mut out = Vec::new();
        repair.feed(&[0xE2, 0x82], &mut out);
        assert!(out.is_empty());
        repair.flush(&mut out);
        assert_eq!(out, [0xE2, 0x82]);
        assert_eq!(repair.tail_len(), 0);
    }

    #[test]
    fn mojibake_triplet_is_rewritten_to_right_single_quote() {
        let mut repair = Utf8Repair::new();
        let mut out = Vec::new();
        repair.feed(&[0xC3, 0x94, 0xC3, 0x87, 0xC3, 0x96], &mut out);
        assert_eq!(out, [0xE2, 0x80, 0x99]);
    }

    #[test]
    fn plain_ascii_passes_through_unchanged() {
        let mut repair = Utf8Repair::new();
        let mut out = Vec::new();
        repair.feed(b"hello", &mut out);
        assert_eq!(out, b"hello");
    }

    #[test]
    fn no_byte_is_dropped_across_an_arbitrary_partition() {
        let s = "hello € world ’".as_bytes();
        for split in 0..s.len() {
            let mut repair = Utf8Repair::new();
            let mut out = Vec::new();
            repair.feed(&s[..split], &mut out);
            repair.feed(&s[split..], &mut out);
            repair.flush(&mut out);
            assert_eq!(out.len(), s.len());
        }
    }
}
