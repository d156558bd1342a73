// Priority bitmap for O(1) highest-ready lookup
// NOTE: one bit per level, larger level = more important
//
// With a single group the levels live in one native word. With G > 1
// levels are split into G words of WORD_BITS levels each, and a summary
// word carries one bit per non-empty group, so highest() costs at most
// two find-highest-set-bit operations.

use crate::port::{WORD_BITS, Word, bit_mask, highest_set_bit};

pub struct PrioBitmap<const G: usize> {
    /// Bit `g` set iff `groups[g] != 0`. Unused when `G == 1`.
    summary: Word,
    groups: [Word; G],
}

impl<const G: usize> PrioBitmap<G> {
    pub const fn new() -> Self {
        Self {
            summary: 0,
            groups: [0; G],
        }
    }

    #[inline]
    const fn split(level: usize) -> (usize, usize) {
        (level / WORD_BITS, level % WORD_BITS)
    }

    #[inline]
    pub fn set(&mut self, level: usize) {
        if G == 1 {
            self.groups[0] |= bit_mask(level);
        } else {
            let (group, index) = Self::split(level);
            self.groups[group] |= bit_mask(index);
            self.summary |= bit_mask(group);
        }
    }

    #[inline]
    pub fn clear(&mut self, level: usize) {
        if G == 1 {
            self.groups[0] &= !bit_mask(level);
        } else {
            let (group, index) = Self::split(level);
            self.groups[group] &= !bit_mask(index);
            // a stale summary bit would send highest() into an empty group
            if self.groups[group] == 0 {
                self.summary &= !bit_mask(group);
            }
        }
    }

    #[inline]
    pub fn is_set(&self, level: usize) -> bool {
        let (group, index) = Self::split(level);
        self.groups[group] & bit_mask(index) != 0
    }

    /// Highest level with its bit set, or `None` when empty.
    #[inline]
    pub fn highest(&self) -> Option<usize> {
        if G == 1 {
            match self.groups[0] {
                0 => None,
                word => Some(highest_set_bit(word)),
            }
        } else {
            if self.summary == 0 {
                return None;
            }
            let group = highest_set_bit(self.summary);
            let index = highest_set_bit(self.groups[group]);
            Some(group * WORD_BITS + index)
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        if G == 1 {
            self.groups[0] == 0
        } else {
            self.summary == 0
        }
    }
}

impl<const G: usize> Default for PrioBitmap<G> {
    fn default() -> Self {
        Self::new()
    }
}
