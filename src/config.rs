// Compile-time configuration
// NOTE: checked when Scheduler::new is monomorphized; a bad
// configuration fails the build
//
// Pool capacity, level count and bitmap group count are const generics
// on Scheduler. Register width is a cargo feature (see port).

use core::fmt;

use crate::port::WORD_BITS;

/// Largest pool a scheduler can hold; handles are 16-bit slot indices.
pub const MAX_TASKS: usize = u16::MAX as usize;

/// Largest level count: two bitmap tiers of native words, and priorities
/// are `u8`.
pub const MAX_LEVELS: usize = if WORD_BITS * WORD_BITS < 256 {
    WORD_BITS * WORD_BITS
} else {
    256
};

/// Bitmap groups needed for `levels` priority levels.
///
/// One group is the flat, single-word bitmap; more than one enables the
/// summary word.
pub const fn groups_for(levels: usize) -> usize {
    levels.div_ceil(WORD_BITS)
}

/// Static description of one scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub tasks: usize,
    pub levels: usize,
    pub groups: usize,
    pub word_bits: usize,
}

impl Config {
    pub const fn new(tasks: usize, levels: usize, groups: usize) -> Self {
        Self {
            tasks,
            levels,
            groups,
            word_bits: WORD_BITS,
        }
    }

    /// Whether `highest()` goes through the group summary word.
    pub const fn is_two_tier(&self) -> bool {
        self.groups > 1
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tasks, {} levels, {}-bit {}",
            self.tasks,
            self.levels,
            self.word_bits,
            if self.is_two_tier() { "two-tier" } else { "flat" }
        )
    }
}

/// Compile-time validation, evaluated from `Scheduler::new`.
pub(crate) const fn validate<const N: usize, const P: usize, const G: usize>() {
    assert!(N > 0, "coopsched: pool capacity must be non-zero");
    assert!(N <= MAX_TASKS, "coopsched: pool capacity exceeds 16-bit handles");
    assert!(P > 0, "coopsched: at least one priority level is required");
    assert!(
        P <= MAX_LEVELS,
        "coopsched: priority levels exceed two bitmap tiers of the native word"
    );
    assert!(
        G == groups_for(P),
        "coopsched: bitmap group count must equal config::groups_for(levels)"
    );
}
