// Port layer: the only target-specific code in the crate
//
// Register width and the find-highest-set-bit strategy are picked with
// cargo features, one per target property. The critical section itself
// comes from the `critical-section` crate; each target registers its
// implementation with `critical_section::set_impl!`.

#[cfg(any(
    all(feature = "word-8", feature = "word-16"),
    all(feature = "word-8", feature = "word-64"),
    all(feature = "word-16", feature = "word-64"),
))]
compile_error!("coopsched: enable at most one of `word-8`, `word-16`, `word-64`");

/// Native bitmap register.
#[cfg(feature = "word-8")]
pub type Word = u8;
/// Native bitmap register.
#[cfg(feature = "word-16")]
pub type Word = u16;
/// Native bitmap register.
#[cfg(feature = "word-64")]
pub type Word = u64;
/// Native bitmap register.
#[cfg(not(any(feature = "word-8", feature = "word-16", feature = "word-64")))]
pub type Word = u32;

/// Bits per [`Word`].
pub const WORD_BITS: usize = Word::BITS as usize;

/// Word with only bit `n` set.
#[inline]
pub const fn bit_mask(n: usize) -> Word {
    debug_assert!(n < WORD_BITS);
    1 << n
}

/// Index of the most significant set bit. `word` must be non-zero.
#[cfg(not(feature = "log2-table"))]
#[inline]
pub fn highest_set_bit(word: Word) -> usize {
    debug_assert!(word != 0);
    // leading_zeros lowers to CLZ where the core has one
    WORD_BITS - 1 - word.leading_zeros() as usize
}

/// Index of the most significant set bit. `word` must be non-zero.
#[cfg(feature = "log2-table")]
#[inline]
pub fn highest_set_bit(word: Word) -> usize {
    debug_assert!(word != 0);
    let mut shift = WORD_BITS - 8;
    loop {
        let byte = (word >> shift) as u8;
        if byte != 0 {
            return shift + LOG2_8[byte as usize] as usize;
        }
        if shift == 0 {
            return 0;
        }
        shift -= 8;
    }
}

// floor(log2(i)) for every byte value; entry 0 is never read
#[cfg(feature = "log2-table")]
static LOG2_8: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 2;
    while i < 256 {
        table[i] = table[i / 2] + 1;
        i += 1;
    }
    table
};

/// Readiness counter increment; clamps at `u8::MAX` instead of wrapping.
#[inline]
pub const fn sat_increment(count: u8) -> u8 {
    count.saturating_add(1)
}

/// Readiness counter decrement; clamps at zero.
#[inline]
pub const fn sat_decrement(count: u8) -> u8 {
    count.saturating_sub(1)
}

/// Park the core until the next interrupt.
///
/// Safe to call with interrupts masked: on both RISC-V and Cortex-M a
/// pending interrupt wakes WFI regardless of the global enable.
#[inline]
pub fn wait_for_interrupt() {
    #[cfg(any(target_arch = "riscv32", target_arch = "arm"))]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }

    #[cfg(not(any(target_arch = "riscv32", target_arch = "arm")))]
    {
        core::hint::spin_loop();
    }
}
