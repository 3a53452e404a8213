//! Fixed-modulus sequence-number arithmetic.
//!
//! Both protocol pairs number packets in `[0, modulus)` and wrap around.
//! All window membership tests go through [`SeqSpace`] so wraparound
//! comparisons live in exactly one place.

/// Sequence-number space with wraparound arithmetic modulo a fixed modulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    modulus: u32,
}

impl SeqSpace {
    /// Create a space over `[0, modulus)`.
    ///
    /// # Panics
    ///
    /// Panics if `modulus < 2`; a one-number space cannot distinguish
    /// anything.
    pub fn new(modulus: u32) -> Self {
        assert!(modulus >= 2, "sequence modulus must be at least 2");
        Self { modulus }
    }

    pub fn modulus(&self) -> u32 {
        self.modulus
    }

    pub fn next(&self, seq: u32) -> u32 {
        (seq + 1) % self.modulus
    }

    pub fn prev(&self, seq: u32) -> u32 {
        (seq + self.modulus - 1) % self.modulus
    }

    pub fn add(&self, seq: u32, offset: u32) -> u32 {
        (seq + offset % self.modulus) % self.modulus
    }

    /// Forward distance from `from` to `to`, in `[0, modulus)`.
    pub fn distance(&self, from: u32, to: u32) -> u32 {
        (to + self.modulus - from) % self.modulus
    }

    /// `true` when `seq` lies in the half-open window `[base, base + size)`.
    pub fn in_window(&self, base: u32, size: u32, seq: u32) -> bool {
        self.distance(base, seq) < size
    }
}
