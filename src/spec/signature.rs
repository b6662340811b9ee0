use std::fmt::Display;

use smallvec::{smallvec, SmallVec};

const WORD: usize = 64;

/// A set of evaluation point indices, stored as a bit vector.
///
/// Bit `i` is set if a term satisfies the specification at the `i`-th point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    words: SmallVec<[u64; 2]>,
    len: usize,
}

impl Signature {
    /// A signature over `len` points with no bit set.
    pub fn new(len: usize) -> Self {
        Self {
            words: smallvec![0; (len + WORD - 1) / WORD],
            len,
        }
    }

    /// A signature over `len` points with every bit set.
    pub fn full(len: usize) -> Self {
        let mut s = Self::new(len);
        for i in 0..len {
            s.set(i, true);
        }
        s
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a bit for a new point.
    pub fn push(&mut self, bit: bool) {
        if self.len % WORD == 0 {
            self.words.push(0);
        }
        self.len += 1;
        self.set(self.len - 1, bit);
    }

    pub fn get(&self, i: usize) -> bool {
        i < self.len && self.words[i / WORD] >> (i % WORD) & 1 == 1
    }

    pub fn set(&mut self, i: usize, bit: bool) {
        debug_assert!(i < self.len);
        let mask = 1u64 << (i % WORD);
        if bit {
            self.words[i / WORD] |= mask;
        } else {
            self.words[i / WORD] &= !mask;
        }
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns true if every point is in the set.
    pub fn is_full(&self) -> bool {
        self.count() == self.len
    }

    /// Returns true if no point is in the set.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn is_subset_of(&self, other: &Signature) -> bool {
        self.words
            .iter()
            .zip(other.words.iter().chain(std::iter::repeat(&0)))
            .all(|(a, b)| a & !b == 0)
    }

    pub fn union_with(&mut self, other: &Signature) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= b;
        }
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.len {
            write!(f, "{}", if self.get(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_crosses_word_boundary() {
        let mut s = Signature::default();
        for i in 0..130 {
            s.push(i % 3 == 0);
        }
        assert_eq!(s.len(), 130);
        assert_eq!(s.count(), 44);
        assert!(s.get(129));
        assert!(!s.get(128));
    }

    #[test]
    fn subset_and_union() {
        let mut a = Signature::new(3);
        a.set(0, true);
        let mut b = Signature::new(3);
        b.set(0, true);
        b.set(2, true);
        assert!(a.is_subset_of(&b));
        assert!(!b.is_subset_of(&a));
        a.union_with(&b);
        assert_eq!(a.to_string(), "101");
        assert!(!a.is_full());
        a.set(1, true);
        assert!(a.is_full());
    }

    #[test]
    fn empty_signature_is_full() {
        assert!(Signature::new(0).is_full());
        assert!(Signature::full(5).is_full());
    }
}
