//! One bit per shape record.
//!
//! Spatial queries mark matching record ids here; layer cursors walk the set
//! with [`StatusBits::next_set_bit`].

const WORD_BITS: usize = u64::BITS as usize;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct StatusBits {
    words: Vec<u64>,
    len: usize,
}

impl StatusBits {
    /// All bits cleared.
    pub fn new(len: usize) -> Self {
        StatusBits {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// All bits set.
    pub fn all(len: usize) -> Self {
        let mut bits = StatusBits {
            words: vec![u64::MAX; len.div_ceil(WORD_BITS)],
            len,
        };
        bits.clear_tail();
        bits
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ignores out-of-range indices.
    pub fn set(&mut self, i: usize) {
        if i < self.len {
            self.words[i / WORD_BITS] |= 1 << (i % WORD_BITS);
        }
    }

    pub fn clear(&mut self, i: usize) {
        if i < self.len {
            self.words[i / WORD_BITS] &= !(1 << (i % WORD_BITS));
        }
    }

    pub fn is_set(&self, i: usize) -> bool {
        i < self.len && self.words[i / WORD_BITS] & (1 << (i % WORD_BITS)) != 0
    }

    /// First set bit at or after `from`.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        if from >= self.len {
            return None;
        }
        let mut word_idx = from / WORD_BITS;
        let mut word = self.words[word_idx] & (u64::MAX << (from % WORD_BITS));
        loop {
            if word != 0 {
                let i = word_idx * WORD_BITS + word.trailing_zeros() as usize;
                return (i < self.len).then_some(i);
            }
            word_idx += 1;
            if word_idx >= self.words.len() {
                return None;
            }
            word = self.words[word_idx];
        }
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        let mut cursor = 0;
        std::iter::from_fn(move || {
            let i = self.next_set_bit(cursor)?;
            cursor = i + 1;
            Some(i)
        })
    }

    /// Keep only bits set in both.
    pub fn intersect_with(&mut self, other: &StatusBits) {
        for (i, w) in self.words.iter_mut().enumerate() {
            *w &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    fn clear_tail(&mut self) {
        let rem = self.len % WORD_BITS;
        if rem == 0 {
            return;
        }
        if let Some(last) = self.words.last_mut() {
            *last &= (1u64 << rem) - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_query_bits() {
        let mut bits = StatusBits::new(130);
        bits.set(0);
        bits.set(64);
        bits.set(129);
        bits.set(500);
        assert!(bits.is_set(0));
        assert!(bits.is_set(64));
        assert!(bits.is_set(129));
        assert!(!bits.is_set(1));
        assert!(!bits.is_set(500));
        assert_eq!(bits.count_ones(), 3);

        bits.clear(64);
        assert!(!bits.is_set(64));
        assert_eq!(bits.count_ones(), 2);
    }

    #[test]
    fn next_set_bit_crosses_words() {
        let mut bits = StatusBits::new(200);
        bits.set(3);
        bits.set(150);
        assert_eq!(bits.next_set_bit(0), Some(3));
        assert_eq!(bits.next_set_bit(3), Some(3));
        assert_eq!(bits.next_set_bit(4), Some(150));
        assert_eq!(bits.next_set_bit(151), None);
        assert_eq!(bits.next_set_bit(1000), None);
    }

    #[test]
    fn all_does_not_leak_past_len() {
        let bits = StatusBits::all(70);
        assert_eq!(bits.count_ones(), 70);
        assert_eq!(bits.next_set_bit(69), Some(69));
        assert_eq!(bits.next_set_bit(70), None);
    }

    #[test]
    fn iter_ones_in_order() {
        let mut bits = StatusBits::new(10);
        for i in [7, 2, 9] {
            bits.set(i);
        }
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![2, 7, 9]);
    }

    #[test]
    fn intersect_keeps_common_bits() {
        let mut a = StatusBits::all(10);
        let mut b = StatusBits::new(10);
        b.set(4);
        b.set(8);
        a.intersect_with(&b);
        assert_eq!(a.iter_ones().collect::<Vec<_>>(), vec![4, 8]);
    }

    #[test]
    fn empty_set() {
        let bits = StatusBits::new(0);
        assert!(bits.is_empty());
        assert_eq!(bits.next_set_bit(0), None);
    }
}
