//! A sorted, contiguous set of signed integers (spec.md §4.4).
//!
//! The set tracks the narrowest integer width that has ever been
//! required to hold one of its members and never narrows that width
//! back down, mirroring the packed list's cascade policy of growing a
//! field but never shrinking it. Membership and insertion position are
//! both found by binary search over a sorted `Vec`, which is where all
//! the real cost of this structure lives — there is no separate
//! "resize the backing array" step distinct from the `Vec`'s own growth.

use rand::Rng;

/// The narrowest width a member has forced the set to use so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Width {
    I16,
    I32,
    I64,
}

impl Width {
    fn required_for(n: i64) -> Width {
        if i16::try_from(n).is_ok() {
            Width::I16
        } else if i32::try_from(n).is_ok() {
            Width::I32
        } else {
            Width::I64
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntSet {
    width: Width,
    values: Vec<i64>,
}

impl Default for IntSet {
    fn default() -> Self {
        Self::new()
    }
}

impl IntSet {
    pub fn new() -> Self {
        IntSet {
            width: Width::I16,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Current encoding tier. Only ever widens; see module docs.
    pub fn width(&self) -> Width {
        self.width
    }

    pub fn contains(&self, n: i64) -> bool {
        self.values.binary_search(&n).is_ok()
    }

    /// Inserts `n`, returning whether it was newly added.
    pub fn insert(&mut self, n: i64) -> bool {
        match self.values.binary_search(&n) {
            Ok(_) => false,
            Err(pos) => {
                self.values.insert(pos, n);
                self.width = self.width.max(Width::required_for(n));
                true
            }
        }
    }

    /// Removes `n`, returning whether it was present. Never narrows
    /// the tracked width, even if the widest remaining member would
    /// now fit in less.
    pub fn remove(&mut self, n: i64) -> bool {
        match self.values.binary_search(&n) {
            Ok(pos) => {
                self.values.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        self.values.get(index).copied()
    }

    pub fn random_member(&self) -> Option<i64> {
        if self.values.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..self.values.len());
        Some(self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.values.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_sorted_order() {
        let mut s = IntSet::new();
        for n in [5, -3, 100, 0, -1] {
            s.insert(n);
        }
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![-3, -1, 0, 5, 100]);
    }

    #[test]
    fn duplicate_insert_is_a_no_op() {
        let mut s = IntSet::new();
        assert!(s.insert(7));
        assert!(!s.insert(7));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn width_widens_but_never_narrows() {
        let mut s = IntSet::new();
        assert_eq!(s.width(), Width::I16);
        s.insert(1);
        assert_eq!(s.width(), Width::I16);
        s.insert(100_000);
        assert_eq!(s.width(), Width::I32);
        s.insert(10_000_000_000);
        assert_eq!(s.width(), Width::I64);

        s.remove(10_000_000_000);
        assert_eq!(s.width(), Width::I64, "removal must not narrow the width");
    }

    #[test]
    fn remove_missing_member_is_false() {
        let mut s = IntSet::new();
        s.insert(1);
        assert!(!s.remove(2));
        assert!(s.remove(1));
        assert!(s.is_empty());
    }

    #[test]
    fn random_member_is_always_a_real_element() {
        let mut s = IntSet::new();
        for n in [1, 2, 3, 4, 5] {
            s.insert(n);
        }
        for _ in 0..50 {
            assert!(s.contains(s.random_member().unwrap()));
        }
    }
}
