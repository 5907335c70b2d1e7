//! The two iterator flavors of spec.md §4.1: a "safe" iterator that
//! tolerates mutation between calls to `next`, and an "unsafe" one that
//! detects any such mutation via a fingerprint and treats it as a fatal
//! programmer error.

use super::Dict;

/// Walks both tables bucket-by-bucket, chain-by-chain, re-deriving its
/// position on every call instead of holding a live reference into the
/// chain — that is what lets the caller mutate the dictionary through
/// [`SafeIter::dict_mut`] between calls without invalidating the cursor.
pub struct SafeIter<'a, K, V, H> {
    dict: &'a mut Dict<K, V, H>,
    table_idx: usize,
    bucket_idx: usize,
    /// Number of nodes of the current bucket's chain already yielded.
    chain_idx: usize,
}

impl<'a, K, V, H> SafeIter<'a, K, V, H> {
    pub(super) fn new(dict: &'a mut Dict<K, V, H>) -> Self {
        SafeIter {
            dict,
            table_idx: 0,
            bucket_idx: 0,
            chain_idx: 0,
        }
    }

    /// Exclusive access to the underlying dictionary, for mutation
    /// between `next` calls.
    pub fn dict_mut(&mut self) -> &mut Dict<K, V, H> {
        self.dict
    }

    pub fn next(&mut self) -> Option<(&K, &V)> {
        loop {
            if self.table_idx >= 2 {
                return None;
            }
            if self.table_idx == 1 && self.dict.rehash_cursor == -1 {
                return None;
            }
            let table = &self.dict.tables[self.table_idx];
            if self.bucket_idx >= table.buckets.len() {
                self.table_idx += 1;
                self.bucket_idx = 0;
                self.chain_idx = 0;
                continue;
            }
            let mut cur = table.buckets[self.bucket_idx].as_deref();
            for _ in 0..self.chain_idx {
                cur = cur.and_then(|n| n.next.as_deref());
            }
            match cur {
                Some(node) => {
                    self.chain_idx += 1;
                    return Some((&node.key, &node.value));
                }
                None => {
                    self.bucket_idx += 1;
                    self.chain_idx = 0;
                }
            }
        }
    }
}

impl<'a, K, V, H> Drop for SafeIter<'a, K, V, H> {
    fn drop(&mut self) {
        self.dict.safe_iterators -= 1;
    }
}

/// Records a fingerprint at the first call to `next` and panics if a
/// later call observes a different one — structural mutation of the
/// dictionary while an unsafe iterator is outstanding is a programmer
/// error (spec.md §7).
pub struct UnsafeIter<'a, K, V, H> {
    dict: &'a Dict<K, V, H>,
    table_idx: usize,
    bucket_idx: usize,
    chain_idx: usize,
    fingerprint: Option<u64>,
}

impl<'a, K, V, H> UnsafeIter<'a, K, V, H> {
    pub(super) fn new(dict: &'a Dict<K, V, H>) -> Self {
        UnsafeIter {
            dict,
            table_idx: 0,
            bucket_idx: 0,
            chain_idx: 0,
            fingerprint: None,
        }
    }

    pub fn next(&mut self) -> Option<(&'a K, &'a V)> {
        let fp = self.dict.fingerprint();
        match self.fingerprint {
            None => self.fingerprint = Some(fp),
            Some(prev) => assert_eq!(
                prev, fp,
                "dict mutated while an unsafe iterator was outstanding"
            ),
        }

        loop {
            if self.table_idx >= 2 {
                return None;
            }
            if self.table_idx == 1 && self.dict.rehash_cursor == -1 {
                return None;
            }
            let table = &self.dict.tables[self.table_idx];
            if self.bucket_idx >= table.buckets.len() {
                self.table_idx += 1;
                self.bucket_idx = 0;
                self.chain_idx = 0;
                continue;
            }
            let mut cur = table.buckets[self.bucket_idx].as_deref();
            for _ in 0..self.chain_idx {
                cur = cur.and_then(|n| n.next.as_deref());
            }
            match cur {
                Some(node) => {
                    self.chain_idx += 1;
                    return Some((&node.key, &node.value));
                }
                None => {
                    self.bucket_idx += 1;
                    self.chain_idx = 0;
                }
            }
        }
    }
}
