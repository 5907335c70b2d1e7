//! The stateless, reverse-binary-increment cursor (spec.md §4.1).
//!
//! The cursor is traversed by reversing its bits, incrementing, and
//! reversing back. This enumeration is robust across resizes: every
//! bucket of the *current* table is eventually visited regardless of how
//! many times the table has doubled or halved mid-scan, at the cost of
//! occasionally revisiting a live element twice.

use super::entry::Table;
use super::Dict;

fn visit_bucket<K, V>(bucket: &Option<Box<super::entry::Node<K, V>>>, visit: &mut impl FnMut(&K, &V)) {
    let mut cur = bucket.as_deref();
    while let Some(node) = cur {
        visit(&node.key, &node.value);
        cur = node.next.as_deref();
    }
}

fn reverse_increment(cursor: u64, mask: u64) -> u64 {
    let mut c = cursor | !mask;
    c = c.reverse_bits();
    c = c.wrapping_add(1);
    c.reverse_bits()
}

pub(super) fn scan<K, V, H>(
    dict: &Dict<K, V, H>,
    cursor: u64,
    mut visit: impl FnMut(&K, &V),
) -> u64 {
    if !dict.is_rehashing() {
        let t = &dict.tables[0];
        if t.buckets.is_empty() {
            return 0;
        }
        let mask = t.mask() as u64;
        let idx = (cursor & mask) as usize;
        visit_bucket(&t.buckets[idx], &mut visit);
        return reverse_increment(cursor, mask);
    }

    // While rehashing, visit the corresponding bucket of the smaller
    // table and every bucket of the larger table it could have expanded
    // into, in one step (spec.md: "visits the corresponding bucket in
    // the smaller table and all its expansions in the larger table").
    let (small, large): (&Table<K, V>, &Table<K, V>) =
        if dict.tables[0].mask() <= dict.tables[1].mask() {
            (&dict.tables[0], &dict.tables[1])
        } else {
            (&dict.tables[1], &dict.tables[0])
        };

    let small_mask = small.mask() as u64;
    let large_mask = large.mask() as u64;
    let idx = cursor & small_mask;
    visit_bucket(&small.buckets[idx as usize], &mut visit);

    let mut expanded = idx;
    loop {
        visit_bucket(&large.buckets[expanded as usize], &mut visit);
        expanded += small_mask + 1;
        if expanded > large_mask {
            break;
        }
    }

    reverse_increment(cursor, small_mask)
}
