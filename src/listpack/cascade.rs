//! Cascade-update propagation (spec.md §4.3 "cascade update").
//!
//! Inserting or deleting an entry changes the byte length of its
//! immediate successor's predecessor, which may force that successor's
//! `prev_entry_length` field to widen from one byte to five. Widening
//! changes the successor's own total length in turn, so the same check
//! must run on the entry after it, and so on — in the worst case this
//! walks the whole list. Deliberately asymmetric: a field is only ever
//! widened, never narrowed back down, even when a later deletion makes
//! the wider field unnecessary.

use super::codec::{self, EntryHeader};

/// Rewrites the `prev_entry_length` fields starting at `offset`, for as
/// long as a field actually needs to widen. `offset` is the entry whose
/// predecessor just changed length (or was removed, in which case its
/// length is `0` — the same value the very first entry in the list
/// carries). Returns the total number of bytes the buffer grew by,
/// which a caller needs to fold into `tail_offset` if the widened run
/// reaches as far as the tail entry.
pub(super) fn repair(buf: &mut Vec<u8>, mut offset: usize, mut predecessor_len: u32) -> usize {
    let mut total_growth = 0usize;
    loop {
        if offset >= buf.len() - 1 {
            // Past the last real entry: nothing left to repair.
            return total_growth;
        }
        let entry = codec::parse_entry(buf, offset);
        let needed_width = codec::prev_len_width_for(predecessor_len);
        if needed_width <= entry.prev_len_width {
            // Field is already wide enough (possibly wider than strictly
            // necessary, which is fine and expected); just refresh the
            // value in place and stop, since this entry's own length did
            // not change.
            rewrite_prev_len_value(buf, &entry, predecessor_len);
            return total_growth;
        }

        // The field must widen, which grows this entry by the
        // difference, shifting everything after it to the right.
        let old_total = entry.total_len();
        let mut rebuilt = Vec::with_capacity(old_total + 4);
        codec::write_prev_len(&mut rebuilt, needed_width, predecessor_len);
        rebuilt.extend_from_slice(&buf[entry.body_offset()..offset + old_total]);
        let grew_by = rebuilt.len() - old_total;

        buf.splice(offset..offset + old_total, rebuilt.iter().copied());
        bump_total_bytes(buf, grew_by as i64);
        total_growth += grew_by;

        predecessor_len = (old_total + grew_by) as u32;
        offset += old_total + grew_by;
    }
}

fn rewrite_prev_len_value(buf: &mut [u8], entry: &EntryHeader, value: u32) {
    if entry.prev_len_width == 1 {
        buf[entry.offset] = value as u8;
    } else {
        buf[entry.offset + 1..entry.offset + 5].copy_from_slice(&value.to_le_bytes());
    }
}

fn bump_total_bytes(buf: &mut [u8], delta: i64) {
    let cur = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let next = (cur as i64 + delta) as u32;
    buf[0..4].copy_from_slice(&next.to_le_bytes());
}
