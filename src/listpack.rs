//! A compact, contiguous byte encoding for short sequences of small
//! values (spec.md §4.3) — the packed representation that both the
//! ordered-set's small form ([`crate::zset`]) and, in a fuller store,
//! lists and hashes sit on top of.
//!
//! Ten-byte header (`total_bytes: u32 LE`, `tail_offset: u32 LE`,
//! `entry_count: u16 LE`, saturating at `u16::MAX` to mean "recount by
//! scanning"), a run of variable-width entries, and a single `0xFF`
//! terminator byte. Each entry carries its own predecessor's length so
//! the list can be walked backwards without an index; [`listpack::cascade`]
//! is the one piece of bookkeeping that costs more than O(1), and only
//! in the rare case a predecessor crosses the 254-byte boundary.

mod cascade;
mod codec;

pub use codec::Value;

const HEADER_LEN: usize = 10;
const ENTRY_COUNT_UNKNOWN: u16 = u16::MAX;

/// A position into the blob where some entry's `prev_entry_length`
/// field begins. Cursors are plain byte offsets: cheap to copy, valid
/// until the entry they name is deleted.
pub type Cursor = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Where {
    Head,
    Tail,
}

/// A packed list. Owns its backing buffer; there is no separate
/// "blob handle" the way a C implementation would have one, since a
/// `Vec<u8>` already reallocates itself transparently on growth.
#[derive(Debug, Clone)]
pub struct ListPack {
    buf: Vec<u8>,
}

impl Default for ListPack {
    fn default() -> Self {
        Self::new()
    }
}

impl ListPack {
    pub fn new() -> Self {
        let mut buf = vec![0u8; HEADER_LEN];
        buf.push(codec::TERMINATOR);
        let mut lp = ListPack { buf };
        lp.set_total_bytes(HEADER_LEN as u32 + 1);
        lp.set_tail_offset(HEADER_LEN as u32);
        lp.set_entry_count(0);
        lp
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn total_bytes(&self) -> u32 {
        u32::from_le_bytes(self.buf[0..4].try_into().unwrap())
    }

    fn set_total_bytes(&mut self, v: u32) {
        self.buf[0..4].copy_from_slice(&v.to_le_bytes());
    }

    fn tail_offset(&self) -> usize {
        u32::from_le_bytes(self.buf[4..8].try_into().unwrap()) as usize
    }

    fn set_tail_offset(&mut self, v: usize) {
        self.buf[4..8].copy_from_slice(&(v as u32).to_le_bytes());
    }

    fn raw_entry_count(&self) -> u16 {
        u16::from_le_bytes(self.buf[8..10].try_into().unwrap())
    }

    fn set_entry_count(&mut self, n: usize) {
        let capped = n.min(ENTRY_COUNT_UNKNOWN as usize) as u16;
        self.buf[8..10].copy_from_slice(&capped.to_le_bytes());
    }

    fn terminator_offset(&self) -> usize {
        self.buf.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.tail_offset() == self.terminator_offset()
    }

    /// Number of live entries. O(1) unless the header's counter has
    /// saturated at `u16::MAX`, in which case this rescans the whole
    /// list once and re-saves an exact count if one is representable
    /// again (spec.md §4.3's "UINT16_MAX" note).
    pub fn len(&mut self) -> usize {
        if self.raw_entry_count() != ENTRY_COUNT_UNKNOWN {
            return self.raw_entry_count() as usize;
        }
        let mut n = 0usize;
        let mut cur = self.first();
        while let Some(c) = cur {
            n += 1;
            cur = self.next(c);
        }
        if n < ENTRY_COUNT_UNKNOWN as usize {
            self.set_entry_count(n);
        }
        n
    }

    pub fn first(&self) -> Option<Cursor> {
        if self.is_empty() {
            None
        } else {
            Some(HEADER_LEN)
        }
    }

    pub fn last(&self) -> Option<Cursor> {
        if self.is_empty() {
            None
        } else {
            Some(self.tail_offset())
        }
    }

    pub fn next(&self, cursor: Cursor) -> Option<Cursor> {
        let entry = codec::parse_entry(&self.buf, cursor);
        let at = cursor + entry.total_len();
        if at == self.terminator_offset() {
            None
        } else {
            Some(at)
        }
    }

    pub fn prev(&self, cursor: Cursor) -> Option<Cursor> {
        if cursor == HEADER_LEN {
            return None;
        }
        let (_, prev_len) = codec::read_prev_len(&self.buf, cursor);
        Some(cursor - prev_len as usize)
    }

    /// `index(0)` is the head, `index(-1)` the tail, matching the
    /// element-list convention used throughout spec.md's range queries.
    pub fn index(&self, i: i64) -> Option<Cursor> {
        if i >= 0 {
            let mut cur = self.first()?;
            for _ in 0..i {
                cur = self.next(cur)?;
            }
            Some(cur)
        } else {
            let mut cur = self.last()?;
            for _ in 0..(-i - 1) {
                cur = self.prev(cur)?;
            }
            Some(cur)
        }
    }

    pub fn get(&self, cursor: Cursor) -> Value {
        let entry = codec::parse_entry(&self.buf, cursor);
        codec::decode_value(&self.buf, &entry)
    }

    pub fn compare(&self, cursor: Cursor, bytes: &[u8]) -> bool {
        let value = self.get(cursor);
        value.as_compare_bytes().as_ref() == bytes
    }

    /// Walks forward from `start`, testing each entry against `target`
    /// and skipping `skip` entries between comparisons — the packed
    /// list is also used to store flat field/value pairs, where only
    /// every other entry is a candidate key.
    pub fn find(&self, start: Cursor, target: &[u8], skip: usize) -> Option<Cursor> {
        let mut cur = Some(start);
        while let Some(c) = cur {
            if self.compare(c, target) {
                return Some(c);
            }
            for _ in 0..=skip {
                cur = cur.and_then(|c| self.next(c));
            }
        }
        None
    }

    pub fn push(&mut self, payload: &[u8], where_: Where) -> Cursor {
        let at = match where_ {
            Where::Head => self.first(),
            Where::Tail => None,
        };
        self.insert_before(at, payload)
    }

    /// Inserts a new entry immediately before `at` (or at the tail if
    /// `at` is `None`), returning the new entry's cursor.
    pub fn insert_before(&mut self, at: Option<Cursor>, payload: &[u8]) -> Cursor {
        let insert_offset = at.unwrap_or_else(|| self.terminator_offset());
        let predecessor_len: u32 = if insert_offset == HEADER_LEN {
            0
        } else {
            codec::read_prev_len(&self.buf, insert_offset).1
        };

        let value = codec::classify_payload(payload);
        let body = codec::encode_body(&value);
        let prev_len_width = codec::prev_len_width_for(predecessor_len);
        let mut entry_bytes = Vec::with_capacity(prev_len_width + body.len());
        codec::write_prev_len(&mut entry_bytes, prev_len_width, predecessor_len);
        entry_bytes.extend_from_slice(&body);
        let new_len = entry_bytes.len();

        let is_append = insert_offset == self.terminator_offset();

        self.buf.splice(insert_offset..insert_offset, entry_bytes);
        self.set_total_bytes(self.total_bytes() + new_len as u32);
        self.set_entry_count(self.raw_entry_count() as usize + 1);

        if is_append {
            self.set_tail_offset(insert_offset);
        } else {
            cascade::repair(&mut self.buf, insert_offset + new_len, new_len as u32);
            // The cascade may have widened several `prev_entry_length`
            // fields between here and the tail, each shifting the
            // tail's true position further than a plain
            // `old_tail_offset + new_len` update would capture. Walking
            // forward with `next` (which only ever consults
            // `buf.len()`, never the stale `tail_offset` field) finds
            // the true tail unconditionally.
            let mut cur = insert_offset;
            while let Some(n) = self.next(cur) {
                cur = n;
            }
            self.set_tail_offset(cur);
        }

        insert_offset
    }

    /// Removes the entry at `cursor`, returning the cursor of the
    /// entry that now occupies its place, or `None` if the removed
    /// entry was the last one.
    pub fn delete(&mut self, cursor: Cursor) -> Option<Cursor> {
        let entry = codec::parse_entry(&self.buf, cursor);
        let removed_len = entry.total_len();
        let predecessor_len = entry.prev_len_value;
        let is_last = cursor == self.tail_offset();

        self.buf.drain(cursor..cursor + removed_len);
        self.set_total_bytes(self.total_bytes() - removed_len as u32);
        if self.raw_entry_count() != ENTRY_COUNT_UNKNOWN {
            self.set_entry_count(self.raw_entry_count() as usize - 1);
        }

        if is_last {
            let new_tail = if cursor == HEADER_LEN {
                HEADER_LEN
            } else {
                cursor - predecessor_len as usize
            };
            self.set_tail_offset(new_tail);
            None
        } else {
            cascade::repair(&mut self.buf, cursor, predecessor_len);
            // Same reasoning as `insert_before`: a widened
            // `prev_entry_length` run between here and the tail can
            // shift the tail further than `removed_len` alone would
            // account for, so re-derive it by walking forward instead
            // of adjusting the stale value arithmetically.
            let mut tail = cursor;
            while let Some(n) = self.next(tail) {
                tail = n;
            }
            self.set_tail_offset(tail);
            Some(cursor)
        }
    }

    /// Deletes up to `count` entries starting at `first`.
    pub fn delete_range(&mut self, first: Cursor, count: usize) {
        let mut cur = Some(first);
        for _ in 0..count {
            match cur {
                Some(c) => cur = self.delete(c),
                None => break,
            }
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            lp: self,
            cur: self.first(),
        }
    }
}

pub struct Iter<'a> {
    lp: &'a ListPack,
    cur: Option<Cursor>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let c = self.cur?;
        self.cur = self.lp.next(c);
        Some(self.lp.get(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(lp: &ListPack) -> Vec<Value> {
        lp.iter().collect()
    }

    #[test]
    fn empty_list_round_trips() {
        let mut lp = ListPack::new();
        assert!(lp.is_empty());
        assert_eq!(lp.len(), 0);
        assert_eq!(lp.first(), None);
        assert_eq!(lp.last(), None);
    }

    #[test]
    fn push_head_and_tail_preserve_order() {
        let mut lp = ListPack::new();
        lp.push(b"b", Where::Tail);
        lp.push(b"c", Where::Tail);
        lp.push(b"a", Where::Head);
        assert_eq!(
            bytes_of(&lp),
            vec![
                Value::Bytes(b"a".to_vec()),
                Value::Bytes(b"b".to_vec()),
                Value::Bytes(b"c".to_vec()),
            ]
        );
        assert_eq!(lp.len(), 3);
    }

    #[test]
    fn numeric_strings_round_trip_as_integers() {
        let mut lp = ListPack::new();
        lp.push(b"hello", Where::Tail);
        lp.push(b"-17", Where::Tail);
        lp.push(b"1024", Where::Tail);
        let vals = bytes_of(&lp);
        assert_eq!(vals[0], Value::Bytes(b"hello".to_vec()));
        assert_eq!(vals[1], Value::Int(-17));
        assert_eq!(vals[2], Value::Int(1024));
    }

    #[test]
    fn leading_zero_stays_a_string() {
        let mut lp = ListPack::new();
        lp.push(b"007", Where::Tail);
        assert_eq!(bytes_of(&lp), vec![Value::Bytes(b"007".to_vec())]);
    }

    #[test]
    fn wide_and_narrow_integers_round_trip() {
        let mut lp = ListPack::new();
        for n in [0i64, 12, 13, -1, 200, -40000, 40000, 9_000_000_000] {
            lp.push(n.to_string().as_bytes(), Where::Tail);
        }
        let vals = bytes_of(&lp);
        let expect: Vec<Value> = [0i64, 12, 13, -1, 200, -40000, 40000, 9_000_000_000]
            .into_iter()
            .map(Value::Int)
            .collect();
        assert_eq!(vals, expect);
    }

    #[test]
    fn cascade_widens_prev_len_on_long_predecessor() {
        let mut lp = ListPack::new();
        let long = vec![b'x'; 300];
        lp.push(&long, Where::Tail);
        lp.push(b"short", Where::Tail);
        assert_eq!(
            bytes_of(&lp),
            vec![Value::Bytes(long), Value::Bytes(b"short".to_vec())]
        );
        let second = lp.next(lp.first().unwrap()).unwrap();
        let (width, value) = codec::read_prev_len(&lp.buf, second);
        assert_eq!(width, 5);
        // 1-byte prev_len(0) + 2-byte string header + 300 payload bytes.
        assert_eq!(value, 303);
    }

    // spec.md §8 scenario S3, extended to more than one cascaded entry:
    // a naive `tail_offset` update that only accounts for the newly
    // inserted entry's own length (and not the extra bytes every
    // widened predecessor-length field adds along the way) would leave
    // `tail_offset` short of the real tail once the cascade touches
    // more than the entry immediately after the insertion point.
    #[test]
    fn s3_cascade_through_several_entries_keeps_tail_offset_exact() {
        let mut lp = ListPack::new();
        // Each original entry is exactly 253 bytes (1-byte prev_len +
        // 2-byte 14-bit string header + 250-byte payload) — just below
        // the 254-byte boundary that forces a 5-byte prev_len field.
        let entry_payload = vec![b'e'; 250];
        for _ in 0..4 {
            lp.push(&entry_payload, Where::Tail);
        }
        // A new 300-byte head entry (1-byte prev_len + 2-byte header +
        // 297-byte payload) pushes every successor's encoded
        // predecessor length to >= 254, forcing the whole chain to
        // widen from 1-byte to 5-byte prev_len fields.
        let new_payload = vec![b'h'; 297];
        let head = lp.first();
        lp.insert_before(head, &new_payload);

        assert_eq!(lp.len(), 5);

        // Every original entry's prev_len field is now 5 bytes wide.
        let mut cur = lp.next(lp.first().unwrap()).unwrap();
        for _ in 0..4 {
            let (width, _) = codec::read_prev_len(&lp.buf, cur);
            assert_eq!(width, 5);
            match lp.next(cur) {
                Some(n) => cur = n,
                None => break,
            }
        }

        // `next` only ever consults `buf.len()` (never the stored
        // `tail_offset` field), so this is an independent check that
        // `tail_offset` really does point at the final entry even
        // though the cascade grew every entry after the insertion
        // point.
        let tail = lp.last().unwrap();
        assert!(lp.next(tail).is_none());
        assert_eq!(lp.get(tail), Value::Bytes(entry_payload.clone()));

        let all: Vec<Value> = bytes_of(&lp);
        let mut expected = vec![Value::Bytes(new_payload)];
        expected.extend(std::iter::repeat(Value::Bytes(entry_payload)).take(4));
        assert_eq!(all, expected);
    }

    #[test]
    fn delete_does_not_shrink_widened_field() {
        let mut lp = ListPack::new();
        let long = vec![b'x'; 300];
        lp.push(&long, Where::Tail);
        lp.push(b"mid", Where::Tail);
        let third = lp.push(b"end", Where::Tail);
        let _ = third;

        let first = lp.first().unwrap();
        lp.delete(first);

        // "mid" now heads the list; its prev-length field was widened
        // while the long entry preceded it and must stay widened.
        let mid_cursor = lp.first().unwrap();
        let (width, value) = codec::read_prev_len(&lp.buf, mid_cursor);
        assert_eq!(width, 5);
        assert_eq!(value, 0);
        assert_eq!(
            bytes_of(&lp),
            vec![Value::Bytes(b"mid".to_vec()), Value::Bytes(b"end".to_vec())]
        );
    }

    #[test]
    fn index_supports_negative_offsets() {
        let mut lp = ListPack::new();
        for c in ["a", "b", "c", "d"] {
            lp.push(c.as_bytes(), Where::Tail);
        }
        assert_eq!(lp.get(lp.index(0).unwrap()), Value::Bytes(b"a".to_vec()));
        assert_eq!(lp.get(lp.index(-1).unwrap()), Value::Bytes(b"d".to_vec()));
        assert_eq!(lp.get(lp.index(-2).unwrap()), Value::Bytes(b"c".to_vec()));
        assert_eq!(lp.index(10), None);
    }

    #[test]
    fn find_with_skip_checks_every_other_entry() {
        let mut lp = ListPack::new();
        for (field, value) in [("a", "1"), ("b", "2"), ("c", "3")] {
            lp.push(field.as_bytes(), Where::Tail);
            lp.push(value.as_bytes(), Where::Tail);
        }
        let start = lp.first().unwrap();
        let found = lp.find(start, b"b", 1).unwrap();
        assert_eq!(lp.get(found), Value::Bytes(b"b".to_vec()));
        assert!(lp.find(start, b"2", 1).is_none());
    }

    #[test]
    fn insert_before_middle_shifts_tail_offset() {
        let mut lp = ListPack::new();
        lp.push(b"a", Where::Tail);
        let c = lp.push(b"c", Where::Tail);
        lp.insert_before(Some(c), b"b");
        assert_eq!(
            bytes_of(&lp),
            vec![
                Value::Bytes(b"a".to_vec()),
                Value::Bytes(b"b".to_vec()),
                Value::Bytes(b"c".to_vec()),
            ]
        );
        let last = lp.last().unwrap();
        assert_eq!(lp.get(last), Value::Bytes(b"c".to_vec()));
        assert_eq!(lp.next(last), None);
    }

    #[test]
    fn delete_range_removes_a_prefix() {
        let mut lp = ListPack::new();
        for c in ["a", "b", "c", "d"] {
            lp.push(c.as_bytes(), Where::Tail);
        }
        let first = lp.first().unwrap();
        lp.delete_range(first, 2);
        assert_eq!(
            bytes_of(&lp),
            vec![Value::Bytes(b"c".to_vec()), Value::Bytes(b"d".to_vec())]
        );
    }

    #[test]
    fn entry_count_saturation_recount_and_resave() {
        let mut lp = ListPack::new();
        for c in ["a", "b", "c"] {
            lp.push(c.as_bytes(), Where::Tail);
        }
        // Force the header into the "count unknown" state and confirm
        // `len` recovers the true count by scanning and re-saves it.
        lp.set_entry_count(ENTRY_COUNT_UNKNOWN as usize);
        assert_eq!(lp.len(), 3);
        assert_eq!(lp.raw_entry_count(), 3);
    }
}
