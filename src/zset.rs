//! The ordered-set value (spec.md §4.5): a dual-representation
//! container that starts compact — one packed list holding
//! `(element, score)` pairs — and promotes, once, to a skip list paired
//! with a hash table once it outgrows [`Limits`].
//!
//! # Grounding
//!
//! The promotion policy (`MAX_ENTRIES_PACKED` / `MAX_VALUE_PACKED`, one-way)
//! mirrors [`crate::config::Limits`]'s doc comment; the large
//! representation's "hash table maps element to a pointer that
//! dereferences to the skip-list node's score" (spec.md §3) is
//! approximated here by storing the score redundantly in both the
//! skip list node and the `Dict` value, kept in sync on every mutation
//! — Rust has no direct equivalent of a raw pointer into another
//! container's field without `Rc<RefCell<_>>` or unsafe code, and a
//! small f64 is cheap enough to duplicate outright (recorded in
//! DESIGN.md).

pub mod aggregate;

use crate::config::Limits;
use crate::dict::Dict;
use crate::error::{Error, Result};
use crate::listpack::{self, ListPack, Where};
use crate::skiplist::SkipList;
use std::ops::Bound;

pub use aggregate::Aggregate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Packed,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Updated,
}

enum Repr {
    Packed(ListPack),
    Large {
        skiplist: SkipList,
        dict: Dict<Vec<u8>, f64>,
    },
}

pub struct ZSet {
    limits: Limits,
    repr: Repr,
}

impl Default for ZSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ZSet {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        ZSet {
            limits,
            repr: Repr::Packed(ListPack::new()),
        }
    }

    pub fn encoding(&self) -> Encoding {
        match &self.repr {
            Repr::Packed(_) => Encoding::Packed,
            Repr::Large { .. } => Encoding::Large,
        }
    }

    pub fn len(&mut self) -> usize {
        match &mut self.repr {
            Repr::Packed(lp) => lp.len() / 2,
            Repr::Large { dict, .. } => dict.len(),
        }
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// `add(element, score) -> added | updated` (spec.md §4.5). Rejects
    /// NaN scores outright, same as [`SkipList::insert`].
    pub fn add(&mut self, element: &[u8], score: f64) -> Result<AddOutcome> {
        if score.is_nan() {
            return Err(Error::InvalidInput("score must not be NaN"));
        }
        let outcome = match &mut self.repr {
            Repr::Packed(lp) => add_packed(lp, element, score),
            Repr::Large { skiplist, dict } => add_large(skiplist, dict, element, score)?,
        };
        self.maybe_promote();
        Ok(outcome)
    }

    fn maybe_promote(&mut self) {
        let lp = match &mut self.repr {
            Repr::Packed(lp) => lp,
            Repr::Large { .. } => return,
        };
        let count = lp.len() / 2;
        let too_wide = packed_pairs(lp).any(|(ec, _)| packed_value_len(lp, ec) > self.limits.max_value_packed);
        if count <= self.limits.max_entries_packed && !too_wide {
            return;
        }
        let Repr::Packed(lp) = std::mem::replace(&mut self.repr, Repr::Packed(ListPack::new())) else {
            unreachable!()
        };
        let mut skiplist = SkipList::new();
        let mut dict: Dict<Vec<u8>, f64> = Dict::new();
        for (ec, sc) in packed_pairs(&lp) {
            let element = packed_element_bytes(&lp, ec);
            let score = decode_score(&lp.get(sc));
            skiplist
                .insert(score, element.clone())
                .expect("promoted score already validated non-NaN on the way in");
            dict.insert(element, score)
                .expect("promoted elements are unique by packed-form construction");
        }
        self.repr = Repr::Large { skiplist, dict };
    }

    pub fn remove(&mut self, element: &[u8]) -> Result<()> {
        match &mut self.repr {
            Repr::Packed(lp) => {
                let existing = packed_pairs(lp).find(|(ec, _)| lp.compare(*ec, element));
                match existing {
                    Some((ec, _)) => {
                        let after = lp.delete(ec).expect("element entry is never the tail");
                        lp.delete(after);
                        Ok(())
                    }
                    None => Err(Error::NotFound),
                }
            }
            Repr::Large { skiplist, dict } => {
                let score = *dict.peek(&element.to_vec()).ok_or(Error::NotFound)?;
                dict.remove(&element.to_vec())?;
                skiplist.remove(score, element)?;
                Ok(())
            }
        }
    }

    pub fn score(&mut self, element: &[u8]) -> Option<f64> {
        match &mut self.repr {
            Repr::Packed(lp) => packed_pairs(lp)
                .find(|(ec, _)| lp.compare(*ec, element))
                .map(|(_, sc)| decode_score(&lp.get(sc))),
            Repr::Large { dict, .. } => dict.find(&element.to_vec()).copied(),
        }
    }

    /// 1-based rank, ascending unless `reverse`.
    pub fn rank(&mut self, element: &[u8], reverse: bool) -> Option<u64> {
        let len = self.len() as u64;
        let ascending = match &mut self.repr {
            Repr::Packed(lp) => {
                let mut idx = 0u64;
                let mut found = None;
                for (ec, _) in packed_pairs(lp) {
                    idx += 1;
                    if lp.compare(ec, element) {
                        found = Some(idx);
                        break;
                    }
                }
                found?
            }
            Repr::Large { skiplist, dict } => {
                let score = *dict.peek(&element.to_vec())?;
                skiplist.rank_of(score, element)?
            }
        };
        Some(if reverse { len - ascending + 1 } else { ascending })
    }

    pub fn range_by_rank(&mut self, start: u64, end: u64, reverse: bool) -> Vec<(Vec<u8>, f64)> {
        let len = self.len() as u64;
        if len == 0 || start > end {
            return Vec::new();
        }
        let (asc_start, asc_end) = if reverse {
            (len.saturating_sub(end) + 1, len.saturating_sub(start) + 1)
        } else {
            (start.max(1), end)
        };
        let asc_start = asc_start.max(1);
        let asc_end = asc_end.min(len);
        if asc_start > asc_end {
            return Vec::new();
        }
        let mut out: Vec<(Vec<u8>, f64)> = match &mut self.repr {
            Repr::Packed(lp) => packed_pairs(lp)
                .skip((asc_start - 1) as usize)
                .take((asc_end - asc_start + 1) as usize)
                .map(|(ec, sc)| (packed_element_bytes(lp, ec), decode_score(&lp.get(sc))))
                .collect(),
            Repr::Large { skiplist, .. } => (asc_start..=asc_end)
                .filter_map(|r| skiplist.element_by_rank(r))
                .map(|(s, e)| (e.to_vec(), s))
                .collect(),
        };
        if reverse {
            out.reverse();
        }
        out
    }

    pub fn range_by_score(
        &mut self,
        min: Bound<f64>,
        max: Bound<f64>,
        offset: usize,
        limit: Option<usize>,
        reverse: bool,
    ) -> Vec<(Vec<u8>, f64)> {
        let mut matches: Vec<(Vec<u8>, f64)> = match &mut self.repr {
            Repr::Packed(lp) => {
                let mut out: Vec<(Vec<u8>, f64)> = packed_pairs(lp)
                    .filter_map(|(ec, sc)| {
                        let score = decode_score(&lp.get(sc));
                        bound_contains(min, max, score).then(|| (packed_element_bytes(lp, ec), score))
                    })
                    .collect();
                out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then_with(|| a.0.cmp(&b.0)));
                out
            }
            Repr::Large { skiplist, .. } => skiplist
                .range_by_score(min, max)
                .into_iter()
                .map(|(s, e)| (e.to_vec(), s))
                .collect(),
        };
        if reverse {
            matches.reverse();
        }
        apply_offset_limit(matches, offset, limit)
    }

    pub fn range_by_lex(
        &mut self,
        min: Bound<&[u8]>,
        max: Bound<&[u8]>,
        offset: usize,
        limit: Option<usize>,
        reverse: bool,
    ) -> Vec<(Vec<u8>, f64)> {
        let mut matches: Vec<(Vec<u8>, f64)> = match &mut self.repr {
            Repr::Packed(lp) => {
                let mut out: Vec<(Vec<u8>, f64)> = packed_pairs(lp)
                    .filter_map(|(ec, sc)| {
                        let elem = packed_element_bytes(lp, ec);
                        bound_contains_bytes(min, max, &elem).then(|| (elem, decode_score(&lp.get(sc))))
                    })
                    .collect();
                out.sort_by(|a, b| a.0.cmp(&b.0));
                out
            }
            Repr::Large { skiplist, .. } => skiplist
                .range_by_lex(min, max)
                .into_iter()
                .map(|(s, e)| (e.to_vec(), s))
                .collect(),
        };
        if reverse {
            matches.reverse();
        }
        apply_offset_limit(matches, offset, limit)
    }

    pub fn count_in_score_range(&mut self, min: Bound<f64>, max: Bound<f64>) -> usize {
        match &mut self.repr {
            Repr::Packed(lp) => packed_pairs(lp)
                .filter(|(_, sc)| bound_contains(min, max, decode_score(&lp.get(*sc))))
                .count(),
            Repr::Large { skiplist, .. } => skiplist.count_in_score_range(min, max),
        }
    }

    pub fn count_in_lex_range(&mut self, min: Bound<&[u8]>, max: Bound<&[u8]>) -> usize {
        match &mut self.repr {
            Repr::Packed(lp) => packed_pairs(lp)
                .filter(|(ec, _)| bound_contains_bytes(min, max, &packed_element_bytes(lp, *ec)))
                .count(),
            Repr::Large { skiplist, .. } => skiplist.count_in_lex_range(min, max),
        }
    }

    /// Every `(element, score)` pair, in no particular guaranteed order
    /// across representations — used by [`aggregate`] to build a fresh
    /// destination set.
    pub fn pairs(&mut self) -> Vec<(Vec<u8>, f64)> {
        match &mut self.repr {
            Repr::Packed(lp) => packed_pairs(lp)
                .map(|(ec, sc)| (packed_element_bytes(lp, ec), decode_score(&lp.get(sc))))
                .collect(),
            Repr::Large { skiplist, .. } => skiplist.iter().map(|(s, e)| (e.to_vec(), s)).collect(),
        }
    }
}

fn apply_offset_limit(items: Vec<(Vec<u8>, f64)>, offset: usize, limit: Option<usize>) -> Vec<(Vec<u8>, f64)> {
    let iter = items.into_iter().skip(offset);
    match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    }
}

fn bound_contains(min: Bound<f64>, max: Bound<f64>, score: f64) -> bool {
    let above_min = match min {
        Bound::Unbounded => true,
        Bound::Included(m) => score >= m,
        Bound::Excluded(m) => score > m,
    };
    let below_max = match max {
        Bound::Unbounded => true,
        Bound::Included(m) => score <= m,
        Bound::Excluded(m) => score < m,
    };
    above_min && below_max
}

fn bound_contains_bytes(min: Bound<&[u8]>, max: Bound<&[u8]>, elem: &[u8]) -> bool {
    let above_min = match min {
        Bound::Unbounded => true,
        Bound::Included(m) => elem >= m,
        Bound::Excluded(m) => elem > m,
    };
    let below_max = match max {
        Bound::Unbounded => true,
        Bound::Included(m) => elem <= m,
        Bound::Excluded(m) => elem < m,
    };
    above_min && below_max
}

fn packed_element_bytes(lp: &ListPack, cursor: listpack::Cursor) -> Vec<u8> {
    lp.get(cursor).as_compare_bytes().into_owned()
}

fn packed_value_len(lp: &ListPack, cursor: listpack::Cursor) -> usize {
    lp.get(cursor).as_compare_bytes().len()
}

/// Walks the flat `[element, score, element, score, ...]` packed form
/// two entries at a time.
fn packed_pairs(lp: &ListPack) -> PackedPairs<'_> {
    PackedPairs {
        lp,
        cur: lp.first(),
    }
}

struct PackedPairs<'a> {
    lp: &'a ListPack,
    cur: Option<listpack::Cursor>,
}

impl<'a> Iterator for PackedPairs<'a> {
    type Item = (listpack::Cursor, listpack::Cursor);

    fn next(&mut self) -> Option<Self::Item> {
        let e = self.cur?;
        let s = self.lp.next(e)?;
        self.cur = self.lp.next(s);
        Some((e, s))
    }
}

fn decode_score(value: &listpack::Value) -> f64 {
    match value {
        listpack::Value::Int(n) => *n as f64,
        listpack::Value::Bytes(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .expect("packed-list score entry must decode as a float"),
    }
}

fn encode_score(score: f64) -> Vec<u8> {
    if score.fract() == 0.0 && score.is_finite() && score.abs() < 1e15 {
        (score as i64).to_string().into_bytes()
    } else {
        score.to_string().into_bytes()
    }
}

fn add_packed(lp: &mut ListPack, element: &[u8], score: f64) -> AddOutcome {
    if let Some((ec, sc)) = packed_pairs(lp).find(|(ec, _)| lp.compare(*ec, element)) {
        let old_score = decode_score(&lp.get(sc));
        if old_score == score {
            return AddOutcome::Updated;
        }
        let after = lp.delete(ec).expect("element entry is never the tail");
        lp.delete(after);
        packed_insert_pair(lp, element, score);
        return AddOutcome::Updated;
    }
    packed_insert_pair(lp, element, score);
    AddOutcome::Added
}

/// Inserts a fresh `(element, score)` pair keeping the packed list in
/// ascending `(score, lex-element)` order (spec.md §3).
fn packed_insert_pair(lp: &mut ListPack, element: &[u8], score: f64) {
    let mut at: Option<listpack::Cursor> = None;
    for (ec, sc) in packed_pairs(lp) {
        let s = decode_score(&lp.get(sc));
        let e = lp.get(ec);
        if (s, e.as_compare_bytes().as_ref()) > (score, element) {
            at = Some(ec);
            break;
        }
    }
    let score_bytes = encode_score(score);
    match at {
        Some(before) => {
            let new_elem = lp.insert_before(Some(before), element);
            let shifted_before = lp.next(new_elem).expect("score slot always follows the element slot");
            lp.insert_before(Some(shifted_before), &score_bytes);
        }
        None => {
            lp.push(element, Where::Tail);
            lp.push(&score_bytes, Where::Tail);
        }
    }
}

fn add_large(
    skiplist: &mut SkipList,
    dict: &mut Dict<Vec<u8>, f64>,
    element: &[u8],
    score: f64,
) -> Result<AddOutcome> {
    let key = element.to_vec();
    if let Some(&old_score) = dict.find(&key) {
        if old_score == score {
            return Ok(AddOutcome::Updated);
        }
        skiplist.remove(old_score, element)?;
        skiplist.insert(score, element.to_vec())?;
        dict.replace(key, score);
        Ok(AddOutcome::Updated)
    } else {
        skiplist.insert(score, element.to_vec())?;
        dict.insert(key, score)?;
        Ok(AddOutcome::Added)
    }
}
