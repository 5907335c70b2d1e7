//! Union/intersect aggregation across ordered-set and plain-set inputs
//! (spec.md §4.5 "Aggregation").
//!
//! An [`IntSet`] stands in for "plain set" inputs here: it is the only
//! set-of-members collaborator this crate defines (spec.md's own
//! cross-reference calls it out as exactly that — "a compact
//! representation of integer-only sets... referenced by ordered-set
//! consumers for set-vs-zset aggregation"), so a plain-set member
//! simply carries an implicit score of `1.0`.

use super::ZSet;
use crate::config::Limits;
use crate::intset::IntSet;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
}

impl Aggregate {
    fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            // +inf weighted with -inf is defined as 0 (spec.md §4.5),
            // not NaN as plain float addition would give.
            Aggregate::Sum if a.is_infinite() && b.is_infinite() && a.is_sign_positive() != b.is_sign_positive() => {
                0.0
            }
            Aggregate::Sum => a + b,
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
        }
    }
}

/// One aggregation input: an ordered set or a plain integer set, each
/// with its own weight.
pub enum Input<'a> {
    ZSet(&'a mut ZSet),
    IntSet(&'a IntSet),
}

impl<'a> Input<'a> {
    fn cardinality(&mut self) -> usize {
        match self {
            Input::ZSet(z) => z.len(),
            Input::IntSet(s) => s.len(),
        }
    }

    fn pairs(&mut self) -> Vec<(Vec<u8>, f64)> {
        match self {
            Input::ZSet(z) => z.pairs(),
            Input::IntSet(s) => s.iter().map(|n| (n.to_string().into_bytes(), 1.0)).collect(),
        }
    }

    fn score_of(&mut self, element: &[u8]) -> Option<f64> {
        match self {
            Input::ZSet(z) => z.score(element),
            Input::IntSet(s) => std::str::from_utf8(element)
                .ok()
                .and_then(|text| text.parse::<i64>().ok())
                .filter(|n| s.contains(*n))
                .map(|_| 1.0),
        }
    }
}

fn cardinality_order(inputs: &mut [(Input<'_>, f64)]) -> Vec<usize> {
    let lens: Vec<usize> = inputs.iter_mut().map(|(input, _)| input.cardinality()).collect();
    let mut order: Vec<usize> = (0..inputs.len()).collect();
    order.sort_by_key(|&i| lens[i]);
    order
}

/// Builds the destination by inserting every aggregated pair through
/// the ordinary [`ZSet::add`] path: its own promotion check already
/// re-evaluates the packed-list thresholds after each insertion, so a
/// destination that ends up within them comes out packed with no
/// separate "compact afterwards" step required.
fn build(pairs: HashMap<Vec<u8>, f64>, limits: Limits) -> ZSet {
    let mut out = ZSet::with_limits(limits);
    for (element, score) in pairs {
        out.add(&element, score).expect("aggregated scores are never NaN");
    }
    out
}

/// Union: every element from every input, with weighted scores
/// combined by `aggregate` wherever an element appears in more than one
/// input (spec.md §4.5).
pub fn union_store(mut inputs: Vec<(Input<'_>, f64)>, aggregate: Aggregate, limits: Limits) -> ZSet {
    let order = cardinality_order(&mut inputs);
    let mut acc: HashMap<Vec<u8>, f64> = HashMap::new();
    for i in order {
        let (input, weight) = &mut inputs[i];
        for (element, score) in input.pairs() {
            let weighted = score * *weight;
            acc.entry(element)
                .and_modify(|s| *s = aggregate.combine(*s, weighted))
                .or_insert(weighted);
        }
    }
    build(acc, limits)
}

/// Intersection: walks the smallest input once, probing every other
/// input for membership; an element survives only if every input has
/// it, with its destination score the weighted aggregate across all of
/// them (spec.md §4.5).
pub fn intersect_store(mut inputs: Vec<(Input<'_>, f64)>, aggregate: Aggregate, limits: Limits) -> ZSet {
    if inputs.is_empty() {
        return ZSet::with_limits(limits);
    }
    let order = cardinality_order(&mut inputs);
    let (smallest, rest) = order.split_first().expect("checked non-empty above");

    let smallest_weight = inputs[*smallest].1;
    let candidates = inputs[*smallest].0.pairs();

    let mut acc: HashMap<Vec<u8>, f64> = HashMap::new();
    'candidate: for (element, score) in candidates {
        let mut agg = score * smallest_weight;
        for &i in rest {
            let (input, weight) = &mut inputs[i];
            match input.score_of(&element) {
                Some(s) => agg = aggregate.combine(agg, s * *weight),
                None => continue 'candidate,
            }
        }
        acc.insert(element, agg);
    }
    build(acc, limits)
}

#[cfg(test)]
mod tests {
    use super::*;

    // spec.md §8 scenario S6.
    #[test]
    fn union_store_sums_weighted_scores_across_inputs() {
        let mut a = ZSet::new();
        a.add(b"x", 1.0).unwrap();
        a.add(b"y", 2.0).unwrap();
        let mut b = ZSet::new();
        b.add(b"y", 3.0).unwrap();
        b.add(b"z", 4.0).unwrap();

        let mut out = union_store(
            vec![(Input::ZSet(&mut a), 2.0), (Input::ZSet(&mut b), 1.0)],
            Aggregate::Sum,
            Limits::default(),
        );

        assert_eq!(out.score(b"x"), Some(2.0));
        assert_eq!(out.score(b"y"), Some(7.0)); // 2*2 + 3*1
        assert_eq!(out.score(b"z"), Some(4.0));
    }

    #[test]
    fn union_sum_of_opposite_infinities_is_zero() {
        let mut a = ZSet::new();
        a.add(b"x", f64::INFINITY).unwrap();
        let mut b = ZSet::new();
        b.add(b"x", f64::NEG_INFINITY).unwrap();

        let mut out = union_store(
            vec![(Input::ZSet(&mut a), 1.0), (Input::ZSet(&mut b), 1.0)],
            Aggregate::Sum,
            Limits::default(),
        );
        assert_eq!(out.score(b"x"), Some(0.0));
    }

    #[test]
    fn intersect_store_keeps_only_common_elements() {
        let mut a = ZSet::new();
        a.add(b"x", 1.0).unwrap();
        a.add(b"y", 2.0).unwrap();
        let mut b = ZSet::new();
        b.add(b"y", 10.0).unwrap();
        b.add(b"z", 20.0).unwrap();

        let mut out = intersect_store(
            vec![(Input::ZSet(&mut a), 1.0), (Input::ZSet(&mut b), 1.0)],
            Aggregate::Max,
            Limits::default(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out.score(b"y"), Some(10.0));
        assert_eq!(out.score(b"x"), None);
    }

    #[test]
    fn intersect_store_treats_an_intset_as_implicit_score_one() {
        let mut a = ZSet::new();
        a.add(b"1", 5.0).unwrap();
        a.add(b"2", 6.0).unwrap();
        let mut plain = IntSet::new();
        plain.insert(1);
        plain.insert(3);

        let mut out = intersect_store(
            vec![(Input::ZSet(&mut a), 1.0), (Input::IntSet(&plain), 1.0)],
            Aggregate::Sum,
            Limits::default(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out.score(b"1"), Some(6.0)); // 5.0 + 1.0
    }

    #[test]
    fn empty_intersection_input_list_yields_an_empty_set() {
        let mut out = intersect_store(Vec::new(), Aggregate::Sum, Limits::default());
        assert_eq!(out.len(), 0);
    }
}
