//! An ordered, rank-aware skip list over `(score, element)` pairs
//! (spec.md §4.2) — the backing structure for the ordered-set's large
//! representation ([`crate::zset`]).
//!
//! Every level carries a span alongside its forward link, so a rank
//! query or "get the Nth element" lookup costs the same O(log N) as a
//! score lookup instead of falling back to a linear walk. Ordering is
//! `(score, element)` lexicographically, with `element` only used to
//! break ties between equal scores.

mod node;

use crate::config::SkipListParams;
use crate::error::{Error, Result};
use node::{less_than, Node};
use rand::Rng;
use std::ops::Bound;

pub struct SkipList {
    params: SkipListParams,
    /// Index `0` is always the head sentinel.
    nodes: Vec<Node>,
    /// Highest level currently in use by any node (`>= 1`).
    level: usize,
    length: usize,
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl SkipList {
    pub fn new() -> Self {
        Self::with_params(SkipListParams::default())
    }

    pub fn with_params(params: SkipListParams) -> Self {
        SkipList {
            nodes: vec![Node::head(params.max_level)],
            level: 1,
            length: 0,
            params,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn random_level(&self) -> usize {
        let mut level = 1;
        let mut rng = rand::thread_rng();
        while level < self.params.max_level && rng.gen_range(0..self.params.level_up_divisor) == 0 {
            level += 1;
        }
        level
    }

    /// Inserts `(score, element)`. The caller is responsible for
    /// ensuring `element` is not already present — unlike a `Dict`,
    /// this list keeps no by-element index of its own, matching how
    /// [`crate::zset`]'s large representation pairs it with a `Dict`
    /// that does.
    pub fn insert(&mut self, score: f64, element: impl Into<Vec<u8>>) -> Result<()> {
        if score.is_nan() {
            return Err(Error::InvalidInput("score must not be NaN"));
        }
        let element = element.into();
        let level = self.random_level();
        if level > self.level {
            // Newly-introduced header levels must start spanning the
            // whole pre-insertion list, or the new node's span below
            // underflows (rank[0] can be nonzero while these levels'
            // rank stays 0).
            for i in self.level..level {
                self.nodes[0].levels[i].span = self.length as u64;
            }
            self.level = level;
        }

        let mut update = vec![0usize; self.params.max_level];
        let mut rank = vec![0u64; self.params.max_level];
        let mut cur = 0usize;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            while let Some(next) = self.nodes[cur].levels[i].forward {
                let n = &self.nodes[next];
                if less_than(n.score, &n.element, score, &element) {
                    rank[i] += self.nodes[cur].levels[i].span;
                    cur = next;
                } else {
                    break;
                }
            }
            update[i] = cur;
        }

        let new_index = self.nodes.len();
        let mut new_node = Node::new(score, element, level);
        for (i, slot) in new_node.levels.iter_mut().enumerate() {
            let pred = update[i];
            slot.forward = self.nodes[pred].levels[i].forward;
            slot.span = self.nodes[pred].levels[i].span - (rank[0] - rank[i]);
            self.nodes[pred].levels[i].forward = Some(new_index);
            self.nodes[pred].levels[i].span = (rank[0] - rank[i]) + 1;
        }
        for i in level..self.level {
            self.nodes[update[i]].levels[i].span += 1;
        }

        new_node.backward = if update[0] == 0 { None } else { Some(update[0]) };
        let forward0 = new_node.levels[0].forward;
        self.nodes.push(new_node);
        if let Some(next) = forward0 {
            self.nodes[next].backward = Some(new_index);
        }
        self.length += 1;
        Ok(())
    }

    /// Removes the node matching `(score, element)` exactly.
    pub fn remove(&mut self, score: f64, element: &[u8]) -> Result<()> {
        let mut update = vec![0usize; self.params.max_level];
        let mut cur = 0usize;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].levels[i].forward {
                let n = &self.nodes[next];
                if less_than(n.score, &n.element, score, element) {
                    cur = next;
                } else {
                    break;
                }
            }
            update[i] = cur;
        }
        let target = self.nodes[cur].levels[0].forward;
        match target {
            Some(t) if self.nodes[t].score == score && self.nodes[t].element == element => {
                self.unlink(t, &update);
                Ok(())
            }
            _ => Err(Error::NotFound),
        }
    }

    fn unlink(&mut self, target: usize, update: &[usize]) {
        let target_level = self.nodes[target].level();
        for i in 0..self.level {
            let pred = update[i];
            if i < target_level && self.nodes[pred].levels[i].forward == Some(target) {
                let target_span = self.nodes[target].levels[i].span;
                self.nodes[pred].levels[i].span += target_span - 1;
                self.nodes[pred].levels[i].forward = self.nodes[target].levels[i].forward;
            } else {
                self.nodes[pred].levels[i].span -= 1;
            }
        }
        if let Some(next) = self.nodes[target].levels[0].forward {
            self.nodes[next].backward = self.nodes[target].backward;
        }
        while self.level > 1 && self.nodes[0].levels[self.level - 1].forward.is_none() {
            self.level -= 1;
        }
        self.length -= 1;
    }

    fn locate(&self, score: f64, element: &[u8]) -> Option<usize> {
        let mut cur = 0usize;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].levels[i].forward {
                let n = &self.nodes[next];
                if less_than(n.score, &n.element, score, element) {
                    cur = next;
                } else {
                    break;
                }
            }
        }
        let candidate = self.nodes[cur].levels[0].forward?;
        let n = &self.nodes[candidate];
        (n.score == score && n.element.as_slice() == element).then_some(candidate)
    }

    pub fn contains(&self, score: f64, element: &[u8]) -> bool {
        self.locate(score, element).is_some()
    }

    /// 1-based rank of `(score, element)` in ascending order, or `None`
    /// if absent.
    pub fn rank_of(&self, score: f64, element: &[u8]) -> Option<u64> {
        let mut rank = 0u64;
        let mut cur = 0usize;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].levels[i].forward {
                let n = &self.nodes[next];
                if less_than(n.score, &n.element, score, element)
                    || (n.score == score && n.element.as_slice() == element)
                {
                    rank += self.nodes[cur].levels[i].span;
                    cur = next;
                } else {
                    break;
                }
            }
        }
        if cur != 0 && self.nodes[cur].score == score && self.nodes[cur].element.as_slice() == element {
            Some(rank)
        } else {
            None
        }
    }

    /// The element at 1-based rank `rank`.
    pub fn element_by_rank(&self, rank: u64) -> Option<(f64, &[u8])> {
        if rank == 0 {
            return None;
        }
        let mut traversed = 0u64;
        let mut cur = 0usize;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].levels[i].forward {
                let next_traversed = traversed + self.nodes[cur].levels[i].span;
                if next_traversed <= rank {
                    traversed = next_traversed;
                    cur = next;
                } else {
                    break;
                }
            }
            if traversed == rank {
                break;
            }
        }
        if traversed == rank && cur != 0 {
            Some((self.nodes[cur].score, self.nodes[cur].element.as_slice()))
        } else {
            None
        }
    }

    pub fn first_in_score_range(&self, min: Bound<f64>, max: Bound<f64>) -> Option<(f64, &[u8])> {
        let mut cur = 0usize;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].levels[i].forward {
                if !score_above_min(self.nodes[next].score, min) {
                    cur = next;
                } else {
                    break;
                }
            }
        }
        let candidate = self.nodes[cur].levels[0].forward?;
        let n = &self.nodes[candidate];
        score_below_max(n.score, max).then_some((n.score, n.element.as_slice()))
    }

    pub fn last_in_score_range(&self, min: Bound<f64>, max: Bound<f64>) -> Option<(f64, &[u8])> {
        let mut cur = 0usize;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].levels[i].forward {
                if score_below_max(self.nodes[next].score, max) {
                    cur = next;
                } else {
                    break;
                }
            }
        }
        if cur == 0 {
            return None;
        }
        let n = &self.nodes[cur];
        score_above_min(n.score, min).then_some((n.score, n.element.as_slice()))
    }

    /// Lex-ordered range queries assume every element in the queried
    /// region shares one score, the same contract `ZRANGEBYLEX` places
    /// on callers in the system this crate is modeled on — elsewhere,
    /// "lexicographic" order and `(score, element)` order disagree and
    /// these skip-level shortcuts would be unsound.
    pub fn first_in_lex_range(&self, min: Bound<&[u8]>, max: Bound<&[u8]>) -> Option<(f64, &[u8])> {
        let mut cur = 0usize;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].levels[i].forward {
                if !elem_above_min(&self.nodes[next].element, min) {
                    cur = next;
                } else {
                    break;
                }
            }
        }
        let candidate = self.nodes[cur].levels[0].forward?;
        let n = &self.nodes[candidate];
        elem_below_max(&n.element, max).then_some((n.score, n.element.as_slice()))
    }

    pub fn last_in_lex_range(&self, min: Bound<&[u8]>, max: Bound<&[u8]>) -> Option<(f64, &[u8])> {
        let mut cur = 0usize;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].levels[i].forward {
                if elem_below_max(&self.nodes[next].element, max) {
                    cur = next;
                } else {
                    break;
                }
            }
        }
        if cur == 0 {
            return None;
        }
        let n = &self.nodes[cur];
        elem_above_min(&n.element, min).then_some((n.score, n.element.as_slice()))
    }

    /// Removes and returns every element currently at 1-based ranks
    /// `start..=end`.
    pub fn remove_range_by_rank(&mut self, start: u64, end: u64) -> Vec<(f64, Vec<u8>)> {
        let mut matches = Vec::new();
        for r in start..=end {
            match self.element_by_rank(r) {
                Some((score, elem)) => matches.push((score, elem.to_vec())),
                None => break,
            }
        }
        for (score, elem) in &matches {
            let _ = self.remove(*score, elem);
        }
        matches
    }

    fn collect_score_range(&self, min: Bound<f64>, max: Bound<f64>) -> Vec<usize> {
        let mut out = Vec::new();
        if let Some((score, elem)) = self.first_in_score_range(min, max) {
            let mut cur = self.locate(score, elem);
            while let Some(idx) = cur {
                let n = &self.nodes[idx];
                if !score_below_max(n.score, max) {
                    break;
                }
                out.push(idx);
                cur = n.levels[0].forward;
            }
        }
        out
    }

    fn collect_lex_range(&self, min: Bound<&[u8]>, max: Bound<&[u8]>) -> Vec<usize> {
        let mut out = Vec::new();
        if let Some((score, elem)) = self.first_in_lex_range(min, max) {
            let mut cur = self.locate(score, elem);
            while let Some(idx) = cur {
                let n = &self.nodes[idx];
                if !elem_below_max(&n.element, max) {
                    break;
                }
                out.push(idx);
                cur = n.levels[0].forward;
            }
        }
        out
    }

    /// Every `(score, element)` pair with a score in `[min, max]`, in
    /// ascending order, without removing anything.
    pub fn range_by_score(&self, min: Bound<f64>, max: Bound<f64>) -> Vec<(f64, &[u8])> {
        self.collect_score_range(min, max)
            .into_iter()
            .map(|idx| (self.nodes[idx].score, self.nodes[idx].element.as_slice()))
            .collect()
    }

    /// Every `(score, element)` pair with an element in `[min, max]`
    /// lexicographically, subject to the same equal-score contract as
    /// [`Self::first_in_lex_range`].
    pub fn range_by_lex(&self, min: Bound<&[u8]>, max: Bound<&[u8]>) -> Vec<(f64, &[u8])> {
        self.collect_lex_range(min, max)
            .into_iter()
            .map(|idx| (self.nodes[idx].score, self.nodes[idx].element.as_slice()))
            .collect()
    }

    pub fn count_in_score_range(&self, min: Bound<f64>, max: Bound<f64>) -> usize {
        self.collect_score_range(min, max).len()
    }

    pub fn count_in_lex_range(&self, min: Bound<&[u8]>, max: Bound<&[u8]>) -> usize {
        self.collect_lex_range(min, max).len()
    }

    pub fn remove_range_by_score(&mut self, min: Bound<f64>, max: Bound<f64>) -> Vec<(f64, Vec<u8>)> {
        let matches: Vec<(f64, Vec<u8>)> = self
            .collect_score_range(min, max)
            .into_iter()
            .map(|idx| (self.nodes[idx].score, self.nodes[idx].element.clone()))
            .collect();
        for (score, elem) in &matches {
            let _ = self.remove(*score, elem);
        }
        matches
    }

    pub fn remove_range_by_lex(&mut self, min: Bound<&[u8]>, max: Bound<&[u8]>) -> Vec<(f64, Vec<u8>)> {
        let matches: Vec<(f64, Vec<u8>)> = self
            .collect_lex_range(min, max)
            .into_iter()
            .map(|idx| (self.nodes[idx].score, self.nodes[idx].element.clone()))
            .collect();
        for (score, elem) in &matches {
            let _ = self.remove(*score, elem);
        }
        matches
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cur: self.nodes[0].levels[0].forward,
        }
    }
}

fn score_above_min(score: f64, min: Bound<f64>) -> bool {
    match min {
        Bound::Unbounded => true,
        Bound::Included(m) => score >= m,
        Bound::Excluded(m) => score > m,
    }
}

fn score_below_max(score: f64, max: Bound<f64>) -> bool {
    match max {
        Bound::Unbounded => true,
        Bound::Included(m) => score <= m,
        Bound::Excluded(m) => score < m,
    }
}

fn elem_above_min(elem: &[u8], min: Bound<&[u8]>) -> bool {
    match min {
        Bound::Unbounded => true,
        Bound::Included(m) => elem >= m,
        Bound::Excluded(m) => elem > m,
    }
}

fn elem_below_max(elem: &[u8], max: Bound<&[u8]>) -> bool {
    match max {
        Bound::Unbounded => true,
        Bound::Included(m) => elem <= m,
        Bound::Excluded(m) => elem < m,
    }
}

pub struct Iter<'a> {
    list: &'a SkipList,
    cur: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (f64, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        let n = &self.list.nodes[idx];
        self.cur = n.levels[0].forward;
        Some((n.score, n.element.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elems(list: &SkipList) -> Vec<(f64, Vec<u8>)> {
        list.iter().map(|(s, e)| (s, e.to_vec())).collect()
    }

    #[test]
    fn insert_keeps_ascending_order() {
        let mut list = SkipList::new();
        for (score, e) in [(3.0, "c"), (1.0, "a"), (2.0, "b")] {
            list.insert(score, e.as_bytes().to_vec()).unwrap();
        }
        assert_eq!(
            elems(&list),
            vec![
                (1.0, b"a".to_vec()),
                (2.0, b"b".to_vec()),
                (3.0, b"c".to_vec())
            ]
        );
    }

    #[test]
    fn equal_scores_break_ties_lexicographically() {
        let mut list = SkipList::new();
        for e in ["banana", "apple", "cherry"] {
            list.insert(1.0, e.as_bytes().to_vec()).unwrap();
        }
        assert_eq!(
            elems(&list),
            vec![
                (1.0, b"apple".to_vec()),
                (1.0, b"banana".to_vec()),
                (1.0, b"cherry".to_vec())
            ]
        );
    }

    #[test]
    fn nan_score_is_rejected() {
        let mut list = SkipList::new();
        assert_eq!(
            list.insert(f64::NAN, b"x".to_vec()),
            Err(Error::InvalidInput("score must not be NaN"))
        );
    }

    #[test]
    fn remove_missing_element_is_not_found() {
        let mut list = SkipList::new();
        list.insert(1.0, b"a".to_vec()).unwrap();
        assert_eq!(list.remove(2.0, b"b"), Err(Error::NotFound));
        assert!(list.remove(1.0, b"a").is_ok());
        assert!(list.is_empty());
    }

    // spec.md §8 scenario S4.
    #[test]
    fn rank_and_rank_range_removal_scenario() {
        let mut list = SkipList::new();
        for i in [1, 3, 5, 7, 9] {
            list.insert(i as f64, format!("e{i}").into_bytes()).unwrap();
        }
        assert_eq!(list.rank_of(5.0, b"e5"), Some(3));
        let removed = list.remove_range_by_rank(2, 4);
        assert_eq!(
            removed,
            vec![
                (3.0, b"e3".to_vec()),
                (5.0, b"e5".to_vec()),
                (7.0, b"e7".to_vec())
            ]
        );
        assert_eq!(
            elems(&list),
            vec![(1.0, b"e1".to_vec()), (9.0, b"e9".to_vec())]
        );
    }

    #[test]
    fn element_by_rank_round_trips_with_rank_of() {
        let mut list = SkipList::new();
        for i in 0..20 {
            list.insert(i as f64, format!("e{i}").into_bytes()).unwrap();
        }
        for r in 1..=20u64 {
            let (score, elem) = list.element_by_rank(r).unwrap();
            assert_eq!(list.rank_of(score, elem), Some(r));
        }
        assert_eq!(list.element_by_rank(0), None);
        assert_eq!(list.element_by_rank(21), None);
    }

    #[test]
    fn score_range_queries_respect_bounds() {
        let mut list = SkipList::new();
        for i in 0..10 {
            list.insert(i as f64, format!("e{i}").into_bytes()).unwrap();
        }
        assert_eq!(
            list.first_in_score_range(Bound::Included(3.0), Bound::Included(7.0)),
            Some((3.0, b"e3".as_slice()))
        );
        assert_eq!(
            list.first_in_score_range(Bound::Excluded(3.0), Bound::Included(7.0)),
            Some((4.0, b"e4".as_slice()))
        );
        assert_eq!(
            list.last_in_score_range(Bound::Included(3.0), Bound::Excluded(7.0)),
            Some((6.0, b"e6".as_slice()))
        );
        assert_eq!(
            list.first_in_score_range(Bound::Included(100.0), Bound::Unbounded),
            None
        );
    }

    #[test]
    fn remove_range_by_score_removes_only_matching_elements() {
        let mut list = SkipList::new();
        for i in 0..10 {
            list.insert(i as f64, format!("e{i}").into_bytes()).unwrap();
        }
        let removed = list.remove_range_by_score(Bound::Included(3.0), Bound::Included(5.0));
        assert_eq!(
            removed,
            vec![
                (3.0, b"e3".to_vec()),
                (4.0, b"e4".to_vec()),
                (5.0, b"e5".to_vec())
            ]
        );
        assert_eq!(list.len(), 7);
        assert!(!list.contains(4.0, b"e4"));
    }

    #[test]
    fn lex_range_queries_over_equal_scores() {
        let mut list = SkipList::new();
        for e in ["a", "b", "c", "d", "e"] {
            list.insert(0.0, e.as_bytes().to_vec()).unwrap();
        }
        assert_eq!(
            list.first_in_lex_range(Bound::Included(b"b".as_slice()), Bound::Included(b"d".as_slice())),
            Some((0.0, b"b".as_slice()))
        );
        assert_eq!(
            list.last_in_lex_range(Bound::Included(b"b".as_slice()), Bound::Excluded(b"d".as_slice())),
            Some((0.0, b"c".as_slice()))
        );
        let removed = list.remove_range_by_lex(Bound::Excluded(b"a".as_slice()), Bound::Included(b"c".as_slice()));
        assert_eq!(removed, vec![(0.0, b"b".to_vec()), (0.0, b"c".to_vec())]);
        assert_eq!(elems(&list), vec![(0.0, b"a".to_vec()), (0.0, b"d".to_vec()), (0.0, b"e".to_vec())]);
    }

    // A node whose random level exceeds every existing node's level must
    // not underflow the new node's span when it lands at a nonzero rank
    // (i.e. anywhere but the head) — newly-introduced header levels have
    // to start out spanning the whole pre-insertion list.
    #[test]
    fn level_raise_past_rank_zero_does_not_underflow_span() {
        let mut list = SkipList::new();
        for i in 0..200 {
            list.insert(i as f64, format!("e{i:03}").into_bytes()).unwrap();
        }
        for r in 1..=200u64 {
            let (score, elem) = list.element_by_rank(r).unwrap();
            assert_eq!(list.rank_of(score, elem), Some(r));
        }
        assert_eq!(list.len(), 200);
    }

    #[test]
    fn large_insert_remove_sequence_matches_a_btreeset_model() {
        use std::collections::BTreeSet;
        let mut list = SkipList::new();
        let mut model: BTreeSet<(i64, Vec<u8>)> = BTreeSet::new();
        let mut rng = rand::thread_rng();
        for i in 0..500 {
            let score = rng.gen_range(0..50);
            let elem = format!("e{i}").into_bytes();
            list.insert(score as f64, elem.clone()).unwrap();
            model.insert((score, elem));
        }
        let from_list: Vec<(i64, Vec<u8>)> = list.iter().map(|(s, e)| (s as i64, e.to_vec())).collect();
        let from_model: Vec<(i64, Vec<u8>)> = model.into_iter().collect();
        assert_eq!(from_list, from_model);
        assert_eq!(list.len(), from_list.len());
    }
}
