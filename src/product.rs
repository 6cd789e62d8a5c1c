//! Reachability search over the product of two DFAs.
//!
//! Product states are never materialized up front: each pair is expanded only
//! when it is popped, by intersecting the transition alphabets of its two
//! halves.

use std::collections::HashSet;
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::dfa::{Dfa, DfaState, DfaStateId, Transition};
use crate::ranges::RangeSet;

/// Identity of a product state: one state id from each DFA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId {
    pub left: DfaStateId,
    pub right: DfaStateId,
}

impl PairId {
    pub fn new(left: DfaStateId, right: DfaStateId) -> Self {
        Self { left, right }
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.left, self.right)
    }
}

/// A product state, borrowing both halves from their DFAs.
#[derive(Debug, Clone, Copy)]
pub struct CombineNode<'a> {
    pub id: PairId,
    left: &'a DfaState,
    right: &'a DfaState,
}

impl<'a> CombineNode<'a> {
    pub fn new(left: &'a Dfa, right: &'a Dfa, id: PairId) -> Self {
        Self {
            id,
            left: left.state(id.left),
            right: right.state(id.right),
        }
    }

    pub fn accepting(&self) -> bool {
        self.left.accepting && self.right.accepting
    }

    /// Every pair reachable on a character both halves can consume.
    pub fn successors(&self) -> Vec<PairId> {
        let mut next = Vec::new();
        for overlap in overlap_ranges(&self.left.transitions, &self.right.transitions) {
            let lefts: Vec<_> = targets_overlapping(&self.left.transitions, &overlap).collect();
            let rights: Vec<_> = targets_overlapping(&self.right.transitions, &overlap).collect();
            for &l in &lefts {
                for &r in &rights {
                    next.push(PairId::new(l, r));
                }
            }
        }
        next
    }
}

fn overlap_ranges(left: &[Transition], right: &[Transition]) -> Vec<RangeSet> {
    let mut out = Vec::new();
    for a in left {
        for b in right {
            if a.ranges.overlaps(&b.ranges) {
                out.push(a.ranges.intersect(&b.ranges));
            }
        }
    }
    out
}

fn targets_overlapping<'t>(
    transitions: &'t [Transition],
    ranges: &'t RangeSet,
) -> impl Iterator<Item = DfaStateId> + 't {
    transitions
        .iter()
        .filter(move |t| t.ranges.overlaps(ranges))
        .map(|t| t.target)
}

#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error("product search exceeded the limit of {limit} states")]
    #[diagnostic(
        code(regexinter::product_limit),
        help("raise --max-product-states")
    )]
    TooManyStates { limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOutcome {
    pub intersects: bool,
    /// Product states popped and expanded (or found accepting).
    pub visited: usize,
}

/// Whether some string drives both DFAs from their roots into accepting
/// states.
pub fn has_intersection(left: &Dfa, right: &Dfa) -> bool {
    match search(left, right, None) {
        Ok(outcome) => outcome.intersects,
        Err(SearchError::TooManyStates { .. }) => unreachable!("no state limit was set"),
    }
}

/// Depth-first search of the product automaton with an explicit stack and a
/// visited set owned by this call.
pub fn search(left: &Dfa, right: &Dfa, limit: Option<usize>) -> Result<SearchOutcome, SearchError> {
    let mut visited: HashSet<PairId> = HashSet::new();
    let mut stack = vec![PairId::new(Dfa::ROOT, Dfa::ROOT)];

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(limit) = limit {
            if visited.len() > limit {
                return Err(SearchError::TooManyStates { limit });
            }
        }

        let node = CombineNode::new(left, right, id);
        if node.accepting() {
            return Ok(SearchOutcome {
                intersects: true,
                visited: visited.len(),
            });
        }

        for next in node.successors() {
            if !visited.contains(&next) {
                stack.push(next);
            }
        }
    }

    Ok(SearchOutcome {
        intersects: false,
        visited: visited.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::compile;

    fn dfa(expr: &str) -> Dfa {
        Dfa::from_nfa(&compile(expr).unwrap())
    }

    #[test]
    fn pair_id_display() {
        assert_eq!(PairId::new(3, 14).to_string(), "3_14");
    }

    #[test]
    fn accepting_roots_stop_immediately() {
        let outcome = search(&dfa("a*"), &dfa("b*"), None).unwrap();
        assert!(outcome.intersects);
        assert_eq!(outcome.visited, 1);
    }

    #[test]
    fn successors_follow_shared_characters() {
        let left = dfa("[a-m]x|[n-z]y");
        let right = dfa("[k-p]x");
        let root = CombineNode::new(&left, &right, PairId::new(Dfa::ROOT, Dfa::ROOT));
        let successors = root.successors();
        // [k-m] and [n-p] lead to different left states
        assert_eq!(successors.len(), 2);
        assert!(successors.iter().all(|p| p.right == successors[0].right));
        assert_ne!(successors[0].left, successors[1].left);
    }

    #[test]
    fn scenarios() {
        assert!(has_intersection(&dfa("a*ba+"), &dfa("b*ab+a")));
        assert!(!has_intersection(&dfa("[A-Z]+"), &dfa("[a-z]+")));
        assert!(has_intersection(&dfa(""), &dfa("")));
        assert!(!has_intersection(&dfa("a"), &dfa("")));
        assert!(!has_intersection(&dfa("(a|b)"), &dfa("(c|d)")));
        assert!(has_intersection(&dfa("a*"), &dfa("a+")));
    }

    #[test]
    fn visited_is_bounded_by_product_size() {
        let left = dfa("(a|b)*abb");
        let right = dfa("(b|a)*bab");
        let outcome = search(&left, &right, None).unwrap();
        assert!(!outcome.intersects);
        assert!(outcome.visited <= left.len() * right.len());
    }

    #[test]
    fn cyclic_products_terminate() {
        assert!(!has_intersection(&dfa("(ab)*a"), &dfa("(ba)*")));
        assert!(has_intersection(&dfa("(ab)*a"), &dfa("a(ba)*")));
    }

    #[test]
    fn product_limit() {
        let left = dfa("a{20}");
        let right = dfa("a{21}");
        assert!(matches!(
            search(&left, &right, Some(5)),
            Err(SearchError::TooManyStates { limit: 5 })
        ));
        let outcome = search(&left, &right, Some(100)).unwrap();
        assert!(!outcome.intersects);
    }
}
