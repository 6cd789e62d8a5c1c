//! Subset construction over rune-range labeled NFAs.
//!
//! Every DFA state stands for the epsilon-closure union of a set of NFA
//! states. Its identity is the canonical label of that set: the sorted NFA
//! ids joined with `,`. States are numbered in the order they are first
//! reached by a depth-first walk over ascending alphabet blocks, so building
//! twice from the same NFA yields the same numbering.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use miette::Diagnostic;
use thiserror::Error;

use crate::nfa::{Nfa, StateId as NfaStateId};
use crate::ranges::{RangeSet, RuneRange, split};

pub type DfaStateId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub ranges: RangeSet,
    pub target: DfaStateId,
}

#[derive(Debug, Clone)]
pub struct DfaState {
    pub id: DfaStateId,
    pub accepting: bool,
    /// Pairwise disjoint; characters outside every range have no transition.
    pub transitions: Vec<Transition>,
    label: String,
    closure: Vec<NfaStateId>,
}

impl DfaState {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The sorted NFA states this DFA state stands for.
    pub fn closure(&self) -> &[NfaStateId] {
        &self.closure
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("DFA construction exceeded the limit of {limit} states")]
    #[diagnostic(
        code(regexinter::dfa_limit),
        help("raise --max-dfa-states or simplify the expression")
    )]
    TooManyStates { limit: usize },
}

#[derive(Debug, Clone)]
pub struct Dfa {
    states: Vec<DfaState>,
    labels: IndexMap<String, DfaStateId>,
}

impl Dfa {
    pub const ROOT: DfaStateId = 0;

    pub fn from_nfa(nfa: &Nfa) -> Dfa {
        match Self::from_nfa_with_limit(nfa, None) {
            Ok(dfa) => dfa,
            Err(BuildError::TooManyStates { .. }) => unreachable!("no state limit was set"),
        }
    }

    /// Run subset construction, giving up once more than `limit` states
    /// would be needed.
    pub fn from_nfa_with_limit(nfa: &Nfa, limit: Option<usize>) -> Result<Dfa, BuildError> {
        Builder {
            nfa,
            limit,
            closures: HashMap::new(),
            states: Vec::new(),
            labels: IndexMap::new(),
        }
        .build()
    }

    pub fn root(&self) -> &DfaState {
        &self.states[Self::ROOT]
    }

    pub fn state(&self, id: DfaStateId) -> &DfaState {
        &self.states[id]
    }

    pub fn states(&self) -> &[DfaState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Find the state with the given canonical label.
    pub fn lookup(&self, label: &str) -> Option<DfaStateId> {
        self.labels.get(label).copied()
    }

    pub fn next_state(&self, from: DfaStateId, c: char) -> Option<DfaStateId> {
        self.states[from]
            .transitions
            .iter()
            .find(|t| t.ranges.contains_char(c))
            .map(|t| t.target)
    }

    /// Whether the automaton accepts all of `input`.
    pub fn is_match(&self, input: &str) -> bool {
        let mut current = Self::ROOT;
        for c in input.chars() {
            match self.next_state(current, c) {
                Some(next) => current = next,
                None => return false,
            }
        }
        self.states[current].accepting
    }
}

impl fmt::Display for Dfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut visited = HashSet::from([Self::ROOT]);
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            let state = &self.states[id];
            write!(f, "{} {{{}}}", state.id, state.label)?;
            if state.accepting {
                write!(f, " accepting")?;
            }
            writeln!(f)?;
            for t in &state.transitions {
                writeln!(f, "  {} -> {}", t.ranges, t.target)?;
            }
            // reversed so the first transition is printed first
            for t in state.transitions.iter().rev() {
                if visited.insert(t.target) {
                    stack.push(t.target);
                }
            }
        }
        Ok(())
    }
}

/// A DFA state whose outgoing blocks are still being resolved.
struct Frame {
    state: DfaStateId,
    blocks: Vec<RuneRange>,
    next: usize,
    targets: IndexMap<DfaStateId, RangeSet>,
}

struct Builder<'a> {
    nfa: &'a Nfa,
    limit: Option<usize>,
    closures: HashMap<NfaStateId, Vec<NfaStateId>>,
    states: Vec<DfaState>,
    labels: IndexMap<String, DfaStateId>,
}

impl Builder<'_> {
    fn build(mut self) -> Result<Dfa, BuildError> {
        let root_closure = if self.nfa.is_empty() {
            Vec::new()
        } else {
            self.closure(self.nfa.start()).to_vec()
        };
        let (root, _) = self.intern(root_closure)?;

        // Depth-first: a freshly created target is fully expanded before its
        // parent moves on to the next block.
        let mut stack = vec![self.frame(root)];
        while let Some(top) = stack.len().checked_sub(1) {
            let frame = &mut stack[top];
            if frame.next == frame.blocks.len() {
                if let Some(done) = stack.pop() {
                    self.finish(done);
                }
                continue;
            }
            let block = frame.blocks[frame.next];
            frame.next += 1;
            let source = frame.state;

            let closure = self.step(source, block);
            let (target, created) = self.intern(closure)?;

            let ranges = stack[top].targets.entry(target).or_default();
            *ranges = ranges.sum(&RangeSet::from(block));

            if created {
                let child = self.frame(target);
                stack.push(child);
            }
        }

        Ok(Dfa {
            states: self.states,
            labels: self.labels,
        })
    }

    fn closure(&mut self, state: NfaStateId) -> &[NfaStateId] {
        let nfa = self.nfa;
        self.closures
            .entry(state)
            .or_insert_with(|| epsilon_closure(nfa, state))
    }

    fn reaches_accepting(&mut self, state: NfaStateId) -> bool {
        let nfa = self.nfa;
        self.closure(state)
            .iter()
            .any(|&s| nfa.state(s).accepting)
    }

    fn frame(&self, state: DfaStateId) -> Frame {
        let nfa = self.nfa;
        let labels = self.states[state]
            .closure
            .iter()
            .flat_map(|&s| &nfa.state(s).edges)
            .filter_map(|edge| edge.label.as_ref());
        Frame {
            state,
            blocks: split(labels),
            next: 0,
            targets: IndexMap::new(),
        }
    }

    /// Union of the closures of every edge target, over the source's NFA
    /// states, whose label overlaps `block`.
    fn step(&mut self, source: DfaStateId, block: RuneRange) -> Vec<NfaStateId> {
        let nfa = self.nfa;
        let targets: Vec<NfaStateId> = self.states[source]
            .closure
            .iter()
            .flat_map(|&s| &nfa.state(s).edges)
            .filter(|edge| edge.label.as_ref().is_some_and(|l| l.contains(block)))
            .map(|edge| edge.target)
            .collect();

        let mut union = BTreeSet::new();
        for target in targets {
            union.extend(self.closure(target).iter().copied());
        }
        union.into_iter().collect()
    }

    /// Return the state for `closure`, creating it if its label is new.
    fn intern(&mut self, closure: Vec<NfaStateId>) -> Result<(DfaStateId, bool), BuildError> {
        let label = make_label(&closure);
        if let Some(&id) = self.labels.get(&label) {
            return Ok((id, false));
        }
        if let Some(limit) = self.limit {
            if self.states.len() >= limit {
                return Err(BuildError::TooManyStates { limit });
            }
        }

        let mut accepting = false;
        for &s in &closure {
            if self.reaches_accepting(s) {
                accepting = true;
                break;
            }
        }

        let id = self.states.len();
        self.labels.insert(label.clone(), id);
        self.states.push(DfaState {
            id,
            accepting,
            transitions: Vec::new(),
            label,
            closure,
        });
        Ok((id, true))
    }

    fn finish(&mut self, frame: Frame) {
        let states = &self.states;
        let mut transitions: Vec<Transition> = frame
            .targets
            .into_iter()
            .map(|(target, ranges)| Transition { ranges, target })
            .collect();
        transitions.sort_by_key(|t| {
            let first = states[t.target].closure.first().copied();
            (first.unwrap_or(t.target), t.target)
        });
        self.states[frame.state].transitions = transitions;
    }
}

fn epsilon_closure(nfa: &Nfa, state: NfaStateId) -> Vec<NfaStateId> {
    let mut seen = BTreeSet::from([state]);
    let mut stack = vec![state];
    while let Some(s) = stack.pop() {
        for edge in nfa.state(s).edges.iter().filter(|e| e.is_epsilon()) {
            if seen.insert(edge.target) {
                stack.push(edge.target);
            }
        }
    }
    seen.into_iter().collect()
}

fn make_label(closure: &[NfaStateId]) -> String {
    closure
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::compile;

    fn class(a: char, b: char) -> RangeSet {
        RangeSet::from(RuneRange::from_chars(a, b))
    }

    #[test]
    fn epsilon_cycle_terminates() {
        // 0 -ε-> 1 -ε-> 0, 1 -a-> 2 (accepting), 2 -ε-> 0
        let mut nfa = Nfa::new();
        let s0 = nfa.add_state();
        let s1 = nfa.add_state();
        let s2 = nfa.add_state();
        nfa.add_epsilon(s0, s1);
        nfa.add_epsilon(s1, s0);
        nfa.add_edge(s1, RangeSet::from_char('a'), s2);
        nfa.add_epsilon(s2, s0);
        nfa.set_accepting(s2);

        let dfa = Dfa::from_nfa(&nfa);
        assert_eq!(dfa.root().label(), "0,1");
        assert!(!dfa.root().accepting);
        assert_eq!(dfa.len(), 2);

        let next = dfa.next_state(Dfa::ROOT, 'a').unwrap();
        assert_eq!(dfa.state(next).label(), "0,1,2");
        assert!(dfa.state(next).accepting);
        assert_eq!(dfa.next_state(next, 'a'), Some(next));
        assert_eq!(dfa.next_state(next, 'b'), None);
    }

    #[test]
    fn overlapping_edges_are_split() {
        // 0 -[a-m]-> 1 (accepting), 0 -[f-z]-> 2
        let mut nfa = Nfa::new();
        let s0 = nfa.add_state();
        let s1 = nfa.add_state();
        let s2 = nfa.add_state();
        nfa.add_edge(s0, class('a', 'm'), s1);
        nfa.add_edge(s0, class('f', 'z'), s2);
        nfa.set_accepting(s1);

        let dfa = Dfa::from_nfa(&nfa);
        let root = dfa.root();
        let summary: Vec<_> = root
            .transitions
            .iter()
            .map(|t| (t.ranges.clone(), dfa.state(t.target).label().to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (class('a', 'e'), "1".to_string()),
                (class('f', 'm'), "1,2".to_string()),
                (class('n', 'z'), "2".to_string()),
            ]
        );
        assert!(dfa.state(dfa.lookup("1").unwrap()).accepting);
        assert!(dfa.state(dfa.lookup("1,2").unwrap()).accepting);
        assert!(!dfa.state(dfa.lookup("2").unwrap()).accepting);
    }

    #[test]
    fn blocks_with_same_target_are_summed() {
        let mut nfa = Nfa::new();
        let s0 = nfa.add_state();
        let s1 = nfa.add_state();
        nfa.add_edge(s0, class('a', 'c'), s1);
        nfa.add_edge(s0, class('x', 'z'), s1);
        nfa.set_accepting(s1);

        let dfa = Dfa::from_nfa(&nfa);
        assert_eq!(dfa.root().transitions.len(), 1);
        assert_eq!(
            dfa.root().transitions[0].ranges,
            class('a', 'c').sum(&class('x', 'z'))
        );
    }

    #[test]
    fn equal_closures_collapse() {
        let dfa = Dfa::from_nfa(&compile("a*").unwrap());
        assert_eq!(dfa.len(), 2);
        assert!(dfa.root().accepting);
        let next = dfa.next_state(Dfa::ROOT, 'a').unwrap();
        assert_eq!(dfa.next_state(next, 'a'), Some(next));
        assert_eq!(dfa.lookup(dfa.root().label()), Some(Dfa::ROOT));
    }

    #[test]
    fn transitions_are_disjoint() {
        let dfa = Dfa::from_nfa(&compile(r"(\w+|[0-9a-f]+|x)*\.[a-z]{2}").unwrap());
        for state in dfa.states() {
            for (i, a) in state.transitions.iter().enumerate() {
                for b in &state.transitions[i + 1..] {
                    assert!(
                        !a.ranges.overlaps(&b.ranges),
                        "state {} has overlapping transitions {} and {}",
                        state.id,
                        a.ranges,
                        b.ranges
                    );
                }
            }
        }
    }

    #[test]
    fn rebuilding_is_deterministic() {
        for pattern in ["(a|b)*abb", "a*ba+", r"[a-z]+@[a-z]+\.(com|org)", "(x|xy|xyz)*"] {
            let nfa = compile(pattern).unwrap();
            let first = Dfa::from_nfa(&nfa);
            let second = Dfa::from_nfa(&nfa);
            assert_eq!(first.len(), second.len(), "pattern '{}'", pattern);
            for (a, b) in first.states().iter().zip(second.states()) {
                assert_eq!(a.label(), b.label(), "pattern '{}'", pattern);
                assert_eq!(a.accepting, b.accepting, "pattern '{}'", pattern);
                assert_eq!(a.transitions, b.transitions, "pattern '{}'", pattern);
            }
        }
    }

    #[test]
    fn transitions_sorted_by_smallest_nfa_state() {
        let dfa = Dfa::from_nfa(&compile("(c|b|a)(x|y)").unwrap());
        for state in dfa.states() {
            let keys: Vec<_> = state
                .transitions
                .iter()
                .map(|t| {
                    let target = dfa.state(t.target);
                    (target.closure().first().copied().unwrap_or(target.id), target.id)
                })
                .collect();
            let mut sorted = keys.clone();
            sorted.sort();
            assert_eq!(keys, sorted);
        }
    }

    #[test]
    fn matches_like_regex_crate() {
        let patterns = ["a*ba+", "(a|b)*abb", "[a-c]{2,3}", "x(yz)*|y+", r"\d+(\.\d+)?"];
        let inputs = [
            "", "a", "ba", "aba", "abaa", "bba", "abb", "babb", "ab", "abc", "cab", "abcd", "x",
            "xyz", "xyzyz", "xy", "yyy", "12", "1.5", "1.", ".5",
        ];
        for pattern in patterns {
            let dfa = Dfa::from_nfa(&compile(pattern).unwrap());
            let re = regex::Regex::new(&format!("^(?:{pattern})$")).unwrap();
            for input in inputs {
                assert_eq!(
                    dfa.is_match(input),
                    re.is_match(input),
                    "pattern '{}' disagrees on input '{}'",
                    pattern,
                    input
                );
            }
        }
    }

    #[test]
    fn state_limit() {
        let nfa = compile("abcd").unwrap();
        assert_eq!(Dfa::from_nfa(&nfa).len(), 5);
        assert!(matches!(
            Dfa::from_nfa_with_limit(&nfa, Some(3)),
            Err(BuildError::TooManyStates { limit: 3 })
        ));
        assert!(Dfa::from_nfa_with_limit(&nfa, Some(5)).is_ok());
    }

    #[test]
    fn empty_nfa_has_a_dead_root() {
        let dfa = Dfa::from_nfa(&Nfa::new());
        assert_eq!(dfa.len(), 1);
        assert!(!dfa.root().accepting);
        assert!(dfa.root().transitions.is_empty());
    }

    #[test]
    fn display_walks_reachable_states() {
        let dfa = Dfa::from_nfa(&compile("ab|cd").unwrap());
        let dump = dfa.to_string();
        assert!(dump.starts_with("0 {"));
        assert_eq!(dump.matches("accepting").count(), 2);
        assert_eq!(dump.lines().filter(|l| !l.starts_with(' ')).count(), dfa.len());
    }
}
