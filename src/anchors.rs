//! Elimination of text and line anchors.
//!
//! With whole-string matching an anchor is a condition on its neighbours:
//! the character consumed just before the position (or the start of input)
//! and the one consumed just after it (or the end of input). The compiler
//! records anchors as side edges, and [`resolve`] folds them away by pairing
//! each NFA state with what is known about those neighbours. The result only
//! has labeled and epsilon edges, and an anchor that can never hold leaves
//! its path dead.

use std::collections::HashMap;

use regex_syntax::hir::Look;

use crate::nfa::{CompileErrorKind, Nfa, StateId};
use crate::ranges::{RangeSet, RuneRange};

const LF: u32 = 0x0a;
const CR: u32 = 0x0d;
const MAX: u32 = char::MAX as u32;

/// A zero-width assertion sitting between two compiler states.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Assertion {
    pub from: StateId,
    pub look: Look,
    pub to: StateId,
}

/// What was consumed right before the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Behind {
    Start,
    Lf,
    Cr,
    Other,
}

/// What may come right after the current position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Ahead {
    end: bool,
    next: RangeSet,
}

impl Ahead {
    fn any() -> Self {
        Self {
            end: true,
            next: except(&[]),
        }
    }

    fn meet(&self, other: &Ahead) -> Ahead {
        Ahead {
            end: self.end && other.end,
            next: self.next.intersect(&other.next),
        }
    }

    fn is_void(&self) -> bool {
        !self.end && self.next.is_empty()
    }
}

fn only(points: &[u32]) -> RangeSet {
    RangeSet::new(points.iter().map(|&p| RuneRange::new(p, p)))
}

/// Every code point except `points`, which must be sorted.
fn except(points: &[u32]) -> RangeSet {
    let mut ranges = Vec::new();
    let mut next = 0;
    for &p in points {
        if p > next {
            ranges.push(RuneRange::new(next, p - 1));
        }
        next = p + 1;
    }
    ranges.push(RuneRange::new(next, MAX));
    RangeSet::new(ranges)
}

/// The condition `look` puts on what follows, given what precedes it, or
/// `None` when it fails outright.
fn demand(look: Look, behind: Behind) -> Option<Ahead> {
    match look {
        Look::Start => (behind == Behind::Start).then(Ahead::any),
        Look::StartLF => matches!(behind, Behind::Start | Behind::Lf).then(Ahead::any),
        Look::StartCRLF => match behind {
            Behind::Start | Behind::Lf => Some(Ahead::any()),
            // a lone CR ends a line, the CR of a CRLF pair does not
            Behind::Cr => Some(Ahead {
                end: true,
                next: except(&[LF]),
            }),
            Behind::Other => None,
        },
        Look::End => Some(Ahead {
            end: true,
            next: RangeSet::empty(),
        }),
        Look::EndLF => Some(Ahead {
            end: true,
            next: only(&[LF]),
        }),
        Look::EndCRLF => Some(Ahead {
            end: true,
            next: if behind == Behind::Cr {
                only(&[CR])
            } else {
                only(&[LF, CR])
            },
        }),
        // the compiler rejects every other assertion
        _ => None,
    }
}

/// Rebuild `raw` without anchors. `accept` is the state that ends a match in
/// `raw`; the returned NFA again has exactly one accepting state.
pub(crate) fn resolve(
    raw: &Nfa,
    accept: StateId,
    assertions: &[Assertion],
    max_states: usize,
) -> Result<Nfa, CompileErrorKind> {
    let mut looks: HashMap<StateId, Vec<Assertion>> = HashMap::new();
    for assertion in assertions {
        looks.entry(assertion.from).or_default().push(*assertion);
    }
    // plain `^` and `$` only care whether anything was consumed at all
    let tracks_lines = assertions
        .iter()
        .any(|a| !matches!(a.look, Look::Start | Look::End));

    Resolver {
        raw,
        looks: &looks,
        tracks_lines,
        max_states,
        out: Nfa::new(),
        ids: HashMap::new(),
        pending: Vec::new(),
        lf: only(&[LF]),
        cr: only(&[CR]),
        rest: except(&[LF, CR]),
    }
    .run(accept)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    state: StateId,
    behind: Behind,
    ahead: Ahead,
}

struct Resolver<'a> {
    raw: &'a Nfa,
    looks: &'a HashMap<StateId, Vec<Assertion>>,
    tracks_lines: bool,
    max_states: usize,
    out: Nfa,
    ids: HashMap<Key, StateId>,
    pending: Vec<(Key, StateId)>,
    lf: RangeSet,
    cr: RangeSet,
    rest: RangeSet,
}

impl Resolver<'_> {
    fn run(mut self, accept: StateId) -> Result<Nfa, CompileErrorKind> {
        let exit = self.add_state()?;
        let start = self.intern(Key {
            state: self.raw.start(),
            behind: Behind::Start,
            ahead: Ahead::any(),
        })?;

        let (raw, looks) = (self.raw, self.looks);
        while let Some((key, from)) = self.pending.pop() {
            if key.state == accept && key.ahead.end {
                self.out.add_epsilon(from, exit);
            }

            for edge in &raw.state(key.state).edges {
                match &edge.label {
                    None => {
                        let to = self.intern(Key {
                            state: edge.target,
                            ..key.clone()
                        })?;
                        self.out.add_epsilon(from, to);
                    }
                    Some(label) => {
                        let allowed = label.intersect(&key.ahead.next);
                        for (behind, part) in self.partition(&allowed) {
                            let to = self.intern(Key {
                                state: edge.target,
                                behind,
                                ahead: Ahead::any(),
                            })?;
                            self.out.add_edge(from, part, to);
                        }
                    }
                }
            }

            for assertion in looks.get(&key.state).into_iter().flatten() {
                let Some(demand) = demand(assertion.look, key.behind) else {
                    continue;
                };
                let ahead = key.ahead.meet(&demand);
                if ahead.is_void() {
                    continue;
                }
                let to = self.intern(Key {
                    state: assertion.to,
                    behind: key.behind,
                    ahead,
                })?;
                self.out.add_epsilon(from, to);
            }
        }

        self.out.set_start(start);
        self.out.set_accepting(exit);
        Ok(self.out)
    }

    fn add_state(&mut self) -> Result<StateId, CompileErrorKind> {
        if self.out.len() >= self.max_states {
            return Err(CompileErrorKind::TooManyStates {
                limit: self.max_states,
            });
        }
        Ok(self.out.add_state())
    }

    fn intern(&mut self, key: Key) -> Result<StateId, CompileErrorKind> {
        if let Some(&id) = self.ids.get(&key) {
            return Ok(id);
        }
        let id = self.add_state()?;
        self.ids.insert(key.clone(), id);
        self.pending.push((key, id));
        Ok(id)
    }

    /// Split `allowed` by what consuming it leaves behind.
    fn partition(&self, allowed: &RangeSet) -> Vec<(Behind, RangeSet)> {
        let parts = if self.tracks_lines {
            vec![
                (Behind::Lf, allowed.intersect(&self.lf)),
                (Behind::Cr, allowed.intersect(&self.cr)),
                (Behind::Other, allowed.intersect(&self.rest)),
            ]
        } else {
            vec![(Behind::Other, allowed.clone())]
        };
        parts.into_iter().filter(|(_, part)| !part.is_empty()).collect()
    }
}
