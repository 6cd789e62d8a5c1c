//! Nondeterministic automata over rune ranges, and a Thompson-style compiler
//! from `regex-syntax` HIR.

use std::ops::Range;

use miette::{Diagnostic, NamedSource, SourceSpan};
use regex_syntax::ParserBuilder;
use regex_syntax::hir::{self, Hir, HirKind, Look};
use thiserror::Error;

use crate::anchors::{self, Assertion};
use crate::config::Config;
use crate::ranges::{RangeSet, RuneRange};

pub type StateId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// `None` marks an epsilon edge.
    pub label: Option<RangeSet>,
    pub target: StateId,
}

impl Edge {
    pub fn is_epsilon(&self) -> bool {
        self.label.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    pub accepting: bool,
    pub edges: Vec<Edge>,
}

/// An NFA stored as an arena of states. State ids are indices into the arena
/// and are handed out in creation order.
#[derive(Debug, Clone, Default)]
pub struct Nfa {
    states: Vec<State>,
    start: StateId,
}

impl Nfa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self) -> StateId {
        self.states.push(State::default());
        self.states.len() - 1
    }

    pub fn add_edge(&mut self, from: StateId, label: RangeSet, to: StateId) {
        self.states[from].edges.push(Edge {
            label: Some(label),
            target: to,
        });
    }

    pub fn add_epsilon(&mut self, from: StateId, to: StateId) {
        self.states[from].edges.push(Edge {
            label: None,
            target: to,
        });
    }

    pub fn set_accepting(&mut self, state: StateId) {
        self.states[state].accepting = true;
    }

    pub fn set_start(&mut self, state: StateId) {
        self.start = state;
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id]
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CompileErrorKind {
    #[error("syntax error")]
    Syntax(#[source] regex_syntax::Error),
    #[error("unsupported look-around assertion {0}")]
    UnsupportedLook(String),
    #[error("repetition count {count} exceeds limit {limit}")]
    RepetitionTooLarge { count: u32, limit: u32 },
    #[error("expression needs more than {limit} NFA states")]
    TooManyStates { limit: usize },
    #[error("literal is not valid UTF-8")]
    InvalidUtf8,
}

/// An expression that could not be turned into an NFA.
#[derive(Debug, Error, Diagnostic)]
#[error("invalid regular expression `{expr}`: {kind}")]
#[diagnostic(code(regexinter::invalid_expression))]
pub struct CompileError {
    pub expr: String,
    pub kind: CompileErrorKind,
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: Option<SourceSpan>,
    label: String,
}

impl CompileError {
    fn new(expr: &str, kind: CompileErrorKind) -> Self {
        let (label, span) = match &kind {
            CompileErrorKind::Syntax(err) => syntax_detail(err),
            other => (other.to_string(), None),
        };
        Self {
            expr: expr.to_string(),
            src: NamedSource::new("<expr>", expr.to_string()),
            span: span.map(|s| to_source_span(&s)),
            label,
            kind,
        }
    }

    /// Byte range of the offending construct inside `expr`, when known.
    pub fn span(&self) -> Option<Range<usize>> {
        self.span.map(|s| s.offset()..s.offset() + s.len())
    }
}

fn to_source_span(span: &Range<usize>) -> SourceSpan {
    SourceSpan::new(span.start.into(), span.len())
}

fn syntax_detail(err: &regex_syntax::Error) -> (String, Option<Range<usize>>) {
    match err {
        regex_syntax::Error::Parse(e) => {
            let span = e.span();
            (e.kind().to_string(), Some(span.start.offset..span.end.offset))
        }
        regex_syntax::Error::Translate(e) => {
            let span = e.span();
            (e.kind().to_string(), Some(span.start.offset..span.end.offset))
        }
        other => (other.to_string(), None),
    }
}

/// Compile `expr` with the default [`Config`].
pub fn compile(expr: &str) -> Result<Nfa, CompileError> {
    compile_with(expr, &Config::default())
}

/// Parse and validate `expr`, then build an NFA with a single accepting
/// state that accepts exactly the strings `expr` matches in full.
pub fn compile_with(expr: &str, config: &Config) -> Result<Nfa, CompileError> {
    let hir = ParserBuilder::new()
        .build()
        .parse(expr)
        .map_err(|e| CompileError::new(expr, CompileErrorKind::Syntax(e)))?;

    let mut compiler = Compiler {
        nfa: Nfa::new(),
        assertions: Vec::new(),
        max_repetition: config.max_repetition,
        max_states: config.max_nfa_states,
    };
    let fragment = compiler
        .compile(&hir)
        .map_err(|kind| CompileError::new(expr, kind))?;

    let mut nfa = compiler.nfa;
    nfa.set_start(fragment.start);
    if compiler.assertions.is_empty() {
        nfa.set_accepting(fragment.end);
        return Ok(nfa);
    }
    anchors::resolve(
        &nfa,
        fragment.end,
        &compiler.assertions,
        config.max_nfa_states,
    )
    .map_err(|kind| CompileError::new(expr, kind))
}

#[derive(Debug, Clone, Copy)]
struct Fragment {
    start: StateId,
    end: StateId,
}

struct Compiler {
    nfa: Nfa,
    /// Anchors, kept out of the graph until they are resolved.
    assertions: Vec<Assertion>,
    max_repetition: u32,
    max_states: usize,
}

impl Compiler {
    fn add_state(&mut self) -> Result<StateId, CompileErrorKind> {
        if self.nfa.len() >= self.max_states {
            return Err(CompileErrorKind::TooManyStates {
                limit: self.max_states,
            });
        }
        Ok(self.nfa.add_state())
    }

    fn single(&mut self) -> Result<Fragment, CompileErrorKind> {
        let state = self.add_state()?;
        Ok(Fragment {
            start: state,
            end: state,
        })
    }

    fn compile(&mut self, hir: &Hir) -> Result<Fragment, CompileErrorKind> {
        match hir.kind() {
            HirKind::Empty => self.single(),
            HirKind::Literal(hir::Literal(bytes)) => {
                let text = std::str::from_utf8(bytes).map_err(|_| CompileErrorKind::InvalidUtf8)?;
                let start = self.add_state()?;
                let mut end = start;
                for c in text.chars() {
                    let next = self.add_state()?;
                    self.nfa.add_edge(end, RangeSet::from_char(c), next);
                    end = next;
                }
                Ok(Fragment { start, end })
            }
            HirKind::Class(class) => {
                let label = class_ranges(class);
                let start = self.add_state()?;
                let end = self.add_state()?;
                // an empty class matches nothing, so leave `end` unreachable
                if !label.is_empty() {
                    self.nfa.add_edge(start, label, end);
                }
                Ok(Fragment { start, end })
            }
            HirKind::Look(look) => match look {
                Look::Start
                | Look::End
                | Look::StartLF
                | Look::EndLF
                | Look::StartCRLF
                | Look::EndCRLF => {
                    let start = self.add_state()?;
                    let end = self.add_state()?;
                    self.assertions.push(Assertion {
                        from: start,
                        look: *look,
                        to: end,
                    });
                    Ok(Fragment { start, end })
                }
                other => Err(CompileErrorKind::UnsupportedLook(format!("{other:?}"))),
            },
            HirKind::Capture(capture) => self.compile(&capture.sub),
            HirKind::Concat(children) => {
                let Some((first, rest)) = children.split_first() else {
                    return self.single();
                };
                let mut fragment = self.compile(first)?;
                for child in rest {
                    let next = self.compile(child)?;
                    self.nfa.add_epsilon(fragment.end, next.start);
                    fragment.end = next.end;
                }
                Ok(fragment)
            }
            HirKind::Alternation(children) => {
                let start = self.add_state()?;
                let end = self.add_state()?;
                for child in children {
                    let branch = self.compile(child)?;
                    self.nfa.add_epsilon(start, branch.start);
                    self.nfa.add_epsilon(branch.end, end);
                }
                Ok(Fragment { start, end })
            }
            HirKind::Repetition(repetition) => self.compile_repetition(repetition),
        }
    }

    /// `x{m,n}` becomes `m` mandatory copies of `x` followed by either a
    /// starred copy (no upper bound) or `n - m` optional copies that all
    /// share one exit state.
    fn compile_repetition(
        &mut self,
        repetition: &hir::Repetition,
    ) -> Result<Fragment, CompileErrorKind> {
        let bound = repetition.max.unwrap_or(repetition.min);
        if bound > self.max_repetition {
            return Err(CompileErrorKind::RepetitionTooLarge {
                count: bound,
                limit: self.max_repetition,
            });
        }

        let start = self.add_state()?;
        let mut end = start;
        for _ in 0..repetition.min {
            let copy = self.compile(&repetition.sub)?;
            self.nfa.add_epsilon(end, copy.start);
            end = copy.end;
        }

        match repetition.max {
            None => {
                let copy = self.compile(&repetition.sub)?;
                let hub = self.add_state()?;
                self.nfa.add_epsilon(end, hub);
                self.nfa.add_epsilon(hub, copy.start);
                self.nfa.add_epsilon(copy.end, hub);
                end = hub;
            }
            Some(max) => {
                let exit = self.add_state()?;
                for _ in repetition.min..max {
                    let copy = self.compile(&repetition.sub)?;
                    self.nfa.add_epsilon(end, exit);
                    self.nfa.add_epsilon(end, copy.start);
                    end = copy.end;
                }
                self.nfa.add_epsilon(end, exit);
                end = exit;
            }
        }
        Ok(Fragment { start, end })
    }
}

fn class_ranges(class: &hir::Class) -> RangeSet {
    match class {
        hir::Class::Unicode(class) => RangeSet::new(
            class
                .ranges()
                .iter()
                .map(|r| RuneRange::from_chars(r.start(), r.end())),
        ),
        hir::Class::Bytes(class) => RangeSet::new(
            class
                .ranges()
                .iter()
                .map(|r| RuneRange::new(u32::from(r.start()), u32::from(r.end()))),
        ),
    }
}
