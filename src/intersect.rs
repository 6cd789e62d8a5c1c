use std::fmt;
use std::ops::AddAssign;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::Config;
use crate::dfa::{BuildError, Dfa};
use crate::nfa::{CompileError, compile_with};
use crate::product::{SearchError, search};

#[derive(Debug, Error, Diagnostic)]
pub enum IntersectionError {
    #[error("invalid first expression: {0}")]
    #[diagnostic(transparent)]
    InvalidLeft(#[source] CompileError),
    #[error("invalid second expression: {0}")]
    #[diagnostic(transparent)]
    InvalidRight(#[source] CompileError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    DfaLimit(#[from] BuildError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    SearchLimit(#[from] SearchError),
}

/// Failure to turn a single expression into a DFA.
#[derive(Debug, Error, Diagnostic)]
pub enum DfaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Limit(#[from] BuildError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub nfa_states: [usize; 2],
    pub dfa_states: [usize; 2],
    pub product_states: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "NFA states:     {} / {}",
            self.nfa_states[0], self.nfa_states[1]
        )?;
        writeln!(
            f,
            "DFA states:     {} / {}",
            self.dfa_states[0], self.dfa_states[1]
        )?;
        writeln!(f, "Product states: {}", self.product_states)
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, other: Stats) {
        for side in 0..2 {
            self.nfa_states[side] += other.nfa_states[side];
            self.dfa_states[side] += other.dfa_states[side];
        }
        self.product_states += other.product_states;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub intersects: bool,
    pub stats: Stats,
}

/// Answers intersection queries under one [`Config`].
///
/// Every call builds its own automata; nothing is cached between calls, so
/// one `Intersector` can be shared freely across threads.
#[derive(Debug, Clone, Default)]
pub struct Intersector {
    config: Config,
}

impl Intersector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compile `expr` and run subset construction on it.
    pub fn dfa(&self, expr: &str) -> Result<Dfa, DfaError> {
        self.build(expr).map(|(_, dfa)| dfa)
    }

    fn build(&self, expr: &str) -> Result<(usize, Dfa), DfaError> {
        let nfa = compile_with(expr, &self.config)?;
        let dfa = Dfa::from_nfa_with_limit(&nfa, self.config.max_dfa_states)?;
        Ok((nfa.len(), dfa))
    }

    /// Check whether some string is fully matched by both expressions.
    pub fn check(&self, first: &str, second: &str) -> Result<Outcome, IntersectionError> {
        let (left_nfa, left) = self.build(first).map_err(|e| match e {
            DfaError::Compile(e) => IntersectionError::InvalidLeft(e),
            DfaError::Limit(e) => IntersectionError::DfaLimit(e),
        })?;
        let (right_nfa, right) = self.build(second).map_err(|e| match e {
            DfaError::Compile(e) => IntersectionError::InvalidRight(e),
            DfaError::Limit(e) => IntersectionError::DfaLimit(e),
        })?;

        let outcome = search(&left, &right, self.config.max_product_states)?;
        Ok(Outcome {
            intersects: outcome.intersects,
            stats: Stats {
                nfa_states: [left_nfa, right_nfa],
                dfa_states: [left.len(), right.len()],
                product_states: outcome.visited,
            },
        })
    }
}

/// Check if two regular expressions have a non-empty intersection.
///
/// Returns Ok(true) if at least one string is fully matched by both.
/// Returns Err if either expression is invalid, naming which one.
pub fn has_intersection(first: &str, second: &str) -> Result<bool, IntersectionError> {
    Intersector::default()
        .check(first, second)
        .map(|outcome| outcome.intersects)
}
