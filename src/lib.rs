//! Decide whether two regular expressions can match a common string.
//!
//! Each expression is compiled to an NFA over rune ranges, turned into a DFA
//! by subset construction, and the product of the two DFAs is searched for a
//! pair of states that accept together.

mod anchors;
pub mod batch;
pub mod config;
pub mod dfa;
pub mod intersect;
pub mod nfa;
pub mod product;
pub mod ranges;

pub use config::Config;
pub use intersect::{DfaError, IntersectionError, Intersector, Outcome, Stats, has_intersection};
