/// Limits applied while compiling and searching.
///
/// Compilation is always bounded: by the largest count a single repetition
/// may carry, and by the total number of NFA states one expression may
/// produce, which catches nested repetitions like `(a{1000}){1000}`. The DFA
/// and product limits are off by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Largest `n` accepted in a counted repetition `{m,n}`.
    pub max_repetition: u32,
    /// Upper bound on NFA states built for a single expression.
    pub max_nfa_states: usize,
    /// Upper bound on DFA states built for a single expression.
    pub max_dfa_states: Option<usize>,
    /// Upper bound on product states visited by one search.
    pub max_product_states: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_repetition: Self::DEFAULT_MAX_REPETITION,
            max_nfa_states: Self::DEFAULT_MAX_NFA_STATES,
            max_dfa_states: None,
            max_product_states: None,
        }
    }
}

impl Config {
    pub const DEFAULT_MAX_REPETITION: u32 = 1000;
    pub const DEFAULT_MAX_NFA_STATES: usize = 100_000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_repetition(mut self, limit: u32) -> Self {
        self.max_repetition = limit;
        self
    }

    pub fn max_nfa_states(mut self, limit: usize) -> Self {
        self.max_nfa_states = limit;
        self
    }

    pub fn max_dfa_states(mut self, limit: Option<usize>) -> Self {
        self.max_dfa_states = limit;
        self
    }

    pub fn max_product_states(mut self, limit: Option<usize>) -> Self {
        self.max_product_states = limit;
        self
    }
}
