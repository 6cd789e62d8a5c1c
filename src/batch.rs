//! Batch files: one pair of `/regex/` literals per line, optionally followed
//! by the expected answer.
//!
//! ```text
//! # both accept "aba"
//! /a*ba+/   /b*ab+a/   => true
//! /[A-Z]+/  /[a-z]+/   => false
//! /a*/      /a+/
//! ```

use std::fmt;
use std::ops::Range;

use logos::Logos;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::intersect::{IntersectionError, Intersector, Stats};

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip(r"#[^\r\n]*", allow_greedy = true))]
pub enum Token {
    #[token("=>")]
    Arrow,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[regex(r"\r?\n")]
    NewLine,
    #[regex(r"/(?:[^/\\\r\n]|\\[^\r\n])*/", |lex| lex.slice().to_string())]
    Regex(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Arrow => write!(f, "'=>'"),
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::NewLine => write!(f, "newline"),
            Token::Regex(s) => write!(f, "regex {}", s),
        }
    }
}

fn to_source_span(span: &Range<usize>) -> SourceSpan {
    SourceSpan::new(span.start.into(), span.len())
}

#[derive(Error, Debug, Diagnostic)]
pub enum ParseError {
    #[error("unexpected token")]
    #[diagnostic(code(batch::unexpected_token))]
    UnexpectedToken {
        expected: String,
        found: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("expected {expected}, found {found}")]
        span: SourceSpan,
    },

    #[error("unexpected end of input, expected {expected}")]
    #[diagnostic(code(batch::unexpected_eof))]
    UnexpectedEof {
        expected: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("expected {expected}")]
        span: SourceSpan,
    },

    #[error("lexer error")]
    #[diagnostic(
        code(batch::lex_error),
        help("each case is written as /first/ /second/ [=> true|false]")
    )]
    LexError {
        #[source_code]
        src: NamedSource<String>,
        #[label("unrecognized token")]
        span: SourceSpan,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub first: String,
    pub second: String,
    pub expected: Option<bool>,
    /// 1-based line the case starts on.
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub cases: Vec<Case>,
}

/// Lex and parse a batch file.
pub fn parse(source: &str, source_name: &str) -> Result<Batch, ParseError> {
    let tokens: Result<Vec<_>, _> = Token::lexer(source)
        .spanned()
        .map(|(res, span)| res.map(|t| (t, span.clone())).map_err(|_| span))
        .collect();

    let tokens = match tokens {
        Ok(t) => t,
        Err(span) => {
            return Err(ParseError::LexError {
                src: NamedSource::new(source_name, source.to_string()),
                span: to_source_span(&span),
            });
        }
    };

    Parser {
        tokens,
        pos: 0,
        source,
        source_name,
    }
    .parse_batch()
}

/// Strip the delimiters and turn `\/` back into `/`. Other escapes are left
/// for the regex parser.
fn unescape_literal(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => out.push('/'),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

struct Parser<'s> {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    source: &'s str,
    source_name: &'s str,
}

impl Parser<'_> {
    fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.source_name, self.source.to_string())
    }

    fn current_span(&self) -> Range<usize> {
        if let Some((_, span)) = self.tokens.get(self.pos) {
            span.clone()
        } else {
            let end = self.source.len();
            end..end
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<(&Token, &Range<usize>)> {
        let item = self.tokens.get(self.pos);
        self.pos += 1;
        item.map(|(t, s)| (t, s))
    }

    fn unexpected(&self, expected: &str, found: &Token, span: &Range<usize>) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
            src: self.named_source(),
            span: to_source_span(span),
        }
    }

    fn eof(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedEof {
            expected: expected.to_string(),
            src: self.named_source(),
            span: to_source_span(&self.current_span()),
        }
    }

    fn skip_newlines(&mut self) {
        while let Some(Token::NewLine) = self.peek() {
            self.advance();
        }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.source[..offset].matches('\n').count() + 1
    }

    fn parse_batch(&mut self) -> Result<Batch, ParseError> {
        let mut cases = Vec::new();
        self.skip_newlines();
        while self.peek().is_some() {
            cases.push(self.parse_case()?);
            self.skip_newlines();
        }
        Ok(Batch { cases })
    }

    fn parse_case(&mut self) -> Result<Case, ParseError> {
        let line = self.line_of(self.current_span().start);
        let first = self.parse_regex()?;
        let second = self.parse_regex()?;

        let expected = if let Some(Token::Arrow) = self.peek() {
            self.advance();
            match self.advance() {
                Some((Token::True, _)) => Some(true),
                Some((Token::False, _)) => Some(false),
                Some((tok, span)) => {
                    let (tok, span) = (tok.clone(), span.clone());
                    return Err(self.unexpected("'true' or 'false'", &tok, &span));
                }
                None => return Err(self.eof("'true' or 'false'")),
            }
        } else {
            None
        };

        match self.advance() {
            None | Some((Token::NewLine, _)) => {}
            Some((tok, span)) => {
                let (tok, span) = (tok.clone(), span.clone());
                return Err(self.unexpected("newline", &tok, &span));
            }
        }

        Ok(Case {
            first,
            second,
            expected,
            line,
        })
    }

    fn parse_regex(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some((Token::Regex(s), _)) => Ok(unescape_literal(s)),
            Some((tok, span)) => {
                let (tok, span) = (tok.clone(), span.clone());
                Err(self.unexpected("regex literal", &tok, &span))
            }
            None => Err(self.eof("regex literal")),
        }
    }
}

#[derive(Debug)]
pub enum Verdict {
    Answer(bool),
    Mismatch { expected: bool, actual: bool },
    Failed(IntersectionError),
}

#[derive(Debug)]
pub struct CaseResult<'a> {
    pub case: &'a Case,
    pub verdict: Verdict,
    /// Missing when either expression failed to compile.
    pub stats: Option<Stats>,
}

impl CaseResult<'_> {
    pub fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Answer(_))
    }
}

impl fmt::Display for CaseResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: /{}/ /{}/ => ",
            self.case.line, self.case.first, self.case.second
        )?;
        match &self.verdict {
            Verdict::Answer(answer) => write!(f, "{}", answer),
            Verdict::Mismatch { expected, actual } => {
                write!(f, "{} (expected {})", actual, expected)
            }
            Verdict::Failed(e) => write!(f, "error: {}", e),
        }
    }
}

#[derive(Debug)]
pub struct Report<'a> {
    pub results: Vec<CaseResult<'a>>,
}

impl Report<'_> {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.passed()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }

    /// Automaton sizes summed over every case that ran.
    pub fn stats(&self) -> Stats {
        let mut total = Stats::default();
        for stats in self.results.iter().filter_map(|r| r.stats) {
            total += stats;
        }
        total
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{}", result)?;
        }
        writeln!(
            f,
            "{} case(s), {} failed",
            self.results.len(),
            self.failures()
        )
    }
}

/// Answer every case. Invalid expressions fail their own case only.
pub fn run<'a>(batch: &'a Batch, intersector: &Intersector) -> Report<'a> {
    let results = batch
        .cases
        .iter()
        .map(|case| {
            let (verdict, stats) = match intersector.check(&case.first, &case.second) {
                Ok(outcome) => {
                    let verdict = match case.expected {
                        Some(expected) if expected != outcome.intersects => Verdict::Mismatch {
                            expected,
                            actual: outcome.intersects,
                        },
                        _ => Verdict::Answer(outcome.intersects),
                    };
                    (verdict, Some(outcome.stats))
                }
                Err(e) => (Verdict::Failed(e), None),
            };
            CaseResult {
                case,
                verdict,
                stats,
            }
        })
        .collect();
    Report { results }
}
