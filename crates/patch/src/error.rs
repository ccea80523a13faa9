//! Error types for bundle patching
//!
//! Structural mismatches are fatal and unretryable: they mean the front-end
//! toolchain produced output this crate's fingerprints no longer recognize.
//! The diagnostics therefore carry the complete searched text — these
//! failures are rare but near-impossible to debug from a one-line message.

use std::fmt;

use thiserror::Error;

pub type PatchResult<T> = std::result::Result<T, PatchError>;

/// How many bytes of the searched text `Display` shows before eliding.
/// The payload always owns the full text; only the rendering truncates.
const DISPLAY_TEXT_LIMIT: usize = 2000;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("{0}")]
    AmbiguousOrMissingMatch(Box<MatchDiagnostics>),

    #[error(
        "unbalanced braces while scanning {direction} from byte {from}: \
         ran off the {edge} of the script before the enclosing function closed"
    )]
    UnbalancedBraces {
        direction: &'static str,
        from: usize,
        edge: &'static str,
    },

    #[error("expected {expected} text but got {got}")]
    WrongTextKind {
        expected: &'static str,
        got: &'static str,
    },

    #[error("no <head> tag found in markup; helper script cannot be installed")]
    MissingHeadTag,
}

/// One fingerprint's outcome while searching for an anchor
#[derive(Debug, Clone)]
pub struct GrammarAttempt {
    pub grammar: &'static str,
    pub candidates: usize,
}

/// Full diagnostic payload for a failed anchor search.
///
/// `searched` is the complete text the fingerprints ran over, untruncated.
#[derive(Debug)]
pub struct MatchDiagnostics {
    pub what: &'static str,
    pub attempts: Vec<GrammarAttempt>,
    pub searched: String,
}

impl MatchDiagnostics {
    pub fn into_error(self) -> PatchError {
        PatchError::AmbiguousOrMissingMatch(Box::new(self))
    }
}

impl fmt::Display for MatchDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "no fingerprint found exactly one {}; the front-end toolchain \
             output has probably drifted from what this harness was built \
             against",
            self.what
        )?;
        for attempt in &self.attempts {
            writeln!(
                f,
                "  {}: {} candidate(s), expected exactly 1",
                attempt.grammar, attempt.candidates
            )?;
        }
        if self.searched.len() <= DISPLAY_TEXT_LIMIT {
            write!(f, "searched text ({} bytes):\n{}", self.searched.len(), self.searched)
        } else {
            let cut = floor_char_boundary(&self.searched, DISPLAY_TEXT_LIMIT);
            write!(
                f,
                "searched text ({} bytes, first {} shown):\n{}",
                self.searched.len(),
                cut,
                &self.searched[..cut]
            )
        }
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
