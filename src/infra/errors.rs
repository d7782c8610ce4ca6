//! The structured error taxonomy every `core::` operation reports through.
//!
//! Library callers match on [`AnalyzerError`] variants; the CLI layer maps each
//! variant to an exit code (see [`exit_code_for`]) and prints a human-readable,
//! miette-rendered diagnostic.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AnalyzerError {
    /// Bad numeric argument, missing required argument.
    #[error("invalid input: {0}")]
    #[diagnostic(code(bundlescope::invalid_input))]
    InvalidInput(String),

    /// Read/write failure on the source or output path.
    #[error("file I/O error: {0}")]
    #[diagnostic(code(bundlescope::file_io))]
    FileIo(String),

    /// The full-tree parser rejected the input.
    #[error("failed to parse source as JavaScript/TypeScript: {0}")]
    #[diagnostic(code(bundlescope::parse_failed))]
    ParseFailed(String),

    /// C4 could not resolve a function within its locality window.
    #[error("boundary scan exceeded its locality window at offset {offset}")]
    #[diagnostic(
        code(bundlescope::boundary_scan_exceeded),
        help("retry with the tree-based fallback (--no-ast-fallback disables it)")
    )]
    BoundaryScanExceeded { offset: usize },

    /// A deep analysis was requested at module scope.
    #[error("offset {offset} is not inside any function")]
    #[diagnostic(code(bundlescope::offset_outside_function))]
    OffsetOutsideFunction { offset: usize },

    /// Regex compilation failed.
    #[error("invalid pattern: {0}")]
    #[diagnostic(code(bundlescope::pattern_invalid))]
    PatternInvalid(String),

    /// A patch-oriented command demanded a match and found none.
    #[error("pattern not found")]
    #[diagnostic(code(bundlescope::pattern_not_found))]
    PatternNotFound,

    /// A patch-oriented command demanded uniqueness and found more than one match.
    #[error("pattern matched {count} times, expected exactly one")]
    #[diagnostic(code(bundlescope::pattern_ambiguous))]
    PatternAmbiguous { count: usize },
}

/// `0` success; `1` failure/not-found/invalid arguments; `2` ambiguous match
/// (`match` only). `patch-check` additionally treats any non-`Unique` status as
/// failure at the call site, not through this mapping.
pub fn exit_code_for(err: &AnalyzerError) -> i32 {
    match err {
        AnalyzerError::PatternAmbiguous { .. } => 2,
        _ => 1,
    }
}
