//! **bundlescope** - a two-tier analyzer for reverse-engineering large
//! single-line minified JavaScript bundles.
//!
//! Fast-path commands drive a streaming character state machine directly;
//! deep-path commands additionally request a syntax tree from an embedded
//! tree-sitter parser. Every analysis is pure, total, and single-threaded:
//! one command opens one source buffer, runs to completion, and releases
//! every derived structure.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// The analyzer core: character state machine, function scanner, scope
/// builder, function map/diff, and every other component the CLI dispatches
/// into.
pub mod core {
    /// Shared data model: SourceBuffer, FunctionSpan, FunctionEntry, Scope,
    /// PatchResult, StringLiteral, DiffResult.
    pub mod model;

    /// C1 — streaming code/string/template/regex/comment classifier.
    pub mod state_machine;

    /// C2 — reformats one-line source into indented lines with an offset map.
    pub mod beautify;

    /// C3 — string-literal landmarks with substring/proximity queries.
    pub mod landmarks;

    /// C4 — enclosing-function scanner built on the state machine.
    pub mod boundary;

    /// C5 — literal/regex pattern search grouped by enclosing function.
    pub mod search;

    /// C6 — patch uniqueness, preview, and code-context validation.
    pub mod patch;

    /// C7 — lexical scope tree built from a parsed syntax tree.
    pub mod scope;

    /// C8 — external references and outgoing/incoming call analysis.
    pub mod graph;

    /// C9 — function map, fingerprinting, and cross-version diff.
    pub mod funcmap;

    /// C10 — channel writer/reader classification and protocol mismatches.
    pub mod trace_io;

    /// C11 — heuristic identifier renaming and minification-idiom expansion.
    pub mod decompile;

    /// C2's one-shot sibling: enclosing function + nearby landmarks + window.
    pub mod context;
}

/// The embedded full-syntax parser boundary (tree-sitter JS/TS), treated
/// everywhere else as an opaque collaborator returning a byte-spanned tree.
pub mod parser {
    pub mod tree;
}

/// Infrastructure: configuration, I/O, line indexing, and the error taxonomy.
pub mod infra {
    /// Layered configuration for the analyzer's tunable defaults.
    pub mod config;
    pub use config::{Config, load_config};

    /// Memory-mapped file I/O and atomic writes.
    pub mod io;
    pub use io::{FileContent, read_file_smart, write_atomic};

    /// CRLF/LF-robust line indexing for O(1) line<->byte mapping.
    pub mod line_index;
    pub use line_index::NewlineIndex;

    /// The structured error taxonomy every `core::` operation returns.
    pub mod errors;
    pub use errors::{AnalyzerError, exit_code_for};
}

pub use cli::{AppContext, Cli, Commands};
pub use infra::{AnalyzerError, Config, load_config};
