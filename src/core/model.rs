//! Shared data model. Every derived structure here conceptually borrows from
//! a [`SourceBuffer`]; nothing holds a cyclic reference except [`Scope`],
//! which resolves its parent through an index into a flat arena.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::infra::errors::AnalyzerError;
use crate::infra::io::{FileContent, read_file_smart};

/// The immutable input: a byte sequence, treated as ASCII-extended UTF-8. All
/// offsets throughout the system are byte offsets into this buffer.
pub struct SourceBuffer {
    path: PathBuf,
    content: FileContent,
}

impl SourceBuffer {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AnalyzerError> {
        let path = path.as_ref().to_path_buf();
        let content = read_file_smart(&path)
            .map_err(|e| AnalyzerError::FileIo(format!("{}: {e:#}", path.display())))?;
        Ok(Self { path, content })
    }

    pub fn from_bytes<P: Into<PathBuf>>(path: P, bytes: Vec<u8>) -> Self {
        Self { path: path.into(), content: FileContent::Buffered(bytes) }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    /// Best-effort UTF-8 view. Minified bundles are ASCII-extended UTF-8 in
    /// practice; invalid sequences are replaced rather than rejected so the
    /// state machine, which only inspects single-byte punctuation, is never
    /// blocked by a stray multi-byte identifier or string payload.
    #[must_use]
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.bytes())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// C1 parser state, advanced one code unit at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    StringSingle,
    StringDouble,
    Template,
    Regex,
    LineComment,
    BlockComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserState {
    pub mode: Mode,
    pub escape_pending: bool,
    pub template_depth: u32,
}

impl Default for ParserState {
    fn default() -> Self {
        Self { mode: Mode::Normal, escape_pending: false, template_depth: 0 }
    }
}

impl ParserState {
    #[must_use]
    pub fn is_in_code(&self) -> bool {
        self.mode == Mode::Normal
    }
}

/// Produced by C4: a syntactically balanced function form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpan {
    pub sig_start: usize,
    pub body_open_brace: usize,
    pub body_end: usize,
    pub signature_text: String,
    pub parameter_list: Vec<String>,
    pub param_count: usize,
}

/// A function-like node discovered by C9's tree walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub param_count: usize,
    pub is_async: bool,
    pub is_generator: bool,
    /// Newlines replaced by spaces, truncated to 120 bytes.
    pub signature_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strings_used: Option<Vec<String>>,
}

pub const ANONYMOUS: &str = "<anonymous>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKind {
    Module,
    Function,
    Arrow,
    Class,
    Block,
    For,
    Catch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingKind {
    Param,
    Var,
    Let,
    Const,
    Function,
    Class,
    Catch,
    Destructured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    pub offset: usize,
}

/// A node in the scope tree, stored in a flat arena and referring to its
/// parent by index to avoid a cyclic owned structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub kind: ScopeKind,
    pub start: usize,
    pub end: usize,
    pub bindings: Vec<Binding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchStatus {
    NotFound,
    Unique,
    Ambiguous,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchMatch {
    pub offset: usize,
    pub match_text: String,
    pub context: String,
    pub context_offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captures: Option<Vec<Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_captures: Option<indexmap::IndexMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    ShortIdentifier,
    NonCodeContext,
    ProtocolMismatch(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchPreview {
    pub before_window: String,
    pub after_window: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchResult {
    pub status: PatchStatus,
    pub matches: Vec<PatchMatch>,
    pub warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PatchPreview>,
}

/// A string literal that survives minification, used as a navigation anchor.
/// Template literals containing `${...}` are excluded by the producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringLiteral {
    pub content: String,
    pub offset: usize,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosing_function_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnchangedEntry {
    pub v1: FunctionEntry,
    pub v2: FunctionEntry,
    pub shift: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifiedEntry {
    pub v1: FunctionEntry,
    pub v2: FunctionEntry,
    pub size_diff: i64,
    pub added_strings: Vec<String>,
    pub removed_strings: Vec<String>,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffResult {
    pub unchanged: Vec<UnchangedEntry>,
    pub modified: Vec<ModifiedEntry>,
    pub added: Vec<FunctionEntry>,
    pub removed: Vec<FunctionEntry>,
}
