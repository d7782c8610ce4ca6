use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Shared application context for global flags.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
}

#[derive(Parser)]
#[command(name = "bscope")]
#[command(about = "A byte-offset-native toolkit for reverse-engineering single-line minified JavaScript bundles")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reformat a one-line bundle into indented source with an offset map
    Beautify(BeautifyArgs),

    /// Print a byte window around an offset
    Slice(SliceArgs),

    /// Search for a literal or regex pattern, grouped by enclosing function
    Find(FindArgs),

    /// Check uniqueness of a pattern and show a replacement preview
    Match(MatchArgs),

    /// Validate a patch target without writing anything
    PatchCheck(PatchCheckArgs),

    /// Find the function(s) enclosing an offset
    ExtractFn(ExtractFnArgs),

    /// Assemble enclosing function, nearby strings, and a marked window
    Context(ContextArgs),

    /// List string literals, optionally filtered, grouped, or diffed
    Strings(StringsArgs),

    /// Show the lexical scope chain at an offset
    Scope(ScopeArgs),

    /// Show external (free) variable references of the enclosing function
    Refs(RefsArgs),

    /// Show outgoing and incoming calls of the enclosing function
    Calls(CallsArgs),

    /// Dump the whole-buffer function map
    Map(MapArgs),

    /// Diff the function maps of two bundle versions
    DiffFns(DiffFnsArgs),

    /// Classify writer/reader sites of a message-channel name
    TraceIo(TraceIoArgs),

    /// Suggest identifier renames and expand minification idioms
    Decompile(DecompileArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct BeautifyArgs {
    /// Bundle file to reformat
    pub file: PathBuf,

    /// Write `<file>.beautified.js` / `.offsetmap.json` beside this path
    /// instead of deriving it from `file`
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct SliceArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Center offset
    pub offset: usize,

    /// Total window length in bytes
    #[arg(long, default_value_t = 500)]
    pub length: usize,

    /// Bytes before the offset (overrides half of --length)
    #[arg(long)]
    pub before: Option<usize>,

    /// Bytes after the offset (overrides half of --length)
    #[arg(long)]
    pub after: Option<usize>,

    /// Reformat the slice before printing
    #[arg(long)]
    pub beautify: bool,
}

#[derive(Parser, Debug)]
pub struct FindArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Literal substring, or a regex when --regex is set
    pub pattern: String,

    /// Treat pattern as a regex, expanding %V%/%S% shorthand
    #[arg(long)]
    pub regex: bool,

    /// Show numbered and named capture groups
    #[arg(long)]
    pub captures: bool,

    /// One line per match, no surrounding context
    #[arg(long)]
    pub compact: bool,

    /// Keep only matches within this many bytes of an offset
    #[arg(long)]
    pub near: Option<usize>,

    /// Print only the match count
    #[arg(long)]
    pub count: bool,

    /// Cap the number of matches shown
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct MatchArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Literal substring to locate
    pub pattern: String,

    /// Preview this replacement text ($1, ${name} capture references)
    #[arg(long)]
    pub replace: Option<String>,
}

#[derive(Parser, Debug)]
pub struct PatchCheckArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Literal substring, or a regex when --regex is set
    pub pattern: String,

    /// Treat pattern as a regex, expanding %V%/%S% shorthand
    #[arg(long)]
    pub regex: bool,

    /// Replacement text to preview ($1, ${name} capture references)
    #[arg(long)]
    pub replacement: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ExtractFnArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Offset inside the target function
    pub offset: usize,

    /// Print every enclosing function from innermost to outermost
    #[arg(long)]
    pub stack: bool,

    /// Select a specific nesting depth (0 = innermost)
    #[arg(long)]
    pub depth: Option<usize>,

    /// Disable the tree-sitter fallback when the fast scan exceeds its
    /// locality window
    #[arg(long)]
    pub no_ast_fallback: bool,
}

#[derive(Parser, Debug)]
pub struct ContextArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Offset of interest
    pub offset: usize,
}

#[derive(Parser, Debug)]
pub struct StringsArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Keep only strings within this many bytes of an offset
    #[arg(long)]
    pub near: Option<usize>,

    /// Keep only strings containing this substring
    #[arg(long)]
    pub filter: Option<String>,

    /// Diff the string sets of two files instead of listing one
    #[arg(long, num_args = 2, value_names = ["FILE1", "FILE2"])]
    pub diff: Option<Vec<PathBuf>>,

    /// Drop strings shorter than this many bytes
    #[arg(long)]
    pub min_length: Option<usize>,

    /// Cap the number of strings shown
    #[arg(long)]
    pub limit: Option<usize>,

    /// Skip enclosing-function enrichment
    #[arg(long)]
    pub raw: bool,

    /// Show every string, ignoring the enrichment cap
    #[arg(long)]
    pub all: bool,
}

#[derive(Parser, Debug)]
pub struct ScopeArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Offset of interest
    pub offset: usize,

    /// Print the full scope chain up to module scope, not just the innermost
    #[arg(long)]
    pub all: bool,
}

#[derive(Parser, Debug)]
pub struct RefsArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Offset inside the target function
    pub offset: usize,
}

#[derive(Parser, Debug)]
pub struct CallsArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Offset inside the target function
    pub offset: usize,
}

#[derive(Parser, Debug)]
pub struct MapArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Attach each function's string-literal set
    #[arg(long)]
    pub strings: bool,
}

#[derive(Parser, Debug)]
pub struct DiffFnsArgs {
    /// Earlier bundle version
    pub file1: PathBuf,

    /// Later bundle version
    pub file2: PathBuf,

    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Cap the number of entries shown per section
    #[arg(long)]
    pub limit: Option<usize>,

    /// Show every entry, ignoring --limit
    #[arg(long)]
    pub all: bool,

    /// Keep only entries whose function name matches
    #[arg(long)]
    pub name: Option<String>,

    /// Include full signature text for modified entries
    #[arg(long)]
    pub body: bool,

    /// Keep only entries whose string diff matches this substring
    #[arg(long)]
    pub filter: Option<String>,

    /// Print only the per-section counts
    #[arg(long)]
    pub summary: bool,

    /// Use the cheap whole-buffer string-set diff instead of the function map
    #[arg(long)]
    pub strings_only: bool,

    /// Skip the fuzzy-similarity categorization label
    #[arg(long)]
    pub raw: bool,
}

#[derive(Parser, Debug)]
pub struct TraceIoArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Channel name to trace (substring match)
    pub channel_pattern: String,
}

#[derive(Parser, Debug)]
pub struct DecompileArgs {
    /// Bundle file
    pub file: PathBuf,

    /// Offset inside the target function
    pub offset: usize,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints an error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print the completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
