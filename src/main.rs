use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled};

use bundlescope::cli::{
    AppContext, BeautifyArgs, CallsArgs, Cli, Commands, ContextArgs, DecompileArgs, DiffFnsArgs, ExtractFnArgs,
    FindArgs, MapArgs, MatchArgs, PatchCheckArgs, RefsArgs, ScopeArgs, SliceArgs, StringsArgs, TraceIoArgs,
};
use bundlescope::core::model::{PatchResult, PatchStatus, SourceBuffer};
use bundlescope::core::{boundary, context, decompile, funcmap, graph, landmarks, patch, scope, search, trace_io};
use bundlescope::infra::write_atomic;
use bundlescope::parser::tree::{self, Dialect};
use bundlescope::AnalyzerError;

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .init();
    if cli.no_color {
        owo_colors::set_override(false);
    }

    let ctx = AppContext { quiet: cli.quiet, no_color: cli.no_color };

    match dispatch(cli.command, &ctx) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands, ctx: &AppContext) -> Result<u8> {
    match command {
        Commands::Beautify(args) => run_beautify(args, ctx).map(|()| 0),
        Commands::Slice(args) => run_slice(args, ctx).map(|()| 0),
        Commands::Find(args) => run_find(args, ctx).map(|()| 0),
        Commands::Match(args) => run_match(args, ctx),
        Commands::PatchCheck(args) => run_patch_check(args, ctx),
        Commands::ExtractFn(args) => run_extract_fn(args, ctx).map(|()| 0),
        Commands::Context(args) => run_context(args, ctx).map(|()| 0),
        Commands::Strings(args) => run_strings(args, ctx).map(|()| 0),
        Commands::Scope(args) => run_scope(args, ctx).map(|()| 0),
        Commands::Refs(args) => run_refs(args, ctx).map(|()| 0),
        Commands::Calls(args) => run_calls(args, ctx).map(|()| 0),
        Commands::Map(args) => run_map(args, ctx).map(|()| 0),
        Commands::DiffFns(args) => run_diff_fns(args, ctx).map(|()| 0),
        Commands::TraceIo(args) => run_trace_io(args, ctx).map(|()| 0),
        Commands::Decompile(args) => run_decompile(args, ctx).map(|()| 0),
        Commands::Completions(args) => bundlescope::completion::run(args, ctx).map(|()| 0),
    }
}

fn dialect_for(path: &Path) -> Dialect {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ts") | Some("tsx") => Dialect::TypeScript,
        _ => Dialect::JavaScript,
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    dir.join(format!("{stem}.{suffix}"))
}

fn take<T>(items: &[T], limit: Option<usize>) -> &[T] {
    match limit {
        Some(n) => &items[..n.min(items.len())],
        None => items,
    }
}

/// Indeterminate spinner for the parse+walk step of `map`/`diff-fns`, hidden
/// entirely under `--quiet` since machine-readable output must stay unpolluted.
fn spinner(ctx: &AppContext, message: &str) -> ProgressBar {
    if ctx.quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn run_beautify(args: BeautifyArgs, ctx: &AppContext) -> Result<()> {
    let buf = SourceBuffer::load(&args.file)?;
    let beautified = bundlescope::core::beautify::beautify(buf.bytes());
    let base = args.output.unwrap_or_else(|| args.file.clone());
    let js_path = with_suffix(&base, "beautified.js");
    let map_path = with_suffix(&base, "offsetmap.json");

    write_atomic(&js_path, beautified.text.as_bytes())?;
    write_atomic(&map_path, serde_json::to_vec(&beautified.line_to_offset)?.as_slice())?;

    if !ctx.quiet {
        println!("wrote {} ({} lines)", js_path.display(), beautified.line_to_offset.len());
        println!("wrote {}", map_path.display());
    }
    Ok(())
}

fn run_slice(args: SliceArgs, _ctx: &AppContext) -> Result<()> {
    let buf = SourceBuffer::load(&args.file)?;
    let bytes = buf.bytes();
    let half = args.length / 2;
    let before = args.before.unwrap_or(half);
    let after = args.after.unwrap_or(args.length - half);
    let lo = args.offset.saturating_sub(before);
    let hi = (args.offset + after).min(bytes.len());
    let window = &bytes[lo..hi];

    if args.beautify {
        println!("{}", bundlescope::core::beautify::beautify(window).text);
    } else {
        println!("{}", String::from_utf8_lossy(window));
    }
    Ok(())
}

fn run_find(args: FindArgs, _ctx: &AppContext) -> Result<()> {
    let cfg = bundlescope::load_config().unwrap_or_default();
    let buf = SourceBuffer::load(&args.file)?;
    let bytes = buf.bytes();

    let mut matches = if args.regex {
        search::search_regex(bytes, &args.pattern, cfg.search_context)?
    } else {
        search::search_literal(bytes, &args.pattern, cfg.search_context)
    };
    if let Some(target) = args.near {
        matches = search::filter_by_proximity(matches, target, cfg.search_context);
    }

    if args.count {
        println!("{}", matches.len());
        return Ok(());
    }

    let limited = search::apply_limit(matches, args.limit);
    let shown = limited.items.len();
    let total = limited.total;

    if args.compact {
        for m in &limited.items {
            println!("{}: {}", m.offset, m.matched_text);
        }
    } else {
        for group in search::group_by_function(bytes, limited.items) {
            match &group.function_signature {
                Some(sig) => println!("# {sig}"),
                None => println!("# <module scope>"),
            }
            for m in &group.matches {
                println!("  @{}: {}", m.offset, m.context);
                if args.captures && !m.captures.is_empty() {
                    println!("    captures: {:?}", m.captures);
                }
                if args.captures && !m.named_captures.is_empty() {
                    println!("    named: {:?}", m.named_captures);
                }
            }
        }
    }

    if total > shown {
        println!("... and {} more", total - shown);
    }
    Ok(())
}

fn print_patch_result(result: &PatchResult) {
    println!("status: {:?}", result.status);
    for m in &result.matches {
        println!("  @{}: {} | {}", m.offset, m.match_text, m.context);
    }
    for w in &result.warnings {
        println!("{}", format!("warning: {w:?}").yellow());
    }
    if let Some(preview) = &result.preview {
        println!("--- before ---\n{}", preview.before_window);
        println!("--- after ---\n{}", preview.after_window);
    }
}

fn run_match(args: MatchArgs, _ctx: &AppContext) -> Result<u8> {
    let cfg = bundlescope::load_config().unwrap_or_default();
    let buf = SourceBuffer::load(&args.file)?;
    let result = patch::patch_check(
        buf.bytes(),
        &args.pattern,
        false,
        args.replace.as_deref(),
        cfg.patch_context,
        cfg.patch_preview_context,
    )?;
    print_patch_result(&result);
    Ok(match result.status {
        PatchStatus::Ambiguous => 2,
        PatchStatus::NotFound => 1,
        PatchStatus::Unique => 0,
    })
}

fn run_patch_check(args: PatchCheckArgs, _ctx: &AppContext) -> Result<u8> {
    let cfg = bundlescope::load_config().unwrap_or_default();
    let buf = SourceBuffer::load(&args.file)?;
    let result = patch::patch_check(
        buf.bytes(),
        &args.pattern,
        args.regex,
        args.replacement.as_deref(),
        cfg.patch_context,
        cfg.patch_preview_context,
    )?;
    print_patch_result(&result);
    Ok(u8::from(result.status != PatchStatus::Unique))
}

fn run_extract_fn(args: ExtractFnArgs, _ctx: &AppContext) -> Result<()> {
    let buf = SourceBuffer::load(&args.file)?;
    let bytes = buf.bytes();

    if args.stack {
        let stack = match boundary::nesting_stack(bytes, args.offset) {
            Ok(s) if !s.is_empty() => s,
            Ok(empty) if args.no_ast_fallback => empty,
            Ok(_) | Err(AnalyzerError::BoundaryScanExceeded { .. } | AnalyzerError::OffsetOutsideFunction { .. }) => {
                let tree = tree::parse(bytes, dialect_for(&args.file), 0)?;
                vec![boundary::enclosing_function_via_tree(&tree, bytes, args.offset)?]
            }
            Err(e) => return Err(e.into()),
        };
        for (depth, span) in stack.iter().enumerate() {
            println!("[{depth}] {}", span.signature_text);
        }
        return Ok(());
    }

    let fast = match args.depth {
        Some(d) => boundary::at_depth(bytes, args.offset, d),
        None => boundary::enclosing_function(bytes, args.offset),
    };
    let span = match fast {
        Ok(s) => s,
        Err(AnalyzerError::BoundaryScanExceeded { .. } | AnalyzerError::OffsetOutsideFunction { .. })
            if !args.no_ast_fallback =>
        {
            let tree = tree::parse(bytes, dialect_for(&args.file), 0)?;
            boundary::enclosing_function_via_tree(&tree, bytes, args.offset)?
        }
        Err(e) => return Err(e.into()),
    };
    println!("{}", span.signature_text);
    println!("body: {}..{}", span.body_open_brace, span.body_end);
    Ok(())
}

fn run_context(args: ContextArgs, _ctx: &AppContext) -> Result<()> {
    let buf = SourceBuffer::load(&args.file)?;
    let snapshot = context::build_context(buf.bytes(), args.offset)?;

    match &snapshot.enclosing_function {
        Some(f) => println!("function: {}", f.signature_text),
        None => println!("function: <module scope>"),
    }
    if !snapshot.nearby_strings.is_empty() {
        println!("nearby strings:");
        for s in &snapshot.nearby_strings {
            println!("  @{}: {:?}", s.offset, s.content);
        }
    }
    println!("---");
    println!("{}", snapshot.window);
    Ok(())
}

fn run_strings(args: StringsArgs, _ctx: &AppContext) -> Result<()> {
    let cfg = bundlescope::load_config().unwrap_or_default();

    if let Some(files) = &args.diff {
        let b1 = SourceBuffer::load(&files[0])?;
        let b2 = SourceBuffer::load(&files[1])?;
        let min_len = args.min_length.unwrap_or(cfg.string_diff_min_length);
        let (added, removed) = funcmap::diff_string_sets(b1.bytes(), b2.bytes(), min_len);
        println!("added ({}):", added.len());
        for s in &added {
            println!("  {s:?}");
        }
        println!("removed ({}):", removed.len());
        for s in &removed {
            println!("  {s:?}");
        }
        return Ok(());
    }

    let buf = SourceBuffer::load(&args.file)?;
    let bytes = buf.bytes();
    let mut items = landmarks::scan(bytes);
    if let Some(needle) = &args.filter {
        items = landmarks::filter_by_substring(items, needle);
    }
    if let Some(target) = args.near {
        items = landmarks::filter_by_proximity(items, target, cfg.landmark_radius);
    }
    if let Some(min_len) = args.min_length {
        items.retain(|s| s.length >= min_len);
    }
    if !args.raw {
        items = landmarks::enrich_with_enclosing_function(bytes, items);
    }

    let total = items.len();
    if !args.all {
        if let Some(limit) = args.limit {
            items.truncate(limit);
        }
    }
    for s in &items {
        match &s.enclosing_function_name {
            Some(name) => println!("@{} [{}]: {:?}", s.offset, name, s.content),
            None => println!("@{}: {:?}", s.offset, s.content),
        }
    }
    if !args.all && items.len() < total {
        println!("... and {} more", total - items.len());
    }
    Ok(())
}

fn run_scope(args: ScopeArgs, _ctx: &AppContext) -> Result<()> {
    let buf = SourceBuffer::load(&args.file)?;
    let bytes = buf.bytes();
    let tree = tree::parse(bytes, dialect_for(&args.file), 0)?;
    let scopes = scope::ScopeTree::build(&tree, bytes);

    let mut idx = scopes.find_scope_at(args.offset);
    loop {
        let s = scopes.scope(idx);
        println!("{:?} [{}..{}]", s.kind, s.start, s.end);
        for b in &s.bindings {
            println!("  {:?} {} @{}", b.kind, b.name, b.offset);
        }
        if !args.all {
            break;
        }
        match s.parent {
            Some(p) => idx = p,
            None => break,
        }
    }
    Ok(())
}

fn run_refs(args: RefsArgs, _ctx: &AppContext) -> Result<()> {
    let buf = SourceBuffer::load(&args.file)?;
    let bytes = buf.bytes();
    let tree = tree::parse(bytes, dialect_for(&args.file), 0)?;
    let scopes = scope::ScopeTree::build(&tree, bytes);
    let g = graph::analyze(&tree, &scopes, bytes, args.offset)?;

    println!("external references:");
    for group in &g.external_refs {
        match group.depth {
            Some(d) => println!("  depth {d}:"),
            None => println!("  global:"),
        }
        for r in &group.refs {
            println!(
                "    {} ({:?}) x{} @{:?}",
                r.name, r.declaration_kind, r.occurrence_count, r.occurrence_offsets
            );
        }
    }
    Ok(())
}

fn run_calls(args: CallsArgs, _ctx: &AppContext) -> Result<()> {
    let buf = SourceBuffer::load(&args.file)?;
    let bytes = buf.bytes();
    let tree = tree::parse(bytes, dialect_for(&args.file), 0)?;
    let scopes = scope::ScopeTree::build(&tree, bytes);
    let g = graph::analyze(&tree, &scopes, bytes, args.offset)?;

    println!("outgoing:");
    for c in &g.outgoing {
        println!("  {}() x{}", c.name, c.occurrence_count);
    }
    println!("incoming:");
    for c in &g.incoming {
        let flag = if c.ambiguous { " [ambiguous]" } else { "" };
        match &c.caller_name {
            Some(name) => println!("  @{} from {name}{flag}: {}", c.call_offset, c.context),
            None => println!("  @{} from <module scope>{flag}: {}", c.call_offset, c.context),
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct MapRow {
    name: String,
    start: usize,
    end: usize,
    params: usize,
    #[tabled(rename = "async")]
    is_async: bool,
    generator: bool,
}

fn run_map(args: MapArgs, ctx: &AppContext) -> Result<()> {
    let buf = SourceBuffer::load(&args.file)?;
    let bytes = buf.bytes();
    let pb = spinner(ctx, "parsing and walking function map...");
    let tree = tree::parse(bytes, dialect_for(&args.file), 0)?;
    let mut entries = funcmap::build_function_map(&tree, bytes);
    pb.finish_and_clear();

    if args.strings {
        let land = landmarks::scan(bytes);
        for e in &mut entries {
            e.strings_used = Some(
                land.iter().filter(|s| s.offset >= e.start && s.offset < e.end).map(|s| s.content.clone()).collect(),
            );
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let rows: Vec<MapRow> = entries
        .iter()
        .map(|e| MapRow {
            name: e.name.clone(),
            start: e.start,
            end: e.end,
            params: e.param_count,
            is_async: e.is_async,
            generator: e.is_generator,
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn run_diff_fns(args: DiffFnsArgs, ctx: &AppContext) -> Result<()> {
    let cfg = bundlescope::load_config().unwrap_or_default();
    let b1 = SourceBuffer::load(&args.file1)?;
    let b2 = SourceBuffer::load(&args.file2)?;

    if args.strings_only {
        let (added, removed) = funcmap::diff_string_sets(b1.bytes(), b2.bytes(), cfg.string_diff_min_length);
        println!("added strings ({}):", added.len());
        for s in &added {
            println!("  {s:?}");
        }
        println!("removed strings ({}):", removed.len());
        for s in &removed {
            println!("  {s:?}");
        }
        return Ok(());
    }

    let pb = spinner(ctx, "parsing both versions and diffing function maps...");
    let t1 = tree::parse(b1.bytes(), dialect_for(&args.file1), 0)?;
    let t2 = tree::parse(b2.bytes(), dialect_for(&args.file2), 0)?;
    let m1 = funcmap::build_function_map(&t1, b1.bytes());
    let m2 = funcmap::build_function_map(&t2, b2.bytes());
    let mut diff = funcmap::diff_functions(b1.bytes(), &m1, b2.bytes(), &m2, cfg.diff_fuzzy_threshold);
    pb.finish_and_clear();

    if let Some(name) = &args.name {
        diff.unchanged.retain(|e| &e.v1.name == name);
        diff.modified.retain(|e| &e.v1.name == name || &e.v2.name == name);
        diff.added.retain(|e| &e.name == name);
        diff.removed.retain(|e| &e.name == name);
    }
    if let Some(needle) = &args.filter {
        diff.modified
            .retain(|e| e.added_strings.iter().any(|s| s.contains(needle.as_str())) || e.removed_strings.iter().any(|s| s.contains(needle.as_str())));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(());
    }
    if args.summary {
        println!("unchanged: {}", diff.unchanged.len());
        println!("modified: {}", diff.modified.len());
        println!("added: {}", diff.added.len());
        println!("removed: {}", diff.removed.len());
        return Ok(());
    }

    let limit = if args.all { None } else { Some(args.limit.unwrap_or(50)) };

    println!("# unchanged ({})", diff.unchanged.len());
    for e in take(&diff.unchanged, limit) {
        println!("  {} @{} -> @{} (shift {})", e.v1.name, e.v1.start, e.v2.start, e.shift);
    }
    println!("# modified ({})", diff.modified.len());
    for e in take(&diff.modified, limit) {
        let label = if args.raw { String::new() } else { format!(" [{}]", funcmap::classify(e)) };
        println!("  {} similarity={:.2}{}", e.v1.name, e.similarity, label);
        if args.body {
            println!("    - {}", e.v1.signature_prefix);
            println!("    + {}", e.v2.signature_prefix);
        }
    }
    println!("# added ({})", diff.added.len());
    for e in take(&diff.added, limit) {
        println!("  {}", format!("+ {} @{}", e.name, e.start).green());
    }
    println!("# removed ({})", diff.removed.len());
    for e in take(&diff.removed, limit) {
        println!("  {}", format!("- {} @{}", e.name, e.start).red());
    }
    Ok(())
}

fn run_trace_io(args: TraceIoArgs, _ctx: &AppContext) -> Result<()> {
    let cfg = bundlescope::load_config().unwrap_or_default();
    let buf = SourceBuffer::load(&args.file)?;
    let result = trace_io::trace_io(buf.bytes(), &args.channel_pattern, cfg.trace_io_window);

    println!("writers ({}):", result.writers.len());
    for s in &result.writers {
        println!("  @{} [{:?}]: {}", s.offset, s.transport, s.context.trim());
    }
    println!("readers ({}):", result.readers.len());
    for s in &result.readers {
        println!("  @{} [{:?}]: {}", s.offset, s.transport, s.context.trim());
    }
    for w in &result.warnings {
        println!("{}", format!("warning: {w:?}").yellow());
    }
    Ok(())
}

fn run_decompile(args: DecompileArgs, _ctx: &AppContext) -> Result<()> {
    let buf = SourceBuffer::load(&args.file)?;
    let bytes = buf.bytes();
    let tree = tree::parse(bytes, dialect_for(&args.file), 0)?;
    let scopes = scope::ScopeTree::build(&tree, bytes);
    let hint = decompile::decompile(&tree, &scopes, bytes, args.offset)?;

    println!("confidence: {:.2}", hint.confidence);
    println!("renames:");
    for r in &hint.renames {
        println!("  {} -> {} ({} uses)", r.original, r.suggested, r.occurrences);
    }
    println!("idioms:");
    for i in &hint.idioms {
        println!("  @{}: {} -> {}", i.offset, i.original, i.expansion);
    }
    Ok(())
}
