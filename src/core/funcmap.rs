//! C9 — whole-buffer function map, cross-version fingerprinting, and the
//! three-pass diff: exact fingerprint match, fuzzy similarity match, then
//! whatever remains is reported added/removed.

use indexmap::IndexSet;
use tree_sitter::{Node, Tree, TreeCursor};
use xxhash_rust::xxh64::xxh64;

use crate::core::landmarks;
use crate::core::model::{ANONYMOUS, DiffResult, FunctionEntry, ModifiedEntry, StringLiteral, UnchangedEntry};
use crate::parser::tree::is_function_like;

fn text(node: Node, bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[node.start_byte()..node.end_byte()]).into_owned()
}

fn function_name(node: Node, bytes: &[u8]) -> Option<String> {
    node.child_by_field_name("name").map(|n| text(n, bytes))
}

fn count_params(node: Node) -> usize {
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        params.named_children(&mut cursor).count()
    } else if node.child_by_field_name("parameter").is_some() {
        1
    } else {
        0
    }
}

fn detect_async(node: Node, bytes: &[u8]) -> bool {
    text(node, bytes).trim_start().starts_with("async")
}

fn detect_generator(node: Node, bytes: &[u8]) -> bool {
    if matches!(node.kind(), "generator_function" | "generator_function_declaration") {
        return true;
    }
    match node.child_by_field_name("name") {
        Some(name) => bytes[node.start_byte()..name.start_byte()].contains(&b'*'),
        None => false,
    }
}

const SIGNATURE_PREFIX_CAP: usize = 120;

fn signature_prefix(node: Node, bytes: &[u8]) -> String {
    let end = node.child_by_field_name("body").map(|b| b.start_byte()).unwrap_or_else(|| node.end_byte());
    let raw = String::from_utf8_lossy(&bytes[node.start_byte()..end]).trim().to_string();
    if raw.chars().count() > SIGNATURE_PREFIX_CAP {
        raw.chars().take(SIGNATURE_PREFIX_CAP).collect()
    } else {
        raw
    }
}

fn build_entry(node: Node, bytes: &[u8]) -> FunctionEntry {
    FunctionEntry {
        name: function_name(node, bytes).unwrap_or_else(|| ANONYMOUS.to_string()),
        start: node.start_byte(),
        end: node.end_byte(),
        param_count: count_params(node),
        is_async: detect_async(node, bytes),
        is_generator: detect_generator(node, bytes),
        signature_prefix: signature_prefix(node, bytes),
        strings_used: None,
    }
}

/// Every function-like node in the tree, in source order.
#[must_use]
pub fn build_function_map(tree: &Tree, bytes: &[u8]) -> Vec<FunctionEntry> {
    let mut out = Vec::new();
    let mut cursor = tree.root_node().walk();
    walk(&mut cursor, bytes, &mut out);
    out.sort_by_key(|e| e.start);
    out
}

fn walk(cursor: &mut TreeCursor<'_>, bytes: &[u8], out: &mut Vec<FunctionEntry>) {
    let node = cursor.node();
    if is_function_like(&node) {
        out.push(build_entry(node, bytes));
    }
    if cursor.goto_first_child() {
        loop {
            walk(cursor, bytes, out);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
}

/// Quantize a byte length into a ~10%-wide bucket, so a few added/removed
/// bytes inside a function body don't break fingerprint equality across
/// trivial edits, while large functions still get fine-grained buckets.
#[must_use]
pub fn size_bin(len: usize) -> usize {
    let step = ((len as f64 * 0.1).round() as usize).max(1);
    ((len as f64 / step as f64).round() as usize) * step
}

/// Identifier-insensitive: never hashes the function's name, since the whole
/// point of C9 is matching functions across versions despite renaming.
#[must_use]
pub fn fingerprint(entry: &FunctionEntry, sorted_strings_joined: &str) -> u64 {
    let mut buf = Vec::with_capacity(16 + sorted_strings_joined.len());
    buf.push(entry.param_count as u8);
    buf.push(entry.is_async as u8);
    buf.push(entry.is_generator as u8);
    buf.extend_from_slice(&size_bin(entry.end - entry.start).to_le_bytes());
    buf.extend_from_slice(sorted_strings_joined.as_bytes());
    xxh64(&buf, 0)
}

fn strings_within(landmarks: &[StringLiteral], entry: &FunctionEntry) -> IndexSet<String> {
    landmarks.iter().filter(|s| s.offset >= entry.start && s.offset < entry.end).map(|s| s.content.clone()).collect()
}

/// `sorted_strings_joined` from spec §4.9's fingerprint formula: the
/// function's string-literal set, sorted for order-independence and joined
/// on a separator that cannot appear inside a JS string literal's content.
fn sorted_strings_joined(strings: &IndexSet<String>) -> String {
    let mut sorted: Vec<&str> = strings.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join("\u{0}")
}

fn jaccard(a: &IndexSet<String>, b: &IndexSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Three-pass diff: exact fingerprint match, then best-similarity fuzzy
/// match above `fuzzy_threshold` on each function's string-literal set, then
/// whatever is left unmatched on either side is added/removed.
#[must_use]
pub fn diff_functions(
    bytes1: &[u8],
    funcs1: &[FunctionEntry],
    bytes2: &[u8],
    funcs2: &[FunctionEntry],
    fuzzy_threshold: f64,
) -> DiffResult {
    let land1 = landmarks::scan(bytes1);
    let land2 = landmarks::scan(bytes2);

    let strs1: Vec<IndexSet<String>> = funcs1.iter().map(|f| strings_within(&land1, f)).collect();
    let strs2: Vec<IndexSet<String>> = funcs2.iter().map(|f| strings_within(&land2, f)).collect();

    let fp1: Vec<u64> =
        funcs1.iter().zip(&strs1).map(|(f, s)| fingerprint(f, &sorted_strings_joined(s))).collect();
    let fp2: Vec<u64> =
        funcs2.iter().zip(&strs2).map(|(f, s)| fingerprint(f, &sorted_strings_joined(s))).collect();
    let mut used1 = vec![false; funcs1.len()];
    let mut used2 = vec![false; funcs2.len()];

    let mut unchanged = Vec::new();
    for i in 0..funcs1.len() {
        if let Some(j) = (0..funcs2.len()).find(|&j| !used2[j] && fp2[j] == fp1[i]) {
            used1[i] = true;
            used2[j] = true;
            unchanged.push(UnchangedEntry {
                v1: funcs1[i].clone(),
                v2: funcs2[j].clone(),
                shift: funcs2[j].start as i64 - funcs1[i].start as i64,
            });
        }
    }

    let mut modified = Vec::new();
    for i in 0..funcs1.len() {
        if used1[i] {
            continue;
        }
        let s1 = &strs1[i];
        let mut best: Option<(usize, f64)> = None;
        for j in 0..funcs2.len() {
            if used2[j] {
                continue;
            }
            let sim = jaccard(s1, &strs2[j]);
            if sim >= fuzzy_threshold && best.is_none_or(|(_, b)| sim > b) {
                best = Some((j, sim));
            }
        }
        if let Some((j, sim)) = best {
            used1[i] = true;
            used2[j] = true;
            let s2 = &strs2[j];
            let added_strings: Vec<String> = s2.difference(s1).cloned().collect();
            let removed_strings: Vec<String> = s1.difference(s2).cloned().collect();
            let f1 = &funcs1[i];
            let f2 = &funcs2[j];
            modified.push(ModifiedEntry {
                v1: f1.clone(),
                v2: f2.clone(),
                size_diff: (f2.end as i64 - f2.start as i64) - (f1.end as i64 - f1.start as i64),
                added_strings,
                removed_strings,
                similarity: sim,
            });
        }
    }

    let added = funcs2.iter().enumerate().filter(|(j, _)| !used2[*j]).map(|(_, f)| f.clone()).collect();
    let removed = funcs1.iter().enumerate().filter(|(i, _)| !used1[*i]).map(|(_, f)| f.clone()).collect();

    DiffResult { unchanged, modified, added, removed }
}

/// The cheap alternative to [`diff_functions`] when no function map is
/// available: diff the whole-buffer string-literal sets directly.
#[must_use]
pub fn diff_string_sets(bytes1: &[u8], bytes2: &[u8], min_length: usize) -> (Vec<String>, Vec<String>) {
    let set1: IndexSet<String> =
        landmarks::scan(bytes1).into_iter().map(|s| s.content).filter(|c| c.len() >= min_length).collect();
    let set2: IndexSet<String> =
        landmarks::scan(bytes2).into_iter().map(|s| s.content).filter(|c| c.len() >= min_length).collect();
    let added = set2.difference(&set1).cloned().collect();
    let removed = set1.difference(&set2).cloned().collect();
    (added, removed)
}

/// Coarse human-facing label for a [`ModifiedEntry`], used by the CLI's
/// summary rendering. Not part of the persisted diff format.
#[must_use]
pub fn classify(entry: &ModifiedEntry) -> &'static str {
    if entry.v1.param_count != entry.v2.param_count || entry.v1.is_async != entry.v2.is_async {
        "signature-changed"
    } else if !entry.added_strings.is_empty() || !entry.removed_strings.is_empty() {
        "strings-changed"
    } else {
        "body-changed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tree::{Dialect, parse};

    #[test]
    fn function_map_is_source_ordered() {
        let src = b"function a(){}function b(x,y){}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let map = build_function_map(&tree, src);
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].name, "a");
        assert_eq!(map[1].name, "b");
        assert_eq!(map[1].param_count, 2);
    }

    #[test]
    fn s6_unchanged_with_shift() {
        let v1 = b"function f(a,b){return a+b}";
        let v2 = b"var pad=1;function f(a,b){return a+b}";
        let t1 = parse(v1, Dialect::JavaScript, 0).unwrap();
        let t2 = parse(v2, Dialect::JavaScript, 0).unwrap();
        let m1 = build_function_map(&t1, v1);
        let m2 = build_function_map(&t2, v2);
        let diff = diff_functions(v1, &m1, v2, &m2, 0.5);
        assert_eq!(diff.unchanged.len(), 1);
        assert!(diff.unchanged[0].shift > 0);
        assert!(diff.modified.is_empty());
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn s7_modified_by_string_set_similarity() {
        let v1 = b"function f(a){console.log(\"hello world one\");console.log(\"shared\");return a}";
        let v2 = b"function f(a,b){console.log(\"hello world two\");console.log(\"shared\");return a+b}";
        let t1 = parse(v1, Dialect::JavaScript, 0).unwrap();
        let t2 = parse(v2, Dialect::JavaScript, 0).unwrap();
        let m1 = build_function_map(&t1, v1);
        let m2 = build_function_map(&t2, v2);
        let diff = diff_functions(v1, &m1, v2, &m2, 0.2);
        assert_eq!(diff.modified.len(), 1);
        assert!(diff.modified[0].removed_strings.contains(&"hello world one".to_string()));
        assert!(diff.modified[0].added_strings.contains(&"hello world two".to_string()));
    }

    #[test]
    fn diff_string_sets_reports_added_and_removed() {
        let (added, removed) = diff_string_sets(b"var a=\"keep\";var b=\"gone\"", b"var a=\"keep\";var c=\"new\"", 1);
        assert!(added.contains(&"new".to_string()));
        assert!(removed.contains(&"gone".to_string()));
    }
}
