//! C8 — outgoing calls, incoming call sites, and external (free) variable
//! references for the function enclosing a given offset. Built entirely on
//! the full syntax tree and the scope arena from [`crate::core::scope`].

use indexmap::IndexMap;
use tree_sitter::{Node, Tree};

use crate::core::model::BindingKind;
use crate::core::scope::ScopeTree;
use crate::infra::errors::AnalyzerError;
use crate::parser::tree::narrowest_function_like_node;

/// A callee name ≤ this many characters is too common a minified identifier
/// to trust a raw name match against — flagged `ambiguous` rather than
/// silently dropped.
const AMBIGUOUS_NAME_MAX_LEN: usize = 2;

const INCOMING_CALL_CONTEXT_RADIUS: usize = 40;

#[derive(Debug, Clone)]
pub struct OutgoingCall {
    pub name: String,
    pub occurrence_count: usize,
}

#[derive(Debug, Clone)]
pub struct IncomingCall {
    pub call_offset: usize,
    pub caller_start: Option<usize>,
    pub caller_name: Option<String>,
    pub context: String,
    /// The callee name was too short to trust without a full type resolver.
    pub ambiguous: bool,
}

#[derive(Debug, Clone)]
pub struct ExternalRef {
    pub name: String,
    /// `None` when the name resolves to nothing in any enclosing scope —
    /// a true global, not merely undeclared-in-this-function.
    pub declaration_kind: Option<BindingKind>,
    pub occurrence_count: usize,
    pub occurrence_offsets: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ExternalRefGroup {
    /// `None` = global: no binding for any ref in this group was found in
    /// any enclosing scope. `Some(1)` = bound in the immediate parent scope,
    /// `Some(2)` = grandparent, and so on.
    pub depth: Option<usize>,
    pub refs: Vec<ExternalRef>,
}

#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    pub function_name: Option<String>,
    pub outgoing: Vec<OutgoingCall>,
    pub incoming: Vec<IncomingCall>,
    pub external_refs: Vec<ExternalRefGroup>,
}

fn text(node: Node, bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[node.start_byte()..node.end_byte()]).into_owned()
}

fn function_name(node: Node, bytes: &[u8]) -> Option<String> {
    node.child_by_field_name("name").map(|n| text(n, bytes))
}

fn context_window(bytes: &[u8], start: usize, end: usize, radius: usize) -> String {
    let lo = start.saturating_sub(radius);
    let hi = (end + radius).min(bytes.len());
    String::from_utf8_lossy(&bytes[lo..hi]).into_owned()
}

pub fn analyze(tree: &Tree, scopes: &ScopeTree, bytes: &[u8], offset: usize) -> Result<CallGraph, AnalyzerError> {
    let node =
        narrowest_function_like_node(tree, offset).ok_or(AnalyzerError::OffsetOutsideFunction { offset })?;
    let function_scope_idx = scopes.find_scope_at(node.start_byte().saturating_add(1));
    let name = function_name(node, bytes);

    let outgoing = collect_outgoing_calls(node, bytes);
    let external_refs = collect_external_refs(node, bytes, scopes, function_scope_idx);
    let incoming = match &name {
        Some(n) => collect_incoming_calls(tree, bytes, n, node.start_byte(), node.end_byte()),
        None => Vec::new(),
    };

    Ok(CallGraph { function_name: name, outgoing, incoming, external_refs })
}

fn callee_name(node: Node, bytes: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => Some(text(node, bytes)),
        "member_expression" => node.child_by_field_name("property").map(|p| text(p, bytes)),
        _ => None,
    }
}

/// Sorted by occurrence count descending (first-seen order breaks ties).
fn collect_outgoing_calls(node: Node, bytes: &[u8]) -> Vec<OutgoingCall> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    walk_calls(node, bytes, &mut counts);
    let mut out: Vec<OutgoingCall> =
        counts.into_iter().map(|(name, occurrence_count)| OutgoingCall { name, occurrence_count }).collect();
    out.sort_by(|a, b| b.occurrence_count.cmp(&a.occurrence_count));
    out
}

fn walk_calls(node: Node, bytes: &[u8], out: &mut IndexMap<String, usize>) {
    if node.kind() == "call_expression"
        && let Some(callee) = node.child_by_field_name("function")
        && let Some(name) = callee_name(callee, bytes)
    {
        *out.entry(name).or_insert(0) += 1;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_calls(child, bytes, out);
    }
}

fn collect_incoming_calls(
    tree: &Tree,
    bytes: &[u8],
    name: &str,
    exclude_start: usize,
    exclude_end: usize,
) -> Vec<IncomingCall> {
    let mut out = Vec::new();
    let root = tree.root_node();
    let mut cursor = root.walk();
    find_calls_to(&mut cursor, bytes, name, tree, exclude_start, exclude_end, &mut out);
    out
}

#[allow(clippy::too_many_arguments)]
fn find_calls_to(
    cursor: &mut tree_sitter::TreeCursor<'_>,
    bytes: &[u8],
    name: &str,
    tree: &Tree,
    exclude_start: usize,
    exclude_end: usize,
    out: &mut Vec<IncomingCall>,
) {
    let node = cursor.node();
    // Calls originating inside the analyzed function's own span are
    // recursion, not an incoming call from elsewhere.
    let in_self_range = node.start_byte() >= exclude_start && node.start_byte() < exclude_end;
    if node.kind() == "call_expression"
        && !in_self_range
        && let Some(callee) = node.child_by_field_name("function")
        && callee_name(callee, bytes).as_deref() == Some(name)
    {
        let call_offset = node.start_byte();
        let caller = narrowest_function_like_node(tree, call_offset).filter(|n| n.id() != node.id());
        out.push(IncomingCall {
            call_offset,
            caller_start: caller.map(|n| n.start_byte()),
            caller_name: caller.and_then(|n| function_name(n, bytes)),
            context: context_window(bytes, call_offset, node.end_byte(), INCOMING_CALL_CONTEXT_RADIUS),
            ambiguous: name.chars().count() <= AMBIGUOUS_NAME_MAX_LEN,
        });
    }
    if cursor.goto_first_child() {
        loop {
            find_calls_to(cursor, bytes, name, tree, exclude_start, exclude_end, out);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
}

fn is_declaration_site(node: Node) -> bool {
    let Some(parent) = node.parent() else { return false };
    match parent.kind() {
        "variable_declarator" => parent.child_by_field_name("name").is_some_and(|n| n.id() == node.id()),
        "function_declaration"
        | "function_expression"
        | "generator_function"
        | "generator_function_declaration"
        | "class_declaration"
        | "class"
        | "method_definition" => parent.child_by_field_name("name").is_some_and(|n| n.id() == node.id()),
        "formal_parameters" => true,
        "catch_clause" => parent.child_by_field_name("parameter").is_some_and(|n| n.id() == node.id()),
        "member_expression" => parent.child_by_field_name("property").is_some_and(|n| n.id() == node.id()),
        _ => false,
    }
}

fn bound_within_function(scopes: &ScopeTree, mut scope_idx: usize, function_scope_idx: usize, name: &str) -> bool {
    loop {
        let s = scopes.scope(scope_idx);
        if s.bindings.iter().any(|b| b.name == name) {
            return true;
        }
        if scope_idx == function_scope_idx {
            return false;
        }
        match s.parent {
            Some(p) => scope_idx = p,
            None => return false,
        }
    }
}

/// Walks outward from the function's own scope to find where `name` is
/// actually bound. `Some(1)` means the immediate parent scope, `Some(2)` the
/// grandparent, and so on; `None` means no enclosing scope binds it at all.
fn resolve_external(scopes: &ScopeTree, function_scope_idx: usize, name: &str) -> (Option<usize>, Option<BindingKind>) {
    let mut depth = 0usize;
    let mut scope_idx = function_scope_idx;
    loop {
        match scopes.scope(scope_idx).parent {
            Some(parent_idx) => {
                depth += 1;
                let parent = scopes.scope(parent_idx);
                if let Some(b) = parent.bindings.iter().find(|b| b.name == name) {
                    return (Some(depth), Some(b.kind));
                }
                scope_idx = parent_idx;
            }
            None => return (None, None),
        }
    }
}

fn collect_external_refs(
    node: Node,
    bytes: &[u8],
    scopes: &ScopeTree,
    function_scope_idx: usize,
) -> Vec<ExternalRefGroup> {
    let mut free: IndexMap<String, Vec<usize>> = IndexMap::new();
    walk_refs(node, bytes, scopes, function_scope_idx, &mut free);

    let mut groups: IndexMap<Option<usize>, Vec<ExternalRef>> = IndexMap::new();
    for (name, mut offsets) in free {
        offsets.sort_unstable();
        let (depth, declaration_kind) = resolve_external(scopes, function_scope_idx, &name);
        groups.entry(depth).or_default().push(ExternalRef {
            name,
            declaration_kind,
            occurrence_count: offsets.len(),
            occurrence_offsets: offsets,
        });
    }

    let mut out: Vec<ExternalRefGroup> = groups
        .into_iter()
        .map(|(depth, mut refs)| {
            refs.sort_by(|a, b| a.name.cmp(&b.name));
            ExternalRefGroup { depth, refs }
        })
        .collect();
    out.sort_by_key(|g| g.depth.unwrap_or(usize::MAX));
    out
}

fn walk_refs(
    node: Node,
    bytes: &[u8],
    scopes: &ScopeTree,
    function_scope_idx: usize,
    free: &mut IndexMap<String, Vec<usize>>,
) {
    if matches!(node.kind(), "identifier" | "shorthand_property_identifier") && !is_declaration_site(node) {
        let name = text(node, bytes);
        let scope_here = scopes.find_scope_at(node.start_byte());
        if !bound_within_function(scopes, scope_here, function_scope_idx, &name) {
            free.entry(name).or_default().push(node.start_byte());
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_refs(child, bytes, scopes, function_scope_idx, free);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tree::{Dialect, parse};

    #[test]
    fn outgoing_calls_collected_and_sorted_by_count() {
        let src = b"function outer(){helper();other.method();helper()}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let g = analyze(&tree, &scopes, src, 20).unwrap();
        assert_eq!(g.outgoing[0].name, "helper");
        assert_eq!(g.outgoing[0].occurrence_count, 2);
        assert!(g.outgoing.iter().any(|c| c.name == "method" && c.occurrence_count == 1));
    }

    #[test]
    fn incoming_call_found_with_caller_and_context() {
        let src = b"function callee(){return 1}function caller(){return callee()}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let g = analyze(&tree, &scopes, src, 12).unwrap();
        assert_eq!(g.incoming.len(), 1);
        assert_eq!(g.incoming[0].caller_name.as_deref(), Some("caller"));
        assert!(g.incoming[0].context.contains("callee()"));
    }

    #[test]
    fn self_recursive_call_is_excluded_from_incoming() {
        let src = b"function fact(n){return n<=1?1:n*fact(n-1)}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let g = analyze(&tree, &scopes, src, 10).unwrap();
        assert!(g.incoming.is_empty());
    }

    #[test]
    fn short_callee_name_is_flagged_ambiguous() {
        let src = b"function f(){return 1}function caller(){return f()}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let g = analyze(&tree, &scopes, src, 5).unwrap();
        assert_eq!(g.incoming.len(), 1);
        assert!(g.incoming[0].ambiguous);
    }

    #[test]
    fn free_variable_is_external_ref_grouped_by_depth() {
        let src = b"var outerVar=1;function f(a){return outerVar+a}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let g = analyze(&tree, &scopes, src, 40).unwrap();
        let group = g.external_refs.iter().find(|grp| grp.depth == Some(1)).unwrap();
        let r = group.refs.iter().find(|r| r.name == "outerVar").unwrap();
        assert_eq!(r.declaration_kind, Some(BindingKind::Var));
        assert_eq!(r.occurrence_count, 1);
        assert!(!group.refs.iter().any(|r| r.name == "a"));
    }

    #[test]
    fn undeclared_name_groups_as_global() {
        let src = b"function f(){return someGlobalThing}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let g = analyze(&tree, &scopes, src, 15).unwrap();
        let group = g.external_refs.iter().find(|grp| grp.depth.is_none()).unwrap();
        assert!(group.refs.iter().any(|r| r.name == "someGlobalThing" && r.declaration_kind.is_none()));
    }
}
