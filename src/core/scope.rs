//! C7 — builds a lexical scope tree with bindings from a parsed syntax tree.
//! The arena is flat; each [`Scope`] refers to its parent by index rather
//! than holding an owned reference, so the structure can never be cyclic.

use tree_sitter::{Node, Tree};

use crate::core::model::{Binding, BindingKind, Scope, ScopeKind};

pub struct ScopeTree {
    pub scopes: Vec<Scope>,
}

impl ScopeTree {
    #[must_use]
    pub fn build(tree: &Tree, bytes: &[u8]) -> Self {
        let mut arena = Vec::new();
        let root = tree.root_node();
        let module = push_scope(&mut arena, ScopeKind::Module, root.start_byte(), root.end_byte(), None);
        recurse_children(root, bytes, module, &mut arena);
        Self { scopes: arena }
    }

    /// The smallest scope whose `[start,end]` contains `offset`; falls back
    /// to the module scope (index 0) when nothing tighter matches.
    #[must_use]
    pub fn find_scope_at(&self, offset: usize) -> usize {
        let mut best = 0usize;
        let mut best_size = usize::MAX;
        for (i, s) in self.scopes.iter().enumerate() {
            if s.start <= offset && offset <= s.end {
                let size = s.end - s.start;
                if size < best_size {
                    best = i;
                    best_size = size;
                }
            }
        }
        best
    }

    #[must_use]
    pub fn scope(&self, idx: usize) -> &Scope {
        &self.scopes[idx]
    }
}

fn push_scope(arena: &mut Vec<Scope>, kind: ScopeKind, start: usize, end: usize, parent: Option<usize>) -> usize {
    arena.push(Scope { kind, start, end, bindings: Vec::new(), parent });
    arena.len() - 1
}

fn bind(arena: &mut [Scope], idx: usize, name: String, kind: BindingKind, offset: usize) {
    arena[idx].bindings.push(Binding { name, kind, offset });
}

fn text(node: Node, bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[node.start_byte()..node.end_byte()]).into_owned()
}

const FUNCTION_KINDS: &[&str] =
    &["function_declaration", "function_expression", "generator_function", "generator_function_declaration"];

fn visit(node: Node, bytes: &[u8], scope_idx: usize, arena: &mut Vec<Scope>) {
    match node.kind() {
        k if FUNCTION_KINDS.contains(&k) => {
            if let Some(name_node) = node.child_by_field_name("name") {
                bind(arena, scope_idx, text(name_node, bytes), BindingKind::Function, name_node.start_byte());
            }
            let new_scope = push_scope(arena, ScopeKind::Function, node.start_byte(), node.end_byte(), Some(scope_idx));
            bind_params(node, bytes, new_scope, arena);
            visit_function_body(node, bytes, new_scope, arena);
        }

        "arrow_function" => {
            let new_scope = push_scope(arena, ScopeKind::Arrow, node.start_byte(), node.end_byte(), Some(scope_idx));
            bind_params(node, bytes, new_scope, arena);
            visit_function_body(node, bytes, new_scope, arena);
        }

        "method_definition" => {
            let new_scope = push_scope(arena, ScopeKind::Function, node.start_byte(), node.end_byte(), Some(scope_idx));
            bind_params(node, bytes, new_scope, arena);
            visit_function_body(node, bytes, new_scope, arena);
        }

        "class_declaration" | "class" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                bind(arena, scope_idx, text(name_node, bytes), BindingKind::Class, name_node.start_byte());
            }
            let new_scope = push_scope(arena, ScopeKind::Class, node.start_byte(), node.end_byte(), Some(scope_idx));
            recurse_children(node, bytes, new_scope, arena);
        }

        "statement_block" => {
            let new_scope = push_scope(arena, ScopeKind::Block, node.start_byte(), node.end_byte(), Some(scope_idx));
            recurse_children(node, bytes, new_scope, arena);
        }

        "for_statement" | "for_in_statement" => {
            let new_scope = push_scope(arena, ScopeKind::For, node.start_byte(), node.end_byte(), Some(scope_idx));
            bind_for_header(node, bytes, new_scope, arena);
            recurse_children(node, bytes, new_scope, arena);
        }

        "catch_clause" => {
            let new_scope = push_scope(arena, ScopeKind::Catch, node.start_byte(), node.end_byte(), Some(scope_idx));
            if let Some(param) = node.child_by_field_name("parameter") {
                flatten_pattern(param, bytes, BindingKind::Catch, &mut arena[new_scope].bindings);
            }
            recurse_children(node, bytes, new_scope, arena);
        }

        "variable_declaration" | "lexical_declaration" => {
            bind_declarators(node, bytes, scope_idx, arena);
            recurse_children(node, bytes, scope_idx, arena);
        }

        _ => recurse_children(node, bytes, scope_idx, arena),
    }
}

/// A function/arrow/method's immediate body block is not its own scope —
/// its bindings belong to the function scope itself.
fn visit_function_body(node: Node, bytes: &[u8], scope_idx: usize, arena: &mut Vec<Scope>) {
    let Some(body) = node.child_by_field_name("body") else { return };
    if body.kind() == "statement_block" {
        recurse_children(body, bytes, scope_idx, arena);
    } else {
        visit(body, bytes, scope_idx, arena);
    }
}

fn recurse_children(node: Node, bytes: &[u8], scope_idx: usize, arena: &mut Vec<Scope>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        visit(child, bytes, scope_idx, arena);
    }
}

fn bind_params(node: Node, bytes: &[u8], scope_idx: usize, arena: &mut Vec<Scope>) {
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            flatten_pattern(child, bytes, BindingKind::Param, &mut arena[scope_idx].bindings);
        }
    } else if let Some(param) = node.child_by_field_name("parameter") {
        flatten_pattern(param, bytes, BindingKind::Param, &mut arena[scope_idx].bindings);
    }
}

fn bind_for_header(node: Node, bytes: &[u8], scope_idx: usize, arena: &mut Vec<Scope>) {
    for field in ["initializer", "left"] {
        if let Some(init) = node.child_by_field_name(field)
            && matches!(init.kind(), "variable_declaration" | "lexical_declaration")
        {
            bind_declarators(init, bytes, scope_idx, arena);
        }
    }
}

fn bind_declarators(node: Node, bytes: &[u8], scope_idx: usize, arena: &mut Vec<Scope>) {
    let keyword = node.child(0).map(|c| text(c, bytes)).unwrap_or_default();
    let kind = match keyword.as_str() {
        "let" => BindingKind::Let,
        "const" => BindingKind::Const,
        _ => BindingKind::Var,
    };
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "variable_declarator"
            && let Some(name) = child.child_by_field_name("name")
        {
            flatten_pattern(name, bytes, kind, &mut arena[scope_idx].bindings);
        }
    }
}

/// Flattens a binding pattern (identifier / object / array / assignment /
/// rest) into individual bindings. `{key: local}` binds `local`, not `key`.
fn flatten_pattern(node: Node, bytes: &[u8], kind: BindingKind, bindings: &mut Vec<Binding>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            bindings.push(Binding { name: text(node, bytes), kind, offset: node.start_byte() });
        }
        "object_pattern" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "pair_pattern" => {
                        if let Some(value) = child.child_by_field_name("value") {
                            flatten_pattern(value, bytes, kind, bindings);
                        }
                    }
                    "rest_pattern" => {
                        if let Some(inner) = child.named_child(0) {
                            flatten_pattern(inner, bytes, BindingKind::Destructured, bindings);
                        }
                    }
                    _ => flatten_pattern(child, bytes, kind, bindings),
                }
            }
        }
        "array_pattern" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                flatten_pattern(child, bytes, kind, bindings);
            }
        }
        "assignment_pattern" => {
            if let Some(left) = node.child_by_field_name("left") {
                flatten_pattern(left, bytes, kind, bindings);
            }
        }
        "rest_pattern" => {
            if let Some(inner) = node.named_child(0) {
                flatten_pattern(inner, bytes, kind, bindings);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                flatten_pattern(child, bytes, kind, bindings);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tree::{Dialect, parse};

    #[test]
    fn invariant4_containment() {
        let src = b"function outer(a){function inner(b){return a+b}return inner}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let idx = scopes.find_scope_at(50);
        let s = scopes.scope(idx);
        assert!(s.start <= 50 && 50 <= s.end);
    }

    #[test]
    fn destructured_param_binds_local_name() {
        let src = b"function f({key:local}){return local}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let fn_scope = scopes.scopes.iter().find(|s| s.kind == ScopeKind::Function).unwrap();
        assert!(fn_scope.bindings.iter().any(|b| b.name == "local"));
        assert!(!fn_scope.bindings.iter().any(|b| b.name == "key"));
    }

    #[test]
    fn catch_clause_own_scope() {
        let src = b"try{}catch(e){var x=1}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        assert!(scopes.scopes.iter().any(|s| s.kind == ScopeKind::Catch && s.bindings.iter().any(|b| b.name == "e")));
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;
    use crate::parser::tree::{Dialect, parse};

    fn nested_functions(depth: usize) -> String {
        let mut src = String::new();
        for i in 0..depth {
            src.push_str(&format!("function f{i}(a{i}){{"));
        }
        src.push_str("return 0;");
        for _ in 0..depth {
            src.push('}');
        }
        src
    }

    proptest! {
        /// Invariant 4, property form: whatever scope `find_scope_at` returns
        /// for any offset inside an arbitrarily deep nesting of functions
        /// actually contains that offset.
        #[test]
        fn containment_holds_for_arbitrary_depth_and_offset(depth in 1usize..12, offset_fraction in 0.0f64..1.0) {
            let src = nested_functions(depth);
            let bytes = src.as_bytes();
            let tree = parse(bytes, Dialect::JavaScript, 0).unwrap();
            let scopes = ScopeTree::build(&tree, bytes);

            let offset = ((bytes.len() - 1) as f64 * offset_fraction) as usize;
            let idx = scopes.find_scope_at(offset);
            let s = scopes.scope(idx);
            prop_assert!(s.start <= offset && offset <= s.end);
        }
    }
}
