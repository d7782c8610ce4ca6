//! The embedded full-syntax parser boundary. Treated everywhere else as an
//! opaque collaborator returning a syntax tree whose every node carries a
//! byte span — exactly what spec.md calls "the external parser".

use tree_sitter::{Node, Parser, Tree};

use crate::infra::errors::AnalyzerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    JavaScript,
    TypeScript,
}

fn language_for(dialect: Dialect) -> tree_sitter::Language {
    match dialect {
        Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    }
}

/// Parse `bytes` and return the syntax tree. `base_offset` is subtracted from
/// every span on receipt, per spec.md §4.7's offset-normalization rule; some
/// tree parsers report spans relative to an accumulated base. tree-sitter's
/// spans are already absolute byte offsets into the buffer it was given, so
/// in practice `base_offset` is always `0` here — the parameter exists so the
/// normalization step named by the spec has a real call site.
pub fn parse(bytes: &[u8], dialect: Dialect, base_offset: usize) -> Result<Tree, AnalyzerError> {
    let _ = base_offset; // tree-sitter spans need no adjustment; see doc comment above.
    let mut parser = Parser::new();
    parser
        .set_language(&language_for(dialect))
        .map_err(|e| AnalyzerError::ParseFailed(e.to_string()))?;

    parser
        .parse(bytes, None)
        .filter(|t| !t.root_node().has_error())
        .ok_or_else(|| AnalyzerError::ParseFailed("syntax error in source".to_string()))
}

/// Parse, tolerating syntax errors in the tree (best-effort analyses that
/// only need byte spans, e.g. landmark enrichment fallbacks, may prefer this
/// over a hard failure).
pub fn parse_lossy(bytes: &[u8], dialect: Dialect) -> Result<Tree, AnalyzerError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language_for(dialect))
        .map_err(|e| AnalyzerError::ParseFailed(e.to_string()))?;
    parser.parse(bytes, None).ok_or_else(|| AnalyzerError::ParseFailed("parser produced no tree".to_string()))
}

pub const FUNCTION_LIKE_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "generator_function",
    "generator_function_declaration",
    "arrow_function",
    "method_definition",
];

#[must_use]
pub fn is_function_like(node: &Node) -> bool {
    FUNCTION_LIKE_KINDS.contains(&node.kind())
}

/// The smallest function-like node whose byte range contains `offset`.
#[must_use]
pub fn narrowest_function_like_node<'t>(tree: &'t Tree, offset: usize) -> Option<Node<'t>> {
    let mut best: Option<Node<'t>> = None;
    let mut cursor = tree.root_node().walk();
    visit(&mut cursor, offset, &mut best);
    best
}

fn visit<'t>(cursor: &mut tree_sitter::TreeCursor<'t>, offset: usize, best: &mut Option<Node<'t>>) {
    let node = cursor.node();
    if !(node.start_byte() <= offset && offset <= node.end_byte()) {
        return;
    }
    if is_function_like(&node) {
        let better = match best {
            Some(b) => (node.end_byte() - node.start_byte()) < (b.end_byte() - b.start_byte()),
            None => true,
        };
        if better {
            *best = Some(node);
        }
    }
    if cursor.goto_first_child() {
        loop {
            visit(cursor, offset, best);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_javascript() {
        let tree = parse(b"function f(a){return a}", Dialect::JavaScript, 0).unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn finds_narrowest_function() {
        let tree = parse(b"function outer(){function inner(){return 1}}", Dialect::JavaScript, 0).unwrap();
        let node = narrowest_function_like_node(&tree, 40).unwrap();
        assert_eq!(node.kind(), "function_declaration");
        assert!(node.start_byte() > 0);
    }
}
