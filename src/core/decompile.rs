//! C11 — best-effort readability hints for a single function: candidate
//! renames for short identifiers, tried in priority order (destructured key,
//! camel-cased initializer description, property-access-derived suffix,
//! comparison-derived suffix), plus expansion of the `!0`/`!1`/`void 0`
//! boolean/undefined idioms minifiers emit.

use indexmap::IndexMap;
use regex::Regex;
use tree_sitter::{Node, Tree};

use crate::core::scope::ScopeTree;
use crate::infra::errors::AnalyzerError;
use crate::parser::tree::narrowest_function_like_node;

const SHORT_NAME_MAX_LEN: usize = 3;
const CONTEXT_RADIUS: usize = 40;
const IDIOMS: &[(&str, &str)] = &[("!0", "true"), ("!1", "false"), ("void 0", "undefined")];
const COMPARISON_OPERATORS: &[&str] = &["===", "!==", "==", "!="];

#[derive(Debug, Clone)]
pub struct RenameSuggestion {
    pub original: String,
    pub suggested: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone)]
pub struct IdiomExpansion {
    pub offset: usize,
    pub original: String,
    pub expansion: String,
}

#[derive(Debug, Clone, Default)]
pub struct DecompileHint {
    pub renames: Vec<RenameSuggestion>,
    pub idioms: Vec<IdiomExpansion>,
    pub confidence: f64,
}

fn text(node: Node, bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[node.start_byte()..node.end_byte()]).into_owned()
}

fn camel_case(words: &[&str]) -> String {
    let mut out = String::new();
    for (i, w) in words.iter().filter(|w| !w.is_empty()).enumerate() {
        let mut chars = w.chars();
        let Some(first) = chars.next() else { continue };
        if i == 0 {
            out.extend(first.to_lowercase());
        } else {
            out.extend(first.to_uppercase());
        }
        out.push_str(chars.as_str());
    }
    out
}

fn sanitize_to_ident(raw: &str) -> String {
    let words: Vec<&str> = raw.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()).collect();
    camel_case(&words)
}

fn find_first<'a>(node: Node<'a>, pred: &mut impl FnMut(Node<'a>) -> bool) -> Option<Node<'a>> {
    if pred(node) {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = find_first(child, pred) {
            return Some(found);
        }
    }
    None
}

/// Priority 1: the original object key a short local name was destructured
/// from, e.g. `{message: e}` suggests renaming `e` back to `message`.
fn destructured_key(node: Node, bytes: &[u8], name: &str) -> Option<String> {
    let found = find_first(node, &mut |n| {
        n.kind() == "pair_pattern"
            && n.child_by_field_name("value").is_some_and(|v| v.kind() == "identifier" && text(v, bytes) == name)
    })?;
    found.child_by_field_name("key").map(|k| text(k, bytes))
}

/// Priority 2: a camel-cased description derived from the declaration's
/// initializer expression — the called function/constructor name.
fn initializer_description(node: Node, bytes: &[u8], name: &str) -> Option<String> {
    let declarator = find_first(node, &mut |n| {
        n.kind() == "variable_declarator"
            && n.child_by_field_name("name").is_some_and(|d| d.kind() == "identifier" && text(d, bytes) == name)
    })?;
    let init = declarator.child_by_field_name("value")?;

    match init.kind() {
        "call_expression" => {
            let callee = init.child_by_field_name("function")?;
            match callee.kind() {
                "member_expression" => {
                    let object = callee.child_by_field_name("object")?;
                    let property = callee.child_by_field_name("property")?;
                    Some(camel_case(&[&text(object, bytes), &text(property, bytes), "result"]))
                }
                "identifier" => Some(camel_case(&[&text(callee, bytes), "result"])),
                _ => None,
            }
        }
        "new_expression" => {
            let ctor = init.child_by_field_name("constructor")?;
            Some(camel_case(&[&text(ctor, bytes)]))
        }
        _ => None,
    }
}

/// Priority 3: the first property a short name is accessed through, e.g.
/// `e.message` suggests the suffix `message`.
fn property_access_suffix(node: Node, bytes: &[u8], name: &str) -> Option<String> {
    let found = find_first(node, &mut |n| {
        n.kind() == "member_expression"
            && n.child_by_field_name("object").is_some_and(|o| o.kind() == "identifier" && text(o, bytes) == name)
    })?;
    found.child_by_field_name("property").map(|p| text(p, bytes))
}

/// Priority 4: a string literal or `typeof` target the name is compared
/// against, e.g. `typeof cb === "function"` suggests the suffix `function`.
fn comparison_derived_suffix(node: Node, bytes: &[u8], name: &str) -> Option<String> {
    let is_name_side = |n: Node| -> bool {
        match n.kind() {
            "identifier" => text(n, bytes) == name,
            "unary_expression" => n
                .child_by_field_name("operator")
                .map(|o| text(o, bytes) == "typeof")
                .unwrap_or(false)
                && n.child_by_field_name("argument").is_some_and(|a| a.kind() == "identifier" && text(a, bytes) == name),
            _ => false,
        }
    };

    let found = find_first(node, &mut |n| {
        n.kind() == "binary_expression"
            && n.child_by_field_name("operator").is_some_and(|o| COMPARISON_OPERATORS.contains(&text(o, bytes).as_str()))
            && (n.child_by_field_name("left").is_some_and(is_name_side)
                || n.child_by_field_name("right").is_some_and(is_name_side))
    })?;

    let left = found.child_by_field_name("left")?;
    let right = found.child_by_field_name("right")?;
    let literal_side = if is_name_side(left) { right } else { left };
    if literal_side.kind() == "string" {
        Some(sanitize_to_ident(&text(literal_side, bytes)))
    } else {
        None
    }
}

fn suggest_name(node: Node, bytes: &[u8], name: &str) -> Option<String> {
    destructured_key(node, bytes, name)
        .or_else(|| initializer_description(node, bytes, name))
        .or_else(|| property_access_suffix(node, bytes, name))
        .or_else(|| comparison_derived_suffix(node, bytes, name))
}

fn usage_contexts(bytes: &[u8], start: usize, end: usize, name: &str) -> Vec<String> {
    let Ok(re) = Regex::new(&format!(r"\b{}\b", regex::escape(name))) else { return Vec::new() };
    let text = String::from_utf8_lossy(&bytes[start..end]);
    re.find_iter(&text)
        .map(|m| {
            let lo = m.start().saturating_sub(CONTEXT_RADIUS);
            let hi = (m.end() + CONTEXT_RADIUS).min(text.len());
            text[lo..hi].to_string()
        })
        .collect()
}

fn expand_idioms(bytes: &[u8], start: usize, end: usize) -> Vec<IdiomExpansion> {
    let text = String::from_utf8_lossy(&bytes[start..end]);
    let mut out = Vec::new();
    for (pattern, expansion) in IDIOMS {
        let mut cursor = 0usize;
        while let Some(pos) = text[cursor..].find(pattern) {
            let offset = start + cursor + pos;
            out.push(IdiomExpansion { offset, original: (*pattern).to_string(), expansion: (*expansion).to_string() });
            cursor += pos + pattern.len();
        }
    }
    out.sort_by_key(|e| e.offset);
    out
}

pub fn decompile(tree: &Tree, scopes: &ScopeTree, bytes: &[u8], offset: usize) -> Result<DecompileHint, AnalyzerError> {
    let node =
        narrowest_function_like_node(tree, offset).ok_or(AnalyzerError::OffsetOutsideFunction { offset })?;
    let (start, end) = (node.start_byte(), node.end_byte());

    let mut seen: IndexMap<String, usize> = IndexMap::new();
    for scope in scopes.scopes.iter().filter(|s| s.start >= start && s.end <= end) {
        for binding in &scope.bindings {
            if binding.name.chars().count() <= SHORT_NAME_MAX_LEN {
                *seen.entry(binding.name.clone()).or_insert(0) += 1;
            }
        }
    }

    let mut renames = Vec::new();
    let mut annotated = 0usize;
    for name in seen.keys() {
        let contexts = usage_contexts(bytes, start, end, name);
        if let Some(suggested) = suggest_name(node, bytes, name) {
            annotated += 1;
            renames.push(RenameSuggestion { original: name.clone(), suggested, occurrences: contexts.len() });
        }
    }

    let confidence = if seen.is_empty() { 1.0 } else { annotated as f64 / seen.len() as f64 };
    let idioms = expand_idioms(bytes, start, end);

    Ok(DecompileHint { renames, idioms, confidence })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tree::{Dialect, parse};

    #[test]
    fn destructured_key_takes_priority() {
        let src = b"function f({message:e}){console.log(e)}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let hint = decompile(&tree, &scopes, src, 5).unwrap();
        assert!(hint.renames.iter().any(|r| r.original == "e" && r.suggested == "message"));
    }

    #[test]
    fn initializer_description_used_when_not_destructured() {
        let src = b"function f(){var e=JSON.parse(raw);return e}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let hint = decompile(&tree, &scopes, src, 5).unwrap();
        let r = hint.renames.iter().find(|r| r.original == "e").unwrap();
        assert_eq!(r.suggested, "jSONParseResult");
    }

    #[test]
    fn property_access_suffix_used_as_fallback() {
        let src = b"function f(e){return e.message}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let hint = decompile(&tree, &scopes, src, 5).unwrap();
        assert!(hint.renames.iter().any(|r| r.original == "e" && r.suggested == "message"));
    }

    #[test]
    fn comparison_derived_suffix_used_as_last_resort() {
        let src = b"function f(cb){return typeof cb===\"function\"}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let hint = decompile(&tree, &scopes, src, 5).unwrap();
        assert!(hint.renames.iter().any(|r| r.original == "cb" && r.suggested == "function"));
    }

    #[test]
    fn idioms_expanded() {
        let src = b"function f(a){return a?!0:!1}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let hint = decompile(&tree, &scopes, src, 5).unwrap();
        assert_eq!(hint.idioms.len(), 2);
        assert_eq!(hint.idioms[0].expansion, "true");
        assert_eq!(hint.idioms[1].expansion, "false");
    }

    #[test]
    fn confidence_is_vacuously_full_with_no_short_identifiers() {
        let src = b"function longName(longParam){return longParam}";
        let tree = parse(src, Dialect::JavaScript, 0).unwrap();
        let scopes = ScopeTree::build(&tree, src);
        let hint = decompile(&tree, &scopes, src, 5).unwrap();
        assert_eq!(hint.confidence, 1.0);
    }
}
