//! C5 — literal / regex / shorthand-expanded pattern search, grouped by
//! enclosing function.

use indexmap::IndexMap;
use regex::Regex;

use crate::core::boundary;
use crate::infra::errors::AnalyzerError;

/// `%V%` -> a minified identifier rune (word char or `$`), one or more.
/// `%S%` -> a double-quoted string with backslash-escapes.
/// Applied only before regex compilation; literal-mode search never expands
/// these (invariant 7).
#[must_use]
pub fn expand_shorthand(pattern: &str) -> String {
    pattern.replace("%V%", r"[\w$]+").replace("%S%", r#""(?:[^"\\]|\\.)*""#)
}

#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub offset: usize,
    pub matched_text: String,
    pub context: String,
    pub captures: Vec<Option<String>>,
    pub named_captures: IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct FunctionGroup {
    pub function_start: Option<usize>,
    pub function_signature: Option<String>,
    pub matches: Vec<SearchMatch>,
}

fn context_window(bytes: &[u8], start: usize, end: usize, radius: usize) -> String {
    let lo = start.saturating_sub(radius);
    let hi = (end + radius).min(bytes.len());
    String::from_utf8_lossy(&bytes[lo..hi]).into_owned()
}

pub fn search_literal(bytes: &[u8], pattern: &str, context_radius: usize) -> Vec<SearchMatch> {
    if pattern.is_empty() {
        return Vec::new();
    }
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    let mut start = 0usize;
    while let Some(pos) = text[start..].find(pattern) {
        let offset = start + pos;
        let end = offset + pattern.len();
        out.push(SearchMatch {
            offset,
            matched_text: pattern.to_string(),
            context: context_window(bytes, offset, end, context_radius),
            captures: Vec::new(),
            named_captures: IndexMap::new(),
        });
        start = end.max(offset + 1);
        if start > text.len() {
            break;
        }
    }
    out
}

pub fn search_regex(bytes: &[u8], raw_pattern: &str, context_radius: usize) -> Result<Vec<SearchMatch>, AnalyzerError> {
    let expanded = expand_shorthand(raw_pattern);
    let re = Regex::new(&expanded).map_err(|e| AnalyzerError::PatternInvalid(e.to_string()))?;
    let text = String::from_utf8_lossy(bytes);

    let mut out = Vec::new();
    for caps in re.captures_iter(&text) {
        let m = caps.get(0).expect("whole match always present");
        let mut captures = Vec::new();
        for i in 1..caps.len() {
            captures.push(caps.get(i).map(|c| c.as_str().to_string()));
        }
        let mut named_captures = IndexMap::new();
        for name in re.capture_names().flatten() {
            if let Some(c) = caps.name(name) {
                named_captures.insert(name.to_string(), c.as_str().to_string());
            }
        }
        out.push(SearchMatch {
            offset: m.start(),
            matched_text: m.as_str().to_string(),
            context: context_window(bytes, m.start(), m.end(), context_radius),
            captures,
            named_captures,
        });
    }
    Ok(out)
}

#[must_use]
pub fn filter_by_proximity(matches: Vec<SearchMatch>, target: usize, radius: usize) -> Vec<SearchMatch> {
    matches.into_iter().filter(|m| m.offset.abs_diff(target) <= radius).collect()
}

pub struct LimitedResult<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[must_use]
pub fn apply_limit<T>(mut items: Vec<T>, limit: Option<usize>) -> LimitedResult<T> {
    let total = items.len();
    if let Some(n) = limit {
        items.truncate(n);
    }
    LimitedResult { items, total }
}

/// Group matches by enclosing function (via C4), groups sorted by function
/// start; matches outside any function form a trailing module-scope group.
#[must_use]
pub fn group_by_function(bytes: &[u8], matches: Vec<SearchMatch>) -> Vec<FunctionGroup> {
    let mut grouped: indexmap::IndexMap<Option<usize>, FunctionGroup> = IndexMap::new();

    for m in matches {
        match boundary::enclosing_function(bytes, m.offset) {
            Ok(span) => {
                grouped
                    .entry(Some(span.sig_start))
                    .or_insert_with(|| FunctionGroup {
                        function_start: Some(span.sig_start),
                        function_signature: Some(span.signature_text.clone()),
                        matches: Vec::new(),
                    })
                    .matches
                    .push(m);
            }
            Err(_) => {
                grouped
                    .entry(None)
                    .or_insert_with(|| FunctionGroup { function_start: None, function_signature: None, matches: Vec::new() })
                    .matches
                    .push(m);
            }
        }
    }

    let mut groups: Vec<FunctionGroup> = grouped.into_values().collect();
    groups.sort_by_key(|g| g.function_start.unwrap_or(usize::MAX));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_never_expands_shorthand() {
        let hits = search_literal(b"a=%V%;b=1", "%V%", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matched_text, "%V%");
    }

    #[test]
    fn s5_named_group_capture() {
        let src = b"async function zO6(A,q){if((await A()).queuedCommands.length===0)return;}";
        let pattern = r"async function (%V%)\((%V%),(%V%)\)";
        let hits = search_regex(src, pattern, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].captures, vec![Some("zO6".into()), Some("A".into()), Some("q".into())]);
    }

    #[test]
    fn grouping_sorted_by_function_start() {
        let src = b"function a(){var x=1}function b(){var x=2}";
        let hits = search_literal(src, "var x", 5);
        let groups = group_by_function(src, hits);
        assert_eq!(groups.len(), 2);
        assert!(groups[0].function_start.unwrap() < groups[1].function_start.unwrap());
    }
}
