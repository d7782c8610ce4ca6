//! C6 — uniqueness check, replacement preview, and code-context
//! verification for a textual patch. Never applies the replacement itself.

use indexmap::IndexMap;
use regex::Regex;

use crate::core::model::{PatchMatch, PatchPreview, PatchResult, PatchStatus, Warning};
use crate::core::state_machine::drive;
use crate::infra::errors::AnalyzerError;

const RESERVED_WORDS: &[&str] = &["var", "let", "for", "if", "of", "in", "do", "new"];

fn context_window(bytes: &[u8], start: usize, end: usize, radius: usize) -> (String, usize) {
    let lo = start.saturating_sub(radius);
    let hi = (end + radius).min(bytes.len());
    (String::from_utf8_lossy(&bytes[lo..hi]).into_owned(), lo)
}

struct RawMatch {
    offset: usize,
    text: String,
    captures: Vec<Option<String>>,
    named_captures: IndexMap<String, String>,
}

fn find_literal(bytes: &[u8], pattern: &str) -> Vec<RawMatch> {
    if pattern.is_empty() {
        return Vec::new();
    }
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    let mut start = 0usize;
    while let Some(pos) = text[start..].find(pattern) {
        let offset = start + pos;
        out.push(RawMatch { offset, text: pattern.to_string(), captures: Vec::new(), named_captures: IndexMap::new() });
        start = offset + pattern.len().max(1);
        if start > text.len() {
            break;
        }
    }
    out
}

fn find_regex(bytes: &[u8], pattern: &str) -> Result<Vec<RawMatch>, AnalyzerError> {
    let expanded = crate::core::search::expand_shorthand(pattern);
    let re = Regex::new(&expanded).map_err(|e| AnalyzerError::PatternInvalid(e.to_string()))?;
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    for caps in re.captures_iter(&text) {
        let m = caps.get(0).expect("whole match always present");
        let captures = (1..caps.len()).map(|i| caps.get(i).map(|c| c.as_str().to_string())).collect();
        let mut named_captures = IndexMap::new();
        for name in re.capture_names().flatten() {
            if let Some(c) = caps.name(name) {
                named_captures.insert(name.to_string(), c.as_str().to_string());
            }
        }
        out.push(RawMatch { offset: m.start(), text: m.as_str().to_string(), captures, named_captures });
    }
    Ok(out)
}

fn short_identifier_warning(pattern: &str) -> bool {
    let ident_re = Regex::new(r"\b[A-Za-z_$][A-Za-z0-9_$]*\b").unwrap();
    ident_re.find_iter(pattern).any(|m| {
        let word = m.as_str();
        word.len() <= 3 && !RESERVED_WORDS.contains(&word)
    })
}

fn non_code_context_warning(bytes: &[u8], offset: usize) -> bool {
    let start = offset.saturating_sub(50_000);
    let state = drive(&bytes[start..bytes.len()], Some(offset - start));
    !state.is_in_code()
}

fn expand_replacement(replacement: &str, captures: &[Option<String>], named: &IndexMap<String, String>) -> String {
    let numbered = Regex::new(r"\$(\d+)").unwrap();
    let named_re = Regex::new(r"\$\{(\w+)\}").unwrap();

    let after_numbered = numbered.replace_all(replacement, |caps: &regex::Captures| {
        let idx: usize = caps[1].parse().unwrap_or(0);
        captures.get(idx.wrapping_sub(1)).and_then(|c| c.clone()).unwrap_or_default()
    });

    named_re
        .replace_all(&after_numbered, |caps: &regex::Captures| named.get(&caps[1]).cloned().unwrap_or_default())
        .into_owned()
}

pub fn patch_check(
    bytes: &[u8],
    pattern: &str,
    is_regex: bool,
    replacement: Option<&str>,
    context_radius: usize,
    preview_radius: usize,
) -> Result<PatchResult, AnalyzerError> {
    let raw = if is_regex { find_regex(bytes, pattern)? } else { find_literal(bytes, pattern) };

    let status = match raw.len() {
        0 => PatchStatus::NotFound,
        1 => PatchStatus::Unique,
        _ => PatchStatus::Ambiguous,
    };

    let mut warnings = Vec::new();
    if short_identifier_warning(pattern) {
        warnings.push(Warning::ShortIdentifier);
    }

    let matches: Vec<PatchMatch> = raw
        .iter()
        .map(|m| {
            let (context, context_offset) = context_window(bytes, m.offset, m.offset + m.text.len(), context_radius);
            PatchMatch {
                offset: m.offset,
                match_text: m.text.clone(),
                context,
                context_offset,
                captures: if m.captures.is_empty() { None } else { Some(m.captures.clone()) },
                named_captures: if m.named_captures.is_empty() { None } else { Some(m.named_captures.clone()) },
            }
        })
        .collect();

    let mut preview = None;
    if status == PatchStatus::Unique {
        let unique = &raw[0];
        if non_code_context_warning(bytes, unique.offset) {
            warnings.push(Warning::NonCodeContext);
        }
        if let Some(replacement) = replacement {
            let before_lo = unique.offset.saturating_sub(preview_radius);
            let before_window = String::from_utf8_lossy(&bytes[before_lo..unique.offset]).into_owned();

            let expanded = expand_replacement(replacement, &unique.captures, &unique.named_captures);
            let match_end = unique.offset + unique.text.len();
            let after_hi = (match_end + preview_radius).min(bytes.len());
            let after_tail = String::from_utf8_lossy(&bytes[match_end..after_hi]).into_owned();

            preview = Some(PatchPreview { before_window, after_window: format!("{expanded}{after_tail}") });
        }
    }

    Ok(PatchResult { status, matches, warnings, preview })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_unique_and_ambiguous() {
        let r = patch_check(b"function foo(){return \"unique_string\"}", "unique_string", false, None, 200, 60).unwrap();
        assert_eq!(r.status, PatchStatus::Unique);
        assert_eq!(r.matches.len(), 1);

        let r = patch_check(b"var a=\"dup\";var b=\"dup\"", "dup", false, None, 200, 60).unwrap();
        assert_eq!(r.status, PatchStatus::Ambiguous);
        assert_eq!(r.matches.len(), 2);
    }

    #[test]
    fn invariant5_uniqueness_law() {
        let src = b"var x=\"only_once_xyz\"";
        let r = patch_check(src, "only_once_xyz", false, None, 200, 60).unwrap();
        assert_eq!(r.status, PatchStatus::Unique);
        let count = src
            .windows(b"only_once_xyz".len())
            .filter(|w| *w == b"only_once_xyz".as_slice())
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn short_identifier_flagged() {
        let r = patch_check(b"var ab=1", "ab", false, None, 200, 60).unwrap();
        assert!(r.warnings.contains(&Warning::ShortIdentifier));
    }

    #[test]
    fn reserved_words_not_flagged() {
        let r = patch_check(b"for(var i=0;;){}", "for", false, None, 200, 60).unwrap();
        assert!(!r.warnings.contains(&Warning::ShortIdentifier));
    }

    #[test]
    fn preview_windows_exclude_the_matched_text() {
        let r = patch_check(b"xxxxxAAAAAyyyyy", "AAAAA", false, Some("Z"), 200, 3).unwrap();
        let preview = r.preview.unwrap();
        assert_eq!(preview.before_window, "xxx");
        assert_eq!(preview.after_window, "Zyyy");
    }
}
