//! C3 — enumerates string/template literals as navigation landmarks, with
//! substring and proximity queries.

use crate::core::boundary;
use crate::core::model::{Mode, ParserState, StringLiteral};
use crate::core::state_machine::advance;

pub const DEFAULT_RADIUS: usize = 5_000;
/// Enclosing-function enrichment is only attempted below this result count.
const ENRICHMENT_CAP: usize = 500;

/// Single streaming pass over `bytes` collecting every string/template
/// landmark. Template literals containing `${` are discarded.
pub fn scan(bytes: &[u8]) -> Vec<StringLiteral> {
    let mut out = Vec::new();
    let mut state = ParserState::default();
    let mut prev_non_ws: Option<u8> = None;
    let mut open: Option<usize> = None;
    let mut i = 0usize;

    while i < bytes.len() {
        let ch = bytes[i];
        let next_ch = bytes.get(i + 1).copied();
        let was_mode = state.mode;
        let was_block_comment = was_mode == Mode::BlockComment;

        if was_mode == Mode::Normal
            && matches!(ch, b'\'' | b'"' | b'`')
        {
            open = Some(i);
        }

        let new_state = advance(state, ch, next_ch, prev_non_ws);

        if was_mode != Mode::Normal
            && new_state.mode == Mode::Normal
            && matches!(was_mode, Mode::StringSingle | Mode::StringDouble | Mode::Template)
        {
            if let Some(start) = open.take() {
                let content_bytes = &bytes[start + 1..i];
                let content = String::from_utf8_lossy(content_bytes).into_owned();
                let is_template = was_mode == Mode::Template;
                if !(is_template && content.contains("${")) {
                    out.push(StringLiteral {
                        length: content.len(),
                        content,
                        offset: start,
                        enclosing_function_name: None,
                    });
                }
            }
        }

        if was_block_comment && new_state.mode == Mode::Normal {
            i += 2;
        } else {
            i += 1;
        }

        state = new_state;
        if state.is_in_code() && !ch.is_ascii_whitespace() {
            prev_non_ws = Some(ch);
        }
    }

    out
}

#[must_use]
pub fn filter_by_substring(landmarks: Vec<StringLiteral>, needle: &str) -> Vec<StringLiteral> {
    landmarks.into_iter().filter(|l| l.content.contains(needle)).collect()
}

#[must_use]
pub fn filter_by_proximity(landmarks: Vec<StringLiteral>, target: usize, radius: usize) -> Vec<StringLiteral> {
    landmarks
        .into_iter()
        .filter(|l| l.offset.abs_diff(target) <= radius)
        .collect()
}

/// Attach the enclosing function's name to each landmark, capped to keep
/// giant-bundle queries fast.
pub fn enrich_with_enclosing_function(bytes: &[u8], mut landmarks: Vec<StringLiteral>) -> Vec<StringLiteral> {
    if landmarks.len() > ENRICHMENT_CAP {
        return landmarks;
    }
    for l in &mut landmarks {
        if let Ok(span) = boundary::enclosing_function(bytes, l.offset) {
            l.enclosing_function_name = Some(signature_name(&span.signature_text));
        }
    }
    landmarks
}

fn signature_name(sig: &str) -> String {
    sig.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_plain_strings() {
        let lm = scan(br#"a='x';b="y""#);
        assert_eq!(lm.len(), 2);
        assert_eq!(lm[0].content, "x");
        assert_eq!(lm[1].content, "y");
    }

    #[test]
    fn template_with_interpolation_excluded() {
        let lm = scan(b"a=`hi ${name}`;b=`plain`");
        assert_eq!(lm.len(), 1);
        assert_eq!(lm[0].content, "plain");
    }

    #[test]
    fn proximity_filter() {
        let lm = scan(br#"a='near';b='far'"#);
        let filtered = filter_by_proximity(lm, 0, 5);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].content, "near");
    }
}
