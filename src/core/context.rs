//! The one-shot `context` command: enclosing function, nearby string
//! landmarks, and a beautified window around an offset with the line of
//! interest marked.

use crate::core::model::{FunctionSpan, StringLiteral};
use crate::core::{beautify, boundary, landmarks};
use crate::infra::errors::AnalyzerError;

const WINDOW_RADIUS: usize = 200;
const MARKER: &str = ">>> ";

#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub enclosing_function: Option<FunctionSpan>,
    pub nearby_strings: Vec<StringLiteral>,
    pub window: String,
    pub window_offset: usize,
}

pub fn build_context(bytes: &[u8], offset: usize) -> Result<ContextSnapshot, AnalyzerError> {
    if offset > bytes.len() {
        return Err(AnalyzerError::InvalidInput(format!("offset {offset} is past end of buffer")));
    }

    let enclosing_function = boundary::enclosing_function(bytes, offset).ok();

    let all_landmarks = landmarks::scan(bytes);
    let nearby_strings = landmarks::filter_by_proximity(all_landmarks, offset, landmarks::DEFAULT_RADIUS);

    let lo = offset.saturating_sub(WINDOW_RADIUS);
    let hi = (offset + WINDOW_RADIUS).min(bytes.len());
    let relative_offset = offset - lo;
    let beautified = beautify::beautify(&bytes[lo..hi]);

    let marker_line = beautified.line_to_offset.iter().rposition(|&o| o <= relative_offset).unwrap_or(0);

    let mut window = String::new();
    for (i, line) in beautified.text.lines().enumerate() {
        if i == marker_line {
            window.push_str(MARKER);
        }
        window.push_str(line);
        window.push('\n');
    }

    Ok(ContextSnapshot { enclosing_function, nearby_strings, window, window_offset: lo })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_the_line_containing_the_offset() {
        let src = b"function f(a){var x=\"needle\";return a+x}";
        let offset = src.iter().position(|&b| b == b'n').unwrap();
        let snapshot = build_context(src, offset).unwrap();
        assert!(snapshot.window.contains(MARKER));
        assert!(snapshot.enclosing_function.is_some());
    }

    #[test]
    fn collects_nearby_landmarks() {
        let src = b"function f(){var x=\"close_by\";return x}";
        let snapshot = build_context(src, 5).unwrap();
        assert!(snapshot.nearby_strings.iter().any(|s| s.content == "close_by"));
    }

    #[test]
    fn rejects_out_of_bounds_offset() {
        let src = b"var a=1";
        assert!(build_context(src, 999).is_err());
    }
}
