//! C4 — finds enclosing function signatures, bodies, parameters, and the
//! nesting stack at a given byte offset, without a full parse.

use crate::core::model::{FunctionSpan, Mode, ParserState};
use crate::core::state_machine::advance;
use crate::infra::errors::AnalyzerError;

/// Locality bound: how far past the query offset the forward scan runs.
const SCAN_HORIZON: usize = 500_000;

struct Candidate {
    sig_start: usize,
    brace_close: usize,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// Look immediately before `function_kw_start` for a word-bounded `async `
/// prefix, returning the start offset to use as the signature start.
fn preceding_async(bytes: &[u8], function_kw_start: usize) -> Option<usize> {
    let mut ws_end = function_kw_start;
    while ws_end > 0 && bytes[ws_end - 1].is_ascii_whitespace() {
        ws_end -= 1;
    }
    if ws_end == function_kw_start || ws_end < 5 {
        return None;
    }
    if &bytes[ws_end - 5..ws_end] == b"async" && (ws_end == 5 || !is_ident_continue(bytes[ws_end - 6])) {
        return Some(ws_end - 5);
    }
    None
}

/// Scan backward from `arrow_pos` (the `=` of `=>`) for its parameter list —
/// either a parenthesized `(...)` group or a bare identifier — and extend the
/// start to include a preceding `async` up to 10 bytes earlier.
fn backward_arrow_params(bytes: &[u8], arrow_pos: usize) -> Option<usize> {
    let mut k = arrow_pos;
    while k > 0 && bytes[k - 1].is_ascii_whitespace() {
        k -= 1;
    }
    if k == 0 {
        return None;
    }

    let mut start = if bytes[k - 1] == b')' {
        let mut depth = 0i32;
        let mut idx = k - 1;
        loop {
            match bytes[idx] {
                b')' => depth += 1,
                b'(' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            if idx == 0 {
                return None;
            }
            idx -= 1;
        }
        idx
    } else if is_ident_continue(bytes[k - 1]) {
        let mut idx = k;
        while idx > 0 && is_ident_continue(bytes[idx - 1]) {
            idx -= 1;
        }
        idx
    } else {
        return None;
    };

    let look_from = start.saturating_sub(10);
    let before = &bytes[look_from..start];
    let trimmed_end = before.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(0, |p| p + 1);
    let trimmed = &before[..trimmed_end];
    if trimmed.len() >= 5 && &trimmed[trimmed.len() - 5..] == b"async" {
        let rel = trimmed.len() - 5;
        if rel == 0 || !is_ident_continue(trimmed[rel - 1]) {
            start = look_from + rel;
        }
    }

    Some(start)
}

fn scan_candidates(bytes: &[u8], target: usize) -> Result<Vec<Candidate>, AnalyzerError> {
    let horizon = bytes.len().min(target.saturating_add(SCAN_HORIZON));

    let mut state = ParserState::default();
    let mut prev_non_ws: Option<u8> = None;
    let mut stack: Vec<Option<usize>> = Vec::new();
    let mut pending_sig: Option<usize> = None;
    let mut candidates = Vec::new();
    let mut i = 0usize;

    while i < horizon {
        let ch = bytes[i];

        if state.is_in_code() {
            if is_ident_start(ch) {
                let start = i;
                let mut j = i;
                while j < horizon && is_ident_continue(bytes[j]) {
                    j += 1;
                }
                let word = &bytes[start..j];

                if word == b"function" {
                    pending_sig = Some(preceding_async(bytes, start).unwrap_or(start));
                } else if word == b"async" {
                    let mut k = j;
                    while k < horizon && bytes[k].is_ascii_whitespace() {
                        k += 1;
                    }
                    if k < horizon && is_ident_start(bytes[k]) {
                        let id_start = k;
                        let mut m = k;
                        while m < horizon && is_ident_continue(bytes[m]) {
                            m += 1;
                        }
                        if &bytes[id_start..m] != b"function" {
                            let mut p = m;
                            while p < horizon && bytes[p].is_ascii_whitespace() {
                                p += 1;
                            }
                            if p < horizon && bytes[p] == b'(' {
                                pending_sig = Some(start);
                            }
                        }
                    }
                }

                prev_non_ws = Some(bytes[j - 1]);
                i = j;
                continue;
            }

            if ch == b'=' && bytes.get(i + 1) == Some(&b'>') {
                if pending_sig.is_none() {
                    pending_sig = backward_arrow_params(bytes, i);
                }
                i += 2;
                prev_non_ws = Some(b'>');
                continue;
            }

            if ch == b'{' {
                stack.push(pending_sig.take());
                i += 1;
                prev_non_ws = Some(b'{');
                continue;
            }

            if ch == b'}' {
                if let Some(Some(sig_start)) = stack.pop() {
                    candidates.push(Candidate { sig_start, brace_close: i });
                }
                i += 1;
                prev_non_ws = Some(b'}');
                continue;
            }
        }

        let next_ch = bytes.get(i + 1).copied();
        let was_block_comment = state.mode == Mode::BlockComment;
        let new_state = advance(state, ch, next_ch, prev_non_ws);
        i += if was_block_comment && new_state.mode == Mode::Normal { 2 } else { 1 };
        state = new_state;
        if state.is_in_code() && !ch.is_ascii_whitespace() {
            prev_non_ws = Some(ch);
        }
    }

    if stack.iter().flatten().any(|&sig_start| sig_start <= target) {
        return Err(AnalyzerError::BoundaryScanExceeded { offset: target });
    }

    Ok(candidates)
}

fn split_top_level_commas(bytes: &[u8]) -> Vec<String> {
    let mut result = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'{' | b'[' | b'(' => depth += 1,
            b'}' | b']' | b')' => depth -= 1,
            b',' if depth == 0 => {
                let piece = String::from_utf8_lossy(&bytes[start..idx]).trim().to_string();
                if !piece.is_empty() {
                    result.push(piece);
                }
                start = idx + 1;
            }
            _ => {}
        }
    }
    let piece = String::from_utf8_lossy(&bytes[start..]).trim().to_string();
    if !piece.is_empty() {
        result.push(piece);
    }
    result
}

fn derive_full_span(bytes: &[u8], sig_start: usize) -> Result<FunctionSpan, AnalyzerError> {
    let len = bytes.len();
    let mut i = sig_start;
    while i < len && bytes[i] != b'(' {
        if bytes[i] == b'=' && bytes.get(i + 1) == Some(&b'>') {
            break;
        }
        i += 1;
    }

    let (param_end, params) = if i < len && bytes[i] == b'(' {
        let open_paren = i;
        let mut depth = 0i32;
        let mut j = i;
        loop {
            if j >= len {
                return Err(AnalyzerError::BoundaryScanExceeded { offset: sig_start });
            }
            match bytes[j] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        let params = split_top_level_commas(&bytes[open_paren + 1..j]);
        (j + 1, params)
    } else {
        let name = String::from_utf8_lossy(&bytes[sig_start..i]).trim().to_string();
        (i, if name.is_empty() { vec![] } else { vec![name] })
    };

    let mut k = param_end;
    while k < len && bytes[k].is_ascii_whitespace() {
        k += 1;
    }
    if k + 1 < len && bytes[k] == b'=' && bytes[k + 1] == b'>' {
        k += 2;
        while k < len && bytes[k].is_ascii_whitespace() {
            k += 1;
        }
    }
    if k >= len || bytes[k] != b'{' {
        return Err(AnalyzerError::BoundaryScanExceeded { offset: sig_start });
    }

    let body_open = k;
    let mut depth = 0i32;
    let mut m = body_open;
    loop {
        if m >= len {
            return Err(AnalyzerError::BoundaryScanExceeded { offset: sig_start });
        }
        match bytes[m] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        m += 1;
    }
    let body_end = m + 1;

    let signature_text = String::from_utf8_lossy(&bytes[sig_start..body_open]).trim_end().to_string();
    let param_count = params.len();

    Ok(FunctionSpan {
        sig_start,
        body_open_brace: body_open,
        body_end,
        signature_text,
        parameter_list: params,
        param_count,
    })
}

/// Every candidate whose span contains `target`, smallest span first (depth
/// 0 = tightest). Empty when `target` sits at module scope.
pub fn nesting_stack(bytes: &[u8], target: usize) -> Result<Vec<FunctionSpan>, AnalyzerError> {
    let mut containing: Vec<Candidate> = scan_candidates(bytes, target)?
        .into_iter()
        .filter(|c| c.sig_start <= target && target <= c.brace_close)
        .collect();
    containing.sort_by_key(|c| c.brace_close - c.sig_start);

    containing.into_iter().map(|c| derive_full_span(bytes, c.sig_start)).collect()
}

/// The smallest function containing `target` (depth 0 of [`nesting_stack`]).
pub fn enclosing_function(bytes: &[u8], target: usize) -> Result<FunctionSpan, AnalyzerError> {
    let stack = nesting_stack(bytes, target)?;
    stack.into_iter().next().ok_or(AnalyzerError::OffsetOutsideFunction { offset: target })
}

/// Select nesting-stack entry `depth` (0 = tightest).
pub fn at_depth(bytes: &[u8], target: usize, depth: usize) -> Result<FunctionSpan, AnalyzerError> {
    let stack = nesting_stack(bytes, target)?;
    stack.into_iter().nth(depth).ok_or(AnalyzerError::OffsetOutsideFunction { offset: target })
}

/// Tree-based fallback used when the state-machine scan fails: the narrowest
/// function-like node containing `target`, with a signature prefix but no
/// parsed parameter list (spec §4.4 Fallback).
pub fn enclosing_function_via_tree(
    tree: &tree_sitter::Tree,
    bytes: &[u8],
    target: usize,
) -> Result<FunctionSpan, AnalyzerError> {
    let node = crate::parser::tree::narrowest_function_like_node(tree, target)
        .ok_or(AnalyzerError::OffsetOutsideFunction { offset: target })?;

    let start = node.start_byte();
    let end = node.end_byte();
    let body_open = node
        .child_by_field_name("body")
        .map(|b| b.start_byte())
        .unwrap_or(end);
    let prefix_end = body_open.min(bytes.len());
    let signature_text = String::from_utf8_lossy(&bytes[start..prefix_end]).trim_end().to_string();

    Ok(FunctionSpan {
        sig_start: start,
        body_open_brace: body_open,
        body_end: end,
        signature_text,
        parameter_list: Vec::new(),
        param_count: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_nesting() {
        // function outer(){function inner(){return 1}}
        let src = b"function outer(){function inner(){return 1}}";
        let stack = nesting_stack(src, 35).unwrap();
        assert_eq!(stack.len(), 2);
        assert!(stack[0].signature_text.contains("inner"));
        assert!(stack[1].signature_text.contains("outer"));
        let span0 = stack[0].body_end - stack[0].sig_start;
        let span1 = stack[1].body_end - stack[1].sig_start;
        assert!(span0 < span1);
    }

    #[test]
    fn arrow_function_body() {
        let src = b"const f=(a,b)=>{return a+b};f(1,2)";
        let span = enclosing_function(src, 20).unwrap();
        assert_eq!(span.param_count, 2);
    }

    #[test]
    fn async_method_shorthand() {
        let src = b"const o={async run(x){return x}}";
        let span = enclosing_function(src, 25).unwrap();
        assert_eq!(span.param_count, 1);
    }

    #[test]
    fn offset_outside_any_function() {
        let src = b"var a=1;";
        assert!(enclosing_function(src, 3).is_err());
    }

    #[test]
    fn depth_selection() {
        let src = b"function outer(){function inner(){return 1}}";
        let d0 = at_depth(src, 35, 0).unwrap();
        let d1 = at_depth(src, 35, 1).unwrap();
        assert!(d0.signature_text.contains("inner"));
        assert!(d1.signature_text.contains("outer"));
    }
}
