//! C2 — reformats a one-line source buffer into indented lines, emitting a
//! line -> original-byte-offset map for later navigation.

use crate::core::model::{Mode, ParserState};
use crate::core::state_machine::advance;

const INDENT_UNIT: &str = "  ";

pub struct Beautified {
    pub text: String,
    /// `line_to_offset[i]` is the byte offset in the original buffer of the
    /// first character copied into beautified line `i` (0-based).
    pub line_to_offset: Vec<usize>,
}

struct LineBuilder {
    buf: Vec<u8>,
    first_offset: Option<usize>,
    indent: usize,
}

impl LineBuilder {
    fn new(indent: usize) -> Self {
        Self { buf: Vec::new(), first_offset: None, indent }
    }

    /// Appends the raw byte as-is — source bytes are never reinterpreted as
    /// Latin-1 codepoints, so multi-byte UTF-8 sequences stay intact.
    fn push(&mut self, ch: u8, offset: usize) {
        if self.first_offset.is_none() {
            self.first_offset = Some(offset);
        }
        self.buf.push(ch);
    }
}

pub fn beautify(bytes: &[u8]) -> Beautified {
    let mut lines: Vec<Vec<u8>> = Vec::new();
    let mut line_to_offset = Vec::new();
    let mut line = LineBuilder::new(0);
    let mut indent = 0usize;
    let mut state = ParserState::default();
    let mut prev_non_ws: Option<u8> = None;

    let mut flush =
        |line: &mut LineBuilder, lines: &mut Vec<Vec<u8>>, offsets: &mut Vec<usize>, next_indent: usize| {
            if let Some(off) = line.first_offset {
                let mut out = Vec::with_capacity(line.indent * INDENT_UNIT.len() + line.buf.len());
                for _ in 0..line.indent {
                    out.extend_from_slice(INDENT_UNIT.as_bytes());
                }
                out.extend_from_slice(&line.buf);
                lines.push(out);
                offsets.push(off);
            }
            *line = LineBuilder::new(next_indent);
        };

    let mut i = 0usize;
    while i < bytes.len() {
        let ch = bytes[i];
        let next_ch = bytes.get(i + 1).copied();
        let was_mode = state.mode;
        let was_block_comment = was_mode == Mode::BlockComment;

        let new_state = advance(state, ch, next_ch, prev_non_ws);

        if was_mode == Mode::Normal {
            match ch {
                b'{' => {
                    line.push(ch, i);
                    indent += 1;
                    flush(&mut line, &mut lines, &mut line_to_offset, indent);
                }
                b'}' => {
                    flush(&mut line, &mut lines, &mut line_to_offset, indent);
                    indent = indent.saturating_sub(1);
                    let mut closing = LineBuilder::new(indent);
                    closing.push(ch, i);
                    flush(&mut closing, &mut lines, &mut line_to_offset, indent);
                    line = LineBuilder::new(indent);
                }
                b';' => {
                    line.push(ch, i);
                    flush(&mut line, &mut lines, &mut line_to_offset, indent);
                }
                b'\n' => {
                    flush(&mut line, &mut lines, &mut line_to_offset, indent);
                }
                _ => line.push(ch, i),
            }
        } else {
            line.push(ch, i);
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

    flush(&mut line, &mut lines, &mut line_to_offset, indent);

    let mut out = Vec::new();
    for (i, l) in lines.iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        out.extend_from_slice(l);
    }
    if !lines.is_empty() {
        out.push(b'\n');
    }

    Beautified { text: String::from_utf8_lossy(&out).into_owned(), line_to_offset }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_simple_statements() {
        let b = beautify(b"a=1;b=2;c=3");
        let got: Vec<&str> = b.text.lines().collect();
        assert_eq!(got, vec!["a=1;", "b=2;", "c=3"]);
        assert_eq!(b.line_to_offset, vec![0, 4, 8]);
    }

    #[test]
    fn braces_indent_and_close_on_own_line() {
        let b = beautify(b"if(x){a=1}");
        let got: Vec<&str> = b.text.lines().collect();
        assert_eq!(got, vec!["if(x){", "  a=1", "}"]);
    }

    #[test]
    fn strings_copied_verbatim_no_formatting_inside() {
        let b = beautify(b"a=\"x;{}y\";b=1");
        let got: Vec<&str> = b.text.lines().collect();
        assert_eq!(got, vec!["a=\"x;{}y\";", "b=1"]);
    }

    #[test]
    fn blank_lines_dropped() {
        let b = beautify(b"a=1;\n\nb=2");
        let got: Vec<&str> = b.text.lines().collect();
        assert_eq!(got, vec!["a=1;", "b=2"]);
    }

    #[test]
    fn multibyte_utf8_string_content_preserved() {
        let src = "a=\"caf\u{e9}\u{1f600}\";b=1".as_bytes();
        let b = beautify(src);
        let got: Vec<&str> = b.text.lines().collect();
        assert_eq!(got, vec!["a=\"caf\u{e9}\u{1f600}\";", "b=1"]);
    }
}
