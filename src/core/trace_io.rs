//! C10 — classifies each writer call site near a channel by wire transport
//! (binary length-prefixed, JSON lines, plain JSON, text, or unknown) and
//! locates reader call sites independently via a fixed keyword table, then
//! flags the specific mismatch where a binary writer coexists with a
//! line-based reader.

use regex::Regex;

use crate::core::model::Warning;
use crate::core::search;

const WRITER_METHODS: &[&str] = &["postMessage", "send", "write", "emit", "publish"];
const READER_METHODS: &[&str] = &["createInterface", "on", "addEventListener", "subscribe", "onmessage"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTransport {
    /// `Buffer.alloc` + `writeUInt32LE`/`writeUInt32BE` — a length-prefixed binary frame.
    Binary,
    /// `JSON.stringify` with an adjacent newline — newline-delimited JSON.
    JsonLines,
    /// `JSON.stringify` with no adjacent newline marker.
    Json,
    /// A plain string-literal argument with no binary or JSON markers.
    Text,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTransport {
    /// `readUInt32LE`/`readUInt32BE` — a length-prefixed binary frame.
    Binary,
    /// `createInterface` or a `'line'` event handler — line-oriented reads.
    Lines,
    /// A `'data'` event handler with no line-oriented marker.
    Data,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct WriterSite {
    pub offset: usize,
    pub transport: WriteTransport,
    pub context: String,
}

#[derive(Debug, Clone)]
pub struct ReaderSite {
    pub offset: usize,
    pub transport: ReadTransport,
    pub context: String,
}

#[derive(Debug, Clone, Default)]
pub struct TraceIoResult {
    pub writers: Vec<WriterSite>,
    pub readers: Vec<ReaderSite>,
    pub warnings: Vec<Warning>,
}

fn call_shape_regexes(methods: &[&str]) -> Vec<Regex> {
    methods.iter().map(|m| Regex::new(&format!(r"{}\s*\(", regex::escape(m))).expect("static pattern")).collect()
}

fn any_call_shape(context: &str, regexes: &[Regex]) -> bool {
    regexes.iter().any(|re| re.is_match(context))
}

fn classify_write_transport(context: &str) -> WriteTransport {
    let has_binary = context.contains("Buffer.alloc")
        || context.contains("writeUInt32LE")
        || context.contains("writeUInt32BE");
    let has_json = context.contains("JSON.stringify");
    let has_newline = context.contains("\\n") || context.contains('\n');
    let has_string_literal = context.contains('"') || context.contains('\'') || context.contains('`');

    if has_binary {
        WriteTransport::Binary
    } else if has_json && has_newline {
        WriteTransport::JsonLines
    } else if has_json {
        WriteTransport::Json
    } else if has_string_literal {
        WriteTransport::Text
    } else {
        WriteTransport::Unknown
    }
}

fn classify_read_transport(context: &str) -> ReadTransport {
    let has_binary = context.contains("readUInt32LE") || context.contains("readUInt32BE");
    let has_lines = context.contains("createInterface") || context.contains("'line'") || context.contains("\"line\"");
    let has_data = context.contains("'data'") || context.contains("\"data\"");

    if has_binary {
        ReadTransport::Binary
    } else if has_lines {
        ReadTransport::Lines
    } else if has_data {
        ReadTransport::Data
    } else {
        ReadTransport::Unknown
    }
}

#[must_use]
pub fn trace_io(bytes: &[u8], channel_pattern: &str, window: usize) -> TraceIoResult {
    let matches = search::search_literal(bytes, channel_pattern, window);
    let mut result = TraceIoResult::default();

    let writer_res = call_shape_regexes(WRITER_METHODS);
    let reader_res = call_shape_regexes(READER_METHODS);

    for m in &matches {
        if any_call_shape(&m.context, &writer_res) {
            result.writers.push(WriterSite {
                offset: m.offset,
                transport: classify_write_transport(&m.context),
                context: m.context.clone(),
            });
        }
        if any_call_shape(&m.context, &reader_res) {
            result.readers.push(ReaderSite {
                offset: m.offset,
                transport: classify_read_transport(&m.context),
                context: m.context.clone(),
            });
        }
    }

    if result.writers.iter().any(|w| w.transport == WriteTransport::Binary)
        && result.readers.iter().any(|r| r.transport == ReadTransport::Lines)
    {
        result.warnings.push(Warning::ProtocolMismatch(format!(
            "channel \"{channel_pattern}\" has a binary length-prefixed writer but a line-based reader"
        )));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_binary_writer_site() {
        let src = b"var b=Buffer.alloc(4);b.writeUInt32LE(len,0);sock.write(CHANNEL,b)";
        let r = trace_io(src, "CHANNEL", 60);
        assert_eq!(r.writers.len(), 1);
        assert_eq!(r.writers[0].transport, WriteTransport::Binary);
    }

    #[test]
    fn classifies_json_lines_writer_site() {
        let src = br#"sock.write(CHANNEL,JSON.stringify(msg)+"\n")"#;
        let r = trace_io(src, "CHANNEL", 60);
        assert_eq!(r.writers.len(), 1);
        assert_eq!(r.writers[0].transport, WriteTransport::JsonLines);
    }

    #[test]
    fn classifies_plain_json_writer_site() {
        let src = b"sock.write(CHANNEL,JSON.stringify(msg))";
        let r = trace_io(src, "CHANNEL", 60);
        assert_eq!(r.writers[0].transport, WriteTransport::Json);
    }

    #[test]
    fn classifies_text_writer_site() {
        let src = b"sock.send(CHANNEL,\"hello\")";
        let r = trace_io(src, "CHANNEL", 60);
        assert_eq!(r.writers[0].transport, WriteTransport::Text);
    }

    #[test]
    fn classifies_line_reader_site() {
        let src = b"readline.createInterface({input:CHANNEL}).on('line',handler)";
        let r = trace_io(src, "CHANNEL", 60);
        assert_eq!(r.readers.len(), 1);
        assert_eq!(r.readers[0].transport, ReadTransport::Lines);
    }

    #[test]
    fn warns_when_binary_writer_meets_line_reader() {
        let src = b"var b=Buffer.alloc(4);b.writeUInt32LE(n,0);a.write(CHANNEL,b);readline.createInterface({input:CHANNEL}).on('line',h)";
        let r = trace_io(src, "CHANNEL", 80);
        assert!(r.warnings.iter().any(|w| matches!(w, Warning::ProtocolMismatch(_))));
    }

    #[test]
    fn no_warning_when_transports_agree() {
        let src = b"a.send(CHANNEL,JSON.stringify(m));b.on('data',CHANNEL)";
        let r = trace_io(src, "CHANNEL", 60);
        assert!(r.warnings.is_empty());
    }
}
