//! Line tokenizer for mixed prose / NDJSON response streams.
//!
//! Backends emit newline-delimited JSON records, sometimes wrapped in SSE
//! `data:` framing, sometimes interleaved with plain prose, and sometimes
//! cut mid-record by the transport. The tokenizer turns appended text into
//! an ordered list of [`Token`]s:
//! - complete lines that parse as JSON objects become [`Token::Record`]
//! - everything else becomes [`Token::Prose`], in order
//! - a trailing line without a newline is held until more text arrives
//! - a line that is an *unterminated* JSON object is carried across line
//!   breaks until it completes (or proves invalid, at which point it is
//!   released as prose)

use serde_json::{Value, json};
use tracing::{debug, trace};

/// Upper bound for a carried, still-incomplete JSON record. Anything larger
/// is released as prose.
const MAX_CARRY_BYTES: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// One unit produced by the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A parsed JSON object, ready for classification.
    Record(Value),
    /// A line of non-JSON text (without its line terminator). An empty
    /// string is a paragraph break.
    Prose(String),
}

/// Tokens produced by one `push` or `finish` call, in stream order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBatch {
    pub tokens: Vec<Token>,
}

#[cfg(test)]
impl TokenBatch {
    /// Parsed records only.
    fn records(&self) -> impl Iterator<Item = &Value> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Record(v) => Some(v),
            Token::Prose(_) => None,
        })
    }

    /// Prose lines joined back together, one line per `\n`.
    fn prose(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            if let Token::Prose(line) = token {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// Outcome of trying to read one line as JSON.
#[derive(Debug)]
enum LineParse {
    /// One or more complete objects, concatenated without separators.
    Records(Vec<Value>),
    /// Looks like the start of a record but the input ended early.
    Incomplete,
    /// Not JSON (or not objects): prose.
    Invalid,
}

/// Parse a trimmed line as a sequence of JSON objects.
fn parse_line(text: &str) -> LineParse {
    if !(text.starts_with('{') || text.starts_with('[')) {
        return LineParse::Invalid;
    }

    let mut records = Vec::new();
    for item in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
        match item {
            Ok(Value::Object(map)) => records.push(Value::Object(map)),
            Ok(Value::Array(items)) if !items.is_empty() && items.iter().all(Value::is_object) => {
                records.extend(items);
            }
            Ok(_) => return LineParse::Invalid,
            Err(e) if e.is_eof() => return LineParse::Incomplete,
            Err(_) => return LineParse::Invalid,
        }
    }

    if records.is_empty() {
        LineParse::Invalid
    } else {
        LineParse::Records(records)
    }
}

/// `event: name`, `id: 42`, `retry: 3000`: an SSE field with a single-token
/// value. Prose such as `event: the launch went well` is left alone.
fn is_sse_field(text: &str) -> bool {
    ["event:", "id:", "retry:"].iter().any(|field| {
        text.strip_prefix(field)
            .map(|value| !value.trim().contains(char::is_whitespace))
            .unwrap_or(false)
    })
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Incremental tokenizer. One instance per stream.
#[derive(Debug, Default)]
pub struct ChunkTokenizer {
    /// Text after the last newline seen so far.
    pending: String,
    /// An unterminated JSON record spanning one or more complete lines.
    carry: Option<String>,
    /// Set once a `data:` line was seen; enables SSE field skipping.
    sse: bool,
    /// Set once any prose was emitted; blank lines only matter after that.
    prose_started: bool,
}

impl ChunkTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one raw chunk and return every token it completes.
    pub fn push(&mut self, chunk: &str) -> TokenBatch {
        let mut batch = TokenBatch::default();
        self.pending.push_str(chunk);

        let Some(last_newline) = self.pending.rfind('\n') else {
            trace!(held = self.pending.len(), "no complete line yet");
            return batch;
        };

        let complete: String = self.pending.drain(..=last_newline).collect();
        for line in complete.lines() {
            self.tokenize_line(line, &mut batch);
        }
        batch
    }

    /// Flush held text at end of stream. Incomplete records become prose
    /// rather than being dropped.
    pub fn finish(&mut self) -> TokenBatch {
        let mut batch = TokenBatch::default();

        let tail = std::mem::take(&mut self.pending);
        if !tail.trim().is_empty() {
            self.tokenize_line(&tail, &mut batch);
        }

        if let Some(carry) = self.carry.take() {
            debug!(len = carry.len(), "stream ended inside a record, keeping it as prose");
            self.emit_prose_block(&carry, &mut batch);
        }
        batch
    }

    /// Bytes currently held back waiting for more input.
    pub fn held_len(&self) -> usize {
        self.pending.len() + self.carry.as_ref().map_or(0, String::len)
    }

    fn tokenize_line(&mut self, line: &str, batch: &mut TokenBatch) {
        let line = line.trim_end_matches('\r');
        let Some((text, framed)) = self.strip_framing(line.trim(), batch) else {
            return;
        };

        if let Some(mut carry) = self.carry.take() {
            // A complete record on its own line wins over continuing the carry.
            if let LineParse::Records(records) = parse_line(text) {
                self.emit_prose_block(&carry, batch);
                self.emit_records(records, batch);
                return;
            }

            carry.push('\n');
            carry.push_str(text);
            match parse_line(&carry) {
                LineParse::Records(records) => {
                    trace!(len = carry.len(), "carried record completed");
                    self.emit_records(records, batch);
                }
                LineParse::Incomplete if carry.len() <= MAX_CARRY_BYTES => {
                    self.carry = Some(carry);
                }
                _ => {
                    debug!(len = carry.len(), "carried record never completed, releasing as prose");
                    self.emit_prose_block(&carry, batch);
                }
            }
            return;
        }

        if text.is_empty() {
            if self.prose_started {
                batch.tokens.push(Token::Prose(String::new()));
            }
            return;
        }

        match parse_line(text) {
            LineParse::Records(records) => self.emit_records(records, batch),
            LineParse::Incomplete => {
                trace!("line starts a record that is not finished yet");
                self.carry = Some(text.to_string());
            }
            LineParse::Invalid => {
                self.prose_started = true;
                let prose = if framed { text } else { line.trim_end() };
                batch.tokens.push(Token::Prose(prose.to_string()));
            }
        }
    }

    /// Handle SSE framing. Returns the text left to tokenize and whether a
    /// `data:` prefix was removed, or `None` if the line was consumed (field
    /// line, comment, or `[DONE]`).
    fn strip_framing<'a>(
        &mut self,
        text: &'a str,
        batch: &mut TokenBatch,
    ) -> Option<(&'a str, bool)> {
        if let Some(rest) = text.strip_prefix("data:") {
            self.sse = true;
            let rest = rest.trim();
            if rest == "[DONE]" {
                batch.tokens.push(Token::Record(json!({ "type": "done" })));
                return None;
            }
            if rest.is_empty() {
                return None;
            }
            return Some((rest, true));
        }

        if is_sse_field(text) || (self.sse && text.starts_with(':')) {
            return None;
        }
        Some((text, false))
    }

    fn emit_records(&mut self, records: Vec<Value>, batch: &mut TokenBatch) {
        batch.tokens.extend(records.into_iter().map(Token::Record));
    }

    fn emit_prose_block(&mut self, text: &str, batch: &mut TokenBatch) {
        self.prose_started = true;
        batch
            .tokens
            .extend(text.lines().map(|l| Token::Prose(l.trim_end().to_string())));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
