//! XML response bodies.
//!
//! Provider schemas are small and fixed, so bodies are assembled with plain
//! `format!` templates in each provider module. This module holds the shared
//! pieces: entity escaping, code-point truncation and the [`XmlResponse`]
//! handed to the HTTP transport.

use std::fmt;

/// Content type of every provider response body.
pub const CONTENT_TYPE: &str = "text/xml";

/// Escapes `&`, `<`, `>`, `"` and `'` as HTML entities.
#[must_use]
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Keeps at most `max_chars` Unicode code points of `value`.
#[must_use]
pub fn truncate(value: &str, max_chars: usize) -> &str {
    value
        .char_indices()
        .nth(max_chars)
        .map_or(value, |(end, _)| &value[..end])
}

/// Truncates the raw value to the field length, then escapes it.
///
/// Length limits in provider schemas count characters of the original text,
/// so truncation happens before escaping expands it.
#[must_use]
pub fn clean(value: &str, max_chars: Option<usize>) -> String {
    match max_chars {
        Some(max) => escape(truncate(value, max)),
        None => escape(value),
    }
}

/// A rendered provider response, ready for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlResponse {
    body: String,
}

impl XmlResponse {
    /// HTTP status the transport should send.
    pub const STATUS: u16 = 200;

    /// Wraps a rendered body.
    #[must_use]
    pub const fn new(body: String) -> Self {
        Self { body }
    }

    /// The XML body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consumes the response, returning the body.
    #[must_use]
    pub fn into_body(self) -> String {
        self.body
    }

    /// Content type header value.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        Self::STATUS
    }
}

impl fmt::Display for XmlResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}
