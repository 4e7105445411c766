//! Scalar values accepted by [`Cache::store`](crate::Cache::store)

use std::fmt::{self, Write};

/// A value that can be written to the store
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// UTF-8 text, written as-is
    Text(String),
    /// Raw bytes, written verbatim
    Binary(Vec<u8>),
    /// Signed integer, written in decimal
    Integer(i64),
    /// Floating-point number, written in shortest round-trip decimal
    Float(f64),
}

impl Payload {
    /// Wire encoding of the value.
    ///
    /// Integral floats keep a trailing `.0` (`1.0`, not `1`) so the stored
    /// text reads back as a float, the way Redis clients write them.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Payload::Text(s) => s.as_bytes().to_vec(),
            Payload::Binary(b) => b.clone(),
            Payload::Integer(i) => i.to_string().into_bytes(),
            Payload::Float(f) => format_float(*f).into_bytes(),
        }
    }

    /// Human-readable literal used in call-history records: `'foo'`,
    /// `b'\x00'`, `42`, `3.14`
    pub fn repr(&self) -> String {
        match self {
            Payload::Text(s) => quote_text(s),
            Payload::Binary(b) => quote_bytes(b),
            Payload::Integer(i) => i.to_string(),
            Payload::Float(f) => format_float(*f),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Binary(value)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Payload::Binary(value.to_vec())
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Integer(value)
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Payload::Integer(i64::from(value))
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Float(value)
    }
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let mut s = value.to_string();
    if s.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        s.push_str(".0");
    }
    s
}

fn quote_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn quote_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push_str("b'");
    for &b in bytes {
        match b {
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", b);
            }
        }
    }
    out.push('\'');
    out
}
