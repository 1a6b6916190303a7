// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF object primitives and their byte-level serialisation (PDF 1.4 §3.2).

use std::collections::BTreeMap;

/// Indirect object number. Numbering starts at 1; 0 is the free-list head.
pub type ObjectNumber = u32;

/// A direct PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Boolean(bool),
    Integer(i64),
    /// Written with at most four decimals, trailing zeros trimmed.
    Real(f64),
    /// Name without the leading slash.
    Name(String),
    /// `( ... )` string; escaping is applied on output.
    LiteralString(Vec<u8>),
    /// `< ... >` string.
    HexString(Vec<u8>),
    Array(Vec<PdfValue>),
    Dictionary(PdfDict),
    /// `N 0 R`
    Reference(ObjectNumber),
}

impl PdfValue {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Append the serialised value to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Self::Null => out.extend_from_slice(b"null"),
            Self::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
            Self::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Self::Real(r) => out.extend_from_slice(format_real(*r).as_bytes()),
            Self::Name(name) => write_name(name, out),
            Self::LiteralString(bytes) => {
                out.push(b'(');
                out.extend_from_slice(&escape_literal(bytes));
                out.push(b')');
            }
            Self::HexString(bytes) => {
                out.push(b'<');
                for byte in bytes {
                    out.extend_from_slice(format!("{:02X}", byte).as_bytes());
                }
                out.push(b'>');
            }
            Self::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.write_to(out);
                }
                out.push(b']');
            }
            Self::Dictionary(dict) => dict.write_to(out),
            Self::Reference(number) => {
                out.extend_from_slice(format!("{} 0 R", number).as_bytes());
            }
        }
    }

    /// Serialise into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}

impl From<i64> for PdfValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for PdfValue {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for PdfValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<PdfDict> for PdfValue {
    fn from(value: PdfDict) -> Self {
        Self::Dictionary(value)
    }
}

/// Dictionary with keys kept in sorted order so output is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfDict {
    entries: BTreeMap<String, PdfValue>,
}

impl PdfDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PdfValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PdfValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PdfValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"<<");
        for (key, value) in &self.entries {
            out.push(b' ');
            write_name(key, out);
            out.push(b' ');
            value.write_to(out);
        }
        out.extend_from_slice(b" >>");
    }
}

/// Format a real number without exponent notation.
fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let text = format!("{:.4}", value);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Write `/Name`, hex-escaping delimiters, whitespace and non-printables.
fn write_name(name: &str, out: &mut Vec<u8>) {
    out.push(b'/');
    for &byte in name.as_bytes() {
        let regular = byte > b' '
            && byte < 0x7F
            && !matches!(
                byte,
                b'#' | b'/' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'%'
            );
        if regular {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        }
    }
}

/// Escape a literal string body: backslash and parentheses get a backslash,
/// control characters become three-digit octal escapes.
pub fn escape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'\\' | b'(' | b')' => {
                out.push(b'\\');
                out.push(byte);
            }
            0x00..=0x1F | 0x7F => {
                out.extend_from_slice(format!("\\{:03o}", byte).as_bytes());
            }
            _ => out.push(byte),
        }
    }
    out
}
