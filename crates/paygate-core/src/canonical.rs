//! Canonical CBOR encoding for signed statements.
//!
//! Statements are CBOR maps with small integer keys, encoded following
//! RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! The same statement always yields the same bytes, so a signature made by
//! a wallet can be re-verified by any service that rebuilds the statement.

/// A value inside a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    UInt(u64),
    Int(i64),
    Bytes(Vec<u8>),
    Text(String),
}

/// A deterministic, integer-keyed CBOR map under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    entries: Vec<(u64, Field)>,
}

impl Statement {
    /// Start an empty statement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unsigned integer field.
    pub fn uint(mut self, key: u64, value: u64) -> Self {
        self.entries.push((key, Field::UInt(value)));
        self
    }

    /// Add a signed integer field.
    pub fn int(mut self, key: u64, value: i64) -> Self {
        self.entries.push((key, Field::Int(value)));
        self
    }

    /// Add a byte string field.
    pub fn bytes(mut self, key: u64, value: impl AsRef<[u8]>) -> Self {
        self.entries.push((key, Field::Bytes(value.as_ref().to_vec())));
        self
    }

    /// Add a text field.
    pub fn text(mut self, key: u64, value: impl Into<String>) -> Self {
        self.entries.push((key, Field::Text(value.into())));
        self
    }

    /// Encode to canonical bytes.
    ///
    /// Duplicate keys keep the last value written.
    pub fn encode(&self) -> Vec<u8> {
        let mut entries: Vec<(Vec<u8>, &Field)> = Vec::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            let mut key_buf = Vec::new();
            encode_uint(&mut key_buf, 0, *key);
            match entries.iter_mut().find(|(k, _)| *k == key_buf) {
                Some(slot) => slot.1 = value,
                None => entries.push((key_buf, value)),
            }
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut buf = Vec::new();
        encode_uint(&mut buf, 5, entries.len() as u64);
        for (key_bytes, value) in entries {
            buf.extend_from_slice(&key_bytes);
            encode_field(&mut buf, value);
        }
        buf
    }
}

fn encode_field(buf: &mut Vec<u8>, field: &Field) {
    match field {
        Field::UInt(n) => encode_uint(buf, 0, *n),
        Field::Int(n) if *n >= 0 => encode_uint(buf, 0, *n as u64),
        // CBOR encodes -1 as 0, -2 as 1, etc.
        Field::Int(n) => encode_uint(buf, 1, (-1 - *n) as u64),
        Field::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Field::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}
