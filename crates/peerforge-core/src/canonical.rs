//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! Signed manifests and patch changes are signed over these bytes, so two
//! peers must produce them identically. Decoding is strict: input that does
//! not re-encode to the exact same bytes is rejected.

use ciborium::value::{Integer, Value};

use crate::error::CoreError;

/// Integer-keyed map entry.
pub fn entry(key: u64, value: Value) -> (Value, Value) {
    (Value::Integer(key.into()), value)
}

pub fn uint(n: u64) -> Value {
    Value::Integer(n.into())
}

pub fn int(n: i64) -> Value {
    Value::Integer(n.into())
}

pub fn bytes(b: &[u8]) -> Value {
    Value::Bytes(b.to_vec())
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Encode a CBOR value to canonical bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Decode exactly one canonically-encoded CBOR value.
pub fn decode(data: &[u8]) -> Result<Value, CoreError> {
    let value: Value = ciborium::from_reader(data)
        .map_err(|e| CoreError::MalformedManifest(format!("cbor: {e}")))?;
    if encode(&value)? != data {
        return Err(CoreError::MalformedManifest(
            "non-canonical encoding or trailing bytes".into(),
        ));
    }
    Ok(value)
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::Encoding("floats are not canonical".into()));
        }
        _ => return Err(CoreError::Encoding("unsupported CBOR value".into())),
    }
    Ok(())
}

fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
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

/// Keys are sorted by their encoded bytes; duplicates are an error.
fn encode_map(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key = Vec::new();
        encode_value_to(&mut key, k)?;
        pairs.push((key, v));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(CoreError::Encoding("duplicate map key".into()));
    }

    encode_uint(buf, 5, pairs.len() as u64);
    for (key, value) in pairs {
        buf.extend_from_slice(&key);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

/// Typed access to an integer-keyed CBOR map.
pub struct Fields<'a> {
    what: &'static str,
    entries: &'a [(Value, Value)],
}

impl<'a> Fields<'a> {
    pub fn new(value: &'a Value, what: &'static str) -> Result<Self, CoreError> {
        match value {
            Value::Map(entries) => Ok(Self { what, entries }),
            _ => Err(CoreError::MalformedManifest(format!("{what}: expected map"))),
        }
    }

    fn malformed(&self, field: &str) -> CoreError {
        CoreError::MalformedManifest(format!("{}: invalid {field}", self.what))
    }

    pub fn get(&self, key: u64) -> Option<&'a Value> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
            .map(|(_, v)| v)
    }

    pub fn uint(&self, key: u64, field: &str) -> Result<u64, CoreError> {
        match self.get(key) {
            Some(Value::Integer(i)) => u64::try_from(*i).map_err(|_| self.malformed(field)),
            _ => Err(self.malformed(field)),
        }
    }

    pub fn int(&self, key: u64, field: &str) -> Result<i64, CoreError> {
        match self.get(key) {
            Some(Value::Integer(i)) => i64::try_from(*i).map_err(|_| self.malformed(field)),
            _ => Err(self.malformed(field)),
        }
    }

    pub fn bytes<const N: usize>(&self, key: u64, field: &str) -> Result<[u8; N], CoreError> {
        match self.get(key) {
            Some(Value::Bytes(b)) => b.as_slice().try_into().map_err(|_| self.malformed(field)),
            _ => Err(self.malformed(field)),
        }
    }

    /// An optional fixed-size byte string; absent and `null` both mean `None`.
    pub fn opt_bytes<const N: usize>(
        &self,
        key: u64,
        field: &str,
    ) -> Result<Option<[u8; N]>, CoreError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.bytes(key, field).map(Some),
        }
    }

    pub fn text(&self, key: u64, field: &str) -> Result<&'a str, CoreError> {
        match self.get(key) {
            Some(Value::Text(s)) => Ok(s.as_str()),
            _ => Err(self.malformed(field)),
        }
    }

    pub fn opt_text(&self, key: u64, field: &str) -> Result<Option<&'a str>, CoreError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.text(key, field).map(Some),
        }
    }

    pub fn map(&self, key: u64, field: &str) -> Result<&'a [(Value, Value)], CoreError> {
        match self.get(key) {
            Some(Value::Map(entries)) => Ok(entries.as_slice()),
            _ => Err(self.malformed(field)),
        }
    }
}
