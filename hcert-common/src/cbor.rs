// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A small CBOR value model.
//!
//! COSE headers, CWT claims and the trust-list payloads all arrive as CBOR
//! maps with integer or text keys. Decoding them into one shared value model
//! keeps the projection code in the upper layers free of `minicbor` plumbing.
//!
//! The decoder is deliberately strict about unsupported CBOR features:
//! indefinite-length items are rejected. Tags on values are read and skipped,
//! so tagged timestamps and similar annotations do not break projection.

use std::collections::BTreeMap;

use minicbor::data::Type;
use minicbor::Decoder;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CborKey {
    /// Integer label (the most common key form in this domain).
    Int(i64),
    /// Text label.
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CborValue {
    Int(i64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<CborValue>),
    Map(BTreeMap<CborKey, CborValue>),
    Bool(bool),
    Null,
}

pub type CborMap = BTreeMap<CborKey, CborValue>;

impl CborValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CborValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CborValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CborValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[CborValue]> {
        match self {
            CborValue::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&CborMap> {
        match self {
            CborValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

/// Lookup helpers for maps keyed by integer or text labels.
pub trait CborMapExt {
    fn int_key(&self, key: i64) -> Option<&CborValue>;
    fn text_key(&self, key: &str) -> Option<&CborValue>;
}

impl CborMapExt for CborMap {
    fn int_key(&self, key: i64) -> Option<&CborValue> {
        self.get(&CborKey::Int(key))
    }

    fn text_key(&self, key: &str) -> Option<&CborValue> {
        self.get(&CborKey::Text(key.to_string()))
    }
}

/// Decode a single CBOR item into a [`CborValue`].
pub fn decode_value(dec: &mut Decoder<'_>) -> Result<CborValue, String> {
    match dec.datatype().map_err(|e| e.to_string())? {
        Type::Null => {
            dec.null().map_err(|e| e.to_string())?;
            Ok(CborValue::Null)
        }
        Type::Bool => {
            let b = dec.bool().map_err(|e| e.to_string())?;
            Ok(CborValue::Bool(b))
        }
        Type::Bytes => {
            let b = dec.bytes().map_err(|e| e.to_string())?;
            Ok(CborValue::Bytes(b.to_vec()))
        }
        Type::String => {
            let s = dec.str().map_err(|e| e.to_string())?;
            Ok(CborValue::Text(s.to_string()))
        }
        Type::I8
        | Type::I16
        | Type::I32
        | Type::I64
        | Type::Int
        | Type::U8
        | Type::U16
        | Type::U32
        | Type::U64 => {
            let i = dec.i64().map_err(|e| e.to_string())?;
            Ok(CborValue::Int(i))
        }
        Type::Tag => {
            // Tags (e.g. tag 1 on epoch timestamps) carry no information the
            // projection layer consumes.
            dec.tag().map_err(|e| e.to_string())?;
            decode_value(dec)
        }
        Type::Array => {
            let len = dec
                .array()
                .map_err(|e| format!("failed to read array: {e}"))?
                .ok_or_else(|| "indefinite-length arrays are not supported".to_string())?;
            let mut out = Vec::with_capacity(len as usize);
            for _ in 0..len {
                out.push(decode_value(dec)?);
            }
            Ok(CborValue::Array(out))
        }
        Type::Map => {
            let m = decode_map(dec)?;
            Ok(CborValue::Map(m))
        }
        other => Err(format!("unsupported CBOR value type: {other:?}")),
    }
}

/// Decode a CBOR map item into a [`CborMap`].
pub fn decode_map(dec: &mut Decoder<'_>) -> Result<CborMap, String> {
    let len = dec
        .map()
        .map_err(|e| format!("failed to read map: {e}"))?
        .ok_or_else(|| "indefinite-length maps are not supported".to_string())?;

    let mut map = BTreeMap::new();
    for _ in 0..len {
        let key = decode_key(dec)?;
        let value = decode_value(dec)?;
        map.insert(key, value);
    }

    Ok(map)
}

/// Decode a buffer that must contain exactly one CBOR map.
pub fn decode_map_bytes(bytes: &[u8]) -> Result<CborMap, String> {
    let mut dec = Decoder::new(bytes);

    // Empty input means empty map, matching the COSE convention for an empty
    // protected-header bstr.
    if bytes.is_empty() {
        return Ok(BTreeMap::new());
    }

    let map = decode_map(&mut dec)?;

    if dec.position() != bytes.len() {
        return Err("trailing bytes after CBOR map".to_string());
    }

    Ok(map)
}

fn decode_key(dec: &mut Decoder<'_>) -> Result<CborKey, String> {
    match dec.datatype().map_err(|e| e.to_string())? {
        Type::I8
        | Type::I16
        | Type::I32
        | Type::I64
        | Type::Int
        | Type::U8
        | Type::U16
        | Type::U32
        | Type::U64 => {
            let i = dec
                .i64()
                .map_err(|e| format!("failed to decode int map key: {e}"))?;
            Ok(CborKey::Int(i))
        }
        Type::String => {
            let s = dec
                .str()
                .map_err(|e| format!("failed to decode text map key: {e}"))?;
            Ok(CborKey::Text(s.to_string()))
        }
        other => Err(format!("unsupported map key type: {other:?}")),
    }
}
