// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! COSE_Sign1 parsing (RFC 9052).
//!
//! On the wire a COSE_Sign1 is a four-tuple, optionally wrapped in CBOR
//! tag 18:
//!
//! ```text
//! [ protected : bstr .cbor header_map,
//!   unprotected : header_map,
//!   payload : bstr / nil,
//!   signature : bstr ]
//! ```
//!
//! The grammar leaves no room for leniency, and the parser takes none:
//! a foreign tag, a tuple of the wrong arity, indefinite-length items and
//! trailing garbage are all hard errors. The one extension is the payload
//! slot: health-certificate issuers in the wild emit the CWT either as a
//! bstr or as a bare CBOR map, so a map is accepted there and its encoded
//! bytes become the payload.

use minicbor::data::{Tag, Type};
use minicbor::{Decoder, Encoder};

use crate::cbor::{decode_map, decode_map_bytes, CborMap, CborMapExt, CborValue};

/// CBOR tag number assigned to COSE_Sign1.
pub const COSE_SIGN1_TAG: u64 = 18;

/// COSE header label for the signature algorithm.
pub const HEADER_ALG: i64 = 1;

/// COSE header label for the key identifier.
pub const HEADER_KID: i64 = 4;

/// Context string that opens every COSE_Sign1 Sig_structure.
const SIGNATURE1_CONTEXT: &str = "Signature1";

/// A decoded COSE header map.
///
/// A protected map also remembers the bstr contents it was decoded from:
/// those exact bytes are what the signature covers, and re-encoding the
/// decoded entries is not guaranteed to reproduce them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CoseHeaderMap {
    raw_cbor: Vec<u8>,
    entries: CborMap,
}

impl CoseHeaderMap {
    fn protected(raw_cbor: Vec<u8>, entries: CborMap) -> Self {
        Self { raw_cbor, entries }
    }

    fn unprotected(entries: CborMap) -> Self {
        Self {
            raw_cbor: Vec::new(),
            entries,
        }
    }

    /// The bstr contents this map was decoded from. Empty for unprotected
    /// maps, which are never signed.
    pub fn raw_cbor(&self) -> &[u8] {
        &self.raw_cbor
    }

    pub fn get_i64(&self, label: i64) -> Option<i64> {
        self.entries.int_key(label).and_then(CborValue::as_i64)
    }

    pub fn get_bytes(&self, label: i64) -> Option<&[u8]> {
        self.entries.int_key(label).and_then(CborValue::as_bytes)
    }

    pub fn entries(&self) -> &CborMap {
        &self.entries
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedCoseSign1 {
    pub protected_headers: CoseHeaderMap,
    pub unprotected_headers: CoseHeaderMap,
    /// Embedded payload bytes; `None` for a detached (`nil`) payload.
    pub payload: Option<Vec<u8>>,
    pub signature: Vec<u8>,
}

impl ParsedCoseSign1 {
    /// The `alg` header label, preferring the protected map.
    pub fn algorithm(&self) -> Option<i64> {
        self.protected_headers
            .get_i64(HEADER_ALG)
            .or_else(|| self.unprotected_headers.get_i64(HEADER_ALG))
    }

    /// The `kid` header bytes, preferring the protected map.
    pub fn key_id(&self) -> Option<&[u8]> {
        self.protected_headers
            .get_bytes(HEADER_KID)
            .or_else(|| self.unprotected_headers.get_bytes(HEADER_KID))
    }

    /// Rebuild the byte sequence the signature covers.
    ///
    /// Per RFC 9052 this is the CBOR array
    /// `["Signature1", protected bstr, external_aad bstr, payload bstr]`
    /// with an empty external_aad. It is always re-encoded from the parsed
    /// parts with definite lengths; input framing is never trusted for these
    /// bytes. A detached message needs its content supplied via
    /// `detached_content`.
    pub fn sig_structure(&self, detached_content: Option<&[u8]>) -> Result<Vec<u8>, String> {
        let payload = self
            .payload
            .as_deref()
            .or(detached_content)
            .ok_or_else(|| {
                "building Sig_structure for a detached payload requires the content bytes"
                    .to_string()
            })?;

        let protected = self.protected_headers.raw_cbor();
        let mut bytes = Vec::with_capacity(protected.len() + payload.len() + 16);
        {
            let mut enc = Encoder::new(&mut bytes);
            enc.array(4)
                .and_then(|e| e.str(SIGNATURE1_CONTEXT))
                .and_then(|e| e.bytes(protected))
                .and_then(|e| e.bytes(&[])) // external_aad, always empty here
                .and_then(|e| e.bytes(payload))
                .map_err(|e| format!("Sig_structure encoding failed: {e}"))?;
        }
        Ok(bytes)
    }
}

/// Parse COSE_Sign1 bytes into their structured form.
pub fn parse_cose_sign1(input: &[u8]) -> Result<ParsedCoseSign1, String> {
    if input.is_empty() {
        return Err("no COSE data to parse".to_string());
    }

    let mut dec = Decoder::new(input);

    skip_cose_sign1_tag(&mut dec)?;
    expect_four_fields(&mut dec)?;

    let protected_headers = read_protected(&mut dec)?;
    let unprotected_headers = read_unprotected(&mut dec)?;
    let payload = read_payload(&mut dec, input)?;
    let signature = dec
        .bytes()
        .map_err(|e| format!("signature: {e}"))?
        .to_vec();

    let leftover = input.len() - dec.position();
    if leftover > 0 {
        return Err(format!("{leftover} bytes of trailing data after COSE_Sign1"));
    }

    Ok(ParsedCoseSign1 {
        protected_headers,
        unprotected_headers,
        payload,
        signature,
    })
}

/// Consume the optional tag 18 prefix. Any other tag is an error rather than
/// something to skip over.
fn skip_cose_sign1_tag(dec: &mut Decoder<'_>) -> Result<(), String> {
    if !matches!(dec.datatype().map_err(|e| e.to_string())?, Type::Tag) {
        return Ok(());
    }

    let tag = dec.tag().map_err(|e| format!("tag: {e}"))?;
    if tag != Tag::new(COSE_SIGN1_TAG) {
        return Err(format!(
            "item is tagged with {tag:?}, not the COSE_Sign1 tag (18)"
        ));
    }
    Ok(())
}

fn expect_four_fields(dec: &mut Decoder<'_>) -> Result<(), String> {
    let arity = dec
        .array()
        .map_err(|e| format!("COSE_Sign1 must be a CBOR array: {e}"))?
        .ok_or_else(|| "COSE_Sign1 array must use a definite length".to_string())?;

    if arity != 4 {
        return Err(format!("COSE_Sign1 has {arity} fields, expected 4"));
    }
    Ok(())
}

fn read_protected(dec: &mut Decoder<'_>) -> Result<CoseHeaderMap, String> {
    let raw = dec
        .bytes()
        .map_err(|e| format!("protected header: {e}"))?
        .to_vec();

    // decode_map_bytes treats an empty buffer as an empty map, which is how
    // COSE spells "no protected headers".
    let entries =
        decode_map_bytes(&raw).map_err(|e| format!("protected header contents: {e}"))?;

    Ok(CoseHeaderMap::protected(raw, entries))
}

fn read_unprotected(dec: &mut Decoder<'_>) -> Result<CoseHeaderMap, String> {
    if !matches!(dec.datatype().map_err(|e| e.to_string())?, Type::Map) {
        return Err("unprotected header must be an inline map".to_string());
    }

    let entries = decode_map(dec).map_err(|e| format!("unprotected header: {e}"))?;
    Ok(CoseHeaderMap::unprotected(entries))
}

fn read_payload(dec: &mut Decoder<'_>, input: &[u8]) -> Result<Option<Vec<u8>>, String> {
    match dec.datatype().map_err(|e| e.to_string())? {
        Type::Bytes => {
            let payload = dec.bytes().map_err(|e| format!("payload: {e}"))?;
            Ok(Some(payload.to_vec()))
        }
        Type::Map => {
            // Bare claim map. Slice out the item's own encoding so the
            // Sig_structure later wraps exactly what the signer signed over.
            let from = dec.position();
            dec.skip().map_err(|e| format!("payload map: {e}"))?;
            Ok(Some(input[from..dec.position()].to_vec()))
        }
        Type::Null => {
            dec.null().map_err(|e| e.to_string())?;
            Ok(None)
        }
        other => Err(format!(
            "payload must be a byte string, a map or null, found {other:?}"
        )),
    }
}
