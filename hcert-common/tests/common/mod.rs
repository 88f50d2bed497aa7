// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared CBOR builders for `hcert-common` integration tests.

#![allow(dead_code)]

use minicbor::data::Tag;

/// Minimal set of CBOR key types used by these tests.
#[derive(Clone, Debug)]
pub(crate) enum TestCborKey {
    Int(i64),
    Text(&'static str),
}

impl TestCborKey {
    pub(crate) fn encode(&self, enc: &mut minicbor::Encoder<Vec<u8>>) {
        match self {
            TestCborKey::Int(i) => {
                enc.i64(*i).unwrap();
            }
            TestCborKey::Text(s) => {
                enc.str(s).unwrap();
            }
        }
    }
}

/// Minimal set of CBOR value types used by these tests.
#[derive(Clone, Debug)]
pub(crate) enum TestCborValue {
    Int(i64),
    Bool(bool),
    Null,
    Bytes(Vec<u8>),
    Text(&'static str),
    Array(Vec<TestCborValue>),
    Map(Vec<(TestCborKey, TestCborValue)>),
}

impl TestCborValue {
    pub(crate) fn encode(&self, enc: &mut minicbor::Encoder<Vec<u8>>) {
        match self {
            TestCborValue::Int(i) => {
                enc.i64(*i).unwrap();
            }
            TestCborValue::Bool(b) => {
                enc.bool(*b).unwrap();
            }
            TestCborValue::Null => {
                enc.null().unwrap();
            }
            TestCborValue::Bytes(b) => {
                enc.bytes(b).unwrap();
            }
            TestCborValue::Text(s) => {
                enc.str(s).unwrap();
            }
            TestCborValue::Array(items) => {
                enc.array(items.len() as u64).unwrap();
                for it in items {
                    it.encode(enc);
                }
            }
            TestCborValue::Map(entries) => {
                enc.map(entries.len() as u64).unwrap();
                for (k, v) in entries {
                    k.encode(enc);
                    v.encode(enc);
                }
            }
        }
    }
}

/// Encodes a protected header map as CBOR bytes.
pub(crate) fn encode_protected_header_bytes(entries: &[(i64, TestCborValue)]) -> Vec<u8> {
    let mut enc = minicbor::Encoder::new(Vec::new());
    enc.map(entries.len() as u64).unwrap();
    for (k, v) in entries {
        enc.i64(*k).unwrap();
        v.encode(&mut enc);
    }
    enc.into_writer()
}

fn encode_unprotected_map(
    enc: &mut minicbor::Encoder<Vec<u8>>,
    entries: &[(TestCborKey, TestCborValue)],
) {
    enc.map(entries.len() as u64).unwrap();
    for (k, v) in entries {
        k.encode(enc);
        v.encode(enc);
    }
}

/// Payload variants a COSE_Sign1 may carry in this domain.
#[derive(Clone, Debug)]
pub(crate) enum TestPayload {
    Bstr(Vec<u8>),
    BareMap(Vec<(TestCborKey, TestCborValue)>),
    Detached,
}

/// Encodes a COSE_Sign1 message from components.
///
/// This is a focused test helper, not a general-purpose COSE encoder.
pub(crate) fn encode_cose_sign1(
    include_tag_18: bool,
    protected_bstr_contents: &[u8],
    unprotected_entries: &[(TestCborKey, TestCborValue)],
    payload: &TestPayload,
    signature: &[u8],
) -> Vec<u8> {
    let mut enc = minicbor::Encoder::new(Vec::new());

    if include_tag_18 {
        enc.tag(Tag::new(18)).unwrap();
    }

    enc.array(4).unwrap();
    enc.bytes(protected_bstr_contents).unwrap();
    encode_unprotected_map(&mut enc, unprotected_entries);
    match payload {
        TestPayload::Bstr(p) => {
            enc.bytes(p).unwrap();
        }
        TestPayload::BareMap(entries) => {
            enc.map(entries.len() as u64).unwrap();
            for (k, v) in entries {
                k.encode(&mut enc);
                v.encode(&mut enc);
            }
        }
        TestPayload::Detached => {
            enc.null().unwrap();
        }
    }
    enc.bytes(signature).unwrap();

    enc.into_writer()
}
