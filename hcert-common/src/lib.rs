// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wire-format primitives shared by the health-certificate verifier.
//!
//! This crate is the bottom layer of the stack. It intentionally exposes only
//! a small surface area:
//! - Decode the Base45 text body of a `HC1:` string.
//! - Inflate the gzip member that wraps the COSE bytes.
//! - Decode CBOR items into a strongly typed value model.
//! - Parse COSE_Sign1 into a structured form and rebuild its Sig_structure.

pub mod base45;
pub mod cbor;
pub mod cose_sign1;
pub mod decompress;

// Re-export the core entry points so consumers can depend on this crate without
// needing to know the internal module layout.
pub use cbor::{CborKey, CborMap, CborMapExt, CborValue};
pub use cose_sign1::{parse_cose_sign1, CoseHeaderMap, ParsedCoseSign1};
