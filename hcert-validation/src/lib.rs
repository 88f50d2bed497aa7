// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! COSE signature verification for health certificates.
//!
//! This crate provides the cryptographic half of the verification pipeline:
//! - Determine the COSE `alg` to use (only ES256 and PS256 are honored in
//!   this domain).
//! - Parse issuer public keys out of X.509/SPKI material.
//! - Verify a Sig_structure against a signature with the resolved key.
//!
//! Certificate chain validation is intentionally out of scope: trust comes
//! from the signed trust list, not from a PKI rooted at the leaf certificate.

pub mod cose_verifier;
pub mod public_key;

pub use cose_verifier::{verify_signature, CoseAlgorithm, SignatureError};
pub use public_key::IssuerPublicKey;
