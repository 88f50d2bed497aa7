// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Gzip (RFC 1952) inflation for the compressed COSE bytes.
//!
//! `flate2` validates the member framing: a wrong magic/header fails up
//! front, and CRC32/ISIZE mismatches fail when the final block is read.

use std::io::Read;

use flate2::read::GzDecoder;

/// Upper bound on inflated size. Certificates are a few hundred bytes; a
/// multi-megabyte expansion is a decompression bomb, not a certificate.
const MAX_INFLATED_LEN: usize = 16 * 1024 * 1024;

/// Inflate a single gzip member.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    let mut buf = [0u8; 16 * 1024];

    loop {
        let n = decoder
            .read(&mut buf)
            .map_err(|e| format!("gzip inflate failed: {e}"))?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
        if out.len() > MAX_INFLATED_LEN {
            return Err("inflated data exceeds the size limit".to_string());
        }
    }

    Ok(out)
}
