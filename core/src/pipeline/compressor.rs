/*
 * compressor.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ponte, a client-side HTTP and WebSocket transport.
 *
 * Ponte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ponte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ponte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Content coding stage: advertises gzip/deflate on requests and inflates response bodies.

use bytes::Bytes;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use std::io::{self, Read};

use crate::protocol::http::{FullResponse, RequestBuilder, MAX_BODY_BYTES};

const ACCEPT_ENCODING: &str = "gzip, deflate";

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentCompressor;

impl ContentCompressor {
    pub fn new() -> Self {
        Self
    }

    /// Add Accept-Encoding unless the caller chose one.
    pub fn prepare_request(&self, request: &mut RequestBuilder) {
        if !request.has_header("Accept-Encoding") {
            request.header("Accept-Encoding", ACCEPT_ENCODING);
        }
    }

    /// Inflate a gzip or deflate body in place. Other codings are passed through untouched.
    pub fn decode_response(&self, mut response: FullResponse) -> io::Result<FullResponse> {
        let coding = match response.header("Content-Encoding") {
            Some(v) => v.trim().to_ascii_lowercase(),
            None => return Ok(response),
        };
        let body = match coding.as_str() {
            "gzip" | "x-gzip" => inflate(GzDecoder::new(&response.body[..]))?,
            // "deflate" is meant to be zlib-wrapped but some servers send raw deflate
            "deflate" => match inflate(ZlibDecoder::new(&response.body[..])) {
                Ok(b) => b,
                Err(_) => inflate(DeflateDecoder::new(&response.body[..]))?,
            },
            "identity" => {
                response.remove_header("Content-Encoding");
                return Ok(response);
            }
            other => {
                tracing::debug!(coding = other, "unsupported content coding left as is");
                return Ok(response);
            }
        };
        response.remove_header("Content-Encoding");
        response.remove_header("Content-Length");
        response
            .headers
            .push(("Content-Length".to_string(), body.len().to_string()));
        response.body = Bytes::from(body);
        Ok(response)
    }
}

fn inflate<R: Read>(decoder: R) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .take(MAX_BODY_BYTES as u64 + 1)
        .read_to_end(&mut out)?;
    if out.len() > MAX_BODY_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "inflated body too large",
        ));
    }
    Ok(out)
}
