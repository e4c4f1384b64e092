/*
 * encoder.rs
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

//! HTTP/1.1 request encoder.

use bytes::{BufMut, BytesMut};
use std::io;

use crate::protocol::http::request::RequestBuilder;

/// Serializes requests. Bodies without an explicit Content-Length go out chunked unless
/// chunking is disabled, in which case a Content-Length header is added.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestEncoder {
    chunking_disabled: bool,
}

impl RequestEncoder {
    pub fn new(chunking_disabled: bool) -> Self {
        Self { chunking_disabled }
    }

    pub fn chunking_disabled(&self) -> bool {
        self.chunking_disabled
    }

    pub fn encode(&self, request: &RequestBuilder, out: &mut BytesMut) -> io::Result<()> {
        if !request.has_header("Host") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "request has no Host header",
            ));
        }
        if request.path.is_empty() || request.path.contains(|c: char| c.is_whitespace()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid request target",
            ));
        }
        let chunked = match &request.body {
            Some(_) if request.has_header("Content-Length") => false,
            Some(_) => request.has_header("Transfer-Encoding") || !self.chunking_disabled,
            None => false,
        };

        out.put_slice(request.method.as_str().as_bytes());
        out.put_u8(b' ');
        out.put_slice(request.path.as_bytes());
        out.put_slice(b" HTTP/1.1\r\n");
        for (name, value) in &request.headers {
            put_header(out, name, value)?;
        }
        if let Some(body) = &request.body {
            if chunked {
                if !request.has_header("Transfer-Encoding") {
                    put_header(out, "Transfer-Encoding", "chunked")?;
                }
            } else if !request.has_header("Content-Length") {
                put_header(out, "Content-Length", &body.len().to_string())?;
            }
        }
        out.put_slice(b"\r\n");

        if let Some(body) = &request.body {
            if chunked {
                if !body.is_empty() {
                    out.put_slice(format!("{:x}\r\n", body.len()).as_bytes());
                    out.put_slice(body);
                    out.put_slice(b"\r\n");
                }
                out.put_slice(b"0\r\n\r\n");
            } else {
                out.put_slice(body);
            }
        }
        Ok(())
    }
}

fn put_header(out: &mut BytesMut, name: &str, value: &str) -> io::Result<()> {
    let bad = |s: &str| s.bytes().any(|b| b == b'\r' || b == b'\n');
    if name.is_empty() || bad(name) || bad(value) || name.contains(':') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid header {:?}", name),
        ));
    }
    out.put_slice(name.as_bytes());
    out.put_slice(b": ");
    out.put_slice(value.as_bytes());
    out.put_slice(b"\r\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::request::Method;

    fn encode(encoder: RequestEncoder, request: &RequestBuilder) -> String {
        let mut out = BytesMut::new();
        encoder.encode(request, &mut out).unwrap();
        String::from_utf8(out.to_vec()).unwrap()
    }

    #[test]
    fn get_without_body() {
        let mut req = RequestBuilder::new(Method::Get, "/index.html");
        req.header("Host", "example.com");
        assert_eq!(
            encode(RequestEncoder::default(), &req),
            "GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n"
        );
    }

    #[test]
    fn body_is_chunked_by_default() {
        let mut req = RequestBuilder::new(Method::Post, "/up");
        req.header("Host", "h").body_slice(b"hello");
        assert_eq!(
            encode(RequestEncoder::new(false), &req),
            "POST /up HTTP/1.1\r\nHost: h\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n"
        );
    }

    #[test]
    fn chunking_disabled_uses_content_length() {
        let mut req = RequestBuilder::new(Method::Post, "/up");
        req.header("Host", "h").body_slice(b"hello");
        assert_eq!(
            encode(RequestEncoder::new(true), &req),
            "POST /up HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello"
        );
    }

    #[test]
    fn missing_host_rejected() {
        let req = RequestBuilder::new(Method::Get, "/");
        let err = RequestEncoder::default()
            .encode(&req, &mut BytesMut::new())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn header_injection_rejected() {
        let mut req = RequestBuilder::new(Method::Get, "/");
        req.header("Host", "h").header("X-Evil", "a\r\nSet-Cookie: b");
        assert!(RequestEncoder::default()
            .encode(&req, &mut BytesMut::new())
            .is_err());
    }
}
