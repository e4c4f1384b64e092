/*
 * decoder.rs
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

//! HTTP/1.1 response push decoder: status line, headers, body (Content-Length, chunked, or
//! until close), aggregated into one `FullResponse`.

use bytes::{Buf, BytesMut};
use std::io;

use crate::protocol::http::response::FullResponse;

/// Max bytes for the status line plus header section.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;
/// Max aggregated body size.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    StatusLine,
    Headers,
    Body,
    UntilClose,
    ChunkSize,
    ChunkData,
    ChunkDataEnd,
    ChunkTrailer,
}

/// Push decoder. Feed bytes with `decode`; each complete response is returned once and the
/// decoder resets for the next one. Bytes after a complete response stay in the buffer (e.g.
/// WebSocket frames following a 101).
pub struct ResponseDecoder {
    state: DecodeState,
    status: u16,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    header_bytes: usize,
    body: BytesMut,
    content_length: usize,
    chunk_remaining: usize,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::StatusLine,
            status: 0,
            reason: None,
            headers: Vec::new(),
            header_bytes: 0,
            body: BytesMut::new(),
            content_length: 0,
            chunk_remaining: 0,
        }
    }

    /// True when no response is partially decoded.
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::StatusLine && self.header_bytes == 0
    }

    /// Consume as much of `buf` as possible. Returns `Some` when a response completed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<FullResponse>> {
        loop {
            match self.state {
                DecodeState::StatusLine => {
                    let line = match self.take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(None),
                    };
                    if line.is_empty() {
                        // Stray CRLF between responses
                        self.header_bytes = 0;
                        continue;
                    }
                    self.parse_status_line(&line)?;
                    self.state = DecodeState::Headers;
                }
                DecodeState::Headers => {
                    let line = match self.take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(None),
                    };
                    if line.is_empty() {
                        if let Some(response) = self.start_body()? {
                            return Ok(Some(response));
                        }
                        continue;
                    }
                    let (name, value) = parse_header(&line)?;
                    self.headers.push((name, value));
                }
                DecodeState::Body => {
                    let remaining = self.content_length - self.body.len();
                    let n = remaining.min(buf.len());
                    self.body.extend_from_slice(&buf.split_to(n));
                    if self.body.len() == self.content_length {
                        return Ok(Some(self.finish()));
                    }
                    return Ok(None);
                }
                DecodeState::UntilClose => {
                    if self.body.len() + buf.len() > MAX_BODY_BYTES {
                        return Err(too_large());
                    }
                    self.body.extend_from_slice(&buf.split());
                    return Ok(None);
                }
                DecodeState::ChunkSize => {
                    let line = match self.take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(None),
                    };
                    let hex_part = line.split(';').next().unwrap_or("").trim();
                    self.chunk_remaining = usize::from_str_radix(hex_part, 16).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size")
                    })?;
                    if self.body.len() + self.chunk_remaining > MAX_BODY_BYTES {
                        return Err(too_large());
                    }
                    self.state = if self.chunk_remaining == 0 {
                        DecodeState::ChunkTrailer
                    } else {
                        DecodeState::ChunkData
                    };
                }
                DecodeState::ChunkData => {
                    let n = self.chunk_remaining.min(buf.len());
                    self.body.extend_from_slice(&buf.split_to(n));
                    self.chunk_remaining -= n;
                    if self.chunk_remaining > 0 {
                        return Ok(None);
                    }
                    self.state = DecodeState::ChunkDataEnd;
                }
                DecodeState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(None);
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "missing CRLF after chunk data",
                        ));
                    }
                    buf.advance(2);
                    self.state = DecodeState::ChunkSize;
                }
                DecodeState::ChunkTrailer => {
                    let line = match self.take_line(buf)? {
                        Some(l) => l,
                        None => return Ok(None),
                    };
                    if line.is_empty() {
                        return Ok(Some(self.finish()));
                    }
                    let (name, value) = parse_header(&line)?;
                    self.headers.push((name, value));
                }
            }
        }
    }

    /// The connection reached end of stream. Completes a read-until-close body; any other
    /// partial response is an error.
    pub fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<FullResponse>> {
        if let Some(response) = self.decode(buf)? {
            return Ok(Some(response));
        }
        match self.state {
            DecodeState::UntilClose => Ok(Some(self.finish())),
            DecodeState::StatusLine if self.header_bytes == 0 && buf.is_empty() => Ok(None),
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-response",
            )),
        }
    }

    /// Split one CRLF-terminated line off `buf` (without the CRLF).
    fn take_line(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        let line_end = match find_crlf(buf) {
            Some(n) => n,
            None => {
                if self.header_bytes + buf.len() > MAX_HEADER_BYTES {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "response header section too large",
                    ));
                }
                return Ok(None);
            }
        };
        let line = buf.split_to(line_end + 2);
        if matches!(
            self.state,
            DecodeState::StatusLine | DecodeState::Headers | DecodeState::ChunkTrailer
        ) {
            self.header_bytes += line.len();
            if self.header_bytes > MAX_HEADER_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "response header section too large",
                ));
            }
        }
        let text = std::str::from_utf8(&line[..line_end])
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid header UTF-8"))?;
        Ok(Some(text.to_string()))
    }

    /// `HTTP/1.1 200 OK` or `HTTP/1.1 200`.
    fn parse_status_line(&mut self, line: &str) -> io::Result<()> {
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        if !version.starts_with("HTTP/") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid status line: {}", line),
            ));
        }
        self.status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .filter(|c| (100..1000).contains(c))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "invalid status code"))?;
        self.reason = parts
            .next()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        Ok(())
    }

    /// Headers done: pick the body mode. Returns the response if it has no body.
    fn start_body(&mut self) -> io::Result<Option<FullResponse>> {
        if (100..200).contains(&self.status) || self.status == 204 || self.status == 304 {
            return Ok(Some(self.finish()));
        }
        let chunked = self.headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case("transfer-encoding") && v.to_ascii_lowercase().contains("chunked")
        });
        if chunked {
            self.state = DecodeState::ChunkSize;
            return Ok(None);
        }
        let content_length = self
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| {
                v.trim().parse::<usize>().map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, "invalid Content-Length")
                })
            })
            .transpose()?;
        match content_length {
            Some(0) => Ok(Some(self.finish())),
            Some(cl) if cl > MAX_BODY_BYTES => Err(too_large()),
            Some(cl) => {
                self.content_length = cl;
                self.state = DecodeState::Body;
                Ok(None)
            }
            None => {
                self.state = DecodeState::UntilClose;
                Ok(None)
            }
        }
    }

    fn finish(&mut self) -> FullResponse {
        let response = FullResponse {
            status: self.status,
            reason: self.reason.take(),
            headers: std::mem::take(&mut self.headers),
            body: self.body.split().freeze(),
        };
        self.state = DecodeState::StatusLine;
        self.status = 0;
        self.header_bytes = 0;
        self.content_length = 0;
        self.chunk_remaining = 0;
        response
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_header(line: &str) -> io::Result<(String, String)> {
    match line.find(':') {
        Some(colon) => Ok((
            line[..colon].trim().to_string(),
            line[colon + 1..].trim().to_string(),
        )),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed header line: {}", line),
        )),
    }
}

fn too_large() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "response body too large")
}
