/*
 * frame.rs
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

//! WebSocket frame format (RFC 6455 §5): decoder for receive, encoder for send (with masking).
//!
//! The decoder yields `InboundUnit`s, the closed set of things the dispatcher classifies.
//! Continuation frames come out as Text/Binary units of the message they continue.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;

use crate::protocol::http::FullResponse;

/// Control frames carry at most 125 payload bytes.
pub const MAX_CONTROL_PAYLOAD: usize = 125;
/// Max payload length we accept or send for one data frame.
pub const MAX_FRAME_PAYLOAD: usize = 16 * 1024 * 1024;
/// Close code reported when a Close frame carries no status (RFC 6455 §7.1.5).
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Close code for a peer that broke the protocol (RFC 6455 §7.4.1).
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;

/// True for close codes an endpoint may put in a Close frame: the registered 1000-1003 and
/// 1007-1014, and the 3000-4999 range for libraries and applications. 1004-1006 and 1015 are
/// reserved for local reporting.
pub fn is_sendable_close_code(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    /// None for reserved opcodes (3-7, 0xB-0xF).
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

/// One decoded inbound unit: the handshake response, or one WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundUnit {
    Response(FullResponse),
    Text { body: String, final_fragment: bool },
    Binary { data: Bytes, final_fragment: bool },
    Ping(Bytes),
    Pong(Bytes),
    Close { code: u16, reason: String },
    Unknown { opcode: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Header,
    ExtendedLen16,
    ExtendedLen64,
    Payload,
}

/// Push decoder for server → client frames (which must not be masked).
pub struct FrameDecoder {
    state: FrameState,
    fin: bool,
    opcode: u8,
    payload_len: usize,
    /// Opcode of the fragmented message in progress.
    fragment: Option<Opcode>,
    /// Trailing bytes of a UTF-8 sequence split across text fragments.
    utf8_carry: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: FrameState::Header,
            fin: false,
            opcode: 0,
            payload_len: 0,
            fragment: None,
            utf8_carry: Vec::new(),
        }
    }

    /// Decode the next complete frame from `buf`, or None if more bytes are needed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<InboundUnit>> {
        loop {
            match self.state {
                FrameState::Header => {
                    if buf.len() < 2 {
                        return Ok(None);
                    }
                    let b0 = buf.get_u8();
                    let b1 = buf.get_u8();
                    if b0 & 0x70 != 0 {
                        return Err(invalid("reserved bits set without a negotiated extension"));
                    }
                    if b1 & 0x80 != 0 {
                        return Err(invalid("server frame must not be masked"));
                    }
                    self.fin = (b0 & 0x80) != 0;
                    self.opcode = b0 & 0x0f;
                    let len7 = b1 & 0x7f;
                    if let Some(op) = Opcode::from_u8(self.opcode) {
                        if op.is_control() && !self.fin {
                            return Err(invalid("control frame must not be fragmented"));
                        }
                        if op.is_control() && len7 as usize > MAX_CONTROL_PAYLOAD {
                            return Err(invalid("control frame payload too long"));
                        }
                    }
                    match len7 {
                        126 => self.state = FrameState::ExtendedLen16,
                        127 => self.state = FrameState::ExtendedLen64,
                        n => {
                            self.payload_len = n as usize;
                            self.state = FrameState::Payload;
                        }
                    }
                }
                FrameState::ExtendedLen16 => {
                    if buf.len() < 2 {
                        return Ok(None);
                    }
                    self.payload_len = buf.get_u16() as usize;
                    self.state = FrameState::Payload;
                }
                FrameState::ExtendedLen64 => {
                    if buf.len() < 8 {
                        return Ok(None);
                    }
                    let len = buf.get_u64();
                    if len > MAX_FRAME_PAYLOAD as u64 {
                        return Err(invalid("data frame payload too long"));
                    }
                    self.payload_len = len as usize;
                    self.state = FrameState::Payload;
                }
                FrameState::Payload => {
                    if self.payload_len > MAX_FRAME_PAYLOAD {
                        return Err(invalid("data frame payload too long"));
                    }
                    if buf.len() < self.payload_len {
                        buf.reserve(self.payload_len - buf.len());
                        return Ok(None);
                    }
                    let payload = buf.split_to(self.payload_len).freeze();
                    self.state = FrameState::Header;
                    return self.classify(payload).map(Some);
                }
            }
        }
    }

    fn classify(&mut self, payload: Bytes) -> io::Result<InboundUnit> {
        let opcode = match Opcode::from_u8(self.opcode) {
            Some(op) => op,
            None => {
                return Ok(InboundUnit::Unknown {
                    opcode: self.opcode,
                })
            }
        };
        match opcode {
            Opcode::Ping => Ok(InboundUnit::Ping(payload)),
            Opcode::Pong => Ok(InboundUnit::Pong(payload)),
            Opcode::Close => parse_close(&payload),
            Opcode::Text | Opcode::Binary => {
                if self.fragment.is_some() {
                    return Err(invalid("expected continuation frame"));
                }
                if !self.fin {
                    self.fragment = Some(opcode);
                }
                self.data_unit(opcode, payload)
            }
            Opcode::Continuation => {
                let op = self
                    .fragment
                    .ok_or_else(|| invalid("continuation frame without a message in progress"))?;
                if self.fin {
                    self.fragment = None;
                }
                self.data_unit(op, payload)
            }
        }
    }

    fn data_unit(&mut self, opcode: Opcode, payload: Bytes) -> io::Result<InboundUnit> {
        if opcode == Opcode::Binary {
            return Ok(InboundUnit::Binary {
                data: payload,
                final_fragment: self.fin,
            });
        }
        let mut bytes = std::mem::take(&mut self.utf8_carry);
        bytes.extend_from_slice(&payload);
        let body = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                let utf8_error = e.utf8_error();
                if utf8_error.error_len().is_some() || self.fin {
                    return Err(invalid("invalid UTF-8 in text frame"));
                }
                // Incomplete sequence at the end of a non-final fragment
                let mut bytes = e.into_bytes();
                self.utf8_carry = bytes.split_off(utf8_error.valid_up_to());
                String::from_utf8(bytes).map_err(|_| invalid("invalid UTF-8 in text frame"))?
            }
        };
        Ok(InboundUnit::Text {
            body,
            final_fragment: self.fin,
        })
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_close(payload: &[u8]) -> io::Result<InboundUnit> {
    match payload.len() {
        0 => Ok(InboundUnit::Close {
            code: CLOSE_NO_STATUS,
            reason: String::new(),
        }),
        1 => Err(invalid("close frame payload of one byte")),
        _ => {
            let code = u16::from_be_bytes([payload[0], payload[1]]);
            let reason = std::str::from_utf8(&payload[2..])
                .map_err(|_| invalid("invalid UTF-8 in close reason"))?
                .to_string();
            Ok(InboundUnit::Close { code, reason })
        }
    }
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// A frame to send (client → server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub opcode: Opcode,
    pub payload: Bytes,
    pub fin: bool,
}

impl OutboundFrame {
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
            fin: true,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Opcode::Text, Bytes::from(text.into()))
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Binary, data)
    }

    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Ping, data)
    }

    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Pong, data)
    }

    /// Close frame; code is optional (e.g. 1000 = normal). Reason is UTF-8.
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let mut payload = BytesMut::new();
        if let Some(c) = code {
            payload.put_u16(c);
            payload.put_slice(reason.as_bytes());
        }
        Self::new(Opcode::Close, payload.freeze())
    }

    /// Encode with a fresh random mask.
    pub fn encode(&self, out: &mut BytesMut) -> io::Result<()> {
        let mut mask_key = [0u8; 4];
        getrandom::getrandom(&mut mask_key)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        encode_frame(self.opcode, &self.payload, self.fin, &mask_key, out)
    }
}

/// Encode one frame (client → server: must mask). Uses `mask_key` (4 bytes) for XOR.
pub fn encode_frame(
    opcode: Opcode,
    payload: &[u8],
    fin: bool,
    mask_key: &[u8; 4],
    out: &mut BytesMut,
) -> io::Result<()> {
    let len = payload.len();
    if opcode.is_control() && (len > MAX_CONTROL_PAYLOAD || !fin) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "control frame payload max 125 bytes, unfragmented",
        ));
    }
    if len > MAX_FRAME_PAYLOAD {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "payload too long",
        ));
    }
    out.reserve(14 + len);
    let fin_bit: u8 = if fin { 0x80 } else { 0 };
    out.put_u8(fin_bit | opcode.as_u8());
    if len < 126 {
        out.put_u8(0x80 | (len as u8));
    } else if len < 65536 {
        out.put_u8(0x80 | 126);
        out.put_u16(len as u16);
    } else {
        out.put_u8(0x80 | 127);
        out.put_u64(len as u64);
    }
    out.put_slice(mask_key);
    for (i, &b) in payload.iter().enumerate() {
        out.put_u8(b ^ mask_key[i % 4]);
    }
    Ok(())
}
