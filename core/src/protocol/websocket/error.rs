/*
 * error.rs
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

//! WebSocket client errors.

use std::io;

/// Why the opening handshake was rejected.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("expected 101 Switching Protocols, got {status}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("missing or invalid Upgrade header")]
    MissingUpgrade,
    #[error("missing Connection: upgrade header")]
    MissingConnectionUpgrade,
    #[error("missing Sec-WebSocket-Accept")]
    MissingAccept,
    #[error("Sec-WebSocket-Accept mismatch")]
    AcceptMismatch,
    #[error("server selected a subprotocol that was not requested: {0}")]
    UnexpectedSubprotocol(String),
    #[error("handshake response received before the request was sent")]
    NotStarted,
}

/// Terminal errors for one WebSocket connection. Every variant is delivered once to the
/// observer's error channel and closes the connection.
#[derive(Debug, thiserror::Error)]
pub enum WebSocketError {
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("unexpected HTTP response (status={status}, content={content})")]
    UnexpectedResponse { status: u16, content: String },
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("cannot identify the WebSocket frame type (opcode {opcode:#x})")]
    UnrecognizedFrame { opcode: u8 },
    #[error("invalid WebSocket URL: {0}")]
    InvalidUrl(String),
    #[error("connection closed before the handshake completed")]
    ConnectionClosed,
    #[error(transparent)]
    Io(#[from] io::Error),
}
