/*
 * handshake.rs
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

//! WebSocket opening handshake (RFC 6455 §4): GET with Upgrade, check the 101, verify
//! Sec-WebSocket-Accept.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::io;

use crate::protocol::http::{FullResponse, Method, RequestBuilder};
use crate::protocol::websocket::dispatcher::{ChannelHandle, Outbound};
use crate::protocol::websocket::error::{HandshakeError, WebSocketError};

/// Magic string for Sec-WebSocket-Accept (RFC 6455 §4.2.2).
const WS_ACCEPT_MAGIC: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Negotiates the opening handshake for one connection. The dispatcher calls `begin_handshake`
/// once when the connection opens and `complete_handshake` with the first response.
pub trait Handshaker: Send {
    /// Write the upgrade request to the channel.
    fn begin_handshake(&mut self, channel: &mut dyn ChannelHandle) -> Result<(), WebSocketError>;

    /// Validate the server's response to the upgrade request.
    fn complete_handshake(&mut self, response: &FullResponse) -> Result<(), WebSocketError>;

    fn is_complete(&self) -> bool;

    /// Subprotocol selected by the server, once complete.
    fn subprotocol(&self) -> Option<&str> {
        None
    }
}

/// RFC 6455 client handshake.
#[derive(Debug, Clone)]
pub struct ClientHandshaker {
    host: String,
    path: String,
    subprotocols: Vec<String>,
    headers: Vec<(String, String)>,
    key: Option<String>,
    selected: Option<String>,
    complete: bool,
}

impl ClientHandshaker {
    /// `host` is the Host header value (with port when not the scheme default); `path` is the
    /// origin-form request target.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            subprotocols: Vec::new(),
            headers: Vec::new(),
            key: None,
            selected: None,
            complete: false,
        }
    }

    pub fn with_subprotocol(mut self, name: impl Into<String>) -> Self {
        self.subprotocols.push(name.into());
        self
    }

    /// Extra header sent with the upgrade request (e.g. Origin, Authorization).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The Sec-WebSocket-Key sent, once the handshake has begun.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn build_request(&self, key: &str) -> RequestBuilder {
        let mut req = RequestBuilder::new(Method::Get, self.path.clone());
        req.header("Host", self.host.clone());
        for (name, value) in &self.headers {
            req.header(name.clone(), value.clone());
        }
        req.header("Upgrade", "websocket")
            .header("Connection", "Upgrade")
            .header("Sec-WebSocket-Key", key)
            .header("Sec-WebSocket-Version", "13");
        if !self.subprotocols.is_empty() {
            req.header("Sec-WebSocket-Protocol", self.subprotocols.join(", "));
        }
        req
    }
}

impl Handshaker for ClientHandshaker {
    fn begin_handshake(&mut self, channel: &mut dyn ChannelHandle) -> Result<(), WebSocketError> {
        let mut key_raw = [0u8; 16];
        getrandom::getrandom(&mut key_raw)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        let key = STANDARD.encode(key_raw);
        let request = self.build_request(&key);
        self.key = Some(key);
        tracing::debug!(host = %self.host, path = %self.path, "sending websocket upgrade");
        channel.write(Outbound::Request(request))?;
        Ok(())
    }

    fn complete_handshake(&mut self, response: &FullResponse) -> Result<(), WebSocketError> {
        let key = self.key.as_deref().ok_or(HandshakeError::NotStarted)?;
        if response.status != 101 {
            return Err(HandshakeError::UnexpectedStatus {
                status: response.status,
                body: response.body_text(),
            }
            .into());
        }
        if !response.header_contains_token("Upgrade", "websocket") {
            return Err(HandshakeError::MissingUpgrade.into());
        }
        if !response.header_contains_token("Connection", "upgrade") {
            return Err(HandshakeError::MissingConnectionUpgrade.into());
        }
        let accept = response
            .header("Sec-WebSocket-Accept")
            .ok_or(HandshakeError::MissingAccept)?;
        if accept.trim() != compute_expected_accept(key) {
            return Err(HandshakeError::AcceptMismatch.into());
        }
        if let Some(protocol) = response.header("Sec-WebSocket-Protocol") {
            let protocol = protocol.trim();
            if !self.subprotocols.iter().any(|p| p == protocol) {
                return Err(HandshakeError::UnexpectedSubprotocol(protocol.to_string()).into());
            }
            self.selected = Some(protocol.to_string());
        }
        self.complete = true;
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn subprotocol(&self) -> Option<&str> {
        self.selected.as_deref()
    }
}

/// Sec-WebSocket-Accept for a key: base64(SHA-1(key + GUID)).
pub fn compute_expected_accept(key_base64: &str) -> String {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(key_base64.as_bytes());
    hasher.update(WS_ACCEPT_MAGIC);
    STANDARD.encode(hasher.finalize())
}
