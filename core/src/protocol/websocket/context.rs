/*
 * context.rs
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

//! Per-connection context handed to observers alongside every message.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one dispatcher (and so one connection) within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ConnectionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

/// Connection properties fixed when the dispatcher is created. Observers use these to tell
/// client connections apart and to find the local endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelContext {
    connection_id: ConnectionId,
    local_address: SocketAddr,
    local_name: String,
    secure: bool,
    requested_uri: String,
}

impl ChannelContext {
    /// `local_name` defaults to the textual local IP; no reverse lookup is made.
    pub fn new(local_address: SocketAddr, secure: bool, requested_uri: impl Into<String>) -> Self {
        Self {
            connection_id: ConnectionId::next(),
            local_name: local_address.ip().to_string(),
            local_address,
            secure,
            requested_uri: requested_uri.into(),
        }
    }

    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = name.into();
        self
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Local port of the connection.
    pub fn listener_port(&self) -> u16 {
        self.local_address.port()
    }

    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn requested_uri(&self) -> &str {
        &self.requested_uri
    }

    /// Always false: this context belongs to a client connection.
    pub fn is_server(&self) -> bool {
        false
    }
}
