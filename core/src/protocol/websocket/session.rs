/*
 * session.rs
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

//! Client sessions and the optional registry they are reported to.

use std::sync::{Arc, Mutex, PoisonError};

use crate::protocol::websocket::context::{ChannelContext, ConnectionId};

/// The logical WebSocket session of one connection, created when the handshake completes.
#[derive(Debug, Clone)]
pub struct ClientSession {
    context: Arc<ChannelContext>,
    subprotocol: Option<String>,
}

impl ClientSession {
    pub(crate) fn new(context: Arc<ChannelContext>, subprotocol: Option<String>) -> Self {
        Self {
            context,
            subprotocol,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.context.connection_id()
    }

    pub fn uri(&self) -> &str {
        self.context.requested_uri()
    }

    pub fn is_secure(&self) -> bool {
        self.context.is_secure()
    }

    /// Subprotocol the server selected, if any.
    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    pub fn context(&self) -> &ChannelContext {
        &self.context
    }
}

/// Receives client sessions as their handshakes complete, and hears once more when each
/// connection terminates. Shared across connections, so implementations synchronize internally.
pub trait SessionRegistry: Send + Sync {
    fn register_session(&self, session: Arc<ClientSession>);

    fn unregister_session(&self, id: ConnectionId);
}

/// Registry that keeps the sessions of live connections.
#[derive(Default)]
pub struct SessionSet {
    sessions: Mutex<Vec<Arc<ClientSession>>>,
}

impl SessionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> Vec<Arc<ClientSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, id: ConnectionId) -> Option<Arc<ClientSession>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let pos = sessions.iter().position(|s| s.id() == id)?;
        Some(sessions.remove(pos))
    }
}

impl SessionRegistry for SessionSet {
    fn register_session(&self, session: Arc<ClientSession>) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session);
    }

    fn unregister_session(&self, id: ConnectionId) {
        if self.remove(id).is_none() {
            tracing::debug!(connection = %id, "unregister for unknown session");
        }
    }
}
