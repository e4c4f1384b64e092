/*
 * message.rs
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

//! Application-facing WebSocket messages.

use bytes::Bytes;

/// Status sent when the connection drops without a Close frame.
pub const GOING_AWAY_STATUS: u16 = 1001;
pub const GOING_AWAY_REASON: &str = "Client is going away";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Ping,
    Pong,
}

/// One message delivered to the observer. Each comes from exactly one inbound frame, except
/// the synthesized going-away Close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebSocketMessage {
    Text {
        body: String,
        final_fragment: bool,
    },
    Binary {
        data: Bytes,
        final_fragment: bool,
    },
    Control {
        signal: ControlSignal,
        payload: Bytes,
    },
    Close {
        status_code: u16,
        reason: String,
    },
}

impl WebSocketMessage {
    pub(crate) fn going_away() -> Self {
        WebSocketMessage::Close {
            status_code: GOING_AWAY_STATUS,
            reason: GOING_AWAY_REASON.to_string(),
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, WebSocketMessage::Close { .. })
    }
}
