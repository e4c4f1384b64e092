/*
 * mod.rs
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

//! WebSocket client (RFC 6455).
//!
//! - `FrameDispatcher`: per-connection state machine. Completes the handshake, classifies frames
//!   into `WebSocketMessage`s for the observer, answers pings, and delivers exactly one terminal
//!   notification.
//! - `FrameDecoder` / `OutboundFrame`: the wire format.
//! - `WebSocketClient` / `WebSocketConnection` / `WebSocketSender`: async connection on tokio.

mod client;
mod connection;
mod context;
mod dispatcher;
mod error;
mod frame;
mod handshake;
mod message;
mod observer;
mod session;

pub use client::WebSocketClient;
pub use connection::{WebSocketConnection, WebSocketSender};
pub use context::{ChannelContext, ConnectionId};
pub use dispatcher::{
    ChannelHandle, FrameDispatcher, HandshakeFuture, HandshakeResult, HandshakeState, Outbound,
};
pub use error::{HandshakeError, WebSocketError};
pub use frame::{
    encode_frame, is_sendable_close_code, FrameDecoder, InboundUnit, Opcode, OutboundFrame,
    CLOSE_NO_STATUS, CLOSE_PROTOCOL_ERROR, MAX_CONTROL_PAYLOAD, MAX_FRAME_PAYLOAD,
};
pub use handshake::{compute_expected_accept, ClientHandshaker, Handshaker};
pub use message::{ControlSignal, WebSocketMessage, GOING_AWAY_REASON, GOING_AWAY_STATUS};
pub use observer::{ChannelObserver, FanOutObserver, LoggingObserver, ObserverEvent, WebSocketObserver};
pub use session::{ClientSession, SessionRegistry, SessionSet};
