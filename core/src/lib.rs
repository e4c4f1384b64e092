/*
 * lib.rs
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

//! Ponte core: the client leg of an HTTP/WebSocket transport.
//!
//! - `pipeline`: assembles the stage chain for an outbound HTTP connection and follows redirects
//!   on fresh connections, carrying one `ConnectionConfig` unchanged across hops.
//! - `protocol::websocket`: the client frame dispatcher (handshake, frame classification,
//!   ping auto-reply, exactly-once termination) plus the async connection driving it.
//! - `protocol::http`: HTTP/1.1 request encoder and response decoder shared by both.

pub mod config;
pub mod net;
pub mod pipeline;
pub mod protocol;
pub mod uri;

pub use config::{ConnectionConfig, OriginContext, TransportSettings};
pub use uri::{Endpoint, Scheme, UriError};
