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

//! HTTP/1.1 encode/decode staging.
//!
//! - `RequestBuilder` + `RequestEncoder`: outbound requests (chunked or Content-Length bodies).
//! - `ResponseDecoder`: push decoder producing one aggregated `FullResponse` at a time.
//! - Buffers: `bytes` crate (BytesMut for the read buffer, Bytes for bodies).

mod decoder;
mod encoder;
mod request;
mod response;

pub use decoder::{ResponseDecoder, MAX_BODY_BYTES, MAX_HEADER_BYTES};
pub use encoder::RequestEncoder;
pub use request::{Method, RequestBuilder};
pub use response::FullResponse;
