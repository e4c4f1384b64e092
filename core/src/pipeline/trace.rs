/*
 * trace.rs
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

//! Trace logging stage: records raw protocol bytes for debugging.
//!
//! Each side of the transport logs under its own tracing target so client and server traffic can
//! be enabled separately, e.g. `RUST_LOG=tracelog.http.upstream=debug`.

/// Target for client (outbound connection) traffic.
pub const UPSTREAM_TRACE_TARGET: &str = "tracelog.http.upstream";
/// Target for server-side traffic.
pub const DOWNSTREAM_TRACE_TARGET: &str = "tracelog.http.downstream";

const DEFAULT_PREVIEW_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceChannel {
    Upstream,
    Downstream,
}

impl TraceChannel {
    pub fn target(self) -> &'static str {
        match self {
            TraceChannel::Upstream => UPSTREAM_TRACE_TARGET,
            TraceChannel::Downstream => DOWNSTREAM_TRACE_TARGET,
        }
    }
}

/// Logs each block of bytes written or read: length plus an escaped preview.
#[derive(Debug, Clone, Copy)]
pub struct TraceLogger {
    channel: TraceChannel,
    preview_bytes: usize,
}

impl TraceLogger {
    pub fn new(channel: TraceChannel) -> Self {
        Self {
            channel,
            preview_bytes: DEFAULT_PREVIEW_BYTES,
        }
    }

    pub fn with_preview_bytes(mut self, n: usize) -> Self {
        self.preview_bytes = n;
        self
    }

    pub fn channel(&self) -> TraceChannel {
        self.channel
    }

    pub fn outbound(&self, data: &[u8]) {
        self.log("outbound", data);
    }

    pub fn inbound(&self, data: &[u8]) {
        self.log("inbound", data);
    }

    fn log(&self, direction: &'static str, data: &[u8]) {
        let preview = &data[..data.len().min(self.preview_bytes)];
        let truncated = preview.len() < data.len();
        // tracing targets must be constants
        match self.channel {
            TraceChannel::Upstream => tracing::debug!(
                target: "tracelog.http.upstream",
                direction,
                len = data.len(),
                truncated,
                data = %preview.escape_ascii()
            ),
            TraceChannel::Downstream => tracing::debug!(
                target: "tracelog.http.downstream",
                direction,
                len = data.len(),
                truncated,
                data = %preview.escape_ascii()
            ),
        }
    }
}
