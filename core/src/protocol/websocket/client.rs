/*
 * client.rs
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

//! WebSocket client: connect to a ws:// or wss:// URL and hand back the connection and its
//! handshake future.

use std::sync::Arc;

use tokio_rustls::rustls::ClientConfig;

use crate::net::{connect_tcp, default_client_config, HttpStream, TlsContext};
use crate::pipeline::{TraceChannel, TraceLogger};
use crate::protocol::websocket::connection::WebSocketConnection;
use crate::protocol::websocket::context::ChannelContext;
use crate::protocol::websocket::dispatcher::{FrameDispatcher, HandshakeFuture};
use crate::protocol::websocket::error::WebSocketError;
use crate::protocol::websocket::handshake::ClientHandshaker;
use crate::protocol::websocket::observer::{LoggingObserver, WebSocketObserver};
use crate::protocol::websocket::session::SessionRegistry;
use crate::uri::{Endpoint, Scheme};

/// Builder for one client connection.
///
/// ```ignore
/// let (conn, handshake) = WebSocketClient::new("wss://example.com/chat")
///     .subprotocol("chat")
///     .observer(observer)
///     .connect()
///     .await?;
/// let sender = conn.sender();
/// tokio::spawn(conn.run());
/// handshake.await?;
/// sender.send_text("hello")?;
/// ```
pub struct WebSocketClient {
    url: String,
    subprotocols: Vec<String>,
    headers: Vec<(String, String)>,
    trace_logging: bool,
    observer: Arc<dyn WebSocketObserver>,
    registry: Option<Arc<dyn SessionRegistry>>,
    tls_config: Option<Arc<ClientConfig>>,
}

impl WebSocketClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subprotocols: Vec::new(),
            headers: Vec::new(),
            trace_logging: false,
            observer: Arc::new(LoggingObserver),
            registry: None,
            tls_config: None,
        }
    }

    pub fn subprotocol(mut self, name: impl Into<String>) -> Self {
        self.subprotocols.push(name.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Log raw traffic under the `tracelog.http.upstream` target.
    pub fn trace_logging(mut self, enabled: bool) -> Self {
        self.trace_logging = enabled;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn WebSocketObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn session_registry(mut self, registry: Arc<dyn SessionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// rustls config for wss:// (defaults to native roots, falling back to webpki-roots).
    pub fn tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Open the connection (TCP, then TLS for wss://). The handshake itself runs once the
    /// returned connection is driven with `run()`.
    pub async fn connect(self) -> Result<(WebSocketConnection, HandshakeFuture), WebSocketError> {
        let endpoint =
            Endpoint::parse(&self.url).map_err(|e| WebSocketError::InvalidUrl(e.to_string()))?;
        if !matches!(endpoint.scheme(), Scheme::Ws | Scheme::Wss) {
            return Err(WebSocketError::InvalidUrl(format!(
                "URL scheme must be ws or wss: {}",
                self.url
            )));
        }
        let tls = if endpoint.is_secure() {
            let config = self.tls_config.clone().unwrap_or_else(default_client_config);
            Some(TlsContext::with_config(config, endpoint.host())?)
        } else {
            None
        };
        let tcp = connect_tcp(endpoint.host(), endpoint.port()).await?;
        let stream = HttpStream::establish(tcp, tls.as_ref()).await?;
        let context = ChannelContext::new(stream.local_addr()?, stream.is_secure(), self.url.clone());

        let mut handshaker = ClientHandshaker::new(endpoint.authority(), endpoint.path());
        for protocol in self.subprotocols {
            handshaker = handshaker.with_subprotocol(protocol);
        }
        for (name, value) in self.headers {
            handshaker = handshaker.with_header(name, value);
        }
        let (dispatcher, handshake) =
            FrameDispatcher::new(Box::new(handshaker), self.observer, self.registry, context);
        let trace = self
            .trace_logging
            .then(|| TraceLogger::new(TraceChannel::Upstream));
        tracing::debug!(url = %endpoint, "websocket connection open");
        Ok((WebSocketConnection::new(stream, dispatcher, trace), handshake))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_websocket_urls() {
        for url in ["http://localhost/", "localhost:80", "ws://:80/"] {
            let err = WebSocketClient::new(url).connect().await.err().unwrap();
            assert!(matches!(err, WebSocketError::InvalidUrl(_)), "{}: {:?}", url, err);
        }
    }
}
