/*
 * observer.rs
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

//! Message observers (push model). The dispatcher calls these as frames are classified.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::protocol::websocket::context::ChannelContext;
use crate::protocol::websocket::error::WebSocketError;
use crate::protocol::websocket::message::WebSocketMessage;

/// Receives messages and terminal errors. Called from the worker of whichever connection
/// produced the event; must not block.
pub trait WebSocketObserver: Send + Sync {
    fn on_message(&self, context: &ChannelContext, message: WebSocketMessage);

    fn on_error(&self, context: &ChannelContext, error: &WebSocketError);
}

/// Logs every event with tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl WebSocketObserver for LoggingObserver {
    fn on_message(&self, context: &ChannelContext, message: WebSocketMessage) {
        match &message {
            WebSocketMessage::Text {
                body,
                final_fragment,
            } => tracing::debug!(
                connection = %context.connection_id(),
                len = body.len(),
                final_fragment,
                "text message"
            ),
            WebSocketMessage::Binary {
                data,
                final_fragment,
            } => tracing::debug!(
                connection = %context.connection_id(),
                len = data.len(),
                final_fragment,
                "binary message"
            ),
            WebSocketMessage::Control { signal, payload } => tracing::debug!(
                connection = %context.connection_id(),
                ?signal,
                len = payload.len(),
                "control message"
            ),
            WebSocketMessage::Close {
                status_code,
                reason,
            } => tracing::info!(
                connection = %context.connection_id(),
                status_code,
                reason = %reason,
                "close"
            ),
        }
    }

    fn on_error(&self, context: &ChannelContext, error: &WebSocketError) {
        tracing::warn!(connection = %context.connection_id(), error = %error, "websocket error");
    }
}

/// Forwards each event to every inner observer, in order.
#[derive(Default, Clone)]
pub struct FanOutObserver {
    observers: Vec<Arc<dyn WebSocketObserver>>,
}

impl FanOutObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn WebSocketObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl WebSocketObserver for FanOutObserver {
    fn on_message(&self, context: &ChannelContext, message: WebSocketMessage) {
        if let Some((last, rest)) = self.observers.split_last() {
            for observer in rest {
                observer.on_message(context, message.clone());
            }
            last.on_message(context, message);
        }
    }

    fn on_error(&self, context: &ChannelContext, error: &WebSocketError) {
        for observer in &self.observers {
            observer.on_error(context, error);
        }
    }
}

/// Event forwarded by `ChannelObserver`. Errors are flattened to their message since the
/// error itself stays with the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    Message(WebSocketMessage),
    Error(String),
}

/// Forwards events into an unbounded channel for a consumer task.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ObserverEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ObserverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl WebSocketObserver for ChannelObserver {
    fn on_message(&self, _context: &ChannelContext, message: WebSocketMessage) {
        if self.tx.send(ObserverEvent::Message(message)).is_err() {
            tracing::debug!("observer channel closed; message dropped");
        }
    }

    fn on_error(&self, _context: &ChannelContext, error: &WebSocketError) {
        if self.tx.send(ObserverEvent::Error(error.to_string())).is_err() {
            tracing::debug!("observer channel closed; error dropped");
        }
    }
}
