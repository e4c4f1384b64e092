/*
 * connection.rs
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

//! WebSocket connection: owns the stream, feeds the decoders, lets the dispatcher act, and
//! flushes what it wrote.

use bytes::BytesMut;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::net::HttpStream;
use crate::pipeline::TraceLogger;
use crate::protocol::http::{RequestEncoder, ResponseDecoder};
use crate::protocol::websocket::context::ChannelContext;
use crate::protocol::websocket::dispatcher::{
    ChannelHandle, FrameDispatcher, HandshakeState, Outbound,
};
use crate::protocol::websocket::error::WebSocketError;
use crate::protocol::websocket::frame::{
    is_sendable_close_code, FrameDecoder, InboundUnit, Opcode, OutboundFrame, MAX_CONTROL_PAYLOAD,
};

const READ_CHUNK: usize = 8192;

/// Writes queued by the dispatcher during one callback.
#[derive(Default)]
struct Outbox {
    pending: Vec<Outbound>,
    closing: bool,
}

impl ChannelHandle for Outbox {
    fn write(&mut self, outbound: Outbound) -> io::Result<()> {
        if self.closing {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "connection is closing",
            ));
        }
        self.pending.push(outbound);
        Ok(())
    }

    fn close(&mut self) {
        self.closing = true;
    }

    fn is_open(&self) -> bool {
        !self.closing
    }
}

/// Queues frames for a running connection. Cheap to clone; frames queued before the handshake
/// completes are held until it does. Once any clone has queued a Close frame, every later send
/// fails with `ConnectionClosed`.
#[derive(Clone)]
pub struct WebSocketSender {
    tx: mpsc::UnboundedSender<OutboundFrame>,
    close_queued: Arc<AtomicBool>,
}

impl WebSocketSender {
    pub fn send(&self, frame: OutboundFrame) -> Result<(), WebSocketError> {
        if frame.opcode.is_control() && frame.payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "control frame payload max 125 bytes",
            )
            .into());
        }
        let closed = if frame.opcode == Opcode::Close {
            self.close_queued.swap(true, Ordering::SeqCst)
        } else {
            self.close_queued.load(Ordering::SeqCst)
        };
        if closed {
            return Err(WebSocketError::ConnectionClosed);
        }
        self.tx
            .send(frame)
            .map_err(|_| WebSocketError::ConnectionClosed)
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), WebSocketError> {
        self.send(OutboundFrame::text(text))
    }

    pub fn send_binary(&self, data: impl Into<bytes::Bytes>) -> Result<(), WebSocketError> {
        self.send(OutboundFrame::binary(data))
    }

    pub fn send_ping(&self, data: impl Into<bytes::Bytes>) -> Result<(), WebSocketError> {
        self.send(OutboundFrame::ping(data))
    }

    /// Start the closing handshake. The connection ends when the peer answers with its Close.
    pub fn close(&self, code: u16, reason: &str) -> Result<(), WebSocketError> {
        if !is_sendable_close_code(code) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("close code {} may not be sent", code),
            )
            .into());
        }
        self.send(OutboundFrame::close(Some(code), reason))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One client connection. Spawn `run()`; use a `WebSocketSender` to send.
pub struct WebSocketConnection {
    stream: HttpStream,
    read_buf: BytesMut,
    response_decoder: ResponseDecoder,
    frame_decoder: FrameDecoder,
    encoder: RequestEncoder,
    trace: Option<TraceLogger>,
    dispatcher: FrameDispatcher,
    outbox: Outbox,
    commands: mpsc::UnboundedReceiver<OutboundFrame>,
    sender: WebSocketSender,
}

impl WebSocketConnection {
    pub(crate) fn new(
        stream: HttpStream,
        dispatcher: FrameDispatcher,
        trace: Option<TraceLogger>,
    ) -> Self {
        let (tx, commands) = mpsc::unbounded_channel();
        Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            response_decoder: ResponseDecoder::new(),
            frame_decoder: FrameDecoder::new(),
            encoder: RequestEncoder::new(false),
            trace,
            dispatcher,
            outbox: Outbox::default(),
            commands,
            sender: WebSocketSender {
                tx,
                close_queued: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    pub fn sender(&self) -> WebSocketSender {
        self.sender.clone()
    }

    pub fn context(&self) -> &ChannelContext {
        self.dispatcher.context()
    }

    /// Drive the connection until it terminates. The observer receives exactly one terminal
    /// notification (a Close message or an error) before this returns.
    pub async fn run(mut self) {
        self.dispatcher.on_connection_open(&mut self.outbox);
        if let Err(e) = self.flush().await {
            self.fail(e.into());
        }
        loop {
            if self.outbox.closing || self.dispatcher.is_terminated() {
                let _ = self.flush().await;
                let _ = self.stream.shutdown().await;
                tracing::debug!(connection = %self.dispatcher.context().connection_id(), "connection finished");
                return;
            }
            let handshake_done = self.dispatcher.handshake_state() == HandshakeState::Complete;
            self.read_buf.reserve(READ_CHUNK);
            tokio::select! {
                read = self.stream.read_buf(&mut self.read_buf) => match read {
                    Ok(0) => {
                        self.finish_handshake_at_eof();
                        self.dispatcher.on_connection_closed();
                        return;
                    }
                    Ok(n) => {
                        if let Some(trace) = &self.trace {
                            let start = self.read_buf.len() - n;
                            trace.inbound(&self.read_buf[start..]);
                        }
                        self.decode_available();
                    }
                    Err(e) => self.fail(e.into()),
                },
                Some(frame) = self.commands.recv(), if handshake_done => {
                    if let Err(e) = self.dispatcher.send_frame(&mut self.outbox, frame) {
                        tracing::debug!(error = %e, "frame dropped");
                    }
                }
            }
            if let Err(e) = self.flush().await {
                self.fail(e.into());
            }
        }
    }

    fn decode_available(&mut self) {
        while !self.dispatcher.is_terminated() {
            let unit = if self.dispatcher.handshake_state() == HandshakeState::Pending {
                self.response_decoder
                    .decode(&mut self.read_buf)
                    .map(|r| r.map(InboundUnit::Response))
            } else {
                self.frame_decoder.decode(&mut self.read_buf)
            };
            match unit {
                Ok(Some(unit)) => self.dispatcher.on_inbound(&mut self.outbox, unit),
                Ok(None) => break,
                Err(e) => {
                    self.fail(WebSocketError::ProtocolViolation(e.to_string()));
                    break;
                }
            }
        }
    }

    /// A rejected upgrade may carry a body read until close: the response only completes at end
    /// of stream and must still reach the handshaker.
    fn finish_handshake_at_eof(&mut self) {
        if self.dispatcher.handshake_state() != HandshakeState::Pending
            || self.dispatcher.is_terminated()
        {
            return;
        }
        match self.response_decoder.decode_eof(&mut self.read_buf) {
            Ok(Some(response)) => self
                .dispatcher
                .on_inbound(&mut self.outbox, InboundUnit::Response(response)),
            Ok(None) => {}
            // truncated response: treated as a dropped connection
            Err(e) => tracing::debug!(error = %e, "upgrade response cut short"),
        }
    }

    fn fail(&mut self, error: WebSocketError) {
        self.dispatcher.on_error(&mut self.outbox, error);
    }

    async fn flush(&mut self) -> io::Result<()> {
        if self.outbox.pending.is_empty() {
            return Ok(());
        }
        let mut out = BytesMut::new();
        for outbound in self.outbox.pending.drain(..) {
            match outbound {
                Outbound::Request(request) => self.encoder.encode(&request, &mut out)?,
                Outbound::Frame(frame) => frame.encode(&mut out)?,
            }
        }
        if let Some(trace) = &self.trace {
            trace.outbound(&out);
        }
        self.stream.write_all(&out).await?;
        self.stream.flush().await
    }
}
