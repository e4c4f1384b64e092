/*
 * dispatcher.rs
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

//! Client frame dispatcher: the per-connection state machine between the decoders and the
//! observer.
//!
//! The connection worker calls `on_connection_open`, then `on_inbound` for every decoded unit,
//! and `on_connection_closed` or `on_error` when the transport ends. All calls for one connection
//! are sequential, so the dispatcher holds no locks. Writes go through `ChannelHandle`, which the
//! worker flushes after each call.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::protocol::http::RequestBuilder;
use crate::protocol::websocket::context::ChannelContext;
use crate::protocol::websocket::error::WebSocketError;
use crate::protocol::websocket::frame::{
    is_sendable_close_code, InboundUnit, Opcode, OutboundFrame, CLOSE_NO_STATUS,
    CLOSE_PROTOCOL_ERROR,
};
use crate::protocol::websocket::handshake::Handshaker;
use crate::protocol::websocket::message::{ControlSignal, WebSocketMessage};
use crate::protocol::websocket::observer::WebSocketObserver;
use crate::protocol::websocket::session::{ClientSession, SessionRegistry};

/// Something the dispatcher asks the connection to send.
#[derive(Debug, Clone)]
pub enum Outbound {
    Request(RequestBuilder),
    Frame(OutboundFrame),
}

/// The dispatcher's view of its connection.
pub trait ChannelHandle {
    fn write(&mut self, outbound: Outbound) -> io::Result<()>;

    /// Close after flushing what was already written.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Monotonic: Pending moves to Complete or Failed, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Pending,
    Complete,
    Failed,
}

pub type HandshakeResult = Result<(), Arc<WebSocketError>>;

/// Resolves once, when the handshake completes or fails. If the connection goes away first,
/// resolves with `ConnectionClosed`.
#[derive(Debug)]
pub struct HandshakeFuture {
    rx: oneshot::Receiver<HandshakeResult>,
}

impl Future for HandshakeFuture {
    type Output = HandshakeResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or_else(|_| Err(Arc::new(WebSocketError::ConnectionClosed))))
    }
}

pub struct FrameDispatcher {
    handshaker: Box<dyn Handshaker>,
    observer: Arc<dyn WebSocketObserver>,
    registry: Option<Arc<dyn SessionRegistry>>,
    context: Arc<ChannelContext>,
    state: HandshakeState,
    session: Option<Arc<ClientSession>>,
    signal: Option<oneshot::Sender<HandshakeResult>>,
    opened: bool,
    /// A Close frame went out through `send_frame`; the peer's Close is then not echoed.
    close_sent: bool,
    /// Set once the terminal notification (Close message or error) has been delivered.
    terminated: bool,
}

impl FrameDispatcher {
    pub fn new(
        handshaker: Box<dyn Handshaker>,
        observer: Arc<dyn WebSocketObserver>,
        registry: Option<Arc<dyn SessionRegistry>>,
        context: ChannelContext,
    ) -> (Self, HandshakeFuture) {
        let (tx, rx) = oneshot::channel();
        let dispatcher = Self {
            handshaker,
            observer,
            registry,
            context: Arc::new(context),
            state: HandshakeState::Pending,
            session: None,
            signal: Some(tx),
            opened: false,
            close_sent: false,
            terminated: false,
        };
        (dispatcher, HandshakeFuture { rx })
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.state
    }

    pub fn session(&self) -> Option<&Arc<ClientSession>> {
        self.session.as_ref()
    }

    pub fn context(&self) -> &Arc<ChannelContext> {
        &self.context
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// True once this side has sent a Close frame.
    pub fn close_sent(&self) -> bool {
        self.close_sent
    }

    /// Send an application frame. Nothing may follow a Close frame, and nothing is sent once the
    /// connection has terminated.
    pub fn send_frame(
        &mut self,
        channel: &mut dyn ChannelHandle,
        frame: OutboundFrame,
    ) -> Result<(), WebSocketError> {
        if self.terminated || self.close_sent {
            return Err(WebSocketError::ConnectionClosed);
        }
        if frame.opcode == Opcode::Close {
            self.close_sent = true;
        }
        channel.write(Outbound::Frame(frame))?;
        Ok(())
    }

    /// Starts the handshake. Only the first call has any effect.
    pub fn on_connection_open(&mut self, channel: &mut dyn ChannelHandle) {
        if self.opened {
            return;
        }
        self.opened = true;
        tracing::debug!(connection = %self.context.connection_id(), uri = %self.context.requested_uri(), "connection open");
        if let Err(e) = self.handshaker.begin_handshake(channel) {
            self.on_error(channel, e);
        }
    }

    /// Dispatch one decoded unit. Errors raised here take the `on_error` path.
    pub fn on_inbound(&mut self, channel: &mut dyn ChannelHandle, unit: InboundUnit) {
        if self.terminated {
            tracing::debug!(connection = %self.context.connection_id(), "unit after termination ignored");
            return;
        }
        match self.state {
            HandshakeState::Pending => match unit {
                InboundUnit::Response(response) => {
                    match self.handshaker.complete_handshake(&response) {
                        Ok(()) => self.handshake_complete(),
                        Err(e) => self.on_error(channel, e),
                    }
                }
                other => {
                    let e = WebSocketError::ProtocolViolation(format!(
                        "{} received before the handshake completed",
                        describe(&other)
                    ));
                    self.on_error(channel, e);
                }
            },
            HandshakeState::Complete => self.dispatch_frame(channel, unit),
            HandshakeState::Failed => {}
        }
    }

    /// The transport ended without a Close frame: deliver the going-away Close.
    pub fn on_connection_closed(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.release_session();
        if let Some(signal) = self.signal.take() {
            self.state = HandshakeState::Failed;
            let _ = signal.send(Err(Arc::new(WebSocketError::ConnectionClosed)));
        }
        tracing::debug!(connection = %self.context.connection_id(), "connection dropped without close frame");
        self.observer
            .on_message(&self.context, WebSocketMessage::going_away());
    }

    /// Terminal error path: fail a pending handshake, notify the observer, close.
    pub fn on_error(&mut self, channel: &mut dyn ChannelHandle, cause: WebSocketError) {
        if self.terminated {
            tracing::debug!(connection = %self.context.connection_id(), error = %cause, "error after termination ignored");
            return;
        }
        self.terminated = true;
        self.release_session();
        let cause = Arc::new(cause);
        if let Some(signal) = self.signal.take() {
            self.state = HandshakeState::Failed;
            let _ = signal.send(Err(cause.clone()));
        }
        tracing::warn!(connection = %self.context.connection_id(), error = %cause, "websocket connection failed");
        self.observer.on_error(&self.context, &cause);
        channel.close();
    }

    fn handshake_complete(&mut self) {
        self.state = HandshakeState::Complete;
        let session = Arc::new(ClientSession::new(
            self.context.clone(),
            self.handshaker.subprotocol().map(str::to_string),
        ));
        self.session = Some(session.clone());
        if let Some(registry) = &self.registry {
            registry.register_session(session);
        }
        if let Some(signal) = self.signal.take() {
            let _ = signal.send(Ok(()));
        }
        tracing::debug!(connection = %self.context.connection_id(), "websocket handshake complete");
    }

    /// Called once, on the terminal path.
    fn release_session(&self) {
        if let (Some(registry), Some(session)) = (&self.registry, &self.session) {
            registry.unregister_session(session.id());
        }
    }

    fn dispatch_frame(&mut self, channel: &mut dyn ChannelHandle, unit: InboundUnit) {
        match unit {
            InboundUnit::Text {
                body,
                final_fragment,
            } => self.emit(WebSocketMessage::Text {
                body,
                final_fragment,
            }),
            InboundUnit::Binary {
                data,
                final_fragment,
            } => self.emit(WebSocketMessage::Binary {
                data,
                final_fragment,
            }),
            InboundUnit::Pong(payload) => self.emit(WebSocketMessage::Control {
                signal: ControlSignal::Pong,
                payload,
            }),
            InboundUnit::Ping(payload) => {
                if let Err(e) = channel.write(Outbound::Frame(OutboundFrame::pong(payload))) {
                    self.on_error(channel, e.into());
                }
            }
            InboundUnit::Close { code, reason } => {
                if !self.close_sent {
                    let echo = match code {
                        CLOSE_NO_STATUS => OutboundFrame::close(None, ""),
                        c if is_sendable_close_code(c) => OutboundFrame::close(Some(c), ""),
                        _ => OutboundFrame::close(Some(CLOSE_PROTOCOL_ERROR), ""),
                    };
                    if let Err(e) = channel.write(Outbound::Frame(echo)) {
                        tracing::debug!(connection = %self.context.connection_id(), error = %e, "close echo not sent");
                    }
                    self.close_sent = true;
                }
                channel.close();
                self.terminated = true;
                self.release_session();
                tracing::debug!(connection = %self.context.connection_id(), code, "peer closed");
                self.emit(WebSocketMessage::Close {
                    status_code: code,
                    reason,
                });
            }
            InboundUnit::Response(response) => {
                let e = WebSocketError::UnexpectedResponse {
                    status: response.status,
                    content: response.body_text(),
                };
                self.on_error(channel, e);
            }
            InboundUnit::Unknown { opcode } => {
                self.on_error(channel, WebSocketError::UnrecognizedFrame { opcode });
            }
        }
    }

    fn emit(&self, message: WebSocketMessage) {
        self.observer.on_message(&self.context, message);
    }
}

fn describe(unit: &InboundUnit) -> &'static str {
    match unit {
        InboundUnit::Response(_) => "HTTP response",
        InboundUnit::Text { .. } => "text frame",
        InboundUnit::Binary { .. } => "binary frame",
        InboundUnit::Ping(_) => "ping frame",
        InboundUnit::Pong(_) => "pong frame",
        InboundUnit::Close { .. } => "close frame",
        InboundUnit::Unknown { .. } => "unknown frame",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::FullResponse;
    use crate::protocol::websocket::error::HandshakeError;
    use crate::protocol::websocket::frame::Opcode;
    use crate::protocol::websocket::message::{GOING_AWAY_REASON, GOING_AWAY_STATUS};
    use crate::protocol::websocket::observer::{ChannelObserver, ObserverEvent};
    use crate::protocol::websocket::session::SessionSet;
    use bytes::Bytes;
    use tokio::sync::mpsc::UnboundedReceiver;

    #[derive(Default)]
    struct Recorder {
        written: Vec<Outbound>,
        closes: usize,
    }

    impl ChannelHandle for Recorder {
        fn write(&mut self, outbound: Outbound) -> io::Result<()> {
            self.written.push(outbound);
            Ok(())
        }

        fn close(&mut self) {
            self.closes += 1;
        }

        fn is_open(&self) -> bool {
            self.closes == 0
        }
    }

    /// Accepts any 101; rejects everything else.
    #[derive(Default)]
    struct StubHandshaker {
        complete: bool,
    }

    impl Handshaker for StubHandshaker {
        fn begin_handshake(&mut self, channel: &mut dyn ChannelHandle) -> Result<(), WebSocketError> {
            channel.write(Outbound::Request(RequestBuilder::new(
                crate::protocol::http::Method::Get,
                "/",
            )))?;
            Ok(())
        }

        fn complete_handshake(&mut self, response: &FullResponse) -> Result<(), WebSocketError> {
            if response.status != 101 {
                return Err(HandshakeError::UnexpectedStatus {
                    status: response.status,
                    body: String::new(),
                }
                .into());
            }
            self.complete = true;
            Ok(())
        }

        fn is_complete(&self) -> bool {
            self.complete
        }
    }

    struct Harness {
        dispatcher: FrameDispatcher,
        handshake: HandshakeFuture,
        channel: Recorder,
        events: UnboundedReceiver<ObserverEvent>,
        registry: Arc<SessionSet>,
    }

    fn harness() -> Harness {
        let (observer, events) = ChannelObserver::new();
        let registry = Arc::new(SessionSet::new());
        let ctx = ChannelContext::new("127.0.0.1:5000".parse().unwrap(), false, "ws://h/chat");
        let (dispatcher, handshake) = FrameDispatcher::new(
            Box::new(StubHandshaker::default()),
            Arc::new(observer),
            Some(registry.clone() as Arc<dyn SessionRegistry>),
            ctx,
        );
        Harness {
            dispatcher,
            handshake,
            channel: Recorder::default(),
            events,
            registry,
        }
    }

    fn open(h: &mut Harness) {
        h.dispatcher.on_connection_open(&mut h.channel);
        h.dispatcher
            .on_inbound(&mut h.channel, InboundUnit::Response(FullResponse::new(101)));
    }

    fn drain(rx: &mut UnboundedReceiver<ObserverEvent>) -> Vec<ObserverEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[tokio::test]
    async fn handshake_completion_registers_one_session_and_emits_nothing() {
        let mut h = harness();
        h.dispatcher.on_connection_open(&mut h.channel);
        h.dispatcher.on_connection_open(&mut h.channel);
        assert_eq!(h.channel.written.len(), 1);
        h.dispatcher
            .on_inbound(&mut h.channel, InboundUnit::Response(FullResponse::new(101)));
        assert_eq!(h.dispatcher.handshake_state(), HandshakeState::Complete);
        assert!(h.handshake.await.is_ok());
        assert_eq!(h.registry.len(), 1);
        let session = h.dispatcher.session().unwrap();
        assert_eq!(session.uri(), "ws://h/chat");
        assert_eq!(session.context().listener_port(), 5000);
        assert!(drain(&mut h.events).is_empty());
    }

    #[test]
    fn data_and_pong_frames_emitted_in_order() {
        let mut h = harness();
        open(&mut h);
        let units = vec![
            InboundUnit::Text {
                body: "one".into(),
                final_fragment: false,
            },
            InboundUnit::Binary {
                data: Bytes::from_static(&[1, 2, 3]),
                final_fragment: true,
            },
            InboundUnit::Pong(Bytes::from_static(b"p")),
        ];
        for u in units {
            h.dispatcher.on_inbound(&mut h.channel, u);
        }
        assert_eq!(
            drain(&mut h.events),
            vec![
                ObserverEvent::Message(WebSocketMessage::Text {
                    body: "one".into(),
                    final_fragment: false
                }),
                ObserverEvent::Message(WebSocketMessage::Binary {
                    data: Bytes::from_static(&[1, 2, 3]),
                    final_fragment: true
                }),
                ObserverEvent::Message(WebSocketMessage::Control {
                    signal: ControlSignal::Pong,
                    payload: Bytes::from_static(b"p")
                }),
            ]
        );
    }

    #[test]
    fn ping_answered_with_identical_pong() {
        let mut h = harness();
        open(&mut h);
        h.channel.written.clear();
        h.dispatcher
            .on_inbound(&mut h.channel, InboundUnit::Ping(Bytes::from_static(b"hb")));
        match &h.channel.written[..] {
            [Outbound::Frame(f)] => {
                assert_eq!(f.opcode, Opcode::Pong);
                assert_eq!(&f.payload[..], b"hb");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(drain(&mut h.events).is_empty());
    }

    #[test]
    fn peer_close_closes_then_emits_once() {
        let mut h = harness();
        open(&mut h);
        h.dispatcher.on_inbound(
            &mut h.channel,
            InboundUnit::Close {
                code: 1000,
                reason: "bye".into(),
            },
        );
        assert_eq!(h.channel.closes, 1);
        assert!(matches!(
            h.channel.written.last(),
            Some(Outbound::Frame(f)) if f.opcode == Opcode::Close && &f.payload[..] == b"\x03\xe8"
        ));
        h.dispatcher.on_connection_closed();
        h.dispatcher.on_error(&mut h.channel, WebSocketError::ConnectionClosed);
        assert_eq!(
            drain(&mut h.events),
            vec![ObserverEvent::Message(WebSocketMessage::Close {
                status_code: 1000,
                reason: "bye".into()
            })]
        );
    }

    #[test]
    fn reply_to_local_close_is_not_echoed() {
        let mut h = harness();
        open(&mut h);
        h.channel.written.clear();
        h.dispatcher
            .send_frame(&mut h.channel, OutboundFrame::close(Some(1000), "done"))
            .unwrap();
        assert!(h.dispatcher.close_sent());
        assert!(matches!(
            h.dispatcher.send_frame(&mut h.channel, OutboundFrame::text("late")),
            Err(WebSocketError::ConnectionClosed)
        ));
        h.dispatcher.on_inbound(
            &mut h.channel,
            InboundUnit::Close {
                code: 1000,
                reason: String::new(),
            },
        );
        assert_eq!(h.channel.written.len(), 1);
        assert_eq!(h.channel.closes, 1);
        assert!(matches!(
            drain(&mut h.events).as_slice(),
            [ObserverEvent::Message(WebSocketMessage::Close { status_code: 1000, .. })]
        ));
    }

    #[test]
    fn reserved_close_codes_echoed_as_protocol_error() {
        let cases = [
            (1006u16, Some(1002u16)),
            (999, Some(1002)),
            (1015, Some(1002)),
            (4001, Some(4001)),
            (1005, None),
        ];
        for (received, echoed) in cases {
            let mut h = harness();
            open(&mut h);
            h.channel.written.clear();
            h.dispatcher.on_inbound(
                &mut h.channel,
                InboundUnit::Close {
                    code: received,
                    reason: String::new(),
                },
            );
            let payload = match h.channel.written.as_slice() {
                [Outbound::Frame(f)] if f.opcode == Opcode::Close => f.payload.clone(),
                other => panic!("unexpected {:?}", other),
            };
            let expected = echoed.map(|c| c.to_be_bytes().to_vec()).unwrap_or_default();
            assert_eq!(&payload[..], &expected[..], "code {}", received);
            // the observer still sees what the peer sent
            assert_eq!(
                drain(&mut h.events),
                vec![ObserverEvent::Message(WebSocketMessage::Close {
                    status_code: received,
                    reason: String::new()
                })]
            );
        }
    }

    #[test]
    fn session_unregistered_on_every_terminal_path() {
        let mut h = harness();
        open(&mut h);
        assert_eq!(h.registry.len(), 1);
        h.dispatcher.on_inbound(
            &mut h.channel,
            InboundUnit::Close {
                code: 1000,
                reason: String::new(),
            },
        );
        assert!(h.registry.is_empty());

        let mut h = harness();
        open(&mut h);
        h.dispatcher.on_connection_closed();
        assert!(h.registry.is_empty());

        let mut h = harness();
        open(&mut h);
        h.dispatcher
            .on_inbound(&mut h.channel, InboundUnit::Unknown { opcode: 0xB });
        h.dispatcher.on_connection_closed();
        assert!(h.registry.is_empty());
        assert!(h.dispatcher.session().is_some());
    }

    #[test]
    fn drop_without_close_synthesizes_going_away() {
        let mut h = harness();
        open(&mut h);
        h.dispatcher.on_connection_closed();
        h.dispatcher.on_connection_closed();
        assert_eq!(
            drain(&mut h.events),
            vec![ObserverEvent::Message(WebSocketMessage::Close {
                status_code: GOING_AWAY_STATUS,
                reason: GOING_AWAY_REASON.into()
            })]
        );
    }

    #[test]
    fn response_after_handshake_is_an_error() {
        let mut h = harness();
        open(&mut h);
        h.dispatcher
            .on_inbound(&mut h.channel, InboundUnit::Response(FullResponse::new(200)));
        assert_eq!(h.channel.closes, 1);
        let events = drain(&mut h.events);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ObserverEvent::Error(m) if m.contains("status=200")));
        h.dispatcher.on_inbound(
            &mut h.channel,
            InboundUnit::Text {
                body: "late".into(),
                final_fragment: true,
            },
        );
        assert!(drain(&mut h.events).is_empty());
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let mut h = harness();
        open(&mut h);
        h.dispatcher
            .on_inbound(&mut h.channel, InboundUnit::Unknown { opcode: 0x3 });
        assert_eq!(h.channel.closes, 1);
        assert!(matches!(
            drain(&mut h.events).as_slice(),
            [ObserverEvent::Error(_)]
        ));
    }

    #[tokio::test]
    async fn frame_before_handshake_fails_handshake() {
        let mut h = harness();
        h.dispatcher.on_connection_open(&mut h.channel);
        h.dispatcher.on_inbound(
            &mut h.channel,
            InboundUnit::Text {
                body: "early".into(),
                final_fragment: true,
            },
        );
        assert_eq!(h.dispatcher.handshake_state(), HandshakeState::Failed);
        let err = h.handshake.await.unwrap_err();
        assert!(matches!(*err, WebSocketError::ProtocolViolation(_)));
        assert_eq!(h.channel.closes, 1);
        assert_eq!(drain(&mut h.events).len(), 1);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn rejected_handshake_reports_error_once() {
        let mut h = harness();
        h.dispatcher.on_connection_open(&mut h.channel);
        h.dispatcher
            .on_inbound(&mut h.channel, InboundUnit::Response(FullResponse::new(400)));
        h.dispatcher.on_connection_closed();
        let err = h.handshake.await.unwrap_err();
        assert!(matches!(*err, WebSocketError::Handshake(_)));
        let events = drain(&mut h.events);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ObserverEvent::Error(_)));
        assert!(h.dispatcher.session().is_none());
    }

    #[tokio::test]
    async fn drop_during_handshake_fails_signal() {
        let mut h = harness();
        h.dispatcher.on_connection_open(&mut h.channel);
        h.dispatcher.on_connection_closed();
        let err = h.handshake.await.unwrap_err();
        assert!(matches!(*err, WebSocketError::ConnectionClosed));
        assert!(matches!(
            drain(&mut h.events).as_slice(),
            [ObserverEvent::Message(WebSocketMessage::Close { status_code: 1001, .. })]
        ));
    }
}
