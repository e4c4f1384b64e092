/*
 * stage.rs
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

//! Named pipeline stages and the ordered pipeline that holds them.

use std::fmt;

use crate::net::TlsContext;
use crate::pipeline::compressor::ContentCompressor;
use crate::pipeline::error::PipelineError;
use crate::pipeline::redirect::RedirectStage;
use crate::pipeline::trace::TraceLogger;
use crate::protocol::http::{RequestEncoder, ResponseDecoder};

pub const TLS_STAGE: &str = "ssl";
pub const COMPRESSOR_STAGE: &str = "compressor";
pub const DECODER_STAGE: &str = "decoder";
pub const ENCODER_STAGE: &str = "encoder";
pub const TRACE_STAGE: &str = "http-trace-logger";
pub const REDIRECT_STAGE: &str = "redirect-handler";

/// One processing stage of an outbound HTTP connection.
pub enum Stage {
    Tls(TlsContext),
    Compressor(ContentCompressor),
    Decoder(ResponseDecoder),
    Encoder(RequestEncoder),
    TraceLogger(TraceLogger),
    Redirect(RedirectStage),
}

impl Stage {
    pub fn kind(&self) -> &'static str {
        match self {
            Stage::Tls(_) => "tls",
            Stage::Compressor(_) => "compressor",
            Stage::Decoder(_) => "decoder",
            Stage::Encoder(_) => "encoder",
            Stage::TraceLogger(_) => "trace-logger",
            Stage::Redirect(_) => "redirect",
        }
    }
}

/// Stages in installation order, each under a unique name. Bytes leave through the stages from
/// last to first and arrive from first to last, so the TLS stage (when present) sits at the
/// head, next to the socket.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<(&'static str, Stage)>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_last(&mut self, name: &'static str, stage: Stage) -> Result<&mut Self, PipelineError> {
        if self.contains(name) {
            return Err(PipelineError::DuplicateStage(name));
        }
        self.stages.push((name, stage));
        Ok(self)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(n, _)| *n).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.iter().any(|(n, _)| *n == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|(n, _)| *n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|(n, _)| *n == name).map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Stage> {
        self.stages
            .iter_mut()
            .find(|(n, _)| *n == name)
            .map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn tls(&self) -> Option<&TlsContext> {
        match self.get(TLS_STAGE) {
            Some(Stage::Tls(t)) => Some(t),
            _ => None,
        }
    }

    pub fn compressor(&self) -> Option<&ContentCompressor> {
        match self.get(COMPRESSOR_STAGE) {
            Some(Stage::Compressor(c)) => Some(c),
            _ => None,
        }
    }

    pub fn decoder_mut(&mut self) -> Option<&mut ResponseDecoder> {
        match self.get_mut(DECODER_STAGE) {
            Some(Stage::Decoder(d)) => Some(d),
            _ => None,
        }
    }

    pub fn encoder(&self) -> Option<&RequestEncoder> {
        match self.get(ENCODER_STAGE) {
            Some(Stage::Encoder(e)) => Some(e),
            _ => None,
        }
    }

    pub fn trace_logger(&self) -> Option<&TraceLogger> {
        match self.get(TRACE_STAGE) {
            Some(Stage::TraceLogger(t)) => Some(t),
            _ => None,
        }
    }

    pub fn redirect(&self) -> Option<&RedirectStage> {
        match self.get(REDIRECT_STAGE) {
            Some(Stage::Redirect(r)) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
