/*
 * assembler.rs
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

//! Declares the stage chain of an outbound HTTP connection.

use crate::config::ConnectionConfig;
use crate::pipeline::compressor::ContentCompressor;
use crate::pipeline::error::PipelineError;
use crate::pipeline::redirect::RedirectStage;
use crate::pipeline::stage::{
    Pipeline, Stage, COMPRESSOR_STAGE, DECODER_STAGE, ENCODER_STAGE, REDIRECT_STAGE, TLS_STAGE,
    TRACE_STAGE,
};
use crate::pipeline::trace::{TraceChannel, TraceLogger};
use crate::protocol::http::{RequestEncoder, ResponseDecoder};

/// Installs, in order: TLS (if configured), compressor, decoder, encoder, trace logger (if
/// enabled) and the redirect stage. Does no I/O.
#[derive(Debug, Clone)]
pub struct PipelineAssembler {
    config: ConnectionConfig,
}

impl PipelineAssembler {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Fails only if `pipeline` already holds one of the stage names.
    pub fn assemble(&self, pipeline: &mut Pipeline) -> Result<(), PipelineError> {
        if let Some(tls) = self.config.tls_context() {
            pipeline.add_last(TLS_STAGE, Stage::Tls(tls.clone()))?;
        }
        pipeline
            .add_last(COMPRESSOR_STAGE, Stage::Compressor(ContentCompressor::new()))?
            .add_last(DECODER_STAGE, Stage::Decoder(ResponseDecoder::new()))?
            .add_last(
                ENCODER_STAGE,
                Stage::Encoder(RequestEncoder::new(self.config.chunking_disabled())),
            )?;
        if self.config.trace_logging_enabled() {
            pipeline.add_last(
                TRACE_STAGE,
                Stage::TraceLogger(TraceLogger::new(TraceChannel::Upstream)),
            )?;
        }
        pipeline.add_last(REDIRECT_STAGE, Stage::Redirect(RedirectStage::new(self.config.clone())))?;
        tracing::debug!(stages = ?pipeline.names(), origin = self.config.origin().url(), "pipeline assembled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OriginContext;
    use crate::net::TlsContext;

    fn assembled(config: ConnectionConfig) -> Pipeline {
        let mut p = Pipeline::new();
        PipelineAssembler::new(config).assemble(&mut p).unwrap();
        p
    }

    #[test]
    fn plain_with_trace_logging() {
        let config = ConnectionConfig::builder(OriginContext::new("http://h/"))
            .trace_logging(true)
            .build();
        let p = assembled(config);
        assert_eq!(
            p.names(),
            vec![
                COMPRESSOR_STAGE,
                DECODER_STAGE,
                ENCODER_STAGE,
                TRACE_STAGE,
                REDIRECT_STAGE
            ]
        );
        assert_eq!(
            p.trace_logger().map(|t| t.channel().target()),
            Some("tracelog.http.upstream")
        );
    }

    #[test]
    fn tls_first_and_no_trace_by_default() {
        let config = ConnectionConfig::builder(OriginContext::new("https://h/"))
            .tls_context(TlsContext::new("h").unwrap())
            .build();
        let p = assembled(config);
        assert_eq!(
            p.names(),
            vec![
                TLS_STAGE,
                COMPRESSOR_STAGE,
                DECODER_STAGE,
                ENCODER_STAGE,
                REDIRECT_STAGE
            ]
        );
        assert_eq!(p.tls().map(|t| t.host()), Some("h"));
    }

    #[test]
    fn redirect_stage_receives_config_unchanged() {
        let origin = OriginContext::new("http://h/start");
        let config = ConnectionConfig::builder(origin.clone())
            .max_redirects(2)
            .chunking_disabled(true)
            .idle_handler_removed(true)
            .trace_logging(true)
            .build();
        let p = assembled(config);
        let stage = p.redirect().unwrap().config();
        assert_eq!(stage.max_redirects(), 2);
        assert!(stage.chunking_disabled());
        assert!(stage.idle_handler_removed());
        assert!(stage.trace_logging_enabled());
        assert!(stage.tls_context().is_none());
        assert!(stage.origin().same_origin(&origin));
        assert!(p.encoder().unwrap().chunking_disabled());
    }

    #[test]
    fn assembling_twice_fails() {
        let config = ConnectionConfig::builder(OriginContext::new("http://h/")).build();
        let mut p = Pipeline::new();
        let assembler = PipelineAssembler::new(config);
        assembler.assemble(&mut p).unwrap();
        assert!(matches!(
            assembler.assemble(&mut p),
            Err(PipelineError::DuplicateStage(_))
        ));
    }
}
