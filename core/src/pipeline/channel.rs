/*
 * channel.rs
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

//! Drives one outbound HTTP connection through its assembled pipeline.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::ConnectionConfig;
use crate::net::{connect_tcp, HttpStream};
use crate::pipeline::assembler::PipelineAssembler;
use crate::pipeline::error::PipelineError;
use crate::pipeline::redirect::{bind_tls, RedirectAction};
use crate::pipeline::stage::{Pipeline, DECODER_STAGE, ENCODER_STAGE, REDIRECT_STAGE};
use crate::protocol::http::{FullResponse, RequestBuilder};
use crate::uri::Endpoint;

const READ_CHUNK: usize = 8192;

/// A freshly opened connection with its pipeline. One request/response exchange per channel:
/// redirect hops always open a new one.
pub struct PipelineChannel {
    endpoint: Endpoint,
    stream: HttpStream,
    pipeline: Pipeline,
    read_buf: BytesMut,
}

impl PipelineChannel {
    /// Connect to `endpoint`, assemble the pipeline from `config`, and run the TLS handshake when
    /// the pipeline has a TLS stage.
    pub async fn open(endpoint: Endpoint, config: &ConnectionConfig) -> Result<Self, PipelineError> {
        let mut pipeline = Pipeline::new();
        PipelineAssembler::new(config.clone()).assemble(&mut pipeline)?;
        let tcp = connect_tcp(endpoint.host(), endpoint.port()).await?;
        let stream = HttpStream::establish(tcp, pipeline.tls())
            .await
            .map_err(PipelineError::Tls)?;
        tracing::debug!(endpoint = %endpoint, secure = stream.is_secure(), "pipeline channel open");
        Ok(Self {
            endpoint,
            stream,
            pipeline,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn is_secure(&self) -> bool {
        self.stream.is_secure()
    }

    /// Send `request` and read the response through the stages. The redirect stage has the last
    /// word: the response is delivered or turned into the next hop. `hops_followed` counts the
    /// redirects already taken in this chain.
    pub async fn exchange(
        mut self,
        mut request: RequestBuilder,
        hops_followed: u32,
    ) -> Result<RedirectAction, PipelineError> {
        if !request.has_header("Host") {
            request.header("Host", self.endpoint.authority());
        }
        if !request.has_header("Connection") {
            request.header("Connection", "close");
        }
        if let Some(compressor) = self.pipeline.compressor() {
            compressor.prepare_request(&mut request);
        }
        let mut out = BytesMut::new();
        self.pipeline
            .encoder()
            .ok_or(PipelineError::MissingStage(ENCODER_STAGE))?
            .encode(&request, &mut out)?;
        if let Some(trace) = self.pipeline.trace_logger() {
            trace.outbound(&out);
        }
        self.stream.write_all(&out).await?;
        self.stream.flush().await?;

        let response = self.read_response().await?;
        let response = match self.pipeline.compressor() {
            Some(compressor) => compressor.decode_response(response)?,
            None => response,
        };
        let _ = self.stream.shutdown().await;
        let redirect = self
            .pipeline
            .redirect()
            .ok_or(PipelineError::MissingStage(REDIRECT_STAGE))?;
        redirect.on_response(&self.endpoint, request, response, hops_followed)
    }

    async fn read_response(&mut self) -> Result<FullResponse, PipelineError> {
        loop {
            let decoder = self
                .pipeline
                .decoder_mut()
                .ok_or(PipelineError::MissingStage(DECODER_STAGE))?;
            if let Some(response) = decoder.decode(&mut self.read_buf)? {
                // interim responses (100 Continue) precede the real one
                if (100..200).contains(&response.status) {
                    continue;
                }
                return Ok(response);
            }
            let start = self.read_buf.len();
            self.read_buf.reserve(READ_CHUNK);
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                let decoder = self
                    .pipeline
                    .decoder_mut()
                    .ok_or(PipelineError::MissingStage(DECODER_STAGE))?;
                return decoder
                    .decode_eof(&mut self.read_buf)?
                    .ok_or(PipelineError::IncompleteResponse);
            }
            if let Some(trace) = self.pipeline.trace_logger() {
                trace.inbound(&self.read_buf[start..]);
            }
        }
    }
}

/// Send `request` to `url`, following redirects on a fresh connection per hop until a response is
/// delivered or the configured budget is spent. The request target is taken from `url`. Each call
/// is its own chain with a full budget, so `config` can be shared between requests.
pub async fn send_following_redirects(
    url: &str,
    mut request: RequestBuilder,
    config: &ConnectionConfig,
) -> Result<FullResponse, PipelineError> {
    let mut endpoint = Endpoint::parse(url)?;
    let mut config = bind_tls(config, &endpoint).map_err(PipelineError::Tls)?;
    request.path = endpoint.path().to_string();
    let mut hops_followed = 0;
    loop {
        let channel = PipelineChannel::open(endpoint, &config).await?;
        match channel.exchange(request, hops_followed).await? {
            RedirectAction::Deliver(response) => return Ok(response),
            RedirectAction::Follow(hop) => {
                endpoint = hop.endpoint;
                request = hop.request;
                config = hop.config;
                hops_followed = hop.hops_followed;
            }
        }
    }
}
