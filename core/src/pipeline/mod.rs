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

//! Outbound HTTP pipeline.
//!
//! - `PipelineAssembler`: declares the stage chain for a new connection from a `ConnectionConfig`.
//! - `Pipeline` / `Stage`: the uniquely named, ordered stages.
//! - `RedirectStage`: terminal stage; delivers a response or yields the next `RedirectHop`.
//! - `PipelineChannel` / `send_following_redirects`: run requests through an assembled pipeline,
//!   one fresh connection per hop.

mod assembler;
mod channel;
mod compressor;
mod error;
mod redirect;
mod stage;
mod trace;

pub use assembler::PipelineAssembler;
pub use channel::{send_following_redirects, PipelineChannel};
pub use compressor::ContentCompressor;
pub use error::PipelineError;
pub use redirect::{RedirectAction, RedirectHop, RedirectStage};
pub use stage::{
    Pipeline, Stage, COMPRESSOR_STAGE, DECODER_STAGE, ENCODER_STAGE, REDIRECT_STAGE, TLS_STAGE,
    TRACE_STAGE,
};
pub use trace::{TraceChannel, TraceLogger, DOWNSTREAM_TRACE_TARGET, UPSTREAM_TRACE_TARGET};
