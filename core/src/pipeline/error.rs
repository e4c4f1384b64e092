/*
 * error.rs
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

//! Pipeline setup and exchange errors.

use std::io;

use crate::uri::UriError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline already has a stage named {0}")]
    DuplicateStage(&'static str),
    #[error("pipeline has no {0} stage")]
    MissingStage(&'static str),
    #[error("TLS setup failed: {0}")]
    Tls(#[source] io::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] UriError),
    #[error("invalid redirect location {location:?}: {source}")]
    InvalidLocation {
        location: String,
        #[source]
        source: UriError,
    },
    #[error("connection closed before a complete response")]
    IncompleteResponse,
    #[error(transparent)]
    Io(#[from] io::Error),
}
