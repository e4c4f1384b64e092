/*
 * config.rs
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

//! Connection configuration threaded through every redirect hop, and transport settings
//! loaded from XML (`<transport>` element) with quick_xml.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::net::TlsContext;

/// Redirect budget used when settings do not specify one.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Errors loading transport settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read transport settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("invalid value {value:?} for <{element}>")]
    InvalidValue { element: String, value: String },
}

struct OriginInner {
    url: String,
}

/// Reference to the request that started a connection. Cloning shares the same origin, so every
/// hop can tell which request it serves. Holds no per-chain state: one `ConnectionConfig` can
/// serve any number of independent requests.
#[derive(Clone)]
pub struct OriginContext {
    inner: Arc<OriginInner>,
}

impl OriginContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(OriginInner { url: url.into() }),
        }
    }

    /// URL of the originating request.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// True if both handles refer to the same originating request.
    pub fn same_origin(&self, other: &OriginContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for OriginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginContext")
            .field("url", &self.inner.url)
            .finish()
    }
}

/// Per-connection configuration. Immutable once built; the redirect stage hands the same value
/// to the next hop.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    tls_context: Option<TlsContext>,
    trace_logging_enabled: bool,
    max_redirects: u32,
    chunking_disabled: bool,
    origin: OriginContext,
    idle_handler_removed: bool,
}

impl ConnectionConfig {
    pub fn builder(origin: OriginContext) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: ConnectionConfig {
                tls_context: None,
                trace_logging_enabled: false,
                max_redirects: DEFAULT_MAX_REDIRECTS,
                chunking_disabled: false,
                origin,
                idle_handler_removed: false,
            },
        }
    }

    pub fn tls_context(&self) -> Option<&TlsContext> {
        self.tls_context.as_ref()
    }

    pub fn trace_logging_enabled(&self) -> bool {
        self.trace_logging_enabled
    }

    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    pub fn chunking_disabled(&self) -> bool {
        self.chunking_disabled
    }

    pub fn origin(&self) -> &OriginContext {
        &self.origin
    }

    /// Whether the idle-state handler of the originating connection was already removed.
    pub fn idle_handler_removed(&self) -> bool {
        self.idle_handler_removed
    }

    /// Same configuration with a different TLS context (a redirect to another host needs a
    /// server name matching that host).
    pub fn with_tls_context(&self, tls_context: Option<TlsContext>) -> Self {
        Self {
            tls_context,
            ..self.clone()
        }
    }
}

/// Builder for `ConnectionConfig`.
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    pub fn tls_context(mut self, tls_context: TlsContext) -> Self {
        self.config.tls_context = Some(tls_context);
        self
    }

    pub fn trace_logging(mut self, enabled: bool) -> Self {
        self.config.trace_logging_enabled = enabled;
        self
    }

    pub fn max_redirects(mut self, max: u32) -> Self {
        self.config.max_redirects = max;
        self
    }

    pub fn chunking_disabled(mut self, disabled: bool) -> Self {
        self.config.chunking_disabled = disabled;
        self
    }

    pub fn idle_handler_removed(mut self, removed: bool) -> Self {
        self.config.idle_handler_removed = removed;
        self
    }

    /// Apply the flags from loaded settings.
    pub fn settings(self, settings: &TransportSettings) -> Self {
        self.trace_logging(settings.trace_logging)
            .max_redirects(settings.max_redirects)
            .chunking_disabled(settings.chunking_disabled)
            .idle_handler_removed(settings.idle_handler_removed)
    }

    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

/// Transport flags as stored in the `<transport>` XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub trace_logging: bool,
    pub max_redirects: u32,
    pub chunking_disabled: bool,
    pub idle_handler_removed: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            trace_logging: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            chunking_disabled: false,
            idle_handler_removed: false,
        }
    }
}

impl TransportSettings {
    /// Load settings from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Self::from_xml(&content)
    }

    /// Parse `<transport><trace-log>true</trace-log><max-redirects>5</max-redirects>...</transport>`.
    /// Unknown elements are ignored.
    pub fn from_xml(content: &str) -> Result<Self, ConfigError> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        let mut settings = Self::default();
        let mut in_transport = false;
        let mut element_name = Vec::<u8>::new();

        loop {
            match reader.read_event() {
                Err(e) => return Err(ConfigError::Xml(e.to_string())),
                Ok(Event::Eof) => break,
                Ok(Event::Start(e)) => {
                    let name = e.name();
                    let name = name.as_ref();
                    if name == b"transport" {
                        in_transport = true;
                    } else if in_transport {
                        element_name.clear();
                        element_name.extend_from_slice(name);
                    }
                }
                Ok(Event::Text(e)) => {
                    if !in_transport || element_name.is_empty() {
                        continue;
                    }
                    let text = e.unescape().map_err(|e| ConfigError::Xml(e.to_string()))?;
                    settings.apply(&element_name, text.trim())?;
                    element_name.clear();
                }
                Ok(Event::End(e)) => {
                    if e.name().as_ref() == b"transport" {
                        in_transport = false;
                    }
                    element_name.clear();
                }
                _ => {}
            }
        }
        Ok(settings)
    }

    fn apply(&mut self, element: &[u8], value: &str) -> Result<(), ConfigError> {
        match element {
            b"trace-log" => self.trace_logging = parse_flag(element, value)?,
            b"max-redirects" => {
                self.max_redirects = value
                    .parse::<u32>()
                    .map_err(|_| invalid_value(element, value))?;
            }
            b"chunking-disabled" => self.chunking_disabled = parse_flag(element, value)?,
            b"idle-handler-removed" => self.idle_handler_removed = parse_flag(element, value)?,
            _ => {}
        }
        Ok(())
    }
}

fn parse_flag(element: &[u8], value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(invalid_value(element, value)),
    }
}

fn invalid_value(element: &[u8], value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        element: String::from_utf8_lossy(element).into_owned(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let xml = "<transport>\
            <trace-log>true</trace-log>\
            <max-redirects>3</max-redirects>\
            <chunking-disabled>yes</chunking-disabled>\
            <idle-handler-removed>1</idle-handler-removed>\
            </transport>";
        let s = TransportSettings::from_xml(xml).unwrap();
        assert!(s.trace_logging);
        assert_eq!(s.max_redirects, 3);
        assert!(s.chunking_disabled);
        assert!(s.idle_handler_removed);
    }

    #[test]
    fn unknown_elements_ignored_and_defaults_kept() {
        let xml = "<transport><colour>blue</colour><trace-log>false</trace-log></transport>";
        let s = TransportSettings::from_xml(xml).unwrap();
        assert_eq!(s, TransportSettings::default());
    }

    #[test]
    fn bad_redirect_count_rejected() {
        let xml = "<transport><max-redirects>many</max-redirects></transport>";
        match TransportSettings::from_xml(xml) {
            Err(ConfigError::InvalidValue { element, value }) => {
                assert_eq!(element, "max-redirects");
                assert_eq!(value, "many");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = TransportSettings::load(&dir.path().join("absent.xml")).unwrap();
        assert_eq!(s, TransportSettings::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transport.xml");
        fs::write(&path, "<transport><max-redirects>0</max-redirects></transport>").unwrap();
        let s = TransportSettings::load(&path).unwrap();
        assert_eq!(s.max_redirects, 0);
    }

    #[test]
    fn builder_applies_settings_and_origin_is_shared() {
        let origin = OriginContext::new("http://example.com/a");
        let settings = TransportSettings {
            trace_logging: true,
            max_redirects: 2,
            chunking_disabled: true,
            idle_handler_removed: true,
        };
        let config = ConnectionConfig::builder(origin.clone()).settings(&settings).build();
        assert!(config.trace_logging_enabled());
        assert_eq!(config.max_redirects(), 2);
        assert!(config.chunking_disabled());
        assert!(config.idle_handler_removed());
        assert!(config.tls_context().is_none());

        let copy = config.clone();
        assert!(copy.origin().same_origin(&origin));
        assert!(!copy.origin().same_origin(&OriginContext::new("http://example.com/a")));
    }
}
