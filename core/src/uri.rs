/*
 * uri.rs
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

//! Connection endpoints parsed from http, https, ws and wss URLs, and resolution of redirect
//! `Location` values against them.

use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UriError {
    #[error("unsupported URL scheme in {0}")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("unterminated IPv6 bracket")]
    UnterminatedIpv6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
    Ws,
    Wss,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Scheme::Https | Scheme::Wss)
    }

    pub fn default_port(self) -> u16 {
        if self.is_secure() {
            443
        } else {
            80
        }
    }

    fn split(url: &str) -> Option<(Scheme, &str)> {
        let (scheme, rest) = url.split_once("://")?;
        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            "ws" => Scheme::Ws,
            "wss" => Scheme::Wss,
            _ => return None,
        };
        Some((scheme, rest))
    }
}

/// Scheme, host, port and origin-form target (path plus query, fragment dropped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self, UriError> {
        let (scheme, rest) =
            Scheme::split(url.trim()).ok_or_else(|| UriError::UnsupportedScheme(url.to_string()))?;
        let rest = strip_fragment(rest);
        let (authority, path) = match rest.find(|c| c == '/' || c == '?') {
            Some(i) if rest.as_bytes()[i] == b'?' => (&rest[..i], format!("/{}", &rest[i..])),
            Some(i) => (&rest[..i], rest[i..].to_string()),
            None => (rest, "/".to_string()),
        };
        // userinfo is not sent anywhere; drop it
        let authority = authority.rsplit_once('@').map_or(authority, |(_, a)| a);
        let (host, port) = split_authority(authority, scheme.default_port())?;
        if host.is_empty() {
            return Err(UriError::MissingHost);
        }
        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host without IPv6 brackets, as used for connecting and TLS verification.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_secure()
    }

    /// Value for the Host header: port omitted when it is the scheme default.
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    pub fn same_host(&self, other: &Endpoint) -> bool {
        self.host.eq_ignore_ascii_case(&other.host) && self.port == other.port
    }

    /// Resolve a Location value: absolute URL, scheme-relative (`//host/p`), absolute path or
    /// relative path.
    pub fn resolve(&self, location: &str) -> Result<Endpoint, UriError> {
        let location = location.trim();
        if location.contains("://") {
            return Endpoint::parse(location);
        }
        if let Some(rest) = location.strip_prefix("//") {
            return Endpoint::parse(&format!("{}://{}", self.scheme.as_str(), rest));
        }
        let location = strip_fragment(location);
        let path = if location.is_empty() {
            self.path.clone()
        } else if location.starts_with('/') {
            remove_dot_segments(location)
        } else if location.starts_with('?') {
            let base = self.path.split('?').next().unwrap_or("/");
            format!("{}{}", base, location)
        } else {
            let base = self.path.split('?').next().unwrap_or("/");
            let dir = match base.rfind('/') {
                Some(i) => &base[..=i],
                None => "/",
            };
            remove_dot_segments(&format!("{}{}", dir, location))
        };
        Ok(Endpoint {
            path,
            ..self.clone()
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme.as_str(), self.authority(), self.path)
    }
}

fn strip_fragment(s: &str) -> &str {
    s.split('#').next().unwrap_or(s)
}

/// Split host and optional port. Handles IPv6 literals (`[::1]:8080`).
fn split_authority(authority: &str, default_port: u16) -> Result<(&str, u16), UriError> {
    let parse_port = |p: &str| p.parse::<u16>().map_err(|_| UriError::InvalidPort(p.to_string()));
    if let Some(rest) = authority.strip_prefix('[') {
        let end = rest.find(']').ok_or(UriError::UnterminatedIpv6)?;
        let host = &rest[..end];
        let port = match rest[end + 1..].strip_prefix(':') {
            Some(p) => parse_port(p)?,
            None => default_port,
        };
        return Ok((host, port));
    }
    match authority.rfind(':') {
        Some(i) => Ok((&authority[..i], parse_port(&authority[i + 1..])?)),
        None => Ok((authority, default_port)),
    }
}

/// RFC 3986 §5.2.4, on the path part only; the query is kept as is.
fn remove_dot_segments(target: &str) -> String {
    let (path, query) = match target.find('?') {
        Some(i) => (&target[..i], &target[i..]),
        None => (target, ""),
    };
    let mut out: Vec<&str> = Vec::new();
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    for (i, seg) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        match *seg {
            "." => {
                if last {
                    out.push("");
                }
            }
            ".." => {
                out.pop();
                if last {
                    out.push("");
                }
            }
            s => out.push(s),
        }
    }
    format!("/{}{}", out.join("/"), query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_and_ports() {
        let e = Endpoint::parse("wss://example.com/chat?room=1#top").unwrap();
        assert_eq!(e.scheme(), Scheme::Wss);
        assert_eq!(e.host(), "example.com");
        assert_eq!(e.port(), 443);
        assert_eq!(e.path(), "/chat?room=1");
        assert_eq!(e.authority(), "example.com");

        let e = Endpoint::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(e.port(), 8080);
        assert_eq!(e.path(), "/");
        assert_eq!(e.authority(), "127.0.0.1:8080");

        let e = Endpoint::parse("ws://[::1]:9000?x=y").unwrap();
        assert_eq!(e.host(), "::1");
        assert_eq!(e.path(), "/?x=y");
        assert_eq!(e.to_string(), "ws://[::1]:9000/?x=y");
    }

    #[test]
    fn parse_rejects_bad_urls() {
        assert!(matches!(
            Endpoint::parse("ftp://h/"),
            Err(UriError::UnsupportedScheme(_))
        ));
        assert_eq!(Endpoint::parse("http:///x"), Err(UriError::MissingHost));
        assert!(matches!(
            Endpoint::parse("http://h:99999/"),
            Err(UriError::InvalidPort(_))
        ));
        assert_eq!(
            Endpoint::parse("ws://[::1/"),
            Err(UriError::UnterminatedIpv6)
        );
    }

    #[test]
    fn resolve_locations() {
        let base = Endpoint::parse("http://a.example:8080/dir/page?q=1").unwrap();
        assert_eq!(
            base.resolve("https://b.example/x").unwrap().to_string(),
            "https://b.example/x"
        );
        assert_eq!(
            base.resolve("//c.example/y").unwrap().to_string(),
            "http://c.example/y"
        );
        assert_eq!(base.resolve("/root").unwrap().path(), "/root");
        assert_eq!(base.resolve("other?z=2").unwrap().path(), "/dir/other?z=2");
        assert_eq!(base.resolve("../up").unwrap().path(), "/up");
        assert_eq!(base.resolve("?p=3").unwrap().path(), "/dir/page?p=3");
        assert_eq!(base.resolve("./").unwrap().path(), "/dir/");
        assert_eq!(base.resolve("/root").unwrap().port(), 8080);
    }
}
