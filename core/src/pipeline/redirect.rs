/*
 * redirect.rs
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

//! Redirect-following terminal stage.
//!
//! Holds the connection's `ConnectionConfig` and decides, per response, whether to deliver it or
//! to follow it on a fresh connection. The hop count belongs to one chain and travels with the
//! hop, so the same configuration is carried unchanged and can be reused for later requests;
//! only the TLS server name is rebound when a hop moves to another host or scheme.

use std::io;

use crate::config::ConnectionConfig;
use crate::net::TlsContext;
use crate::pipeline::error::PipelineError;
use crate::protocol::http::{FullResponse, Method, RequestBuilder};
use crate::uri::Endpoint;

/// What the redirect stage decided for one response.
#[derive(Debug)]
pub enum RedirectAction {
    Deliver(FullResponse),
    Follow(RedirectHop),
}

/// The next request in a redirect chain.
#[derive(Debug)]
pub struct RedirectHop {
    pub endpoint: Endpoint,
    pub request: RequestBuilder,
    pub config: ConnectionConfig,
    pub status: u16,
    /// Redirects followed in this chain, including this one.
    pub hops_followed: u32,
}

#[derive(Debug, Clone)]
pub struct RedirectStage {
    config: ConnectionConfig,
}

impl RedirectStage {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Decide on `response`, received for `request` sent to `endpoint` after `hops_followed`
    /// redirects in the current chain.
    pub fn on_response(
        &self,
        endpoint: &Endpoint,
        mut request: RequestBuilder,
        response: FullResponse,
        hops_followed: u32,
    ) -> Result<RedirectAction, PipelineError> {
        if !response.is_redirect() {
            return Ok(RedirectAction::Deliver(response));
        }
        let location = match response.header("Location") {
            Some(l) => l.to_string(),
            None => {
                tracing::debug!(status = response.status, "redirect without Location delivered");
                return Ok(RedirectAction::Deliver(response));
            }
        };
        if hops_followed >= self.config.max_redirects() {
            tracing::debug!(
                origin = self.config.origin().url(),
                max = self.config.max_redirects(),
                "redirect limit reached"
            );
            return Ok(RedirectAction::Deliver(response));
        }
        let target = endpoint
            .resolve(&location)
            .map_err(|source| PipelineError::InvalidLocation {
                location: location.clone(),
                source,
            })?;
        let hop = hops_followed + 1;

        let to_get = match response.status {
            303 => request.method != Method::Head,
            301 | 302 => request.method == Method::Post,
            _ => false,
        };
        if to_get {
            request.method = Method::Get;
            request.body = None;
            request
                .remove_header("Content-Length")
                .remove_header("Transfer-Encoding")
                .remove_header("Content-Type");
        }
        if !target.same_host(endpoint) {
            request.remove_header("Authorization").remove_header("Cookie");
        }
        request.remove_header("Host");
        request.path = target.path().to_string();

        let config = bind_tls(&self.config, &target).map_err(PipelineError::Tls)?;
        tracing::debug!(
            status = response.status,
            hop,
            from = %endpoint,
            to = %target,
            idle_handler_removed = config.idle_handler_removed(),
            "following redirect"
        );
        Ok(RedirectAction::Follow(RedirectHop {
            endpoint: target,
            request,
            config,
            status: response.status,
            hops_followed: hop,
        }))
    }
}

/// The configuration to connect to `endpoint` with: TLS exactly when the endpoint is secure, with
/// a server name for its host. Returns the same configuration when nothing needs to change.
pub(crate) fn bind_tls(config: &ConnectionConfig, endpoint: &Endpoint) -> io::Result<ConnectionConfig> {
    match (endpoint.is_secure(), config.tls_context()) {
        (false, None) => Ok(config.clone()),
        (false, Some(_)) => Ok(config.with_tls_context(None)),
        (true, Some(tls)) if tls.host().eq_ignore_ascii_case(endpoint.host()) => Ok(config.clone()),
        (true, Some(tls)) => Ok(config.with_tls_context(Some(tls.for_host(endpoint.host())?))),
        (true, None) => Ok(config.with_tls_context(Some(TlsContext::new(endpoint.host())?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OriginContext;

    fn config(max: u32) -> ConnectionConfig {
        ConnectionConfig::builder(OriginContext::new("http://a.example/start"))
            .max_redirects(max)
            .chunking_disabled(true)
            .idle_handler_removed(true)
            .build()
    }

    fn redirect(status: u16, location: &str) -> FullResponse {
        let mut r = FullResponse::new(status);
        r.headers.push(("Location".into(), location.into()));
        r
    }

    fn get() -> RequestBuilder {
        let mut r = RequestBuilder::new(Method::Get, "/start");
        r.header("Host", "a.example");
        r
    }

    fn follow(action: RedirectAction) -> RedirectHop {
        match action {
            RedirectAction::Follow(hop) => hop,
            RedirectAction::Deliver(r) => panic!("delivered {}", r.status),
        }
    }

    #[test]
    fn follows_relative_location_with_same_config() {
        let cfg = config(5);
        let stage = RedirectStage::new(cfg.clone());
        let base = Endpoint::parse("http://a.example/start").unwrap();
        let hop = follow(stage.on_response(&base, get(), redirect(302, "/next"), 0).unwrap());
        assert_eq!(hop.endpoint.to_string(), "http://a.example/next");
        assert_eq!(hop.request.path, "/next");
        assert!(!hop.request.has_header("Host"));
        assert!(hop.config.origin().same_origin(cfg.origin()));
        assert_eq!(hop.config.max_redirects(), 5);
        assert!(hop.config.chunking_disabled());
        assert!(hop.config.idle_handler_removed());
        assert_eq!(hop.hops_followed, 1);
    }

    #[test]
    fn budget_exhausted_delivers_redirect() {
        let stage = RedirectStage::new(config(0));
        let base = Endpoint::parse("http://a.example/").unwrap();
        match stage.on_response(&base, get(), redirect(301, "/x"), 0).unwrap() {
            RedirectAction::Deliver(r) => assert_eq!(r.status, 301),
            RedirectAction::Follow(_) => panic!("followed with no budget"),
        }
    }

    #[test]
    fn budget_is_per_chain_and_stage_is_reusable() {
        let stage = RedirectStage::new(config(2));
        let base = Endpoint::parse("http://a.example/").unwrap();
        let hop = follow(stage.on_response(&base, get(), redirect(302, "/b"), 1).unwrap());
        assert_eq!(hop.hops_followed, 2);
        let next = stage
            .on_response(&hop.endpoint, hop.request, redirect(302, "/c"), hop.hops_followed)
            .unwrap();
        assert!(matches!(next, RedirectAction::Deliver(_)));
        // a new chain on the same configuration starts from zero
        let hop = follow(stage.on_response(&base, get(), redirect(302, "/b"), 0).unwrap());
        assert_eq!(hop.hops_followed, 1);
    }

    #[test]
    fn non_redirects_and_missing_location_delivered() {
        let stage = RedirectStage::new(config(5));
        let base = Endpoint::parse("http://a.example/").unwrap();
        assert!(matches!(
            stage.on_response(&base, get(), FullResponse::new(200), 0).unwrap(),
            RedirectAction::Deliver(_)
        ));
        assert!(matches!(
            stage.on_response(&base, get(), FullResponse::new(307), 0).unwrap(),
            RedirectAction::Deliver(_)
        ));
    }

    #[test]
    fn see_other_rewrites_post_but_temporary_redirect_keeps_it() {
        let stage = RedirectStage::new(config(5));
        let base = Endpoint::parse("http://a.example/form").unwrap();
        let post = || {
            let mut r = RequestBuilder::new(Method::Post, "/form");
            r.header("Host", "a.example")
                .header("Content-Type", "text/plain")
                .body(b"x=1".to_vec());
            r
        };
        let hop = follow(stage.on_response(&base, post(), redirect(303, "/done"), 0).unwrap());
        assert_eq!(hop.request.method, Method::Get);
        assert!(hop.request.body.is_none());
        assert!(!hop.request.has_header("Content-Type"));

        let hop = follow(stage.on_response(&base, post(), redirect(307, "/again"), 0).unwrap());
        assert_eq!(hop.request.method, Method::Post);
        assert_eq!(hop.request.body.as_deref(), Some(&b"x=1"[..]));
    }

    #[test]
    fn cross_host_https_hop_gets_tls_for_new_host() {
        let stage = RedirectStage::new(config(5));
        let base = Endpoint::parse("http://a.example/").unwrap();
        let mut req = get();
        req.header("Authorization", "Bearer t");
        let hop = follow(
            stage
                .on_response(&base, req, redirect(308, "https://b.example/secure"), 0)
                .unwrap(),
        );
        assert_eq!(hop.config.tls_context().map(|t| t.host()), Some("b.example"));
        assert!(!hop.request.has_header("Authorization"));
        assert!(hop.config.origin().same_origin(stage.config().origin()));
    }

    #[test]
    fn bad_location_is_an_error() {
        let stage = RedirectStage::new(config(5));
        let base = Endpoint::parse("http://a.example/").unwrap();
        assert!(matches!(
            stage.on_response(&base, get(), redirect(302, "ftp://x/"), 0),
            Err(PipelineError::InvalidLocation { .. })
        ));
    }
}
