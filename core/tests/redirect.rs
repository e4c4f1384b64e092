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

//! Redirect following against in-process HTTP servers.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use ponte_core::pipeline::{send_following_redirects, PipelineError};
use ponte_core::protocol::http::{Method, RequestBuilder};
use ponte_core::{ConnectionConfig, OriginContext};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Accept one connection, read the request head (and `body_len` body bytes), answer with
/// `response`. Resolves to the raw request text.
async fn serve_once(response: Vec<u8>, body_len: usize) -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut tmp = [0u8; 1024];
        loop {
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
            let n = sock.read(&mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
        }
        sock.write_all(&response).await.unwrap();
        let _ = sock.shutdown().await;
        String::from_utf8_lossy(&buf).into_owned()
    });
    (port, handle)
}

fn redirect_to(status: u16, location: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} Moved\r\nLocation: {}\r\nContent-Length: 0\r\n\r\n",
        status, location
    )
    .into_bytes()
}

fn ok(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

#[tokio::test]
async fn follows_redirect_to_another_server() {
    init_tracing();
    let (final_port, final_server) = serve_once(ok("done"), 0).await;
    let (start_port, start_server) = serve_once(
        redirect_to(302, &format!("http://127.0.0.1:{}/final?x=1", final_port)),
        0,
    )
    .await;
    let url = format!("http://127.0.0.1:{}/start", start_port);
    let config = ConnectionConfig::builder(OriginContext::new(url.clone()))
        .trace_logging(true)
        .build();

    let response = send_following_redirects(&url, RequestBuilder::new(Method::Get, "/"), &config)
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(&response.body[..], b"done");

    let first = start_server.await.unwrap();
    assert!(first.starts_with("GET /start HTTP/1.1\r\n"), "{}", first);
    let second = final_server.await.unwrap();
    assert!(second.starts_with("GET /final?x=1 HTTP/1.1\r\n"), "{}", second);
    assert!(second.contains(&format!("Host: 127.0.0.1:{}\r\n", final_port)));
    assert!(second.contains("Accept-Encoding: gzip, deflate\r\n"));
}

#[tokio::test]
async fn zero_budget_returns_the_redirect() {
    init_tracing();
    let (port, server) = serve_once(redirect_to(302, "/elsewhere"), 0).await;
    let url = format!("http://127.0.0.1:{}/", port);
    let config = ConnectionConfig::builder(OriginContext::new(url.clone()))
        .max_redirects(0)
        .build();
    let response = send_following_redirects(&url, RequestBuilder::new(Method::Get, "/"), &config)
        .await
        .unwrap();
    assert_eq!(response.status, 302);
    assert_eq!(response.header("Location"), Some("/elsewhere"));
    server.await.unwrap();
}

#[tokio::test]
async fn redirect_chain_stops_at_budget() {
    init_tracing();
    let (third_port, third) = serve_once(ok("unreached"), 0).await;
    let (second_port, second) =
        serve_once(redirect_to(307, &format!("http://127.0.0.1:{}/3", third_port)), 0).await;
    let (first_port, first) =
        serve_once(redirect_to(301, &format!("http://127.0.0.1:{}/2", second_port)), 0).await;
    let url = format!("http://127.0.0.1:{}/1", first_port);
    let config = ConnectionConfig::builder(OriginContext::new(url.clone()))
        .max_redirects(1)
        .build();
    let response = send_following_redirects(&url, RequestBuilder::new(Method::Get, "/"), &config)
        .await
        .unwrap();
    assert_eq!(response.status, 307);
    first.await.unwrap();
    second.await.unwrap();
    third.abort();
}

#[tokio::test]
async fn each_request_gets_its_own_redirect_budget() {
    init_tracing();
    let config = ConnectionConfig::builder(OriginContext::new("http://127.0.0.1/"))
        .max_redirects(1)
        .build();
    for round in 0..2 {
        let (target_port, target) = serve_once(ok("landed"), 0).await;
        let (start_port, start) =
            serve_once(redirect_to(302, &format!("http://127.0.0.1:{}/t", target_port)), 0).await;
        let url = format!("http://127.0.0.1:{}/s", start_port);
        let response =
            send_following_redirects(&url, RequestBuilder::new(Method::Get, "/"), &config)
                .await
                .unwrap();
        assert_eq!(response.status, 200, "request {}", round);
        assert_eq!(response.body_text(), "landed");
        start.await.unwrap();
        target.await.unwrap();
    }
}

#[tokio::test]
async fn see_other_after_post_becomes_get() {
    init_tracing();
    let (done_port, done) = serve_once(ok("thanks"), 0).await;
    let (form_port, form) = serve_once(
        redirect_to(303, &format!("http://127.0.0.1:{}/thanks", done_port)),
        5,
    )
    .await;
    let url = format!("http://127.0.0.1:{}/form", form_port);
    let config = ConnectionConfig::builder(OriginContext::new(url.clone()))
        .chunking_disabled(true)
        .build();
    let mut request = RequestBuilder::new(Method::Post, "/");
    request.body(b"a=b&c".to_vec());
    let response = send_following_redirects(&url, request, &config).await.unwrap();
    assert_eq!(response.body_text(), "thanks");

    let posted = form.await.unwrap();
    assert!(posted.starts_with("POST /form HTTP/1.1\r\n"));
    assert!(posted.contains("Content-Length: 5\r\n"));
    assert!(posted.ends_with("a=b&c"));
    let followed = done.await.unwrap();
    assert!(followed.starts_with("GET /thanks HTTP/1.1\r\n"));
    assert!(!followed.contains("Content-Length"));
}

#[tokio::test]
async fn gzip_response_is_inflated() {
    init_tracing();
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(b"compressed hello").unwrap();
    let gz = enc.finish().unwrap();
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
        gz.len()
    )
    .into_bytes();
    response.extend_from_slice(&gz);
    let (port, server) = serve_once(response, 0).await;
    let url = format!("http://127.0.0.1:{}/z", port);
    let config = ConnectionConfig::builder(OriginContext::new(url.clone())).build();
    let response = send_following_redirects(&url, RequestBuilder::new(Method::Get, "/"), &config)
        .await
        .unwrap();
    assert_eq!(response.body_text(), "compressed hello");
    assert_eq!(response.header("Content-Encoding"), None);
    server.await.unwrap();
}

#[tokio::test]
async fn unsupported_url_is_rejected() {
    let config = ConnectionConfig::builder(OriginContext::new("ftp://h/")).build();
    let err = send_following_redirects("ftp://h/", RequestBuilder::new(Method::Get, "/"), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidUrl(_)));
}
