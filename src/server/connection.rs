// Connection handling module
// Accepts a single TCP connection and serves HTTP/1.1 on it

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, Version};
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppState;
use crate::http;
use crate::logger::{self, AccessLogEntry, AccessLogFormat};

/// Accept a connection, enforcing the connection limit.
///
/// Returns `false` when the connection was rejected.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
) -> bool {
    // Increment first, then check, so concurrent accepts cannot both slip in
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return false;
        }
    }

    logger::log_connection_accepted(&peer_addr);
    handle_connection(stream, peer_addr, Arc::clone(state));
    true
}

/// Serve one connection in its own task.
///
/// `read_timeout` bounds how long a request's headers may take to arrive and
/// `write_timeout` bounds producing each response. A keep-alive connection
/// may outlive both. The connection counter is released when it ends.
fn handle_connection(stream: tokio::net::TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let performance = &state.config.performance;
        let mut builder = http1::Builder::new();
        builder.keep_alive(performance.keep_alive_timeout > 0);
        if performance.read_timeout > 0 {
            builder
                .timer(TokioTimer::new())
                .header_read_timeout(Duration::from_secs(performance.read_timeout));
        }

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| serve_request(req, peer_addr, Arc::clone(&service_state))),
        );

        if let Err(err) = conn.await {
            logger::log_connection_error(&err);
        }

        state.active_connections.fetch_sub(1, Ordering::SeqCst);
    });
}

async fn serve_request(
    req: Request<Incoming>,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();

    // Request bodies are never read by a static server
    let (parts, _body) = req.into_parts();
    let req = Request::from_parts(parts, ());

    let write_timeout = state.config.performance.write_timeout;
    let response = if write_timeout > 0 {
        match tokio::time::timeout(
            Duration::from_secs(write_timeout),
            state.pipeline.handle(&req, false),
        )
        .await
        {
            Ok(response) => response,
            Err(_) => {
                logger::log_warning(&format!(
                    "Request {} from {peer_addr} timed out after {write_timeout} seconds",
                    req.uri().path()
                ));
                http::build_500_response()
            }
        }
    } else {
        state.pipeline.handle(&req, false).await
    };

    if state.config.logging.access_log {
        let format = AccessLogFormat::from_name(&state.config.logging.access_log_format);
        logger::log_access(
            &access_entry(&req, &response, peer_addr, started),
            format,
        );
    }

    Ok(response.map(Full::new))
}

fn access_entry(
    req: &Request<()>,
    response: &Response<Bytes>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let header_value = |name: header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().len();
    entry.content_encoding = response
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    entry.referer = header_value(header::REFERER);
    entry.user_agent = header_value(header::USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;

    #[test]
    fn test_access_entry_fields() {
        let req = Request::builder()
            .uri("/assets/app.js?v=3")
            .header(header::REFERER, "https://example.com/")
            .header(header::USER_AGENT, "curl/8.0")
            .body(())
            .unwrap();
        let mut response = Response::new(Bytes::from_static(b"body"));
        *response.status_mut() = StatusCode::OK;
        response
            .headers_mut()
            .insert(header::CONTENT_ENCODING, header::HeaderValue::from_static("gzip"));

        let peer: SocketAddr = "10.0.0.7:51234".parse().unwrap();
        let entry = access_entry(&req, &response, peer, Instant::now());

        assert_eq!(entry.remote_addr, "10.0.0.7");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.path, "/assets/app.js");
        assert_eq!(entry.query.as_deref(), Some("v=3"));
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body_bytes, 4);
        assert_eq!(entry.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(entry.referer.as_deref(), Some("https://example.com/"));
        assert_eq!(entry.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn test_version_label() {
        assert_eq!(version_label(Version::HTTP_10), "1.0");
        assert_eq!(version_label(Version::HTTP_11), "1.1");
    }
}
