//! HTTP response building module
//!
//! Builders for the responses the pipeline produces. Bodies are plain `Bytes`
//! so later stages can still rewrite them; the connection layer wraps them in
//! `Full` when handing them to hyper.

use hyper::body::Bytes;
use hyper::header;
use hyper::{Response, StatusCode};

use super::cache::Validators;

const NOT_FOUND_BODY: &str = "404 page not found\n";
const METHOD_NOT_ALLOWED_BODY: &str = "405 method not allowed\n";
const INTERNAL_ERROR_BODY: &str = "500 internal server error\n";
const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Build 200 response carrying a file body and its validators
pub fn build_file_response(
    data: Bytes,
    content_type: &str,
    validators: &Validators,
) -> Response<Bytes> {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(data)
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Bytes::new())
        });
    validators.apply(response.headers_mut());
    response
}

/// Turn a GET response into its HEAD form.
///
/// Headers are kept as they are; `Content-Length` reports the length of the
/// body that was dropped.
pub fn strip_body_for_head(response: Response<Bytes>) -> Response<Bytes> {
    let (mut parts, body) = response.into_parts();
    if !body.is_empty() {
        parts
            .headers
            .insert(header::CONTENT_LENGTH, header::HeaderValue::from(body.len()));
    }
    Response::from_parts(parts, Bytes::new())
}

/// Build 304 Not Modified response; validators are still sent
pub fn build_304_response(validators: &Validators) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = StatusCode::NOT_MODIFIED;
    validators.apply(response.headers_mut());
    response
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Bytes> {
    text_response(StatusCode::NOT_FOUND, NOT_FOUND_BODY)
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<Bytes> {
    let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_BODY);
    response.headers_mut().insert(
        header::ALLOW,
        header::HeaderValue::from_static(ALLOWED_METHODS),
    );
    response
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<Bytes> {
    text_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY)
}

/// Build OPTIONS response
pub fn build_options_response() -> Response<Bytes> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ALLOW, ALLOWED_METHODS)
        .body(Bytes::new())
        .unwrap_or_else(|e| {
            log_build_error("OPTIONS", &e);
            Response::new(Bytes::new())
        })
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Bytes> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Bytes::from_static(body.as_bytes()))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Bytes::from_static(body.as_bytes()))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
