//! Response compression stage
//!
//! Runs last on the way out, after the resolver has produced the final body.
//! Empty bodies such as 304 are passed through untouched. HEAD responses still
//! carry their body at this point and are stripped afterwards.

use hyper::body::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::Response;

use crate::config::CompressionConfig;
use crate::http::ContentEncoding;
use crate::logger;

use super::pipeline::RequestContext;

pub struct Compression {
    config: CompressionConfig,
}

impl Compression {
    pub const fn new(config: CompressionConfig) -> Self {
        Self { config }
    }

    pub fn after(&self, ctx: &RequestContext, response: Response<Bytes>) -> Response<Bytes> {
        let body_len = response.body().len();
        if body_len == 0
            || body_len < self.config.min_size
            || response.headers().contains_key(header::CONTENT_ENCODING)
        {
            return response;
        }

        let (mut parts, body) = response.into_parts();
        parts.headers.append(
            header::VARY,
            HeaderValue::from_static("Accept-Encoding"),
        );

        let encoding = ContentEncoding::negotiate(ctx.accept_encoding.as_deref());
        let Some(encoding_name) = encoding.header_value() else {
            return Response::from_parts(parts, body);
        };

        match encoding.encode(&body, &self.config) {
            Ok(encoded) => {
                parts.headers.insert(
                    header::CONTENT_ENCODING,
                    HeaderValue::from_static(encoding_name),
                );
                parts.headers.remove(header::CONTENT_LENGTH);
                Response::from_parts(parts, Bytes::from(encoded))
            }
            Err(e) => {
                logger::log_error(&format!(
                    "{encoding_name} compression failed for {}: {e}",
                    ctx.path
                ));
                Response::from_parts(parts, body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::{Request, StatusCode};
    use std::io::Read;

    const BODY: &[u8] = b"<!doctype html><html><body><div id=\"app\"></div></body></html>";

    fn context(accept_encoding: Option<&str>) -> RequestContext {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = accept_encoding {
            builder = builder.header(header::ACCEPT_ENCODING, value);
        }
        RequestContext::from_request(&builder.body(()).unwrap(), false)
    }

    fn response(body: &'static [u8]) -> Response<Bytes> {
        Response::new(Bytes::from_static(body))
    }

    #[test]
    fn test_brotli_body() {
        let stage = Compression::new(CompressionConfig::default());
        let out = stage.after(&context(Some("gzip, br")), response(BODY));

        assert_eq!(out.headers()[header::CONTENT_ENCODING], "br");
        assert_eq!(out.headers()[header::VARY], "Accept-Encoding");
        let mut decoded = Vec::new();
        brotli::Decompressor::new(out.body().as_ref(), 4096)
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, BODY);
    }

    #[test]
    fn test_gzip_body() {
        let stage = Compression::new(CompressionConfig::default());
        let out = stage.after(&context(Some("gzip")), response(BODY));

        assert_eq!(out.headers()[header::CONTENT_ENCODING], "gzip");
        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(out.body().as_ref())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, BODY);
    }

    #[test]
    fn test_identity_when_not_accepted() {
        let stage = Compression::new(CompressionConfig::default());
        let out = stage.after(&context(None), response(BODY));

        assert!(out.headers().get(header::CONTENT_ENCODING).is_none());
        assert_eq!(out.body().as_ref(), BODY);
    }

    #[test]
    fn test_empty_body_is_untouched() {
        let stage = Compression::new(CompressionConfig::default());
        let mut not_modified = response(b"");
        *not_modified.status_mut() = StatusCode::NOT_MODIFIED;

        let out = stage.after(&context(Some("br")), not_modified);
        assert_eq!(out.status(), StatusCode::NOT_MODIFIED);
        assert!(out.headers().get(header::CONTENT_ENCODING).is_none());
        assert!(out.headers().get(header::VARY).is_none());
    }

    #[test]
    fn test_small_body_below_min_size() {
        let stage = Compression::new(CompressionConfig {
            min_size: 1024,
            ..CompressionConfig::default()
        });
        let out = stage.after(&context(Some("br")), response(BODY));
        assert!(out.headers().get(header::CONTENT_ENCODING).is_none());
        assert_eq!(out.body().as_ref(), BODY);
    }

    #[test]
    fn test_already_encoded_body_is_kept() {
        let stage = Compression::new(CompressionConfig::default());
        let mut encoded = response(BODY);
        encoded
            .headers_mut()
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));

        let out = stage.after(&context(Some("br")), encoded);
        assert_eq!(out.headers()[header::CONTENT_ENCODING], "gzip");
        assert_eq!(out.body().as_ref(), BODY);
    }
}
