//! Request pipeline
//!
//! A request passes through an ordered list of stages. Each stage may add
//! headers or answer the request itself on the way in, and may rewrite the
//! response on the way out. The resolver sits between the two passes:
//!
//! ```text
//! SecurityHeaders -> MethodGuard -> CacheControl -> [Resolver] -> Compression
//! ```

use config::ConfigError;
use hyper::body::Bytes;
use hyper::header::{self, HeaderMap};
use hyper::{Method, Request, Response};
use percent_encoding::percent_decode_str;
use std::sync::Arc;

use crate::config::Config;
use crate::http;
use crate::logger;

use super::assets::AssetCache;
use super::compression::Compression;
use super::policy::CacheControl;
use super::resolver::Resolver;
use super::security::SecurityHeaders;

/// Request data the stages and the resolver work from
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Percent-decoded path that cannot climb above the static root
    pub path: String,
    pub is_head: bool,
    /// The transport itself is encrypted
    pub is_secure: bool,
    pub forwarded_proto: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub accept_encoding: Option<String>,
}

impl RequestContext {
    pub fn from_request<B>(req: &Request<B>, is_secure: bool) -> Self {
        let headers = req.headers();
        Self {
            method: req.method().clone(),
            path: normalize_path(req.uri().path()),
            is_head: req.method() == Method::HEAD,
            is_secure,
            forwarded_proto: header_string(headers, "x-forwarded-proto"),
            if_none_match: header_string(headers, header::IF_NONE_MATCH.as_str()),
            if_modified_since: header_string(headers, header::IF_MODIFIED_SINCE.as_str()),
            accept_encoding: header_string(headers, header::ACCEPT_ENCODING.as_str()),
        }
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Decode `%XX` escapes and resolve `.` and `..` segments lexically.
///
/// The result always starts with `/`; a trailing slash is preserved.
pub fn normalize_path(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(|c: char| c == '/' || c == '\\') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut path = String::with_capacity(decoded.len() + 1);
    for segment in &segments {
        path.push('/');
        path.push_str(segment);
    }
    if path.is_empty() || decoded.ends_with('/') {
        path.push('/');
    }
    path
}

/// Outcome of a stage's inbound pass
pub enum Flow {
    Continue,
    Respond(Response<Bytes>),
}

/// Answers OPTIONS and rejects methods a static server cannot honour
pub struct MethodGuard;

impl MethodGuard {
    pub fn before(ctx: &RequestContext) -> Flow {
        match ctx.method {
            Method::GET | Method::HEAD => Flow::Continue,
            Method::OPTIONS => Flow::Respond(http::build_options_response()),
            ref method => {
                logger::log_warning(&format!("Method not allowed: {method} {}", ctx.path));
                Flow::Respond(http::build_405_response())
            }
        }
    }
}

/// A named pipeline stage
pub enum Stage {
    SecurityHeaders(SecurityHeaders),
    MethodGuard(MethodGuard),
    CacheControl(CacheControl),
    Compression(Compression),
}

impl Stage {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SecurityHeaders(_) => "security-headers",
            Self::MethodGuard(_) => "method-guard",
            Self::CacheControl(_) => "cache-control",
            Self::Compression(_) => "compression",
        }
    }

    pub async fn before(&self, ctx: &RequestContext, headers: &mut HeaderMap) -> Flow {
        match self {
            Self::SecurityHeaders(stage) => stage.before(ctx, headers),
            Self::MethodGuard(_) => MethodGuard::before(ctx),
            Self::CacheControl(stage) => stage.before(ctx, headers).await,
            Self::Compression(_) => Flow::Continue,
        }
    }

    pub fn after(&self, ctx: &RequestContext, response: Response<Bytes>) -> Response<Bytes> {
        match self {
            Self::Compression(stage) => stage.after(ctx, response),
            Self::SecurityHeaders(_) | Self::MethodGuard(_) | Self::CacheControl(_) => response,
        }
    }
}

pub struct Pipeline {
    stages: Vec<Stage>,
    resolver: Resolver,
}

impl Pipeline {
    /// Compose the stages for `config`.
    ///
    /// The configuration is validated again here; a fallback name with a path
    /// separator or an unusable header value is rejected.
    pub fn new(config: Arc<Config>, assets: Arc<AssetCache>) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut stages = vec![Stage::SecurityHeaders(SecurityHeaders::new(&config)?)];
        if config.strict_methods {
            stages.push(Stage::MethodGuard(MethodGuard));
        }
        stages.push(Stage::CacheControl(CacheControl::new(Arc::clone(&config))));
        if config.compression.enabled {
            stages.push(Stage::Compression(Compression::new(
                config.compression.clone(),
            )));
        }

        Ok(Self {
            resolver: Resolver::new(&config, assets),
            stages,
        })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Run a request through every stage and the resolver
    pub async fn handle<B>(&self, req: &Request<B>, is_secure: bool) -> Response<Bytes> {
        let ctx = RequestContext::from_request(req, is_secure);

        let mut headers = HeaderMap::new();
        let mut entered = 0;
        let mut early = None;
        for stage in &self.stages {
            entered += 1;
            if let Flow::Respond(response) = stage.before(&ctx, &mut headers).await {
                early = Some(response);
                break;
            }
        }

        let mut response = match early {
            Some(response) => response,
            None => self.resolver.resolve(&ctx).await,
        };
        merge_headers(response.headers_mut(), headers);

        for stage in self.stages[..entered].iter().rev() {
            response = stage.after(&ctx, response);
        }

        // HEAD goes through the GET path so both carry identical headers
        if ctx.is_head {
            response = http::strip_body_for_head(response);
        }
        response
    }
}

/// Add stage headers the response does not already carry
fn merge_headers(target: &mut HeaderMap, staged: HeaderMap) {
    for (name, value) in &staged {
        if !target.contains_key(name) {
            target.insert(name.clone(), value.clone());
        }
    }
}
