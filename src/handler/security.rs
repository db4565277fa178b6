//! Security response headers
//!
//! Header values are parsed once when the pipeline is built, so a bad value in
//! the configuration fails startup instead of every request.

use config::ConfigError;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::config::Config;

use super::pipeline::{Flow, RequestContext};

const DEFAULT_CONTENT_TYPE_OPTIONS: &str = "nosniff";
const DEFAULT_FRAME_OPTIONS: &str = "DENY";
const DEFAULT_REFERRER_POLICY: &str = "no-referrer-when-downgrade";
const DEFAULT_PERMISSIONS_POLICY: &str = "geolocation=(), microphone=(), camera=()";

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
    hsts: Option<HeaderValue>,
    trust_forwarded_proto: bool,
}

impl SecurityHeaders {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let security = &config.security;
        let mut headers = vec![
            (
                header::X_CONTENT_TYPE_OPTIONS,
                parse_value(
                    "security.x_content_type_options",
                    security
                        .x_content_type_options
                        .as_deref()
                        .unwrap_or(DEFAULT_CONTENT_TYPE_OPTIONS),
                )?,
            ),
            (
                header::X_FRAME_OPTIONS,
                parse_value(
                    "security.x_frame_options",
                    security
                        .x_frame_options
                        .as_deref()
                        .unwrap_or(DEFAULT_FRAME_OPTIONS),
                )?,
            ),
            (
                header::REFERRER_POLICY,
                parse_value(
                    "security.referrer_policy",
                    security
                        .referrer_policy
                        .as_deref()
                        .unwrap_or(DEFAULT_REFERRER_POLICY),
                )?,
            ),
            (
                PERMISSIONS_POLICY,
                parse_value(
                    "security.permissions_policy",
                    security
                        .permissions_policy
                        .as_deref()
                        .unwrap_or(DEFAULT_PERMISSIONS_POLICY),
                )?,
            ),
        ];

        if let Some(csp) = config.csp_header.as_deref().filter(|v| !v.is_empty()) {
            headers.push((
                header::CONTENT_SECURITY_POLICY,
                parse_value("CSP_HEADER", csp)?,
            ));
        }

        let hsts = match config.hsts_max_age {
            Some(max_age) if max_age > 0 => Some(parse_value(
                "HSTS_MAX_AGE",
                &format!("max-age={max_age}; includeSubDomains"),
            )?),
            _ => None,
        };

        Ok(Self {
            headers,
            hsts,
            trust_forwarded_proto: config.trust_forwarded_proto,
        })
    }

    pub fn before(&self, ctx: &RequestContext, headers: &mut HeaderMap) -> Flow {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }

        if let Some(ref hsts) = self.hsts {
            if self.is_secure(ctx) {
                headers.insert(header::STRICT_TRANSPORT_SECURITY, hsts.clone());
            }
        }

        Flow::Continue
    }

    fn is_secure(&self, ctx: &RequestContext) -> bool {
        ctx.is_secure
            || (self.trust_forwarded_proto
                && ctx
                    .forwarded_proto
                    .as_deref()
                    .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https")))
    }
}

fn parse_value(key: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value)
        .map_err(|e| ConfigError::Message(format!("invalid header value for {key}: {e}")))
}
