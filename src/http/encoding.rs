//! Content-Encoding negotiation and body compression
//!
//! Brotli is preferred over gzip. Encoders are finalised before their output
//! is returned so every body carries a complete trailer.

use std::io::{self, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::CompressionConfig;

/// Brotli sliding window (log2 of bytes)
const BROTLI_LGWIN: u32 = 22;
const BROTLI_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Brotli,
    Gzip,
    Identity,
}

impl ContentEncoding {
    /// Pick an encoding from an `Accept-Encoding` header value.
    ///
    /// Tokens are compared case-insensitively; a token explicitly refused
    /// with `q=0` is not chosen.
    pub fn negotiate(accept_encoding: Option<&str>) -> Self {
        let Some(header) = accept_encoding else {
            return Self::Identity;
        };

        let accepted: Vec<String> = header
            .split(',')
            .filter_map(|item| {
                let mut parts = item.split(';');
                let token = parts.next()?.trim().to_ascii_lowercase();
                let refused = parts.any(|param| {
                    param
                        .trim()
                        .strip_prefix("q=")
                        .and_then(|q| q.trim().parse::<f32>().ok())
                        .is_some_and(|q| q <= 0.0)
                });
                (!token.is_empty() && !refused).then_some(token)
            })
            .collect();

        if accepted.iter().any(|t| t == "br") {
            Self::Brotli
        } else if accepted.iter().any(|t| t == "gzip") {
            Self::Gzip
        } else {
            Self::Identity
        }
    }

    /// `Content-Encoding` header value, `None` for identity
    pub const fn header_value(self) -> Option<&'static str> {
        match self {
            Self::Brotli => Some("br"),
            Self::Gzip => Some("gzip"),
            Self::Identity => None,
        }
    }

    /// Compress `data`; identity returns a copy
    pub fn encode(self, data: &[u8], config: &CompressionConfig) -> io::Result<Vec<u8>> {
        match self {
            Self::Brotli => {
                let mut writer = brotli::CompressorWriter::new(
                    Vec::new(),
                    BROTLI_BUFFER_SIZE,
                    config.brotli_quality.min(11),
                    BROTLI_LGWIN,
                );
                writer.write_all(data)?;
                // into_inner finishes the stream
                Ok(writer.into_inner())
            }
            Self::Gzip => {
                let mut encoder =
                    GzEncoder::new(Vec::new(), Compression::new(config.gzip_level.min(9)));
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::Identity => Ok(data.to_vec()),
        }
    }
}
