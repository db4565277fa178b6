//! Request resolution and conditional serving
//!
//! Picks the source for a request (memory cache, the file on disk, or the SPA
//! fallback file), derives its validators and decides between a full body and
//! 304 Not Modified.

use hyper::body::Bytes;
use hyper::Response;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use crate::config::Config;
use crate::http::{self, mime, Validators};
use crate::logger;

use super::assets::AssetCache;
use super::pipeline::RequestContext;

pub struct Resolver {
    static_dir: PathBuf,
    fallback_file: PathBuf,
    fallback_url: String,
    assets: Arc<AssetCache>,
}

impl Resolver {
    pub fn new(config: &Config, assets: Arc<AssetCache>) -> Self {
        let static_dir = PathBuf::from(&config.static_dir);
        Self {
            fallback_file: static_dir.join(&config.spa_fallback_file),
            fallback_url: config.fallback_url_path(),
            static_dir,
            assets,
        }
    }

    pub async fn resolve(&self, ctx: &RequestContext) -> Response<Bytes> {
        let lookup_path = if ctx.path == "/" {
            self.fallback_url.as_str()
        } else {
            ctx.path.as_str()
        };

        if let Some(asset) = self.assets.lookup(lookup_path) {
            let validators = Validators::new(asset.modified, asset.size);
            if is_not_modified(ctx, &validators) {
                return http::build_304_response(&validators);
            }
            return http::build_file_response(
                asset.content.clone(),
                asset.mime_type,
                &validators,
            );
        }

        let requested = self.static_dir.join(lookup_path.trim_start_matches('/'));
        let (file_path, metadata) = match regular_file(&requested).await {
            Some(metadata) => (requested, metadata),
            None => match regular_file(&self.fallback_file).await {
                Some(metadata) => (self.fallback_file.clone(), metadata),
                None => {
                    logger::log_debug(&format!(
                        "Neither {} nor fallback {} exist",
                        requested.display(),
                        self.fallback_file.display()
                    ));
                    return http::build_404_response();
                }
            },
        };

        let validators = Validators::new(
            metadata.modified().unwrap_or(UNIX_EPOCH),
            metadata.len(),
        );
        if is_not_modified(ctx, &validators) {
            return http::build_304_response(&validators);
        }

        match tokio::fs::read(&file_path).await {
            Ok(content) => http::build_file_response(
                Bytes::from(content),
                mime::content_type_for_path(&file_path),
                &validators,
            ),
            Err(e) => {
                logger::log_error(&format!(
                    "Failed to read file '{}': {e}",
                    file_path.display()
                ));
                http::build_500_response()
            }
        }
    }
}

/// Metadata of `path` when it is a regular file; directories count as missing
async fn regular_file(path: &Path) -> Option<Metadata> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(Metadata::is_file)
}

fn is_not_modified(ctx: &RequestContext, validators: &Validators) -> bool {
    validators.is_not_modified(
        ctx.if_none_match.as_deref(),
        ctx.if_modified_since.as_deref(),
    )
}
