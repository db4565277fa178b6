//! Cache-Control classification
//!
//! Build output under `/assets/` and static media are content-addressed and
//! cached for a year. The SPA shell always revalidates. Anything else gets a
//! short cache only when it names a real file.

use hyper::header::HeaderMap;
use std::fs::Metadata;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::http::CachePolicy;

use super::pipeline::{Flow, RequestContext};

const HASHED_ASSETS_PREFIX: &str = "/assets/";

const IMMUTABLE_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp",
];

/// Classify a normalised request path.
///
/// Returns `None` when no Cache-Control header should be attached.
pub async fn classify(path: &str, config: &Config) -> Option<CachePolicy> {
    if path.starts_with(HASHED_ASSETS_PREFIX)
        || IMMUTABLE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    {
        return Some(CachePolicy::Immutable);
    }

    if path == "/" || path == config.fallback_url_path() {
        return Some(CachePolicy::NoCache);
    }

    let file_path = Path::new(&config.static_dir).join(path.trim_start_matches('/'));
    // Directories count as missing, like in the resolver
    tokio::fs::metadata(&file_path)
        .await
        .ok()
        .filter(Metadata::is_file)
        .map(|_| CachePolicy::ShortCache)
}

/// Pipeline stage tagging responses with their Cache-Control treatment
pub struct CacheControl {
    config: Arc<Config>,
}

impl CacheControl {
    pub const fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub async fn before(&self, ctx: &RequestContext, headers: &mut HeaderMap) -> Flow {
        if let Some(policy) = classify(&ctx.path, &self.config).await {
            policy.apply(headers);
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_for(dir: &Path, fallback: &str) -> Config {
        Config {
            static_dir: dir.to_string_lossy().into_owned(),
            spa_fallback_file: fallback.to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_immutable_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), "index.html");

        for path in [
            "/assets/index-4f2a9c.js",
            "/assets/fonts/inter.woff2",
            "/logo.png",
            "/photo.jpeg",
            "/vite.svg",
            "/styles/main.css",
            "/hero.webp",
        ] {
            assert_eq!(
                classify(path, &config).await,
                Some(CachePolicy::Immutable),
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn test_shell_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), "index.html");

        assert_eq!(classify("/", &config).await, Some(CachePolicy::NoCache));
        assert_eq!(
            classify("/index.html", &config).await,
            Some(CachePolicy::NoCache)
        );
    }

    #[tokio::test]
    async fn test_existing_file_gets_short_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("robots.txt"), "User-agent: *").unwrap();
        let config = config_for(dir.path(), "index.html");

        assert_eq!(
            classify("/robots.txt", &config).await,
            Some(CachePolicy::ShortCache)
        );
        assert_eq!(classify("/api/users", &config).await, None);
    }

    #[tokio::test]
    async fn test_directory_is_not_short_cached() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        let config = config_for(dir.path(), "index.html");

        assert_eq!(classify("/docs", &config).await, None);
        assert_eq!(classify("/docs/", &config).await, None);
    }

    #[tokio::test]
    async fn test_custom_fallback_changes_shell() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "index").unwrap();
        fs::write(dir.path().join("custom.html"), "custom").unwrap();
        let config = config_for(dir.path(), "custom.html");

        assert_eq!(
            classify("/custom.html", &config).await,
            Some(CachePolicy::NoCache)
        );
        assert_eq!(
            classify("/index.html", &config).await,
            Some(CachePolicy::ShortCache)
        );
    }
}
