//! In-memory cache of critical assets
//!
//! A small fixed set of files (the SPA shell plus a few known assets) is read
//! into memory at startup. The whole mapping is rebuilt on `reload` and
//! published with a single swap, so readers never see a partial state.

use hyper::body::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::Config;
use crate::http::mime;
use crate::logger;

/// Preloaded copy of a file
#[derive(Debug, Clone)]
pub struct CachedAsset {
    pub content: Bytes,
    pub modified: SystemTime,
    pub size: u64,
    pub mime_type: &'static str,
}

/// URL path → cached asset, keyed like `/index.html`
pub struct AssetCache {
    static_dir: PathBuf,
    names: Vec<String>,
    entries: RwLock<Arc<HashMap<String, Arc<CachedAsset>>>>,
}

impl AssetCache {
    /// Read the named files from `static_dir`. Missing or unreadable files
    /// are logged and skipped.
    pub fn load(static_dir: impl Into<PathBuf>, names: Vec<String>) -> Self {
        let static_dir = static_dir.into();
        let entries = read_assets(&static_dir, &names);
        Self {
            static_dir,
            names,
            entries: RwLock::new(Arc::new(entries)),
        }
    }

    /// Cache the fallback file followed by the configured preload list
    pub fn for_config(config: &Config) -> Self {
        let mut names = vec![config.spa_fallback_file.clone()];
        for name in &config.preload {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        Self::load(&config.static_dir, names)
    }

    /// Re-read every critical file and publish the new mapping at once
    pub fn reload(&self) {
        let fresh = Arc::new(read_assets(&self.static_dir, &self.names));
        *self.entries.write() = fresh;
    }

    pub fn lookup(&self, url_path: &str) -> Option<Arc<CachedAsset>> {
        self.entries.read().get(url_path).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_assets(static_dir: &Path, names: &[String]) -> HashMap<String, Arc<CachedAsset>> {
    let mut entries = HashMap::with_capacity(names.len());

    for name in names {
        let file_path = static_dir.join(name);
        match read_asset(&file_path) {
            Ok(asset) => {
                entries.insert(format!("/{name}"), Arc::new(asset));
            }
            Err(e) => logger::log_warning(&format!(
                "Could not load critical asset {} into cache: {e}",
                file_path.display()
            )),
        }
    }

    logger::log_assets_loaded(entries.len(), &static_dir.to_string_lossy());
    entries
}

fn read_asset(file_path: &Path) -> std::io::Result<CachedAsset> {
    let content = std::fs::read(file_path)?;
    let metadata = std::fs::metadata(file_path)?;
    Ok(CachedAsset {
        content: Bytes::from(content),
        modified: metadata.modified()?,
        size: metadata.len(),
        mime_type: mime::content_type_for_path(file_path),
    })
}
