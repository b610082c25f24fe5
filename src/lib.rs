pub mod actions;
pub mod config;
pub mod error;
pub mod models;
pub mod resolve;
pub mod routes;

use std::path::{Path, PathBuf};

/// Per-mount configuration for the files API: every handler reads its
/// base directory, public URL prefix and mount prefix from here instead
/// of process-wide state, so several independent mounts can coexist.
pub struct FilesService {
    pub base_dir: PathBuf,
    pub base_url: String,
    pub prefix: String,
    pub http: reqwest::Client,
}

impl FilesService {
    pub fn new(
        base_dir: impl AsRef<Path>,
        base_url: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            base_url: base_url.into(),
            prefix,
            http: reqwest::Client::new(),
        }
    }
}
