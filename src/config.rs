use std::{env, path::PathBuf};

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub base_dir: PathBuf,
    pub base_url: String,
    pub api_prefix: String,
    pub log_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ApiError> {
        dotenvy::dotenv().ok();

        let host = env::var("SHELF_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env::var("SHELF_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|err| ApiError::Config(format!("invalid SHELF_PORT: {err}")))?;

        let base_dir =
            PathBuf::from(env::var("SHELF_BASE_DIR").unwrap_or_else(|_| "./data/files".into()));

        let base_url = env::var("SHELF_BASE_URL").unwrap_or_else(|_| "/uploads/".into());

        let api_prefix = env::var("SHELF_API_PREFIX").unwrap_or_else(|_| "/api/files".into());

        let log_dir = PathBuf::from(env::var("SHELF_LOG_DIR").unwrap_or_else(|_| "./log".into()));

        Ok(Self {
            host,
            port,
            base_dir,
            base_url,
            api_prefix,
            log_dir,
        })
    }
}
