//! Runtime configuration.
//!
//! Everything is read once from environment variables at startup. The only
//! credential is the Gemini API key; leaving it unset (or at the
//! deployment-template placeholder) disables AI generation with a clear
//! error instead of failing startup.

use std::path::PathBuf;

use crate::ai::DEFAULT_GEMINI_MODEL;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the HTTP API.
    pub host: String,
    pub port: u16,
    /// Gemini API key. May be empty; checked per request.
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Path of the JSON document holding the paper collection.
    pub storage_path: PathBuf,
    /// Directory exported paper images are written to.
    pub export_dir: PathBuf,
    /// Base URL of the rendering service, if one is deployed.
    pub renderer_url: Option<String>,
}

impl Config {
    /// Build a config from environment variables, with local-development
    /// defaults for everything but the API key.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("PAPERDECK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".paperdeck"));

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            gemini_api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            storage_path: data_dir.join("papers.json"),
            export_dir: data_dir.join("exports"),
            renderer_url: std::env::var("RENDERER_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }
}
