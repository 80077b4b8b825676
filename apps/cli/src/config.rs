use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const CONFIG_FILE: &str = "docbrains.toml";
pub const DEFAULT_API_ENDPOINT: &str = "http://localhost:8001/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_endpoint: String,
    pub download_dir: PathBuf,
    pub preferences_path: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.into(),
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            preferences_path: default_preferences_path(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Keys accepted in `docbrains.toml`; all optional.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_endpoint: Option<String>,
    download_dir: Option<PathBuf>,
    preferences_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
}

pub fn default_preferences_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docbrains")
        .join("preferences.json")
}

/// Defaults, then the config file (if present), then the process environment.
pub fn load_settings(config_path: Option<&Path>) -> Settings {
    let path = config_path.unwrap_or_else(|| Path::new(CONFIG_FILE));
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw, path);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str, path: &Path) {
    let file_cfg = match toml::from_str::<FileSettings>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable config file");
            return;
        }
    };

    if let Some(v) = file_cfg.api_endpoint {
        settings.api_endpoint = v;
    }
    if let Some(v) = file_cfg.download_dir {
        settings.download_dir = v;
    }
    if let Some(v) = file_cfg.preferences_path {
        settings.preferences_path = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("BACKEND_URL") {
        settings.api_endpoint = format!("{}/api", v.trim().trim_end_matches('/'));
    }
    if let Some(v) = var("APP__API_ENDPOINT") {
        settings.api_endpoint = v;
    }

    if let Some(v) = var("APP__DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }

    if let Some(v) = var("APP__PREFERENCES_PATH") {
        settings.preferences_path = PathBuf::from(v);
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
}

/// Trims whitespace and trailing slashes and checks for an http(s) base url.
pub fn normalize_api_endpoint(raw: &str) -> anyhow::Result<String> {
    let endpoint = raw.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Ok(DEFAULT_API_ENDPOINT.to_string());
    }

    let url = Url::parse(endpoint)
        .with_context(|| format!("invalid api endpoint '{endpoint}'"))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        bail!("api endpoint '{endpoint}' must start with http:// or https://");
    }

    Ok(endpoint.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
