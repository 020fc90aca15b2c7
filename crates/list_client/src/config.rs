use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use shared::pagination::DEFAULT_ITEMS_PER_PAGE;
use tracing::warn;

pub const SETTINGS_FILE: &str = "list_client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSettings {
    pub server_url: String,
    pub debounce_ms: u64,
    pub default_page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            debounce_ms: 100,
            default_page_size: DEFAULT_ITEMS_PER_PAGE,
            request_timeout_secs: 30,
        }
    }
}

impl ListSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    debounce_ms: Option<u64>,
    default_page_size: Option<u32>,
    request_timeout_secs: Option<u64>,
}

pub fn load_settings() -> ListSettings {
    let mut settings = load_settings_from(Path::new(SETTINGS_FILE));
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Defaults overlaid with the TOML file at `path`, if it exists and parses.
pub fn load_settings_from(path: &Path) -> ListSettings {
    let mut settings = ListSettings::default();

    let Ok(raw) = fs::read_to_string(path) else {
        return settings;
    };
    let file_cfg = match toml::from_str::<FileSettings>(&raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!(path = %path.display(), "ignoring unparsable settings file: {err}");
            return settings;
        }
    };

    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.debounce_ms {
        settings.debounce_ms = v;
    }
    if let Some(v) = file_cfg.default_page_size {
        settings.default_page_size = v.max(1);
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    settings
}

pub fn apply_env_overrides(settings: &mut ListSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("LIST_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("APP__DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
        settings.debounce_ms = v;
    }
    if let Some(v) = lookup("APP__PAGE_SIZE").and_then(|v| v.parse::<u32>().ok()) {
        settings.default_page_size = v.max(1);
    }
    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_secs = v;
    }
}
