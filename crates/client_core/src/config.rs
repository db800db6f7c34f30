use std::{collections::HashMap, fs, path::Path};

pub const DEFAULT_SETTINGS_FILE: &str = "forest.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub reject_dangling_references: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            request_timeout_secs: 30,
            user_agent: concat!("forest-client/", env!("CARGO_PKG_VERSION")).into(),
            reject_dangling_references: false,
        }
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(DEFAULT_SETTINGS_FILE)
}

/// Defaults, then the TOML file at `path` if readable, then environment overrides.
pub fn load_settings_from(path: impl AsRef<Path>) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings.server_url = normalize_server_url(&settings.server_url);
    settings
}

fn apply_file_overrides(settings: &mut ClientSettings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };

    if let Some(v) = file_cfg.get("server_url").and_then(toml::Value::as_str) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = file_cfg
        .get("request_timeout_secs")
        .and_then(toml::Value::as_integer)
    {
        if let Ok(parsed) = u64::try_from(v) {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Some(v) = file_cfg.get("user_agent").and_then(toml::Value::as_str) {
        settings.user_agent = v.to_string();
    }
    if let Some(v) = file_cfg
        .get("reject_dangling_references")
        .and_then(toml::Value::as_bool)
    {
        settings.reject_dangling_references = v;
    }
}

fn apply_env_overrides(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("FOREST_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = var("APP__USER_AGENT") {
        settings.user_agent = v;
    }

    if let Some(v) = var("APP__REJECT_DANGLING_REFERENCES") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.reject_dangling_references = parsed;
        }
    }
}

pub fn normalize_server_url(raw_server_url: &str) -> String {
    let trimmed = raw_server_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return ClientSettings::default().server_url;
    }
    trimmed.to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
