use std::{collections::HashMap, fs};

use gallery_core::UploadPolicy;
use toml::Value;
use tracing::warn;

const CONFIG_FILE: &str = "gallery.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base_url: String,
    pub upload_policy: UploadPolicy,
    pub request_timeout_secs: u64,
    pub start_offline: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/api".into(),
            upload_policy: UploadPolicy::AllItems,
            request_timeout_secs: 30,
            start_offline: false,
        }
    }
}

pub fn load_settings() -> Settings {
    let raw = fs::read_to_string(CONFIG_FILE).ok();
    settings_from(raw.as_deref(), |key| std::env::var(key).ok())
}

/// Layers `gallery.toml` contents and then environment values over the
/// defaults. Values that fail to parse keep the previous layer.
fn settings_from(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, Value>>(raw) {
            Ok(file_cfg) => {
                let get = |key: &str| file_cfg.get(key).and_then(|value| scalar_text(key, value));
                if let Some(v) = get("api_base_url") {
                    settings.api_base_url = v;
                }
                if let Some(v) = get("upload_policy") {
                    apply_policy(&mut settings, &v);
                }
                if let Some(v) = get("request_timeout_secs") {
                    apply_timeout(&mut settings, &v);
                }
                if let Some(v) = get("start_offline") {
                    apply_offline(&mut settings, &v);
                }
            }
            Err(error) => warn!(%error, file = CONFIG_FILE, "ignoring unreadable config file"),
        }
    }

    if let Some(v) = env("GALLERY_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__UPLOAD_POLICY") {
        apply_policy(&mut settings, &v);
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        apply_timeout(&mut settings, &v);
    }
    if let Some(v) = env("APP__START_OFFLINE") {
        apply_offline(&mut settings, &v);
    }

    settings.api_base_url = normalize_api_base_url(&settings.api_base_url);
    settings
}

/// Accepts both native TOML scalars (`start_offline = true`) and their quoted
/// form (`start_offline = "true"`).
fn scalar_text(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Integer(number) => Some(number.to_string()),
        Value::Float(number) => Some(number.to_string()),
        Value::Boolean(flag) => Some(flag.to_string()),
        Value::Datetime(_) | Value::Array(_) | Value::Table(_) => {
            warn!(key, file = CONFIG_FILE, "ignoring non-scalar config value");
            None
        }
    }
}

fn apply_policy(settings: &mut Settings, raw: &str) {
    match raw.parse::<UploadPolicy>() {
        Ok(policy) => settings.upload_policy = policy,
        Err(error) => warn!(%error, "keeping upload policy {:?}", settings.upload_policy),
    }
}

fn apply_timeout(settings: &mut Settings, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<u64>() {
        settings.request_timeout_secs = parsed;
    }
}

fn apply_offline(settings: &mut Settings, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<bool>() {
        settings.start_offline = parsed;
    }
}

pub fn normalize_api_base_url(raw_api_base_url: &str) -> String {
    let trimmed = raw_api_base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Settings::default().api_base_url;
    }
    trimmed.to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
