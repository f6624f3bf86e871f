use std::{collections::HashMap, fs, path::Path};

use client_core::ClientOptions;
use shared::domain::RearmPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub log_filter: String,
    pub failure_message: String,
    pub rearm_after_submit: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let options = ClientOptions::default();
        Self {
            base_url: "http://127.0.0.1:5000/api".into(),
            log_filter: "info".into(),
            failure_message: options.failure_message,
            rearm_after_submit: false,
        }
    }
}

impl Settings {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            failure_message: self.failure_message.clone(),
            rearm_policy: if self.rearm_after_submit {
                RearmPolicy::DisableAfterSubmit
            } else {
                RearmPolicy::KeepEnabled
            },
        }
    }
}

/// Settings plus the problems met while loading them. The warnings are kept
/// until logging is installed, since the log filter is itself a setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub warnings: Vec<String>,
}

pub fn load_settings(config_path: &Path) -> LoadedSettings {
    load_settings_from(config_path, |key| std::env::var(key).ok())
}

/// Defaults, then the flat `key = "value"` table in `config_path`, then the
/// environment looked up through `env`.
pub fn load_settings_from(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> LoadedSettings {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("base_url") {
                    settings.base_url = v.clone();
                }
                if let Some(v) = file_cfg.get("log_filter") {
                    settings.log_filter = v.clone();
                }
                if let Some(v) = file_cfg.get("failure_message") {
                    settings.failure_message = v.clone();
                }
                if let Some(v) = file_cfg.get("rearm_after_submit") {
                    apply_flag(&mut settings.rearm_after_submit, v, &mut warnings);
                }
            }
            Err(err) => warnings.push(format!(
                "ignoring unreadable config '{}': {err}",
                config_path.display()
            )),
        }
    }

    if let Some(v) = env("FORMWIRE_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = env("APP__BASE_URL") {
        settings.base_url = v;
    }

    if let Some(v) = env("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    if let Some(v) = env("APP__FAILURE_MESSAGE") {
        settings.failure_message = v;
    }

    if let Some(v) = env("APP__REARM_AFTER_SUBMIT") {
        apply_flag(&mut settings.rearm_after_submit, &v, &mut warnings);
    }

    LoadedSettings { settings, warnings }
}

fn apply_flag(flag: &mut bool, raw: &str, warnings: &mut Vec<String>) {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *flag = true,
        "0" | "false" | "no" | "off" => *flag = false,
        other => warnings.push(format!("ignoring invalid boolean setting '{other}'")),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
