use std::{collections::HashMap, fs, path::Path};

pub const SETTINGS_FILE: &str = "coupon_client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub use_system_clipboard: bool,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".into(),
            request_timeout_secs: 10,
            use_system_clipboard: true,
            log_filter: "info".into(),
        }
    }
}

/// Defaults, then `coupon_client.toml`, then environment. Values that fail to
/// parse are skipped and reported back so they can be logged once tracing is up.
pub fn load_settings() -> (Settings, Vec<String>) {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub(crate) fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> (Settings, Vec<String>) {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => {
                for (key, value) in file_cfg {
                    let value = match value {
                        toml::Value::String(v) => v,
                        toml::Value::Integer(v) => v.to_string(),
                        toml::Value::Boolean(v) => v.to_string(),
                        other => {
                            warnings.push(format!(
                                "{}: unsupported value for '{key}': {other}",
                                path.display()
                            ));
                            continue;
                        }
                    };
                    if let Err(err) = apply_setting(&mut settings, &key, &value) {
                        warnings.push(format!("{}: {err}", path.display()));
                    }
                }
            }
            Err(err) => warnings.push(format!("{}: ignored, {err}", path.display())),
        }
    }

    for (var, key) in [
        ("COUPON_SERVER_URL", "server_url"),
        ("APP__SERVER_URL", "server_url"),
        ("APP__REQUEST_TIMEOUT_SECS", "request_timeout_secs"),
        ("APP__USE_SYSTEM_CLIPBOARD", "use_system_clipboard"),
        ("APP__LOG_FILTER", "log_filter"),
    ] {
        if let Some(value) = env(var) {
            if let Err(err) = apply_setting(&mut settings, key, &value) {
                warnings.push(format!("{var}: {err}"));
            }
        }
    }

    (settings, warnings)
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> Result<(), String> {
    match key {
        "server_url" => settings.server_url = value.trim().to_string(),
        "request_timeout_secs" => {
            settings.request_timeout_secs = match value.trim().parse::<u64>() {
                Ok(0) | Err(_) => {
                    return Err(format!(
                        "request_timeout_secs must be a positive integer, got '{value}'"
                    ))
                }
                Ok(secs) => secs,
            }
        }
        "use_system_clipboard" => {
            settings.use_system_clipboard = parse_flag(value).ok_or_else(|| {
                format!("use_system_clipboard must be true or false, got '{value}'")
            })?
        }
        "log_filter" => settings.log_filter = value.trim().to_string(),
        other => return Err(format!("unknown setting '{other}'")),
    }
    Ok(())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
