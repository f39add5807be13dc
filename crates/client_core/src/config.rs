use std::{collections::HashMap, fs, io, path::Path, time::Duration};

use anyhow::{anyhow, bail, Context};
use shared::domain::{PageSize, TaskOrder};
use tracing::warn;

use crate::controller::{ControllerOptions, DEFAULT_READ_ROW_SET, DEFAULT_WRITE_ROW_SET};

pub const DEFAULT_CONFIG_FILE: &str = "tasks.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub service_url: String,
    pub api_key: Option<String>,
    pub read_row_set: String,
    pub write_row_set: String,
    pub order: TaskOrder,
    pub default_page_size: PageSize,
    pub notification_ttl_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:54321".into(),
            api_key: None,
            read_row_set: DEFAULT_READ_ROW_SET.into(),
            write_row_set: DEFAULT_WRITE_ROW_SET.into(),
            order: TaskOrder::UpdatedAtDesc,
            default_page_size: PageSize::default(),
            notification_ttl_ms: 3_000,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn controller_options(&self) -> ControllerOptions {
        let ttl_ms = i64::try_from(self.notification_ttl_ms).unwrap_or(i64::MAX);
        ControllerOptions {
            read_row_set: self.read_row_set.clone(),
            write_row_set: self.write_row_set.clone(),
            order: self.order,
            page_size: self.default_page_size,
            notification_ttl: chrono::Duration::milliseconds(ttl_ms),
        }
    }

    /// Applies one `key = value` override; keys match the field names.
    pub fn apply(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let value = value.trim();
        match key {
            "service_url" => self.service_url = value.to_string(),
            "api_key" => {
                self.api_key = (!value.is_empty()).then(|| value.to_string());
            }
            "read_row_set" => self.read_row_set = non_empty(key, value)?,
            "write_row_set" => self.write_row_set = non_empty(key, value)?,
            "order" => {
                self.order = value.parse::<TaskOrder>().map_err(|err| anyhow!(err))?;
            }
            "default_page_size" => {
                let raw: u32 = value
                    .parse()
                    .with_context(|| format!("default_page_size '{value}' is not a number"))?;
                self.default_page_size = PageSize::new(raw)?;
            }
            "notification_ttl_ms" => {
                self.notification_ttl_ms = value
                    .parse()
                    .with_context(|| format!("notification_ttl_ms '{value}' is not a number"))?;
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = value
                    .parse()
                    .with_context(|| format!("request_timeout_secs '{value}' is not a number"))?;
            }
            other => bail!("unknown setting '{other}'"),
        }
        Ok(())
    }
}

const SETTING_KEYS: [&str; 8] = [
    "service_url",
    "api_key",
    "read_row_set",
    "write_row_set",
    "order",
    "default_page_size",
    "notification_ttl_ms",
    "request_timeout_secs",
];

/// Defaults, then the settings file at `path` (skipped when absent), then the
/// variables `env` resolves.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
    }

    apply_env(&mut settings, env)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let table = toml::from_str::<HashMap<String, toml::Value>>(raw)?;
    for (key, value) in table {
        if !SETTING_KEYS.contains(&key.as_str()) {
            warn!("config: ignoring unknown setting '{key}'");
            continue;
        }
        let value = match value {
            toml::Value::String(s) => s,
            other => other.to_string(),
        };
        settings.apply(&key, &value)?;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
    if let Some(v) = env("SUPABASE_URL") {
        settings.apply("service_url", &v)?;
    }
    if let Some(v) = env("SUPABASE_ANON_KEY") {
        settings.apply("api_key", &v)?;
    }

    for key in SETTING_KEYS {
        let upper = key.to_ascii_uppercase();
        if let Some(v) = env(&format!("TASKS_{upper}")) {
            settings
                .apply(key, &v)
                .with_context(|| format!("invalid TASKS_{upper}"))?;
        }
        if let Some(v) = env(&format!("TASKS__{upper}")) {
            settings
                .apply(key, &v)
                .with_context(|| format!("invalid TASKS__{upper}"))?;
        }
    }
    Ok(())
}

fn non_empty(key: &str, value: &str) -> anyhow::Result<String> {
    if value.is_empty() {
        bail!("{key} must not be empty");
    }
    Ok(value.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
