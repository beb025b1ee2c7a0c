use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Model selected when a session starts (must be one of `models`)
    pub default_model: Option<String>,
    /// Replaces the built-in model list when non-empty
    #[serde(default)]
    pub models: Vec<String>,
    /// API base URL; `OPENAI_BASE_URL` takes precedence
    pub base_url: Option<String>,
    /// Replaces the built-in coding-assistant system prompt
    pub system_prompt: Option<String>,
    /// Colorize user and assistant turns
    pub color: Option<bool>,
}

/// Endpoint settings resolved from the config file and the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Config {
    pub fn color_enabled(&self) -> bool {
        self.color.unwrap_or(true)
    }

    pub fn set_default_model(&mut self, model: String) {
        self.default_model = Some(model);
    }

    pub fn unset_default_model(&mut self) {
        self.default_model = None;
    }

    pub fn api_settings(&self) -> ApiSettings {
        self.api_settings_with(|key| std::env::var(key).ok())
    }

    /// Resolve endpoint settings with an explicit variable lookup. Empty
    /// values count as unset.
    pub fn api_settings_with<F>(&self, lookup: F) -> ApiSettings
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |value: String| {
            let trimmed = value.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        };

        let api_key = lookup(API_KEY_ENV).and_then(non_empty);
        let base_url = lookup(BASE_URL_ENV)
            .and_then(non_empty)
            .or_else(|| self.base_url.clone().and_then(non_empty))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        ApiSettings { api_key, base_url }
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
