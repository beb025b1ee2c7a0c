//! Model catalog
//!
//! The chat only offers a small, fixed set of model identifiers. The set
//! ships with the binary and can be replaced from the config file.

use crate::core::config::Config;

/// Model identifiers offered when the config does not override them.
/// The first entry is the default selection.
pub const BUILTIN_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4-turbo",
    "gpt-4.5-preview",
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-16k",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<String>,
    default_model: String,
}

impl ModelCatalog {
    /// Build a catalog from an explicit list. The default falls back to the
    /// first entry when it is missing or not part of the list.
    pub fn new(models: Vec<String>, default_model: Option<&str>) -> Self {
        let mut models: Vec<String> = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if models.is_empty() {
            models = BUILTIN_MODELS.iter().map(|m| m.to_string()).collect();
        }

        let default_model = default_model
            .and_then(|wanted| models.iter().find(|m| m.as_str() == wanted))
            .unwrap_or(&models[0])
            .clone();

        Self {
            models,
            default_model,
        }
    }

    pub fn builtin() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn from_config(config: &Config) -> Self {
        let catalog = Self::new(config.models.clone(), config.default_model.as_deref());
        if let Some(wanted) = config.default_model.as_deref() {
            if catalog.default_model != wanted {
                tracing::warn!(
                    model = wanted,
                    "configured default model is not in the catalog; using {}",
                    catalog.default_model
                );
            }
        }
        catalog
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
