//! Model listing

use crate::core::config::Config;
use crate::core::models::ModelCatalog;

pub fn format_model_list(config: &Config) -> String {
    let catalog = ModelCatalog::from_config(config);
    let source = if config.models.is_empty() {
        "built-in list"
    } else {
        "from config"
    };

    let mut out = String::new();
    out.push_str(&format!("🤖 Available Models ({source})\n"));
    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    for model in catalog.iter() {
        if model == catalog.default_model() {
            out.push_str(&format!("  • {model} (default)\n"));
        } else {
            out.push_str(&format!("  • {model}\n"));
        }
    }
    out
}

pub fn list_models(config: &Config) {
    print!("{}", format_model_list(config));
}
