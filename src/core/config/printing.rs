use crate::core::config::data::Config;
use crate::core::models::ModelCatalog;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.default_model {
            Some(model) => println!("  default-model: {model}"),
            None => println!("  default-model: (unset)"),
        }
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (unset)"),
        }
        match self.color_enabled() {
            true => println!("  color: on"),
            false => println!("  color: off"),
        }
        if self.system_prompt.is_some() {
            println!("  system-prompt: (custom)");
        }
        let catalog = ModelCatalog::from_config(self);
        println!("  models:");
        for model in catalog.iter() {
            println!("    {model}");
        }
    }
}
