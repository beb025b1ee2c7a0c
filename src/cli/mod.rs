//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod model_list;
pub mod say;

use std::error::Error;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::model_list::list_models;
use crate::cli::say::run_say;
use crate::core::app::App;
use crate::core::chat_stream::OpenAiService;
use crate::core::config::Config;
use crate::core::models::ModelCatalog;
use crate::ui::chat_loop::run_chat;
use crate::utils::logging::TranscriptLog;

#[derive(Parser)]
#[command(name = "codementor", version)]
#[command(about = "A terminal coding assistant that streams answers from OpenAI-compatible APIs")]
#[command(
    long_about = "Code Mentor is a terminal coding assistant. Your conversation is sent to an \
OpenAI-compatible chat completions API and the answer is streamed back as it is generated.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY    Your API key (required to send messages)\n\
  OPENAI_BASE_URL   Custom API base URL (optional, defaults to https://api.openai.com/v1)\n\
  RUST_LOG          Diagnostic log filter (overrides -v)\n\n\
Commands inside the chat:\n\
  /help             Show all commands\n\
  /model [MODEL]    List models or switch model\n\
  /file <PATH>      Add a .py, .txt, .csv or .json file to the conversation\n\
  /image <PATH>     Attach a .png or .jpg image (shown only)\n\
  /log [FILE]       Enable, pause or resume the transcript log\n\
  /quit             Leave"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for this session
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Enable logging of the transcript to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,

    /// Upload a text file into the conversation before the first prompt
    #[arg(short = 'f', long = "file", global = true, value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Increase diagnostic output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Send a single prompt and print the streamed answer
    Say {
        /// Prompt text (multiple words are joined with spaces)
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// List the models that can be selected
    Models,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        value: Option<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command.unwrap_or(Commands::Chat) {
        Commands::Models => {
            let config = Config::load()?;
            list_models(&config);
            Ok(())
        }
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            match (key.as_str(), value) {
                ("default-model", Some(model)) => {
                    let catalog = ModelCatalog::from_config(&config);
                    if !catalog.contains(&model) {
                        return Err(format!(
                            "Unknown model '{model}'. Run 'codementor models' to see the choices."
                        )
                        .into());
                    }
                    config.set_default_model(model.clone());
                    config.save()?;
                    println!("✅ Set default-model to: {model}");
                }
                ("default-model", None) => config.print_all(),
                _ => return Err(format!("Unknown config key: {key}").into()),
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            match key.as_str() {
                "default-model" => {
                    config.unset_default_model();
                    config.save()?;
                    println!("✅ Unset default-model");
                }
                _ => return Err(format!("Unknown config key: {key}").into()),
            }
            Ok(())
        }
        command @ (Commands::Chat | Commands::Say { .. }) => {
            let config = Config::load()?;
            let settings = config.api_settings();
            if settings.api_key.is_none() {
                tracing::warn!("OPENAI_API_KEY is not set; requests will fail until it is");
            }
            let service = OpenAiService::new(settings);

            let mut app = App::from_config(&config, TranscriptLog::new(args.log)?);
            if let Some(model) = args.model.as_deref() {
                app.session.select_model(model)?;
            }
            for path in &args.files {
                let upload = app.upload_file(path)?;
                tracing::info!(file = %upload.name, "uploaded file from command line");
            }

            match command {
                Commands::Say { prompt } => run_say(&mut app, &service, prompt).await,
                _ => Ok(run_chat(&mut app, &service).await?),
            }
        }
    }
}
