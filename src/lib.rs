//! Code Mentor is a terminal coding assistant for OpenAI-compatible chat APIs.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation session, model catalog, uploads,
//!   configuration, and the streaming completion client.
//! - [`ui`] renders the transcript and runs the interactive loop that reads
//!   input and shows answers as they stream in.
//! - [`commands`] implements slash-command parsing and execution used by the
//!   chat loop.
//! - [`api`] defines the chat payloads sent to and received from the API.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`], which loads
//! configuration and dispatches into [`ui::chat_loop`] or the one-shot
//! [`cli::say`] command.

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
