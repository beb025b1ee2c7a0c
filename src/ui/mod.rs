//! Terminal front end for interactive chat sessions.
//!
//! - [`chat_loop`]: reads input lines, dispatches them to [`crate::commands`]
//!   and submits prompts through [`crate::core::session`].
//! - [`render`]: transcript formatting and the streaming display.

pub mod chat_loop;
pub mod render;
