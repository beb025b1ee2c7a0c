use super::CommandResult;
use crate::core::app::App;

pub type CommandHandler = fn(&mut App, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands().iter().find(|command| {
        command.name.eq_ignore_ascii_case(name)
            || command
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
    })
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        aliases: &["?"],
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "model",
        aliases: &[],
        usage: "/model [MODEL]",
        help: "List available models or switch to another one.",
        handler: super::handle_model,
    },
    Command {
        name: "file",
        aliases: &["upload"],
        usage: "/file <PATH>",
        help: "Add a .py, .txt, .csv or .json file to the conversation.",
        handler: super::handle_file,
    },
    Command {
        name: "image",
        aliases: &[],
        usage: "/image <PATH>",
        help: "Attach a .png or .jpg image for display (not sent to the model).",
        handler: super::handle_image,
    },
    Command {
        name: "images",
        aliases: &[],
        usage: "/images",
        help: "List images attached in this session.",
        handler: super::handle_images,
    },
    Command {
        name: "history",
        aliases: &[],
        usage: "/history",
        help: "Print the conversation so far.",
        handler: super::handle_history,
    },
    Command {
        name: "log",
        aliases: &[],
        usage: "/log [FILE]",
        help: "Toggle logging or set the log file path.",
        handler: super::handle_log,
    },
    Command {
        name: "quit",
        aliases: &["exit"],
        usage: "/quit",
        help: "End the session.",
        handler: super::handle_quit,
    },
];
