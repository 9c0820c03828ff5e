use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked in the chat by starting a line with a slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Show the stored profile
    Profile,
    /// Set one profile field
    Set,
    /// Clear the stored profile
    Unset,
    /// List uploaded documents
    Files,
    /// Upload a local document
    Upload,
    /// Show the persisted context
    Context,
    /// Clear the screen and forget the context
    Clear,
    /// Show help
    Help,
    /// Exit the chat
    Bye,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Split the argument of `/set` into field and value.
    pub fn field_assignment(&self) -> Option<(&str, &str)> {
        if self.command != SlashCommand::Set {
            return None;
        }
        let arg = self.argument()?.trim();
        let (field, value) = arg.split_once(char::is_whitespace).unwrap_or((arg, ""));
        Some((field, value.trim()))
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Profile => "show your profile",
            SlashCommand::Set => "set a profile field: /set <fullName|personalNumber|department|contact> <value>",
            SlashCommand::Unset => "delete your profile",
            SlashCommand::Files => "list uploaded documents",
            SlashCommand::Upload => "upload a document: /upload <path>",
            SlashCommand::Context => "show the conversation context sent with each message",
            SlashCommand::Clear => "start over: clear messages and context",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the chat",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether the command needs an argument to do anything.
    pub fn requires_argument(self) -> bool {
        matches!(self, SlashCommand::Set | SlashCommand::Upload)
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim().strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let head = parts.next()?;
    let argument = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let head = head.to_lowercase();
    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        "?" | "h" => Some(SlashCommand::Help),
        "ls" | "documents" => Some(SlashCommand::Files),
        "reset" => Some(SlashCommand::Clear),
        _ => None,
    })?;

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for command in SlashCommand::iter() {
        help.push_str(&format!("/{} - {}\n", command.command(), command.description()));
    }
    help.push_str("\nAliases: /q, /quit, /exit for /bye; /ls for /files; /reset for /clear");
    help
}
