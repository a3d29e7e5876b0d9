//! Inbound command model.
//!
//! Every gateway update is classified into exactly one [`Command`] variant at
//! the adapter boundary. Each variant has its own typed struct so handlers can
//! be registered per variant (see [`crate::mediator`]).

use std::fmt;

use crate::domain::{ChatId, Message, MessageId};

/// Routing context shared by all variants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandContext {
    pub chat_id: ChatId,
    pub user_id: String,
    pub language_code: String,
    pub message_id: MessageId,
}

/// `/something` typed by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedCommand {
    pub context: CommandContext,
    pub name: String,
}

/// Free-form text to be turned into a shopping list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageCommand {
    pub context: CommandContext,
    pub text: String,
}

/// Inline keyboard button press on a message we sent earlier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonPressCommand {
    pub context: CommandContext,
    pub button_id: i32,
    pub original_message: Message,
}

/// Anything the bot does not react to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownCommand {
    pub context: CommandContext,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Named(NamedCommand),
    TextMessage(TextMessageCommand),
    ButtonPress(ButtonPressCommand),
    Unknown(UnknownCommand),
}

/// Runtime variant tag of a [`Command`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Named,
    TextMessage,
    ButtonPress,
    Unknown,
}

pub(crate) const KIND_COUNT: usize = 4;

impl CommandKind {
    pub const ALL: [CommandKind; KIND_COUNT] = [
        CommandKind::Named,
        CommandKind::TextMessage,
        CommandKind::ButtonPress,
        CommandKind::Unknown,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            CommandKind::Named => 0,
            CommandKind::TextMessage => 1,
            CommandKind::ButtonPress => 2,
            CommandKind::Unknown => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Named => "named",
            CommandKind::TextMessage => "text_message",
            CommandKind::ButtonPress => "button_press",
            CommandKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Named(_) => CommandKind::Named,
            Command::TextMessage(_) => CommandKind::TextMessage,
            Command::ButtonPress(_) => CommandKind::ButtonPress,
            Command::Unknown(_) => CommandKind::Unknown,
        }
    }

    pub fn context(&self) -> &CommandContext {
        match self {
            Command::Named(c) => &c.context,
            Command::TextMessage(c) => &c.context,
            Command::ButtonPress(c) => &c.context,
            Command::Unknown(c) => &c.context,
        }
    }
}

/// A concrete command struct that knows its own tag and can be unwrapped
/// from the [`Command`] union.
pub trait CommandVariant: Sized + Send + 'static {
    const KIND: CommandKind;

    /// Unwrap the variant; returns the command unchanged if the tag differs.
    fn from_command(command: Command) -> Result<Self, Command>;
}

macro_rules! impl_command_variant {
    ($ty:ty, $variant:ident) => {
        impl CommandVariant for $ty {
            const KIND: CommandKind = CommandKind::$variant;

            fn from_command(command: Command) -> Result<Self, Command> {
                match command {
                    Command::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }

        impl From<$ty> for Command {
            fn from(value: $ty) -> Self {
                Command::$variant(value)
            }
        }
    };
}

impl_command_variant!(NamedCommand, Named);
impl_command_variant!(TextMessageCommand, TextMessage);
impl_command_variant!(ButtonPressCommand, ButtonPress);
impl_command_variant!(UnknownCommand, Unknown);

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CommandContext {
        CommandContext {
            chat_id: ChatId(7),
            user_id: "42".to_string(),
            language_code: "en".to_string(),
            message_id: MessageId(3),
        }
    }

    #[test]
    fn kind_matches_variant() {
        let named: Command = NamedCommand {
            context: ctx(),
            name: "/start".to_string(),
        }
        .into();
        assert_eq!(named.kind(), CommandKind::Named);
        assert_eq!(named.context().chat_id, ChatId(7));

        let unknown: Command = UnknownCommand { context: ctx() }.into();
        assert_eq!(unknown.kind(), CommandKind::Unknown);
    }

    #[test]
    fn from_command_rejects_other_variants() {
        let text: Command = TextMessageCommand {
            context: ctx(),
            text: "milk".to_string(),
        }
        .into();
        let back = NamedCommand::from_command(text.clone()).unwrap_err();
        assert_eq!(back, text);
        let ok = TextMessageCommand::from_command(text).unwrap();
        assert_eq!(ok.text, "milk");
    }

    #[test]
    fn kind_indices_are_distinct() {
        let mut seen = [false; KIND_COUNT];
        for kind in CommandKind::ALL {
            assert!(!seen[kind.index()]);
            seen[kind.index()] = true;
        }
    }
}
