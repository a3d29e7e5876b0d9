//! Classification of Telegram updates into commands.

use teloxide::types::{CallbackQuery, Message as TgMessage, Update, UpdateKind, User};

use shoplist_core::{
    command::{
        ButtonPressCommand, Command, CommandContext, NamedCommand, TextMessageCommand,
        UnknownCommand,
    },
    domain::{ChatId, Message, MessageId},
    errors::Error,
    Result,
};

use crate::keyboard::{parse_button_id, parse_keyboard};

pub const COMMAND_PREFIX: char = '/';

/// Turn one update into exactly one command.
///
/// Only a callback with a missing message or a non-numeric payload fails;
/// everything the bot does not understand becomes [`Command::Unknown`].
pub fn classify(update: &Update) -> Result<Command> {
    match &update.kind {
        UpdateKind::Message(msg) => {
            let context = message_context(msg, msg.from());
            Ok(match msg.text() {
                Some(text) => classify_text(context, text),
                None => Command::Unknown(UnknownCommand { context }),
            })
        }
        UpdateKind::EditedMessage(msg) => Ok(Command::Unknown(UnknownCommand {
            context: message_context(msg, msg.from()),
        })),
        UpdateKind::CallbackQuery(q) => classify_callback(q),
        _ => Ok(Command::Unknown(UnknownCommand {
            context: CommandContext {
                chat_id: ChatId(0),
                user_id: String::new(),
                language_code: String::new(),
                message_id: MessageId(0),
            },
        })),
    }
}

/// `/name args` becomes a named command; anything else is list text.
pub fn classify_text(context: CommandContext, text: &str) -> Command {
    if text.starts_with(COMMAND_PREFIX) {
        Command::Named(NamedCommand {
            context,
            name: command_name(text),
        })
    } else {
        Command::TextMessage(TextMessageCommand {
            context,
            text: text.to_string(),
        })
    }
}

/// First word of a command message, without a `@botname` suffix.
pub fn command_name(text: &str) -> String {
    let first = text.split_whitespace().next().unwrap_or(text);
    let name = first.split_once('@').map_or(first, |(name, _)| name);
    name.to_string()
}

fn classify_callback(q: &CallbackQuery) -> Result<Command> {
    let msg = q
        .message
        .as_ref()
        .ok_or_else(|| Error::InvalidUpdate("callback query without a message".to_string()))?;
    let data = q
        .data
        .as_deref()
        .ok_or_else(|| Error::InvalidUpdate("callback query without data".to_string()))?;
    let button_id = parse_button_id(data)?;

    let buttons = match msg.reply_markup() {
        Some(markup) => parse_keyboard(markup)?,
        None => Vec::new(),
    };
    let text = msg.text().unwrap_or_default();

    Ok(Command::ButtonPress(ButtonPressCommand {
        context: message_context(msg, Some(&q.from)),
        button_id,
        original_message: Message::with_buttons(text, buttons),
    }))
}

fn message_context(msg: &TgMessage, from: Option<&User>) -> CommandContext {
    CommandContext {
        chat_id: ChatId(msg.chat.id.0),
        user_id: from.map(|u| u.id.0.to_string()).unwrap_or_default(),
        language_code: from
            .and_then(|u| u.language_code.clone())
            .unwrap_or_default(),
        message_id: MessageId(msg.id.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shoplist_core::command::CommandKind;
    use shoplist_core::domain::{Button, CheckState};

    fn user() -> serde_json::Value {
        json!({ "id": 77, "is_bot": false, "first_name": "Sam", "language_code": "ru" })
    }

    fn chat() -> serde_json::Value {
        json!({ "id": 10, "type": "private", "first_name": "Sam" })
    }

    fn update(value: serde_json::Value) -> Update {
        // teloxide's `Update` deserializer only works from text, not from `Value`.
        serde_json::from_str(&value.to_string()).unwrap()
    }

    fn text_update(text: &str) -> Update {
        update(json!({
            "update_id": 1,
            "message": {
                "message_id": 5,
                "date": 1700000000,
                "chat": chat(),
                "from": user(),
                "text": text
            }
        }))
    }

    #[test]
    fn slash_text_is_named_command() {
        let cmd = classify(&text_update("/start@shop_bot now")).unwrap();
        let Command::Named(named) = cmd else {
            panic!("expected named command, got {cmd:?}");
        };
        assert_eq!(named.name, "/start");
        assert_eq!(named.context.chat_id, ChatId(10));
        assert_eq!(named.context.user_id, "77");
        assert_eq!(named.context.language_code, "ru");
        assert_eq!(named.context.message_id, MessageId(5));
    }

    #[test]
    fn plain_text_is_list_text() {
        let cmd = classify(&text_update("milk and bread")).unwrap();
        assert_eq!(cmd.kind(), CommandKind::TextMessage);
    }

    fn callback(data: &str, with_message: bool) -> Update {
        let mut q = json!({
            "id": "q1",
            "from": user(),
            "chat_instance": "ci",
            "data": data
        });
        if with_message {
            q["message"] = json!({
                "message_id": 9,
                "date": 1700000000,
                "chat": chat(),
                "text": "Your list:",
                "reply_markup": { "inline_keyboard": [
                    [{ "text": "✅ bread", "callback_data": "1" }],
                    [{ "text": "⬜ milk", "callback_data": "2" }]
                ]}
            });
        }
        update(json!({ "update_id": 2, "callback_query": q }))
    }

    #[test]
    fn callback_rebuilds_original_message() {
        let cmd = classify(&callback("2", true)).unwrap();
        let Command::ButtonPress(press) = cmd else {
            panic!("expected button press, got {cmd:?}");
        };
        assert_eq!(press.button_id, 2);
        assert_eq!(press.context.message_id, MessageId(9));
        assert_eq!(press.original_message.text, "Your list:");
        assert_eq!(
            press.original_message.buttons,
            vec![
                Button::new(1, "bread", CheckState::Checked),
                Button::new(2, "milk", CheckState::Unchecked),
            ]
        );
    }

    #[test]
    fn malformed_callbacks_are_invalid() {
        assert!(matches!(
            classify(&callback("abc", true)),
            Err(Error::InvalidUpdate(_))
        ));
        assert!(matches!(
            classify(&callback("1", false)),
            Err(Error::InvalidUpdate(_))
        ));
    }

    #[test]
    fn non_text_message_is_unknown() {
        let upd = update(json!({
            "update_id": 3,
            "message": {
                "message_id": 6,
                "date": 1700000000,
                "chat": chat(),
                "from": user(),
                "location": { "longitude": 37.6, "latitude": 55.7 }
            }
        }));
        let cmd = classify(&upd).unwrap();
        assert_eq!(cmd.kind(), CommandKind::Unknown);
        assert_eq!(cmd.context().chat_id, ChatId(10));
    }

    #[test]
    fn command_name_strips_bot_suffix_and_args() {
        assert_eq!(command_name("/help"), "/help");
        assert_eq!(command_name("/Help@bot extra words"), "/Help");
        assert_eq!(command_name("/"), "/");
    }
}
