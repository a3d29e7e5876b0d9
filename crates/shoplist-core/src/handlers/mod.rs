//! Built-in handlers and strategies, plus the registry wiring that binds them
//! to command variants.

use std::sync::Arc;

use crate::{
    command::{ButtonPressCommand, NamedCommand, TextMessageCommand, UnknownCommand},
    domain::{ChatId, Message},
    inference::InferenceGate,
    localization::Localization,
    mediator::HandlerRegistry,
    messaging::port::MessagingPort,
    strategy::{ReservedCommands, StrategyChain},
    Result,
};

pub mod button;
pub mod named;
pub mod text;
pub mod unknown;

pub use button::ButtonPressHandler;
pub use named::{HelpStrategy, StartStrategy, UnknownCommandStrategy};
pub use text::TextMessageHandler;
pub use unknown::UnknownUpdateHandler;

/// Outbound side shared by handlers that reply with localized text.
#[derive(Clone)]
pub struct Replier {
    messenger: Arc<dyn MessagingPort>,
    localization: Arc<Localization>,
}

impl Replier {
    pub fn new(messenger: Arc<dyn MessagingPort>, localization: Arc<Localization>) -> Self {
        Self {
            messenger,
            localization,
        }
    }

    pub fn translate(&self, language: &str, key: &str) -> String {
        self.localization.translate(language, key)
    }

    pub async fn send(&self, chat_id: ChatId, message: &Message) -> Result<()> {
        self.messenger.send_message(chat_id, message).await?;
        Ok(())
    }

    pub async fn send_text(&self, chat_id: ChatId, language: &str, key: &str) -> Result<()> {
        self.send(chat_id, &Message::text(self.translate(language, key)))
            .await
    }

    pub fn messenger(&self) -> &Arc<dyn MessagingPort> {
        &self.messenger
    }
}

/// Register the bot's handlers for every command variant.
///
/// Named commands go through `/start`, `/help`, then the catch-all for
/// non-reserved names.
pub fn default_registry(
    gate: Arc<InferenceGate>,
    replier: Replier,
    reserved: ReservedCommands,
) -> Result<HandlerRegistry> {
    let chain = StrategyChain::new()
        .with(Arc::new(StartStrategy::new(replier.clone())))
        .with(Arc::new(HelpStrategy::new(replier.clone())))
        .with(Arc::new(UnknownCommandStrategy::new(
            replier.clone(),
            reserved,
        )));

    let registry = HandlerRegistry::new()
        .with::<NamedCommand, _>(Arc::new(chain))?
        .with::<TextMessageCommand, _>(Arc::new(TextMessageHandler::new(gate, replier.clone())))?
        .with::<ButtonPressCommand, _>(Arc::new(ButtonPressHandler::new(
            replier.messenger().clone(),
        )))?
        .with::<UnknownCommand, _>(Arc::new(UnknownUpdateHandler))?;
    registry.ensure_complete()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::domain::{Button, CheckState, MessageId, MessageRef};
    use crate::inference::{PromptTemplate, SamplingConfig};
    use crate::localization::keys;
    use crate::mediator::{Mediator, Outcome};
    use crate::test_support::{context, RecordingMessenger, ScriptedEngine, Sent};
    use tokio_util::sync::CancellationToken;

    fn mediator(engine: ScriptedEngine) -> (Mediator, Arc<RecordingMessenger>, Arc<Localization>) {
        let messenger = Arc::new(RecordingMessenger::default());
        let localization = Arc::new(Localization::builtin().unwrap());
        let gate = Arc::new(InferenceGate::new(
            Box::new(engine),
            PromptTemplate::builtin().unwrap(),
            SamplingConfig::default(),
        ));
        let replier = Replier::new(messenger.clone(), localization.clone());
        let registry =
            default_registry(gate, replier, ReservedCommands::new(["/help", "/start"])).unwrap();
        (Mediator::new(registry), messenger, localization)
    }

    #[tokio::test]
    async fn text_message_becomes_checklist_and_toggles() {
        let (mediator, messenger, loc) =
            mediator(ScriptedEngine::replying(r#"["milk", "eggs", "bread", "milk"]"#));
        let cancel = CancellationToken::new();

        let outcome = mediator
            .send(
                Command::TextMessage(TextMessageCommand {
                    context: context("en"),
                    text: "Milk, eggs and bread".to_string(),
                }),
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Handled);

        let sent = messenger.sent();
        let Sent::Send(chat, list) = &sent[0] else {
            panic!("expected a new message, got {sent:?}");
        };
        assert_eq!(*chat, ChatId(10));
        assert_eq!(list.text, loc.translate("en", keys::SHOP_LIST_HEADER));
        let labels: Vec<_> = list.buttons.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(labels, ["bread", "eggs", "milk"]);

        let outcome = mediator
            .send(
                Command::ButtonPress(ButtonPressCommand {
                    context: context("en"),
                    button_id: 2,
                    original_message: list.clone(),
                }),
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Handled);

        let sent = messenger.sent();
        let Sent::Edit(target, edited) = &sent[1] else {
            panic!("expected an edit, got {sent:?}");
        };
        assert_eq!(
            *target,
            MessageRef {
                chat_id: ChatId(10),
                message_id: MessageId(5)
            }
        );
        assert_eq!(edited.buttons[1], Button::new(2, "eggs", CheckState::Checked));
        assert_eq!(edited.buttons[0].check, CheckState::Unchecked);
    }

    #[tokio::test]
    async fn named_commands_reply_in_user_language() {
        let (mediator, messenger, loc) = mediator(ScriptedEngine::replying("[]"));
        let cancel = CancellationToken::new();

        for (name, key) in [
            ("/start", keys::START_COMMAND_RESPONSE),
            ("/HELP", keys::HELP_COMMAND_RESPONSE),
            ("/weather", keys::UNKNOWN_COMMAND_RESPONSE),
        ] {
            let outcome = mediator
                .send(
                    Command::Named(NamedCommand {
                        context: context("ru"),
                        name: name.to_string(),
                    }),
                    &cancel,
                )
                .await
                .unwrap();
            assert_eq!(outcome, Outcome::Handled, "{name}");
            let last = messenger.sent().pop().unwrap();
            assert_eq!(
                last,
                Sent::Send(ChatId(10), Message::text(loc.translate("ru", key)))
            );
        }
    }

    #[tokio::test]
    async fn unknown_update_is_ignored_silently() {
        let (mediator, messenger, _) = mediator(ScriptedEngine::replying("[]"));
        let outcome = mediator
            .send(
                Command::Unknown(UnknownCommand {
                    context: context("en"),
                }),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn bindings_resolve_on_first_send() {
        use crate::command::CommandKind;

        let (mediator, _, _) = mediator(ScriptedEngine::replying("[]"));
        for kind in CommandKind::ALL {
            assert!(!mediator.is_resolved(kind));
        }

        mediator
            .send(
                Command::Named(NamedCommand {
                    context: context("en"),
                    name: "/start".to_string(),
                }),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        for kind in CommandKind::ALL {
            assert_eq!(mediator.is_resolved(kind), kind == CommandKind::Named, "{kind}");
        }
    }
}
