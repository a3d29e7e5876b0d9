use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    command::ButtonPressCommand,
    domain::MessageRef,
    mediator::{Handler, Outcome},
    messaging::port::MessagingPort,
    Result,
};

/// Flips the checkbox of the pressed button and edits the message in place.
pub struct ButtonPressHandler {
    messenger: Arc<dyn MessagingPort>,
}

impl ButtonPressHandler {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self { messenger }
    }
}

#[async_trait]
impl Handler<ButtonPressCommand> for ButtonPressHandler {
    async fn handle(
        &self,
        command: ButtonPressCommand,
        _cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let ButtonPressCommand {
            context,
            button_id,
            original_message,
        } = command;

        let Some(updated) = original_message.toggle(button_id) else {
            warn!(
                chat_id = context.chat_id.0,
                message_id = context.message_id.0,
                button_id,
                "pressed button not found on message"
            );
            return Ok(Outcome::TargetNotFound);
        };

        debug!(chat_id = context.chat_id.0, button_id, "toggling item");
        let target = MessageRef {
            chat_id: context.chat_id,
            message_id: context.message_id,
        };
        self.messenger.edit_message(target, &updated).await?;
        Ok(Outcome::Handled)
    }
}
