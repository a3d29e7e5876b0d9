use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    command::TextMessageCommand,
    domain::Message,
    errors::Error,
    handlers::Replier,
    inference::InferenceGate,
    localization::keys,
    mediator::{Handler, Outcome},
    Result,
};

/// Turns free text into a checklist message.
pub struct TextMessageHandler {
    gate: Arc<InferenceGate>,
    replier: Replier,
}

impl TextMessageHandler {
    pub fn new(gate: Arc<InferenceGate>, replier: Replier) -> Self {
        Self { gate, replier }
    }
}

#[async_trait]
impl Handler<TextMessageCommand> for TextMessageHandler {
    async fn handle(
        &self,
        command: TextMessageCommand,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let ctx = &command.context;
        let lang = ctx.language_code.as_str();

        let items = match self.gate.parse(&command.text, cancel).await {
            Ok(items) => items,
            Err(e @ Error::ParseFailed(_)) => {
                warn!(chat_id = ctx.chat_id.0, error = %e, "could not build a list");
                self.replier
                    .send_text(ctx.chat_id, lang, keys::PARSE_FAILED)
                    .await?;
                return Ok(Outcome::Handled);
            }
            Err(e) => return Err(e),
        };

        info!(chat_id = ctx.chat_id.0, items = items.len(), "replying with list");
        if items.is_empty() {
            self.replier
                .send_text(ctx.chat_id, lang, keys::NO_ITEMS_IN_LIST)
                .await?;
        } else {
            let header = self.replier.translate(lang, keys::SHOP_LIST_HEADER);
            self.replier
                .send(ctx.chat_id, &Message::checklist(header, &items))
                .await?;
        }
        Ok(Outcome::Handled)
    }
}
