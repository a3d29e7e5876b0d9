use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    command::UnknownCommand,
    mediator::{Handler, Outcome},
    Result,
};

/// Updates the bot has no behaviour for (stickers, joins, edits, ...).
pub struct UnknownUpdateHandler;

#[async_trait]
impl Handler<UnknownCommand> for UnknownUpdateHandler {
    async fn handle(&self, command: UnknownCommand, _cancel: &CancellationToken) -> Result<Outcome> {
        warn!(
            chat_id = command.context.chat_id.0,
            user_id = %command.context.user_id,
            "ignoring unsupported update"
        );
        Ok(Outcome::Ignored)
    }
}
