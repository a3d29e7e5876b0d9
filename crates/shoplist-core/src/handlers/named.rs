use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    command::NamedCommand,
    handlers::Replier,
    localization::keys,
    mediator::Outcome,
    strategy::{CommandStrategy, ReservedCommands},
    Result,
};

pub const START_COMMAND: &str = "/start";
pub const HELP_COMMAND: &str = "/help";

/// Strategy that answers one fixed command with one localized text.
macro_rules! fixed_reply_strategy {
    ($(#[$meta:meta])* $name:ident, $token:expr, $key:expr) => {
        $(#[$meta])*
        pub struct $name {
            replier: Replier,
        }

        impl $name {
            pub fn new(replier: Replier) -> Self {
                Self { replier }
            }
        }

        #[async_trait]
        impl CommandStrategy for $name {
            fn name(&self) -> &'static str {
                $token
            }

            fn can_handle(&self, command: &NamedCommand) -> bool {
                command.name.eq_ignore_ascii_case($token)
            }

            async fn handle(
                &self,
                command: &NamedCommand,
                _cancel: &CancellationToken,
            ) -> Result<Outcome> {
                let ctx = &command.context;
                self.replier
                    .send_text(ctx.chat_id, &ctx.language_code, $key)
                    .await?;
                Ok(Outcome::Handled)
            }
        }
    };
}

fixed_reply_strategy!(
    /// Greeting for `/start`.
    StartStrategy,
    START_COMMAND,
    keys::START_COMMAND_RESPONSE
);

fixed_reply_strategy!(
    /// Usage hint for `/help`.
    HelpStrategy,
    HELP_COMMAND,
    keys::HELP_COMMAND_RESPONSE
);

/// Catch-all for command names that are not reserved by another strategy.
/// Register it last.
pub struct UnknownCommandStrategy {
    replier: Replier,
    reserved: ReservedCommands,
}

impl UnknownCommandStrategy {
    pub fn new(replier: Replier, reserved: ReservedCommands) -> Self {
        Self { replier, reserved }
    }
}

#[async_trait]
impl CommandStrategy for UnknownCommandStrategy {
    fn name(&self) -> &'static str {
        "unknown-command"
    }

    fn can_handle(&self, command: &NamedCommand) -> bool {
        !self.reserved.contains(&command.name)
    }

    async fn handle(&self, command: &NamedCommand, _cancel: &CancellationToken) -> Result<Outcome> {
        let ctx = &command.context;
        info!(command = %command.name, chat_id = ctx.chat_id.0, "unknown command");
        self.replier
            .send_text(ctx.chat_id, &ctx.language_code, keys::UNKNOWN_COMMAND_RESPONSE)
            .await?;
        Ok(Outcome::Handled)
    }
}
