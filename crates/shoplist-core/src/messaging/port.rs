use async_trait::async_trait;

use crate::{
    domain::{ChatId, Message, MessageId, MessageRef},
    Result,
};

/// Outbound side of the chat gateway.
///
/// Implementations render `Message::buttons` as an inline keyboard, one button
/// per row, labelled with [`crate::domain::Button::label`].
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Send a new message and return the id the gateway assigned to it.
    async fn send_message(&self, chat_id: ChatId, message: &Message) -> Result<MessageId>;

    /// Replace text and keyboard of a message sent earlier.
    async fn edit_message(&self, target: MessageRef, message: &Message) -> Result<()>;
}
