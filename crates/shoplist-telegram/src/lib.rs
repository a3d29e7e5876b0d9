//! Telegram adapter (teloxide).
//!
//! This crate implements the `shoplist-core` MessagingPort over Telegram Bot
//! API and turns incoming updates into core commands.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode};

use tokio::time::sleep;

pub mod keyboard;
pub mod router;
pub mod update;

use shoplist_core::{
    domain::{ChatId, Message, MessageId, MessageRef},
    errors::Error,
    messaging::port::MessagingPort,
    Result,
};

use crate::keyboard::render_keyboard;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Bot API client for `token`.
pub fn connect(token: &str) -> Bot {
    Bot::new(token)
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_message(&self, chat_id: ChatId, message: &Message) -> Result<MessageId> {
        let html = escape_html(&message.text);
        let markup = (!message.buttons.is_empty()).then(|| render_keyboard(&message.buttons));

        let sent = self
            .with_retry(|| {
                let req = self
                    .bot
                    .send_message(Self::tg_chat(chat_id), html.clone())
                    .parse_mode(ParseMode::Html);
                match &markup {
                    Some(m) => req.reply_markup(m.clone()),
                    None => req,
                }
            })
            .await?;

        Ok(MessageId(sent.id.0))
    }

    async fn edit_message(&self, target: MessageRef, message: &Message) -> Result<()> {
        let html = escape_html(&message.text);
        let markup = render_keyboard(&message.buttons);

        self.with_retry(|| {
            self.bot
                .edit_message_text(
                    Self::tg_chat(target.chat_id),
                    Self::tg_msg_id(target.message_id),
                    html.clone(),
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(markup.clone())
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html("<b>milk & \"bread\"</b>"),
            "&lt;b&gt;milk &amp; &quot;bread&quot;&lt;/b&gt;"
        );
        assert_eq!(escape_html("молоко"), "молоко");
    }
}
