//! Fakes shared by handler and wiring tests.

use std::sync::{
    atomic::{AtomicI32, AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::{
    command::CommandContext,
    domain::{ChatId, Message, MessageId, MessageRef},
    errors::Error,
    inference::{InferenceEngine, SamplingConfig, TokenStream},
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Sent {
    Send(ChatId, Message),
    Edit(MessageRef, Message),
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<Sent>>,
    next_id: AtomicI32,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    async fn send_message(&self, chat_id: ChatId, message: &Message) -> Result<MessageId> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Send(chat_id, message.clone()));
        Ok(MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 100))
    }

    async fn edit_message(&self, target: MessageRef, message: &Message) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Edit(target, message.clone()));
        Ok(())
    }
}

/// Engine that answers every prompt with the same output (or error).
pub struct ScriptedEngine {
    reply: std::result::Result<&'static str, &'static str>,
    pub calls: std::sync::Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn replying(output: &'static str) -> Self {
        Self {
            reply: Ok(output),
            calls: Default::default(),
        }
    }

    pub fn failing(reason: &'static str) -> Self {
        Self {
            reply: Err(reason),
            calls: Default::default(),
        }
    }
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    async fn generate(
        &mut self,
        _prompt: &str,
        _sampling: &SamplingConfig,
        _cancel: CancellationToken,
    ) -> Result<TokenStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Ok(output) => {
                let fragments: Vec<Result<String>> =
                    output.split_inclusive(',').map(|f| Ok(f.to_string())).collect();
                Ok(stream::iter(fragments).boxed())
            }
            Err(reason) => Err(Error::External(reason.to_string())),
        }
    }

    async fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn context(language: &str) -> CommandContext {
    CommandContext {
        chat_id: ChatId(10),
        user_id: "77".to_string(),
        language_code: language.to_string(),
        message_id: MessageId(5),
    }
}
