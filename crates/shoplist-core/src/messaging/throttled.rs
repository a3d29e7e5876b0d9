use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, Message, MessageId, MessageRef},
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Telegram API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat (Telegram 1 msg/sec style limits).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return how long to wait before using it.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = self.next.max(now);
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that spaces out outbound calls.
///
/// Checkbox toggling produces bursts of edits on one message; this keeps them
/// under Telegram's per-chat limits instead of relying on 429 retries.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter for `chat_id`. Creating one drops limiters whose slot has already
    /// passed, since they behave like fresh ones.
    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        if let Some(lim) = map.get(&chat_id) {
            return lim.clone();
        }

        let now = Instant::now();
        map.retain(|_, lim| lim.try_lock().map_or(true, |l| l.next > now));

        let lim = Arc::new(Mutex::new(IntervalLimiter::new(
            self.cfg.per_chat_min_interval,
        )));
        map.insert(chat_id, lim.clone());
        lim
    }

    async fn throttle_chat(&self, chat_id: ChatId) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id.0).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    async fn send_message(&self, chat_id: ChatId, message: &Message) -> Result<MessageId> {
        self.throttle_chat(chat_id).await;
        self.inner.send_message(chat_id, message).await
    }

    async fn edit_message(&self, target: MessageRef, message: &Message) -> Result<()> {
        self.throttle_chat(target.chat_id).await;
        self.inner.edit_message(target, message).await
    }
}
