use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

/// Per-chat slots are pruned once the map grows past this many chats.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Spacing between any two outbound calls.
    pub global_min_interval: Duration,
    /// Spacing between calls to the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40),
            per_chat_min_interval: Duration::from_millis(1050),
        }
    }
}

impl ThrottleConfig {
    pub fn with_global_interval(global_min_interval: Duration) -> Self {
        Self {
            global_min_interval,
            ..Self::default()
        }
    }
}

/// Next free send slot, globally and per chat.
#[derive(Debug)]
struct Slots {
    cfg: ThrottleConfig,
    global_next: Instant,
    chat_next: HashMap<ChatId, Instant>,
}

impl Slots {
    fn new(cfg: ThrottleConfig, now: Instant) -> Self {
        Self {
            cfg,
            global_next: now,
            chat_next: HashMap::new(),
        }
    }

    /// Book the earliest slot that satisfies both intervals; returns how long
    /// the caller must wait before sending.
    fn reserve_at(&mut self, chat: Option<ChatId>, now: Instant) -> Duration {
        let mut start = self.global_next.max(now);
        if let Some(chat) = chat {
            if let Some(next) = self.chat_next.get(&chat) {
                start = start.max(*next);
            }
            if self.chat_next.len() >= PRUNE_THRESHOLD {
                self.chat_next.retain(|_, next| *next > now);
            }
            self.chat_next
                .insert(chat, start + self.cfg.per_chat_min_interval);
        }
        self.global_next = start + self.cfg.global_min_interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that spaces outbound calls.
///
/// Broadcast fan-out goes through this so a long recipient list stays under the
/// platform's flood limits. It reduces 429s; it does not rule them out.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    slots: Mutex<Slots>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            slots: Mutex::new(Slots::new(cfg, Instant::now())),
        }
    }

    async fn wait_turn(&self, chat: Option<ChatId>) {
        let wait = self.slots.lock().await.reserve_at(chat, Instant::now());
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_html(chat_id, html).await
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.wait_turn(Some(msg.chat_id)).await;
        self.inner.edit_html(msg, html).await
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        file_ref: &str,
        caption_html: Option<&str>,
    ) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_photo(chat_id, file_ref, caption_html).await
    }

    async fn send_video(
        &self,
        chat_id: ChatId,
        file_ref: &str,
        caption_html: Option<&str>,
    ) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_video(chat_id, file_ref, caption_html).await
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner
            .send_inline_keyboard(chat_id, text, keyboard)
            .await
    }

    async fn edit_inline_keyboard(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<()> {
        self.wait_turn(Some(msg.chat_id)).await;
        self.inner.edit_inline_keyboard(msg, text, keyboard).await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        // Callback answers carry no chat.
        self.wait_turn(None).await;
        self.inner.answer_callback_query(callback_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::Error, testing::FakeMessenger};

    fn cfg(global_ms: u64, chat_ms: u64) -> ThrottleConfig {
        ThrottleConfig {
            global_min_interval: Duration::from_millis(global_ms),
            per_chat_min_interval: Duration::from_millis(chat_ms),
        }
    }

    #[test]
    fn different_chats_only_pay_the_global_interval() {
        let now = Instant::now();
        let mut slots = Slots::new(cfg(40, 1000), now);
        assert_eq!(slots.reserve_at(Some(ChatId(1)), now), Duration::ZERO);
        assert_eq!(
            slots.reserve_at(Some(ChatId(2)), now),
            Duration::from_millis(40)
        );
        assert_eq!(
            slots.reserve_at(Some(ChatId(3)), now),
            Duration::from_millis(80)
        );
    }

    #[test]
    fn same_chat_waits_for_its_own_interval() {
        let now = Instant::now();
        let mut slots = Slots::new(cfg(40, 1000), now);
        assert_eq!(slots.reserve_at(Some(ChatId(1)), now), Duration::ZERO);
        assert_eq!(
            slots.reserve_at(Some(ChatId(1)), now),
            Duration::from_millis(1000)
        );
        // The global slot moved past the per-chat wait.
        assert_eq!(slots.reserve_at(None, now), Duration::from_millis(1040));
    }

    #[test]
    fn zero_intervals_never_wait() {
        let now = Instant::now();
        let mut slots = Slots::new(cfg(0, 0), now);
        for i in 0..5 {
            assert_eq!(slots.reserve_at(Some(ChatId(i % 2)), now), Duration::ZERO);
        }
    }

    #[test]
    fn idle_chats_are_pruned() {
        let start = Instant::now();
        let mut slots = Slots::new(cfg(0, 10), start);
        for i in 0..PRUNE_THRESHOLD as i64 {
            slots.reserve_at(Some(ChatId(i)), start);
        }
        let later = start + Duration::from_secs(1);
        slots.reserve_at(Some(ChatId(-1)), later);
        assert_eq!(slots.chat_next.len(), 1);
    }

    #[tokio::test]
    async fn errors_pass_through_unchanged() {
        let fake = Arc::new(FakeMessenger::failing_for(&[7], &[]));
        let throttled = ThrottledMessenger::new(fake.clone(), cfg(0, 0));

        assert!(throttled.send_html(ChatId(1), "hi").await.is_ok());
        let err = throttled.send_html(ChatId(7), "hi").await.unwrap_err();
        assert!(matches!(err, Error::RecipientUnavailable(_)));
        assert_eq!(fake.attempts_to(7), 1);
    }
}
