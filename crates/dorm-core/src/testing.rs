//! Test doubles shared by the core unit tests.

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

const MAX_MESSAGE_LEN: usize = 4096;
const MAX_CAPTION_LEN: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Sent {
    Html(ChatId, String),
    Photo(ChatId, String, Option<String>),
    Video(ChatId, String, Option<String>),
    Keyboard(ChatId, String, InlineKeyboard),
}

impl Sent {
    pub(crate) fn chat(&self) -> ChatId {
        match self {
            Sent::Html(c, _) | Sent::Photo(c, _, _) | Sent::Video(c, _, _) => *c,
            Sent::Keyboard(c, _, _) => *c,
        }
    }

    pub(crate) fn text(&self) -> &str {
        match self {
            Sent::Html(_, t) | Sent::Keyboard(_, t, _) => t,
            Sent::Photo(_, _, c) | Sent::Video(_, _, c) => c.as_deref().unwrap_or(""),
        }
    }
}

/// Records every successful send; chats in `unreachable` fail with
/// `RecipientUnavailable`, chats in `broken` with a transport error.
#[derive(Default)]
pub(crate) struct FakeMessenger {
    next_id: Mutex<i32>,
    sent: Mutex<Vec<Sent>>,
    attempts: Mutex<Vec<ChatId>>,
    unreachable: HashSet<i64>,
    broken: HashSet<i64>,
}

impl FakeMessenger {
    pub(crate) fn failing_for(unreachable: &[i64], broken: &[i64]) -> Self {
        Self {
            unreachable: unreachable.iter().copied().collect(),
            broken: broken.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_to(&self, chat: i64) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.chat() == ChatId(chat))
            .collect()
    }

    pub(crate) fn attempts_to(&self, chat: i64) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == ChatId(chat))
            .count()
    }

    fn deliver(&self, chat_id: ChatId, record: Sent) -> Result<MessageRef> {
        self.attempts.lock().unwrap().push(chat_id);
        if self.unreachable.contains(&chat_id.0) {
            return Err(Error::RecipientUnavailable(format!("chat {}", chat_id.0)));
        }
        if self.broken.contains(&chat_id.0) {
            return Err(Error::External("network down".to_string()));
        }
        let limit = match record {
            Sent::Html(..) | Sent::Keyboard(..) => MAX_MESSAGE_LEN,
            Sent::Photo(..) | Sent::Video(..) => MAX_CAPTION_LEN,
        };
        if record.text().chars().count() > limit {
            return Err(Error::External("message is too long".to_string()));
        }
        self.sent.lock().unwrap().push(record);

        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        })
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: MAX_MESSAGE_LEN,
            max_caption_len: MAX_CAPTION_LEN,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.deliver(chat_id, Sent::Html(chat_id, html.to_string()))
    }

    async fn edit_html(&self, _msg: MessageRef, _html: &str) -> Result<()> {
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        file_ref: &str,
        caption_html: Option<&str>,
    ) -> Result<MessageRef> {
        self.deliver(
            chat_id,
            Sent::Photo(chat_id, file_ref.to_string(), caption_html.map(str::to_string)),
        )
    }

    async fn send_video(
        &self,
        chat_id: ChatId,
        file_ref: &str,
        caption_html: Option<&str>,
    ) -> Result<MessageRef> {
        self.deliver(
            chat_id,
            Sent::Video(chat_id, file_ref.to_string(), caption_html.map(str::to_string)),
        )
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.deliver(chat_id, Sent::Keyboard(chat_id, text.to_string(), keyboard))
    }

    async fn edit_inline_keyboard(
        &self,
        _msg: MessageRef,
        _text: &str,
        _keyboard: InlineKeyboard,
    ) -> Result<()> {
        Ok(())
    }

    async fn answer_callback_query(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
        Ok(())
    }
}
