use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    conversation::{ConversationState, Conversations},
    directory::UserDirectory,
    domain::{ChatId, UserId},
    errors::{Error, LogDefault},
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    store::{NewBroadcast, Store},
    Result,
};

/// What an administrator asked to send: text, or one photo/video with an
/// optional caption. Text and captions are sent as HTML, verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BroadcastPayload {
    Text {
        html: String,
    },
    Photo {
        file_ref: String,
        caption: Option<String>,
    },
    Video {
        file_ref: String,
        caption: Option<String>,
    },
}

impl BroadcastPayload {
    /// Text or caption, if the payload carries any.
    pub fn text(&self) -> Option<&str> {
        let text = match self {
            BroadcastPayload::Text { html } => Some(html.as_str()),
            BroadcastPayload::Photo { caption, .. } | BroadcastPayload::Video { caption, .. } => {
                caption.as_deref()
            }
        };
        text.filter(|t| !t.trim().is_empty())
    }

    /// Body stored with the broadcast record.
    pub fn record_body(&self) -> String {
        self.text().unwrap_or("[media]").to_string()
    }

    /// Rejects text or captions the messenger would refuse for every recipient.
    /// The admin stays in composition and may send a shorter version.
    fn check_len(&self, caps: MessagingCapabilities) -> Result<()> {
        let (len, limit) = match self {
            BroadcastPayload::Text { html } => (html.chars().count(), caps.max_message_len),
            BroadcastPayload::Photo { caption, .. } | BroadcastPayload::Video { caption, .. } => (
                caption.as_deref().map_or(0, |c| c.chars().count()),
                caps.max_caption_len,
            ),
        };
        if len > limit {
            return Err(Error::InvalidState(format!(
                "message is too long ({len} characters, limit {limit})"
            )));
        }
        Ok(())
    }

    async fn deliver(&self, messenger: &dyn MessagingPort, chat_id: ChatId) -> Result<()> {
        match self {
            BroadcastPayload::Text { html } => {
                messenger.send_html(chat_id, html).await?;
            }
            BroadcastPayload::Photo { file_ref, caption } => {
                messenger
                    .send_photo(chat_id, file_ref, caption.as_deref())
                    .await?;
            }
            BroadcastPayload::Video { file_ref, caption } => {
                messenger
                    .send_video(chat_id, file_ref, caption.as_deref())
                    .await?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastSummary {
    /// `None` when the record could not be written.
    pub record_id: Option<i64>,
    pub sent: i64,
    pub failed: i64,
    /// Recipients deactivated because they can no longer be reached.
    pub deactivated: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BroadcastSummary {
    pub fn attempted(&self) -> i64 {
        self.sent + self.failed
    }
}

/// Admin-authored fan-out to every active user.
///
/// Flow per admin: `begin` -> `capture` -> `confirm` (or `cancel` at any step).
/// Delivery is sequential; a failed recipient is counted and skipped, never
/// retried within the same pass.
pub struct BroadcastEngine {
    store: Arc<dyn Store>,
    directory: Arc<UserDirectory>,
    conversations: Arc<Conversations>,
    messenger: Arc<dyn MessagingPort>,
}

impl BroadcastEngine {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<UserDirectory>,
        conversations: Arc<Conversations>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            store,
            directory,
            conversations,
            messenger,
        }
    }

    async fn require_admin(&self, admin: UserId) -> Result<()> {
        if self.directory.is_admin(admin).await {
            Ok(())
        } else {
            tracing::warn!(user_id = admin.0, "broadcast denied: not an admin");
            Err(Error::Unauthorized(format!("user {admin} is not an admin")))
        }
    }

    /// Enter composition. Non-admins get `Unauthorized` and no state change.
    pub async fn begin(&self, admin: UserId) -> Result<()> {
        self.require_admin(admin).await?;
        self.conversations
            .set(admin, ConversationState::ComposingBroadcast)
            .await;
        tracing::info!(admin_id = admin.0, "broadcast composition started");
        Ok(())
    }

    /// Store the payload and return the current recipient count for the preview.
    /// The count may be stale by the time `confirm` runs.
    pub async fn capture(&self, admin: UserId, payload: BroadcastPayload) -> Result<i64> {
        if self.conversations.get(admin).await != ConversationState::ComposingBroadcast {
            return Err(Error::InvalidState(
                "no broadcast is being composed".to_string(),
            ));
        }
        if let Err(e) = self.require_admin(admin).await {
            self.conversations.clear(admin).await;
            return Err(e);
        }
        payload.check_len(self.messenger.capabilities())?;

        let recipients = self
            .store
            .count_active_users()
            .await
            .or_log_default("count_active_users");

        self.conversations
            .set(admin, ConversationState::AwaitingBroadcastConfirm { payload })
            .await;
        Ok(recipients)
    }

    /// Send the captured payload to every active user and record the outcome.
    ///
    /// The admin's state is back to `Idle` whatever happens here.
    pub async fn confirm(&self, admin: UserId) -> Result<BroadcastSummary> {
        self.require_admin(admin).await?;

        let payload = match self.conversations.take(admin).await {
            ConversationState::AwaitingBroadcastConfirm { payload } => payload,
            other => {
                tracing::warn!(admin_id = admin.0, state = ?other, "broadcast confirm without payload");
                return Err(Error::InvalidState(
                    "no broadcast payload to send".to_string(),
                ));
            }
        };

        let started_at = Utc::now();
        let recipients = self.store.active_user_ids().await?;
        tracing::info!(
            admin_id = admin.0,
            recipients = recipients.len(),
            "broadcast started"
        );

        let mut sent = 0i64;
        let mut failed = 0i64;
        let mut unreachable = Vec::new();
        for recipient in recipients {
            match payload
                .deliver(self.messenger.as_ref(), ChatId::from(recipient))
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(recipient = recipient.0, kind = e.kind(), error = %e, "broadcast delivery failed");
                    if matches!(e, Error::RecipientUnavailable(_)) {
                        unreachable.push(recipient);
                    }
                }
            }
        }

        let mut deactivated = 0;
        for user in unreachable {
            match self.store.set_user_active(user, false).await {
                Ok(()) => deactivated += 1,
                Err(e) => {
                    tracing::warn!(user_id = user.0, kind = e.kind(), error = %e, "deactivation failed")
                }
            }
        }

        let completed_at = Utc::now();
        let record = NewBroadcast {
            admin_id: admin,
            message: payload.record_body(),
            sent_count: sent,
            failed_count: failed,
            created_at: started_at,
            completed_at: Some(completed_at),
        };
        let record_id = match self.store.record_broadcast(&record).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(admin_id = admin.0, kind = e.kind(), error = %e, "broadcast record not saved");
                None
            }
        };

        tracing::info!(
            admin_id = admin.0,
            sent,
            failed,
            deactivated,
            "broadcast finished"
        );
        Ok(BroadcastSummary {
            record_id,
            sent,
            failed,
            deactivated,
            started_at,
            completed_at,
        })
    }

    /// Drop any pending broadcast; returns whether there was one.
    pub async fn cancel(&self, admin: UserId) -> bool {
        match self.conversations.get(admin).await {
            ConversationState::ComposingBroadcast
            | ConversationState::AwaitingBroadcastConfirm { .. } => {
                self.conversations.clear(admin).await;
                tracing::info!(admin_id = admin.0, "broadcast cancelled");
                true
            }
            _ => false,
        }
    }
}
