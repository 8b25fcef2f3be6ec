use std::sync::Arc;

use chrono::{Local, Utc};

use crate::{
    conversation::{ConversationState, Conversations},
    domain::{ChatId, FeedbackType, UserId, UserProfile},
    errors::Error,
    formatting,
    messaging::port::MessagingPort,
    store::Store,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Saved {
        feedback_id: i64,
        notified: usize,
        notify_failed: usize,
    },
    /// The item could not be persisted; the user was told, admins were not.
    NotSaved,
}

/// Collects one free-text message per feedback session and forwards it to
/// the configured admins.
pub struct FeedbackPipeline {
    store: Arc<dyn Store>,
    conversations: Arc<Conversations>,
    messenger: Arc<dyn MessagingPort>,
    admin_ids: Vec<i64>,
}

impl FeedbackPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        conversations: Arc<Conversations>,
        messenger: Arc<dyn MessagingPort>,
        admin_ids: Vec<i64>,
    ) -> Self {
        Self {
            store,
            conversations,
            messenger,
            admin_ids,
        }
    }

    /// Start waiting for the user's next message. Replaces any prior state.
    pub async fn begin(&self, user: UserId, feedback_type: FeedbackType) {
        self.conversations
            .set(user, ConversationState::AwaitingFeedback { feedback_type })
            .await;
        tracing::debug!(user_id = user.0, %feedback_type, "awaiting feedback");
    }

    /// Consume `text` as the body of the pending feedback.
    ///
    /// Returns `InvalidState` (and leaves state alone) when the user is not
    /// in a feedback session. Otherwise the state ends up `Idle` on every path.
    pub async fn submit(&self, profile: &UserProfile, text: &str) -> Result<FeedbackOutcome> {
        let user = profile.user_id();
        let feedback_type = match self.conversations.get(user).await {
            ConversationState::AwaitingFeedback { feedback_type } => feedback_type,
            _ => {
                return Err(Error::InvalidState(
                    "no feedback session in progress".to_string(),
                ))
            }
        };
        self.conversations.clear(user).await;

        let chat = ChatId::from(user);
        let feedback_id = match self
            .store
            .add_feedback(user, feedback_type.as_str(), text, Utc::now())
            .await
        {
            Ok(id) if id != 0 => id,
            Ok(_) => {
                tracing::error!(user_id = user.0, "feedback insert returned no id");
                self.notify_user(chat, formatting::FEEDBACK_SAVE_FAILED).await;
                return Ok(FeedbackOutcome::NotSaved);
            }
            Err(e) => {
                tracing::error!(user_id = user.0, kind = e.kind(), error = %e, "feedback not saved");
                self.notify_user(chat, formatting::FEEDBACK_SAVE_FAILED).await;
                return Ok(FeedbackOutcome::NotSaved);
            }
        };

        tracing::info!(user_id = user.0, feedback_id, %feedback_type, "feedback received");
        self.notify_user(chat, formatting::FEEDBACK_RECEIVED).await;

        let note = formatting::feedback_notification(
            profile,
            feedback_type,
            Local::now(),
            text,
            self.messenger.capabilities().max_message_len,
        );
        let mut notified = 0;
        let mut notify_failed = 0;
        for admin in &self.admin_ids {
            match self.messenger.send_html(ChatId(*admin), &note).await {
                Ok(_) => notified += 1,
                Err(e) => {
                    notify_failed += 1;
                    tracing::warn!(admin_id = *admin, kind = e.kind(), error = %e, "admin notification failed");
                }
            }
        }

        Ok(FeedbackOutcome::Saved {
            feedback_id,
            notified,
            notify_failed,
        })
    }

    /// Leave the feedback session without saving; returns whether there was one.
    pub async fn cancel(&self, user: UserId) -> bool {
        if matches!(
            self.conversations.get(user).await,
            ConversationState::AwaitingFeedback { .. }
        ) {
            self.conversations.clear(user).await;
            true
        } else {
            false
        }
    }

    async fn notify_user(&self, chat: ChatId, html: &str) {
        if let Err(e) = self.messenger.send_html(chat, html).await {
            tracing::warn!(chat_id = chat.0, kind = e.kind(), error = %e, "feedback reply failed");
        }
    }
}
