use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

use crate::{broadcast::BroadcastPayload, domain::FeedbackType, domain::UserId};

/// Where a user currently is in a multi-step flow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingFeedback {
        feedback_type: FeedbackType,
    },
    ComposingBroadcast,
    AwaitingBroadcastConfirm {
        payload: BroadcastPayload,
    },
}

#[derive(Debug)]
struct Entry {
    state: ConversationState,
    updated: Instant,
}

/// Per-user conversation states.
///
/// `Idle` is never stored. A non-idle state older than the timeout reads as
/// `Idle` and is dropped on access.
pub struct Conversations {
    timeout: Option<Duration>,
    states: Mutex<HashMap<UserId, Entry>>,
}

impl Conversations {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, user: UserId) -> ConversationState {
        self.get_at(user, Instant::now()).await
    }

    pub async fn get_at(&self, user: UserId, now: Instant) -> ConversationState {
        let mut states = self.states.lock().await;
        match states.get(&user) {
            Some(entry) if self.expired(entry, now) => {
                states.remove(&user);
                tracing::debug!(user_id = user.0, "conversation state expired");
                ConversationState::Idle
            }
            Some(entry) => entry.state.clone(),
            None => ConversationState::Idle,
        }
    }

    pub async fn set(&self, user: UserId, state: ConversationState) {
        self.set_at(user, state, Instant::now()).await;
    }

    pub async fn set_at(&self, user: UserId, state: ConversationState, now: Instant) {
        let mut states = self.states.lock().await;
        if state == ConversationState::Idle {
            states.remove(&user);
        } else {
            states.insert(
                user,
                Entry {
                    state,
                    updated: now,
                },
            );
        }
    }

    pub async fn clear(&self, user: UserId) {
        self.states.lock().await.remove(&user);
    }

    /// Remove and return the current state (expired entries come back as `Idle`).
    pub async fn take(&self, user: UserId) -> ConversationState {
        let now = Instant::now();
        match self.states.lock().await.remove(&user) {
            Some(entry) if !self.expired(&entry, now) => entry.state,
            _ => ConversationState::Idle,
        }
    }

    /// Drop every expired entry; returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut states = self.states.lock().await;
        let before = states.len();
        states.retain(|_, e| !self.expired(e, now));
        before - states.len()
    }

    fn expired(&self, entry: &Entry, now: Instant) -> bool {
        self.timeout
            .is_some_and(|t| now.saturating_duration_since(entry.updated) >= t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn states_are_per_user() {
        let conv = Conversations::new(None);
        conv.set(UserId(1), ConversationState::ComposingBroadcast)
            .await;

        assert_eq!(
            conv.get(UserId(1)).await,
            ConversationState::ComposingBroadcast
        );
        assert_eq!(conv.get(UserId(2)).await, ConversationState::Idle);

        conv.clear(UserId(1)).await;
        assert_eq!(conv.get(UserId(1)).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn take_removes() {
        let conv = Conversations::new(None);
        let awaiting = ConversationState::AwaitingFeedback {
            feedback_type: FeedbackType::Bug,
        };
        conv.set(UserId(1), awaiting.clone()).await;

        assert_eq!(conv.take(UserId(1)).await, awaiting);
        assert_eq!(conv.take(UserId(1)).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn stale_states_expire() {
        let conv = Conversations::new(Some(Duration::from_secs(60)));
        let t0 = Instant::now();
        conv.set_at(UserId(1), ConversationState::ComposingBroadcast, t0)
            .await;

        assert_eq!(
            conv.get_at(UserId(1), t0 + Duration::from_secs(59)).await,
            ConversationState::ComposingBroadcast
        );
        assert_eq!(
            conv.get_at(UserId(1), t0 + Duration::from_secs(60)).await,
            ConversationState::Idle
        );
        // Gone for good, even when asked with an earlier clock.
        assert_eq!(conv.get_at(UserId(1), t0).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn no_timeout_keeps_states() {
        let conv = Conversations::new(None);
        let t0 = Instant::now();
        conv.set_at(UserId(1), ConversationState::ComposingBroadcast, t0)
            .await;
        assert_eq!(
            conv.get_at(UserId(1), t0 + Duration::from_secs(86_400)).await,
            ConversationState::ComposingBroadcast
        );
        assert_eq!(conv.sweep().await, 0);
    }
}
