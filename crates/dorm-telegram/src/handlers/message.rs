use teloxide::types::Message;

use dorm_core::{
    broadcast::BroadcastPayload,
    conversation::ConversationState,
    domain::{ChatId, UserProfile},
    errors::Error,
    feedback::FeedbackOutcome,
    formatting::{self, escape_html, NO_PERMISSION},
};

use crate::{menu, router::AppState};

use super::{reply, reply_with_keyboard};

/// Non-command messages, interpreted by the sender's conversation state.
pub async fn handle_message(
    msg: &Message,
    profile: &UserProfile,
    state: &AppState,
) -> anyhow::Result<()> {
    let chat = ChatId(msg.chat.id.0);
    route_message(chat, msg.text(), payload_of(msg), profile, state).await
}

/// `payload` is what the message would broadcast, if anything.
pub(crate) async fn route_message(
    chat: ChatId,
    text: Option<&str>,
    payload: Option<BroadcastPayload>,
    profile: &UserProfile,
    state: &AppState,
) -> anyhow::Result<()> {
    let user = profile.user_id();

    match state.conversations.get(user).await {
        ConversationState::AwaitingFeedback { .. } => {
            let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
                reply(
                    state,
                    chat,
                    "Please describe your feedback in a text message, or send /cancel.",
                )
                .await;
                return Ok(());
            };
            if let FeedbackOutcome::Saved { feedback_id, .. } =
                state.feedback.submit(profile, text).await?
            {
                tracing::info!(user_id = user.0, feedback_id, "feedback received");
            }
            reply_with_keyboard(
                state,
                chat,
                menu::MAIN_MENU_TEXT,
                menu::main_menu_keyboard(),
            )
            .await;
        }
        ConversationState::ComposingBroadcast => {
            let Some(payload) = payload else {
                reply(
                    state,
                    chat,
                    "Send text, one photo or one video. /cancel aborts the broadcast.",
                )
                .await;
                return Ok(());
            };
            match state.broadcast.capture(user, payload.clone()).await {
                Ok(recipients) => {
                    reply_with_keyboard(
                        state,
                        chat,
                        &formatting::broadcast_preview(
                            recipients,
                            &payload,
                            state.messenger.capabilities().max_message_len,
                        ),
                        menu::broadcast_confirm_keyboard(),
                    )
                    .await;
                }
                Err(Error::Unauthorized(_)) => reply(state, chat, NO_PERMISSION).await,
                Err(Error::InvalidState(why)) => {
                    reply(
                        state,
                        chat,
                        &format!("❌ {}. Send a shorter version or /cancel.", escape_html(&why)),
                    )
                    .await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        ConversationState::AwaitingBroadcastConfirm { .. } => {
            reply(
                state,
                chat,
                "Use the buttons under the preview to send or cancel the broadcast.",
            )
            .await;
        }
        ConversationState::Idle => {
            reply_with_keyboard(state, chat, menu::MENU_HINT, menu::main_menu_keyboard()).await;
        }
    }

    Ok(())
}

/// Largest photo size, a video, or plain text, in that order.
fn payload_of(msg: &Message) -> Option<BroadcastPayload> {
    let caption = msg.caption().map(str::to_string);
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(BroadcastPayload::Photo {
            file_ref: photo.file.id.clone(),
            caption,
        });
    }
    if let Some(video) = msg.video() {
        return Some(BroadcastPayload::Video {
            file_ref: video.file.id.clone(),
            caption,
        });
    }
    msg.text()
        .filter(|t| !t.trim().is_empty())
        .map(|t| BroadcastPayload::Text {
            html: t.to_string(),
        })
}
