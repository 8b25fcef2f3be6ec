//! Telegram update handlers.
//!
//! Each entry point registers/touches the sender first, then routes the update.
//! Failures stop at this boundary: they are logged and turned into an apology
//! for the one user involved.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, User},
};

use dorm_core::{
    domain::{ChatId, MessageId, MessageRef, UserProfile},
    formatting::GENERIC_APOLOGY,
    messaging::types::InlineKeyboard,
};

use crate::router::AppState;

mod admin;
mod callback;
mod commands;
mod message;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let profile = profile_of(&q.from);
    state.directory.observe(&profile).await;

    let origin = q.message.as_ref().map(|m| MessageRef {
        chat_id: ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
    });
    dispatch_callback(
        q.data.as_deref().unwrap_or(""),
        &q.id,
        origin,
        &profile,
        &state,
    )
    .await;
    Ok(())
}

async fn dispatch_callback(
    data: &str,
    callback_id: &str,
    origin: Option<MessageRef>,
    profile: &UserProfile,
    state: &AppState,
) {
    if let Err(e) = callback::route_callback(data, callback_id, origin, profile, state).await {
        tracing::error!(user_id = profile.id, data, error = %e, "callback handler failed");
        let chat = origin.map_or_else(|| ChatId::from(profile.user_id()), |o| o.chat_id);
        apologize(state, callback_id, chat).await;
    }
}

/// Answer the press with an apology; if the query is already spent or gone,
/// say it in the chat instead.
async fn apologize(state: &AppState, callback_id: &str, chat: ChatId) {
    if let Err(e) = state
        .messenger
        .answer_callback_query(callback_id, Some(GENERIC_APOLOGY))
        .await
    {
        tracing::warn!(chat_id = chat.0, kind = e.kind(), error = %e, "apology answer failed; replying in chat");
        reply(state, chat, GENERIC_APOLOGY).await;
    }
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let profile = profile_of(user);
    state.directory.observe(&profile).await;

    let is_command = msg.text().is_some_and(|t| t.starts_with('/'));
    let result = if is_command {
        commands::handle_command(&msg, &profile, &state).await
    } else {
        message::handle_message(&msg, &profile, &state).await
    };

    if let Err(e) = result {
        tracing::error!(user_id = profile.id, error = %e, "message handler failed");
        reply(&state, ChatId(msg.chat.id.0), GENERIC_APOLOGY).await;
    }
    Ok(())
}

fn profile_of(u: &User) -> UserProfile {
    UserProfile {
        id: u.id.0 as i64,
        username: u.username.clone(),
        first_name: Some(u.first_name.clone()).filter(|s| !s.is_empty()),
        last_name: u.last_name.clone(),
    }
}

/// Best-effort HTML reply; delivery failures are only logged.
async fn reply(state: &AppState, chat: ChatId, html: &str) {
    if let Err(e) = state.messenger.send_html(chat, html).await {
        tracing::warn!(chat_id = chat.0, kind = e.kind(), error = %e, "reply failed");
    }
}

async fn reply_with_keyboard(state: &AppState, chat: ChatId, html: &str, kb: InlineKeyboard) {
    if let Err(e) = state.messenger.send_inline_keyboard(chat, html, kb).await {
        tracing::warn!(chat_id = chat.0, kind = e.kind(), error = %e, "reply failed");
    }
}
