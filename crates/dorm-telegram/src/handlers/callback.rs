use chrono::Utc;

use dorm_core::{
    domain::{ChatId, FeedbackType, MessageRef, UserProfile},
    errors::LogDefault,
    formatting::feedback_prompt,
    messaging::types::InlineKeyboard,
};

use crate::{
    menu::{self, setting_keys},
    router::AppState,
};

use super::{admin, reply};

/// Callback data handled by the admin screens.
const ADMIN_ACTIONS: [&str; 8] = [
    "admin_panel",
    "admin_stats",
    "refresh_stats",
    "admin_feedback",
    "feedback_mark_read",
    "admin_broadcast",
    "broadcast_confirm",
    "broadcast_cancel",
];

/// Route one callback press. `origin` is the message carrying the keyboard;
/// Telegram omits it for messages too old to reach.
pub(crate) async fn route_callback(
    data: &str,
    callback_id: &str,
    origin: Option<MessageRef>,
    profile: &UserProfile,
    state: &AppState,
) -> anyhow::Result<()> {
    let Some(origin) = origin else {
        state.messenger.answer_callback_query(callback_id, None).await?;
        return Ok(());
    };

    if ADMIN_ACTIONS.contains(&data) {
        return admin::handle_admin_callback(data, callback_id, origin, profile, state).await;
    }

    let user = profile.user_id();
    if data == menu::MAIN_MENU {
        state.feedback.cancel(user).await;
        state.broadcast.cancel(user).await;
        show(state, origin, menu::MAIN_MENU_TEXT, menu::main_menu_keyboard()).await;
    } else if menu::SECTIONS.contains(&data) {
        open_section(data, origin, profile, state).await?;
    } else if let Some(kind) = data.strip_prefix("feedback_") {
        let feedback_type = FeedbackType::parse(kind).unwrap_or_default();
        state.feedback.begin(user, feedback_type).await;
        show(
            state,
            origin,
            &feedback_prompt(feedback_type),
            menu::back_to_main_keyboard(),
        )
        .await;
    } else if let Some(category) = data.strip_prefix("video_category_") {
        send_videos(category, callback_id, origin.chat_id, state).await?;
        return Ok(());
    } else if let Some(floor) = data.strip_prefix("floor_") {
        let floor = floor.parse::<i64>().unwrap_or(-1);
        let chat = state
            .store
            .get_floor_chat(floor)
            .await
            .or_log_default("get_floor_chat");
        let text = menu::floor_chat_text(chat.as_ref(), floor);
        let chats = state.store.floor_chats().await.or_log_default("floor_chats");
        show(state, origin, &text, menu::floor_chats_keyboard(&chats)).await;
    } else {
        tracing::debug!(user_id = user.0, data, "unknown callback data");
    }

    state.messenger.answer_callback_query(callback_id, None).await?;
    Ok(())
}

async fn open_section(
    section: &str,
    origin: MessageRef,
    profile: &UserProfile,
    state: &AppState,
) -> anyhow::Result<()> {
    let user = profile.user_id();
    if state.cfg.stats_enabled {
        if let Err(e) = state
            .store
            .log_section_access(user, section, Utc::now())
            .await
        {
            tracing::warn!(user_id = user.0, section, kind = e.kind(), error = %e, "section access not logged");
        }
    }

    let cfg = &state.cfg;
    let (text, keyboard) = match section {
        "official_channel" => {
            let link = link_setting(
                state,
                setting_keys::OFFICIAL_CHANNEL_LINK,
                &cfg.official_channel_link,
            )
            .await;
            (
                menu::link_section(
                    "📢 Official channel",
                    "News and announcements from the dormitory administration.",
                    link.as_deref(),
                ),
                menu::back_to_main_keyboard(),
            )
        }
        "general_chat" => {
            let link =
                link_setting(state, setting_keys::GENERAL_CHAT_LINK, &cfg.general_chat_link).await;
            (
                menu::link_section(
                    "👥 General chat",
                    "Chat with everyone living in the dormitory.",
                    link.as_deref(),
                ),
                menu::back_to_main_keyboard(),
            )
        }
        "guide_website" => {
            let link =
                link_setting(state, setting_keys::GUIDE_WEBSITE_LINK, &cfg.guide_website_link)
                    .await;
            (
                menu::link_section(
                    "📚 Guide website",
                    "Rules, schedules and answers to common questions.",
                    link.as_deref(),
                ),
                menu::back_to_main_keyboard(),
            )
        }
        "student_council" => {
            let text = link_setting(state, setting_keys::STUDENT_COUNCIL_TEXT, "")
                .await
                .unwrap_or_else(|| {
                    "💡 <b>Student council</b>\n\nThe council represents residents. \
                     Use Feedback to reach it."
                        .to_string()
                });
            (text, menu::back_to_main_keyboard())
        }
        "contacts" => {
            let text = link_setting(state, setting_keys::CONTACTS_TEXT, "")
                .await
                .unwrap_or_else(|| {
                    "📞 <b>Important contacts</b>\n\nEmergency services: 112".to_string()
                });
            (text, menu::back_to_main_keyboard())
        }
        "floor_chats" => {
            let chats = state.store.floor_chats().await.or_log_default("floor_chats");
            (
                menu::floor_chats_text(&chats),
                menu::floor_chats_keyboard(&chats),
            )
        }
        "video_guide" => (
            "🎬 <b>Video guides</b>\n\nChoose a category:".to_string(),
            menu::video_categories_keyboard(),
        ),
        "feedback" => {
            state.feedback.begin(user, FeedbackType::General).await;
            (
                "📝 <b>Feedback</b>\n\nPick a topic, or just write your message now.".to_string(),
                menu::feedback_type_keyboard(),
            )
        }
        _ => (menu::MAIN_MENU_TEXT.to_string(), menu::main_menu_keyboard()),
    };

    show(state, origin, &text, keyboard).await;
    Ok(())
}

/// Stored setting when present and non-empty, else the configured fallback.
async fn link_setting(state: &AppState, key: &str, fallback: &str) -> Option<String> {
    let stored = state
        .store
        .get_setting(key)
        .await
        .or_log_default("get_setting")
        .filter(|v| !v.trim().is_empty());
    stored.or_else(|| Some(fallback.to_string()).filter(|v| !v.trim().is_empty()))
}

async fn send_videos(
    category: &str,
    callback_id: &str,
    chat: ChatId,
    state: &AppState,
) -> anyhow::Result<()> {
    let videos = state
        .store
        .videos_by_category(category)
        .await
        .or_log_default("videos_by_category");

    if videos.is_empty() {
        state
            .messenger
            .answer_callback_query(callback_id, Some("No videos in this category yet."))
            .await?;
        return Ok(());
    }
    state.messenger.answer_callback_query(callback_id, None).await?;

    for v in videos.iter().take(menu::MAX_VIDEOS_PER_CATEGORY) {
        let caption = menu::video_caption(v);
        if let Err(e) = state
            .messenger
            .send_video(chat, &v.file_id, Some(&caption))
            .await
        {
            tracing::warn!(video_id = v.id, kind = e.kind(), error = %e, "video send failed");
        }
    }
    let label = menu::video_category_label(category).unwrap_or(category);
    reply(
        state,
        chat,
        &format!("That was <b>{}</b>. /start opens the menu.", label),
    )
    .await;
    Ok(())
}

/// Edit the callback's message in place; send a fresh one if the edit fails.
pub(super) async fn show(state: &AppState, origin: MessageRef, text: &str, kb: InlineKeyboard) {
    if let Err(e) = state
        .messenger
        .edit_inline_keyboard(origin, text, kb.clone())
        .await
    {
        tracing::debug!(kind = e.kind(), error = %e, "edit failed; sending a new message");
        if let Err(e) = state
            .messenger
            .send_inline_keyboard(origin.chat_id, text, kb)
            .await
        {
            tracing::warn!(chat_id = origin.chat_id.0, kind = e.kind(), error = %e, "reply failed");
        }
    }
}
