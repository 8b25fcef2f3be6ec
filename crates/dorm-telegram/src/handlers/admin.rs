use chrono::Local;

use dorm_core::{
    domain::{MessageRef, UserProfile},
    errors::{Error, LogDefault},
    formatting::{self, NO_PERMISSION},
    stats::DEFAULT_POPULAR_LIMIT,
};

use crate::{menu, router::AppState};

use super::callback::show;

const FEEDBACK_PAGE: i64 = 5;

const BROADCAST_GONE: &str = "❌ Nothing to send: the broadcast was cancelled or has expired.";
const BROADCAST_FAILED: &str =
    "❌ The broadcast could not be started and nothing was sent. Please compose it again.";

/// Admin callbacks. Every action re-checks the admin flag.
pub async fn handle_admin_callback(
    data: &str,
    callback_id: &str,
    origin: MessageRef,
    profile: &UserProfile,
    state: &AppState,
) -> anyhow::Result<()> {
    let admin = profile.user_id();
    if !state.directory.is_admin(admin).await {
        tracing::warn!(user_id = admin.0, data, "admin action denied");
        state
            .messenger
            .answer_callback_query(callback_id, Some(NO_PERMISSION))
            .await?;
        return Ok(());
    }

    let mut notice: Option<&str> = None;
    match data {
        "admin_panel" => {
            show(state, origin, menu::ADMIN_PANEL, menu::admin_panel_keyboard()).await;
        }
        "admin_stats" | "refresh_stats" => {
            let text = stats_text(state).await?;
            show(state, origin, &text, menu::admin_stats_keyboard()).await;
            if data == "refresh_stats" {
                notice = Some("Updated");
            }
        }
        "admin_feedback" => {
            let counts = state.stats.feedback_stats().await?;
            let entries = state
                .store
                .unread_feedback(FEEDBACK_PAGE)
                .await
                .or_log_default("unread_feedback");
            let text = formatting::unread_feedback_list(&entries, counts.unread);
            show(
                state,
                origin,
                &text,
                menu::admin_feedback_keyboard(counts.unread > 0),
            )
            .await;
        }
        "feedback_mark_read" => {
            let marked = state.store.mark_all_feedback_read().await?;
            tracing::info!(admin_id = admin.0, marked, "feedback marked read");
            show(
                state,
                origin,
                "💬 <b>Feedback</b>\n\n✅ All messages are marked as read.",
                menu::admin_feedback_keyboard(false),
            )
            .await;
        }
        "admin_broadcast" => {
            state.broadcast.begin(admin).await?;
            show(
                state,
                origin,
                formatting::BROADCAST_COMPOSE,
                menu::back_to_main_keyboard(),
            )
            .await;
        }
        "broadcast_confirm" => {
            // Answer first: the fan-out can outlive the callback deadline. From
            // here on the query is spent, so every outcome ends on a screen.
            if let Err(e) = state
                .messenger
                .answer_callback_query(callback_id, Some("Sending..."))
                .await
            {
                tracing::warn!(kind = e.kind(), error = %e, "confirm answer failed");
            }
            if let Err(e) = state
                .messenger
                .edit_html(origin, "⏳ Broadcast in progress...")
                .await
            {
                tracing::debug!(kind = e.kind(), error = %e, "progress edit failed");
            }

            let text = match state.broadcast.confirm(admin).await {
                Ok(summary) => formatting::broadcast_summary(&summary),
                Err(Error::InvalidState(_)) => BROADCAST_GONE.to_string(),
                Err(Error::Unauthorized(_)) => NO_PERMISSION.to_string(),
                Err(e) => {
                    tracing::error!(admin_id = admin.0, kind = e.kind(), error = %e, "broadcast failed");
                    BROADCAST_FAILED.to_string()
                }
            };
            show(state, origin, &text, menu::admin_panel_keyboard()).await;
            return Ok(());
        }
        "broadcast_cancel" => {
            state.broadcast.cancel(admin).await;
            show(
                state,
                origin,
                "❌ Broadcast cancelled.",
                menu::admin_panel_keyboard(),
            )
            .await;
        }
        _ => tracing::debug!(admin_id = admin.0, data, "unknown admin action"),
    }

    state
        .messenger
        .answer_callback_query(callback_id, notice)
        .await?;
    Ok(())
}

async fn stats_text(state: &AppState) -> anyhow::Result<String> {
    let users = state.stats.user_stats().await?;
    let sections = state
        .stats
        .popular_sections(DEFAULT_POPULAR_LIMIT)
        .await
        .or_log_default("popular_sections");
    let feedback = state.stats.feedback_stats().await?;

    // The timestamp keeps a refresh from producing an identical message.
    Ok(format!(
        "{}\n\n<i>Updated {}</i>",
        formatting::stats_report(&users, &sections, feedback),
        Local::now().format("%H:%M:%S"),
    ))
}
