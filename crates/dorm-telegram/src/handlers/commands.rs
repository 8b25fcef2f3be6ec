use chrono::Utc;
use teloxide::prelude::*;

use dorm_core::{
    domain::{ChatId, UserId, UserProfile},
    errors::Error,
    formatting::{escape_html, NO_PERMISSION},
    store::NewVideo,
};

use crate::{menu, router::AppState};

use super::{reply, reply_with_keyboard};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// `<key> <value...>`
fn parse_setting(args: &str) -> Option<(String, String)> {
    let (key, value) = args.trim().split_once(char::is_whitespace)?;
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

/// `<floor> <link> [title...]`
fn parse_floorchat(args: &str) -> Option<(i64, String, Option<String>)> {
    let mut parts = args.trim().splitn(3, char::is_whitespace);
    let floor = parts.next()?.parse::<i64>().ok()?;
    let link = parts.next()?.trim();
    if link.is_empty() {
        return None;
    }
    let title = parts
        .next()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    Some((floor, link.to_string(), title))
}

/// `<category> | <title> | <description>`; the description may be omitted.
fn parse_addvideo(args: &str) -> Option<(String, String, String)> {
    let mut parts = args.splitn(3, '|').map(str::trim);
    let category = parts.next().filter(|s| !s.is_empty())?;
    let title = parts.next().filter(|s| !s.is_empty())?;
    let description = parts.next().unwrap_or("");
    Some((
        category.to_lowercase(),
        title.to_string(),
        description.to_string(),
    ))
}

/// `<id> on|off`
fn parse_setadmin(args: &str) -> Option<(i64, bool)> {
    let mut parts = args.split_whitespace();
    let id = parts.next()?.parse::<i64>().ok()?;
    let flag = match parts.next()?.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => true,
        "off" | "false" | "0" | "no" => false,
        _ => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((id, flag))
}

pub async fn handle_command(
    msg: &Message,
    profile: &UserProfile,
    state: &AppState,
) -> anyhow::Result<()> {
    let text = msg.text().unwrap_or("");
    let (cmd, args) = parse_command(text);
    let chat = ChatId(msg.chat.id.0);
    let user = profile.user_id();

    tracing::debug!(user_id = user.0, %cmd, "command");

    match cmd.as_str() {
        "start" => {
            state.directory.upsert_user(profile).await?;
            state.conversations.clear(user).await;
            reply_with_keyboard(state, chat, menu::WELCOME, menu::main_menu_keyboard()).await;
        }
        "help" => {
            reply_with_keyboard(state, chat, menu::HELP, menu::back_to_main_keyboard()).await;
        }
        "cancel" => {
            let cancelled =
                state.feedback.cancel(user).await || state.broadcast.cancel(user).await;
            let text = if cancelled {
                "❌ Action cancelled."
            } else {
                "Nothing to cancel."
            };
            reply_with_keyboard(state, chat, text, menu::main_menu_keyboard()).await;
        }
        "admin" => {
            if !state.directory.is_admin(user).await {
                reply(state, chat, NO_PERMISSION).await;
                return Ok(());
            }
            tracing::info!(admin_id = user.0, "admin panel opened");
            reply_with_keyboard(state, chat, menu::ADMIN_PANEL, menu::admin_panel_keyboard())
                .await;
        }
        "setting" | "floorchat" | "addvideo" | "setadmin" => {
            if !state.directory.is_admin(user).await {
                reply(state, chat, NO_PERMISSION).await;
                return Ok(());
            }
            let answer = admin_command(&cmd, &args, msg, user, state).await?;
            reply(state, chat, &answer).await;
        }
        _ => {
            reply(state, chat, "Unknown command. Send /help for the list.").await;
        }
    }

    Ok(())
}

async fn admin_command(
    cmd: &str,
    args: &str,
    msg: &Message,
    admin: UserId,
    state: &AppState,
) -> anyhow::Result<String> {
    let answer = match cmd {
        "setting" => {
            let Some((key, value)) = parse_setting(args) else {
                return Ok("Usage: /setting &lt;key&gt; &lt;value&gt;".to_string());
            };
            state.store.set_setting(&key, &value, Utc::now()).await?;
            tracing::info!(admin_id = admin.0, %key, "setting updated");
            format!("✅ Setting <code>{}</code> updated.", escape_html(&key))
        }
        "floorchat" => {
            let Some((floor, link, title)) = parse_floorchat(args) else {
                return Ok("Usage: /floorchat &lt;floor&gt; &lt;link&gt; [title]".to_string());
            };
            state
                .store
                .set_floor_chat(floor, &link, title.as_deref(), Utc::now())
                .await?;
            tracing::info!(admin_id = admin.0, floor, "floor chat updated");
            format!("✅ Chat for floor {floor} saved.")
        }
        "addvideo" => {
            let Some((category, title, description)) = parse_addvideo(args) else {
                return Ok(
                    "Usage: reply to a video with /addvideo &lt;category&gt; | &lt;title&gt; | &lt;description&gt;"
                        .to_string(),
                );
            };
            if menu::video_category_label(&category).is_none() {
                let known = menu::VIDEO_CATEGORIES
                    .iter()
                    .map(|(id, _)| *id)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Ok(format!("Unknown category. Known: {known}"));
            }
            let Some(video) = msg.reply_to_message().and_then(|m| m.video()) else {
                return Ok("Reply to a video message with this command.".to_string());
            };
            let id = state
                .store
                .add_video(
                    &NewVideo {
                        category: category.clone(),
                        title,
                        description,
                        file_id: video.file.id.clone(),
                        file_path: None,
                    },
                    Utc::now(),
                )
                .await?;
            tracing::info!(admin_id = admin.0, video_id = id, %category, "video added");
            format!("✅ Video added to {}.", escape_html(&category))
        }
        "setadmin" => {
            let Some((id, flag)) = parse_setadmin(args) else {
                return Ok("Usage: /setadmin &lt;id&gt; on|off".to_string());
            };
            match state.directory.set_admin(UserId(id), flag).await {
                Ok(()) => format!(
                    "✅ Admin flag for {id} is now {}.",
                    if flag { "on" } else { "off" }
                ),
                Err(Error::NotFound(_)) => format!("User {id} has never talked to the bot."),
                Err(e) => return Err(e.into()),
            }
        }
        _ => "Unknown command.".to_string(),
    };
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_bot_suffix() {
        assert_eq!(
            parse_command("/Start@dorm_bot"),
            ("start".to_string(), String::new())
        );
        assert_eq!(
            parse_command("/setting  official_channel_link https://t.me/x"),
            (
                "setting".to_string(),
                "official_channel_link https://t.me/x".to_string()
            )
        );
    }

    #[test]
    fn setting_needs_key_and_value() {
        assert_eq!(
            parse_setting("contacts_text Call 112 in an emergency"),
            Some((
                "contacts_text".to_string(),
                "Call 112 in an emergency".to_string()
            ))
        );
        assert_eq!(parse_setting("lonely"), None);
        assert_eq!(parse_setting(""), None);
    }

    #[test]
    fn floorchat_title_is_optional() {
        assert_eq!(
            parse_floorchat("3 https://t.me/f3"),
            Some((3, "https://t.me/f3".to_string(), None))
        );
        assert_eq!(
            parse_floorchat("4 https://t.me/f4 Floors 4-5"),
            Some((4, "https://t.me/f4".to_string(), Some("Floors 4-5".to_string())))
        );
        assert_eq!(parse_floorchat("x https://t.me/f"), None);
        assert_eq!(parse_floorchat("5"), None);
    }

    #[test]
    fn addvideo_splits_on_pipes() {
        assert_eq!(
            parse_addvideo("Laundry | Using the dryer | Step by step"),
            Some((
                "laundry".to_string(),
                "Using the dryer".to_string(),
                "Step by step".to_string()
            ))
        );
        assert_eq!(
            parse_addvideo("kitchen | Stove"),
            Some(("kitchen".to_string(), "Stove".to_string(), String::new()))
        );
        assert_eq!(parse_addvideo("kitchen"), None);
    }

    #[test]
    fn setadmin_accepts_on_off() {
        assert_eq!(parse_setadmin("42 on"), Some((42, true)));
        assert_eq!(parse_setadmin("42 OFF"), Some((42, false)));
        assert_eq!(parse_setadmin("42 maybe"), None);
        assert_eq!(parse_setadmin("42 on extra"), None);
        assert_eq!(parse_setadmin("abc on"), None);
    }
}
