//! HTML texts shared by the core flows and the admin screens.

use chrono::{DateTime, Local, TimeZone};

use crate::{
    broadcast::{BroadcastPayload, BroadcastSummary},
    domain::{FeedbackType, UserProfile},
    stats::UserStats,
    store::{FeedbackCounts, FeedbackEntry, SectionCount},
};

pub const FEEDBACK_RECEIVED: &str = "✅ <b>Thank you!</b>\n\nYour message has been delivered to the dormitory team. We read every submission.";
pub const FEEDBACK_SAVE_FAILED: &str =
    "❌ Something went wrong while saving your message. Please try again.";
pub const NO_PERMISSION: &str = "❌ You do not have administrator rights.";
pub const GENERIC_APOLOGY: &str = "Sorry, something went wrong. Please try again later.";

const PREVIEW_CHARS: usize = 100;
const ELLIPSIS_CHARS: usize = 3;
const PREVIEW_SHORTENED: &str = "\n<i>(shortened in this preview)</i>";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Cut to `max_chars` characters, appending "..." when something was dropped.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}

/// Human label of a menu section tag; unknown tags are shown as-is.
pub fn section_display_name(tag: &str) -> &str {
    match tag {
        "official_channel" => "📢 Official channel",
        "student_council" => "💡 Student council",
        "floor_chats" => "🗣 Floor chats",
        "general_chat" => "👥 General chat",
        "guide_website" => "📚 Guide website",
        "video_guide" => "🎬 Video guides",
        "contacts" => "📞 Contacts",
        "feedback" => "📝 Feedback",
        other => other,
    }
}

pub fn feedback_type_label(t: FeedbackType) -> &'static str {
    match t {
        FeedbackType::General => "💬 General",
        FeedbackType::Suggestion => "💡 Suggestion",
        FeedbackType::Bug => "🐛 Bug report",
        FeedbackType::Question => "❓ Question",
    }
}

pub fn feedback_prompt(t: FeedbackType) -> String {
    format!(
        "📝 <b>{}</b>\n\nWrite your message in one text message. Send /cancel to stop.",
        feedback_type_label(t)
    )
}

/// Note sent to every admin when a resident submits feedback.
///
/// The body is shortened so the whole note stays within `max_chars`.
pub fn feedback_notification<Tz: TimeZone>(
    from: &UserProfile,
    feedback_type: FeedbackType,
    at: DateTime<Tz>,
    body: &str,
    max_chars: usize,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let header = format!(
        "🔔 <b>New feedback</b>\n\n\
         👤 <b>From:</b> {} ({})\n\
         🆔 <b>ID:</b> {}\n\
         📝 <b>Type:</b> {}\n\
         📅 <b>Time:</b> {}\n\n\
         💬 <b>Message:</b>\n",
        escape_html(&from.full_name()),
        escape_html(&from.handle()),
        from.id,
        feedback_type.as_str(),
        at.format("%d.%m.%Y %H:%M"),
    );
    let budget = body_budget(&header, max_chars);
    format!("{header}{}", escape_within(body, budget))
}

/// Characters left for a body after `frame`, keeping room for a trailing "...".
/// Tags count too, so the visible text is never longer.
fn body_budget(frame: &str, max_chars: usize) -> usize {
    max_chars.saturating_sub(frame.chars().count() + ELLIPSIS_CHARS)
}

/// Escape `s` and cut it so the escaped text stays within `budget`
/// characters before the "...". Entities are never split.
fn escape_within(s: &str, budget: usize) -> String {
    let escaped = escape_html(s);
    if escaped.chars().count() <= budget + ELLIPSIS_CHARS {
        return escaped;
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let mut buf = [0u8; 4];
        let piece = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&quot;",
            _ => c.encode_utf8(&mut buf),
        };
        let len = piece.chars().count();
        if used + len > budget {
            break;
        }
        used += len;
        out.push_str(piece);
    }
    out.push_str("...");
    out
}

pub fn stats_report(
    users: &UserStats,
    sections: &[SectionCount],
    feedback: FeedbackCounts,
) -> String {
    let popular = if sections.is_empty() {
        "No data yet".to_string()
    } else {
        sections
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "{}. {}: {}",
                    i + 1,
                    escape_html(section_display_name(&s.section_name)),
                    s.access_count
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "📊 <b>Bot statistics</b>\n\n\
         👥 <b>Users</b>\n\
         • Total: {}\n\
         • Active today: {}\n\
         • Active this week: {}\n\
         • Active this month: {}\n\n\
         🔥 <b>Popular sections (30 days)</b>\n{}\n\n\
         📝 <b>Feedback</b>\n\
         • Unread: {}\n\
         • Total: {}",
        users.total,
        users.active_today,
        users.active_week,
        users.active_month,
        popular,
        feedback.unread,
        feedback.total,
    )
}

/// Admin view of the newest unread feedback items.
pub fn unread_feedback_list(entries: &[FeedbackEntry], unread_total: i64) -> String {
    if entries.is_empty() {
        return "💬 <b>Feedback</b>\n\n📭 No unread messages.".to_string();
    }

    let mut out = format!("💬 <b>Feedback</b>\n\n📬 Unread: {unread_total}\n\n<b>Latest:</b>");
    for e in entries {
        let who = e
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("@{u}"))
            .unwrap_or_else(|| "unknown".to_string());
        out.push_str(&format!(
            "\n\n📝 <b>From:</b> {} (ID: {})\n📅 <b>Date:</b> {}\n🏷 <b>Type:</b> {}\n💭 {}",
            escape_html(&who),
            e.user_id,
            e.created_at
                .with_timezone(&Local)
                .format("%d.%m.%Y %H:%M"),
            escape_html(&e.feedback_type),
            escape_html(&truncate_text(&e.message, PREVIEW_CHARS)),
        ));
    }
    out
}

pub const BROADCAST_COMPOSE: &str = "📨 <b>Broadcast</b>\n\n\
    Send the message that every active user should receive.\n\n\
    • HTML formatting is supported\n\
    • You may attach one photo or one video with a caption\n\
    • Send /cancel to abort";

/// Preview shown to the admin before sending. Content that would push the
/// preview past `max_chars` is shown escaped and shortened; the broadcast
/// itself is sent in full.
pub fn broadcast_preview(recipients: i64, payload: &BroadcastPayload, max_chars: usize) -> String {
    let kind = match payload {
        BroadcastPayload::Text { .. } => "text",
        BroadcastPayload::Photo { .. } => "photo",
        BroadcastPayload::Video { .. } => "video",
    };
    let frame = |content: &str| {
        format!(
            "📨 <b>Broadcast preview</b>\n\n\
             <b>Recipients:</b> {recipients}\n\
             <b>Kind:</b> {kind}\n\n\
             <b>Content:</b>\n{content}\n\n\
             ⚠️ Check the formatting before sending."
        )
    };

    let content = payload.text().unwrap_or("[media]");
    let full = frame(content);
    if full.chars().count() <= max_chars {
        return full;
    }
    let empty = frame(PREVIEW_SHORTENED);
    let budget = body_budget(&empty, max_chars);
    frame(&format!("{}{PREVIEW_SHORTENED}", escape_within(content, budget)))
}

pub fn broadcast_summary(summary: &BroadcastSummary) -> String {
    let mut out = format!(
        "✅ <b>Broadcast finished</b>\n\n\
         📊 <b>Results:</b>\n\
         • Sent: {}\n\
         • Failed: {}\n\
         • Reach: {}/{}",
        summary.sent,
        summary.failed,
        summary.sent,
        summary.attempted(),
    );
    if summary.deactivated > 0 {
        out.push_str(&format!(
            "\n• Deactivated (blocked the bot): {}",
            summary.deactivated
        ));
    }
    if summary.record_id.is_none() {
        out.push_str("\n\n⚠️ The broadcast record could not be saved.");
    }
    out.push_str(&format!(
        "\n\nCompleted at {}",
        summary.completed_at.with_timezone(&Local).format("%H:%M:%S")
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("привет мир", 6), "привет...");
    }

    #[test]
    fn notification_escapes_user_text() {
        let from = UserProfile {
            id: 42,
            username: Some("kate".to_string()),
            first_name: Some("Kate".to_string()),
            last_name: Some("<script>".to_string()),
        };
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 1, 2, 3, 4, 0)
            .unwrap();
        let html = feedback_notification(&from, FeedbackType::Bug, at, "a < b", 4096);

        assert!(html.contains("@kate"));
        assert!(html.contains("Kate &lt;script&gt;"));
        assert!(html.contains("<b>Type:</b> bug"));
        assert!(html.contains("02.01.2026 03:04"));
        assert!(html.ends_with("a &lt; b"));
    }

    #[test]
    fn long_feedback_still_fits_one_message() {
        let from = UserProfile {
            id: 42,
            first_name: Some("Kate".to_string()),
            ..UserProfile::default()
        };
        let body = "x".repeat(4096);
        let html = feedback_notification(&from, FeedbackType::General, Utc::now(), &body, 4096);

        assert!(html.chars().count() <= 4096);
        assert!(html.ends_with("..."));
        assert!(html.contains("<b>Message:</b>\nxxx"));
    }

    #[test]
    fn preview_of_a_full_length_text_fits() {
        let payload = BroadcastPayload::Text {
            html: "a".repeat(4096),
        };
        let html = broadcast_preview(12, &payload, 4096);
        assert!(html.chars().count() <= 4096);
        assert!(html.contains("shortened in this preview"));
        assert!(html.contains("<b>Recipients:</b> 12"));

        let short = BroadcastPayload::Text {
            html: "<b>hi</b>".to_string(),
        };
        let html = broadcast_preview(3, &short, 4096);
        assert!(html.contains("<b>Content:</b>\n<b>hi</b>"));
        assert!(!html.contains("shortened"));
    }

    #[test]
    fn escaping_never_pushes_past_the_limit() {
        let markup = BroadcastPayload::Text {
            html: "<&>".repeat(1300),
        };
        let html = broadcast_preview(1, &markup, 4096);
        assert!(html.chars().count() <= 4096);
        assert!(html.contains("&lt;&amp;&gt;"));

        let from = UserProfile {
            id: 7,
            ..UserProfile::default()
        };
        let body = "\"".repeat(2000);
        let html = feedback_notification(&from, FeedbackType::Bug, Utc::now(), &body, 4096);
        assert!(html.chars().count() <= 4096);
        assert!(html.ends_with("&quot;..."));
    }

    #[test]
    fn stats_report_uses_section_names() {
        let users = UserStats {
            total: 10,
            active_today: 2,
            active_week: 5,
            active_month: 8,
        };
        let sections = vec![
            SectionCount {
                section_name: "contacts".to_string(),
                access_count: 4,
            },
            SectionCount {
                section_name: "mystery".to_string(),
                access_count: 1,
            },
        ];
        let html = stats_report(&users, &sections, FeedbackCounts { unread: 1, total: 3 });

        assert!(html.contains("1. 📞 Contacts: 4"));
        assert!(html.contains("2. mystery: 1"));
        assert!(html.contains("Active this week: 5"));
        assert!(html.contains("Unread: 1"));

        let empty = stats_report(&UserStats::default(), &[], FeedbackCounts::default());
        assert!(empty.contains("No data yet"));
    }

    #[test]
    fn feedback_list_previews_are_short() {
        let long = "x".repeat(250);
        let entries = vec![FeedbackEntry {
            id: 1,
            user_id: 7,
            feedback_type: "general".to_string(),
            message: long,
            created_at: Utc::now(),
            username: None,
            first_name: None,
            last_name: None,
        }];
        let html = unread_feedback_list(&entries, 1);
        assert!(html.contains(&format!("{}...", "x".repeat(100))));
        assert!(!html.contains(&"x".repeat(101)));
        assert!(html.contains("unknown (ID: 7)"));
        assert!(unread_feedback_list(&[], 0).contains("No unread"));
    }

    #[test]
    fn summary_mentions_missing_record() {
        let now = Utc::now();
        let summary = BroadcastSummary {
            record_id: None,
            sent: 2,
            failed: 1,
            deactivated: 1,
            started_at: now,
            completed_at: now,
        };
        let html = broadcast_summary(&summary);
        assert!(html.contains("Reach: 2/3"));
        assert!(html.contains("Deactivated"));
        assert!(html.contains("could not be saved"));
    }
}
