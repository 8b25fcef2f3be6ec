//! Resident menu: sections, keyboards and static texts.

use dorm_core::{
    formatting::{escape_html, feedback_type_label},
    messaging::types::{InlineButton, InlineKeyboard},
    store::{FloorChat, Video},
    domain::FeedbackType,
};

pub const MAIN_MENU: &str = "main_menu";

pub const WELCOME: &str = "👋 <b>Welcome to the dormitory assistant!</b>\n\n\
    Here you can find the official channel, floor chats, guides and important \
    contacts, and send feedback to the dormitory team.\n\nChoose a section below:";

pub const MAIN_MENU_TEXT: &str = "🏠 <b>Main menu</b>\n\nChoose a section:";

pub const HELP: &str = "ℹ️ <b>Help</b>\n\n\
    /start - open the main menu\n\
    /help - show this message\n\
    /cancel - stop the current action\n\n\
    Use the buttons under the menu to navigate.";

pub const MENU_HINT: &str = "Use the menu buttons to navigate, or send /start to open the menu.";

pub const ADMIN_PANEL: &str = "🛠 <b>Admin panel</b>\n\n\
    Commands:\n\
    /setting &lt;key&gt; &lt;value&gt;\n\
    /floorchat &lt;floor&gt; &lt;link&gt; [title]\n\
    /addvideo &lt;category&gt; | &lt;title&gt; | &lt;description&gt; (reply to a video)\n\
    /setadmin &lt;id&gt; on|off";

/// Callback tags of the main menu sections, in display order.
pub const SECTIONS: [&str; 8] = [
    "official_channel",
    "student_council",
    "floor_chats",
    "general_chat",
    "guide_website",
    "video_guide",
    "contacts",
    "feedback",
];

/// (id, label) of the video guide categories.
pub const VIDEO_CATEGORIES: [(&str, &str); 4] = [
    ("checkin", "🏠 Moving in"),
    ("laundry", "🧺 Laundry"),
    ("kitchen", "🍳 Kitchen"),
    ("safety", "🧯 Fire safety"),
];

pub const MAX_VIDEOS_PER_CATEGORY: usize = 5;

/// Setting keys that override configured links.
pub mod setting_keys {
    pub const OFFICIAL_CHANNEL_LINK: &str = "official_channel_link";
    pub const GENERAL_CHAT_LINK: &str = "general_chat_link";
    pub const GUIDE_WEBSITE_LINK: &str = "guide_website_link";
    pub const STUDENT_COUNCIL_TEXT: &str = "student_council_text";
    pub const CONTACTS_TEXT: &str = "contacts_text";
}

pub fn video_category_label(id: &str) -> Option<&'static str> {
    VIDEO_CATEGORIES
        .iter()
        .find(|(c, _)| *c == id)
        .map(|(_, label)| *label)
}

fn home_button() -> InlineButton {
    InlineButton::new("🏠 Main menu", MAIN_MENU)
}

pub fn main_menu_keyboard() -> InlineKeyboard {
    InlineKeyboard::one_per_row(
        SECTIONS
            .iter()
            .map(|tag| {
                InlineButton::new(dorm_core::formatting::section_display_name(tag), *tag)
            })
            .collect(),
    )
}

pub fn back_to_main_keyboard() -> InlineKeyboard {
    InlineKeyboard::new(vec![vec![home_button()]])
}

pub fn feedback_type_keyboard() -> InlineKeyboard {
    let types = [
        FeedbackType::Suggestion,
        FeedbackType::Bug,
        FeedbackType::Question,
        FeedbackType::General,
    ];
    InlineKeyboard::one_per_row(
        types
            .iter()
            .map(|t| InlineButton::new(feedback_type_label(*t), format!("feedback_{}", t.as_str())))
            .collect(),
    )
    .push_row(vec![home_button()])
}

pub fn video_categories_keyboard() -> InlineKeyboard {
    InlineKeyboard::one_per_row(
        VIDEO_CATEGORIES
            .iter()
            .map(|(id, label)| InlineButton::new(*label, format!("video_category_{id}")))
            .collect(),
    )
    .push_row(vec![home_button()])
}

pub fn floor_chats_keyboard(chats: &[FloorChat]) -> InlineKeyboard {
    InlineKeyboard::grid(
        chats
            .iter()
            .map(|c| {
                let label = c
                    .chat_title
                    .clone()
                    .unwrap_or_else(|| format!("Floor {}", c.floor_number));
                InlineButton::new(label, format!("floor_{}", c.floor_number))
            })
            .collect(),
        2,
    )
    .push_row(vec![home_button()])
}

pub fn admin_panel_keyboard() -> InlineKeyboard {
    InlineKeyboard::one_per_row(vec![
        InlineButton::new("📊 Statistics", "admin_stats"),
        InlineButton::new("📨 Broadcast", "admin_broadcast"),
        InlineButton::new("💬 Feedback", "admin_feedback"),
    ])
    .push_row(vec![home_button()])
}

pub fn admin_stats_keyboard() -> InlineKeyboard {
    InlineKeyboard::one_per_row(vec![
        InlineButton::new("🔄 Refresh", "refresh_stats"),
        InlineButton::new("◀️ Back", "admin_panel"),
    ])
}

pub fn admin_feedback_keyboard(has_unread: bool) -> InlineKeyboard {
    let mut buttons = Vec::new();
    if has_unread {
        buttons.push(InlineButton::new("✅ Mark all read", "feedback_mark_read"));
    }
    buttons.push(InlineButton::new("◀️ Back", "admin_panel"));
    InlineKeyboard::one_per_row(buttons)
}

pub fn broadcast_confirm_keyboard() -> InlineKeyboard {
    InlineKeyboard::new(vec![vec![
        InlineButton::new("✅ Send", "broadcast_confirm"),
        InlineButton::new("❌ Cancel", "broadcast_cancel"),
    ]])
}

/// Section body with a link line, or a notice when no link is configured.
pub fn link_section(title: &str, blurb: &str, link: Option<&str>) -> String {
    let link_line = match link {
        Some(l) => format!("🔗 {}", escape_html(l)),
        None => "The link is not configured yet.".to_string(),
    };
    format!("<b>{}</b>\n\n{}\n\n{}", escape_html(title), blurb, link_line)
}

pub fn floor_chats_text(chats: &[FloorChat]) -> String {
    if chats.is_empty() {
        return "🗣 <b>Floor chats</b>\n\nNo floor chats have been added yet.".to_string();
    }
    "🗣 <b>Floor chats</b>\n\nPick your floor:".to_string()
}

pub fn floor_chat_text(chat: Option<&FloorChat>, floor: i64) -> String {
    match chat {
        Some(c) => format!(
            "🗣 <b>{}</b>\n\n🔗 {}",
            escape_html(
                &c.chat_title
                    .clone()
                    .unwrap_or_else(|| format!("Floor {}", c.floor_number))
            ),
            escape_html(&c.chat_link)
        ),
        None => format!("No chat is registered for floor {floor}."),
    }
}

pub fn video_caption(v: &Video) -> String {
    if v.description.trim().is_empty() {
        format!("🎬 <b>{}</b>", escape_html(&v.title))
    } else {
        format!(
            "🎬 <b>{}</b>\n\n{}",
            escape_html(&v.title),
            escape_html(&v.description)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_menu_lists_every_section() {
        let kb = main_menu_keyboard();
        assert_eq!(kb.callback_data(), SECTIONS.to_vec());
    }

    #[test]
    fn feedback_buttons_carry_type_tags() {
        let data = feedback_type_keyboard().callback_data().join(",");
        assert!(data.contains("feedback_bug"));
        assert!(data.contains("feedback_general"));
        assert!(data.ends_with(MAIN_MENU));
    }

    #[test]
    fn floor_buttons_use_floor_numbers() {
        let chats = vec![
            FloorChat {
                floor_number: 2,
                chat_link: "https://t.me/x".to_string(),
                chat_title: None,
            },
            FloorChat {
                floor_number: 4,
                chat_link: "https://t.me/y".to_string(),
                chat_title: Some("4-5".to_string()),
            },
        ];
        let kb = floor_chats_keyboard(&chats);
        assert_eq!(kb.callback_data(), vec!["floor_2", "floor_4", MAIN_MENU]);
        assert_eq!(kb.rows[0][1].label, "4-5");
    }

    #[test]
    fn missing_link_is_explained() {
        let text = link_section("Channel", "News", None);
        assert!(text.contains("not configured"));
        assert_eq!(video_category_label("laundry"), Some("🧺 Laundry"));
        assert_eq!(video_category_label("nope"), None);
    }
}
