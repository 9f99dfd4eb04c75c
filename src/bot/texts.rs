//! Keyboards and message bodies shown to users.

use super::session::Command;
use crate::models::{GroupSummary, PlantPhoto, PlantSchedule, WateringHistoryEntry, WateringStats};
use crate::schedule::{evaluate, PendingPlant, WateringStatus};
use crate::telegram::{escape_markdown, ReplyMarkup};
use chrono::NaiveDateTime;

pub const CANCEL_BUTTON: &str = "Cancel";
pub const SKIP_BUTTON: &str = "Skip";
pub const NO_GROUP_BUTTON: &str = "No group";

const ADD_BUTTON: &str = "🌱 Add plant";
const WATER_BUTTON: &str = "💧 Water";
const PLANTS_BUTTON: &str = "📋 My plants";
const PENDING_BUTTON: &str = "⏰ Pending";
const STATS_BUTTON: &str = "📊 Statistics";
const PHOTOS_BUTTON: &str = "📸 Photos";
const HELP_BUTTON: &str = "❓ Help";

pub const HELP: &str = "🌿 *Available commands:*\n\n\
    *Plants:*\n\
    /add - Add a new plant\n\
    /plants - List your plants\n\
    /delete - Delete a plant\n\n\
    *Watering:*\n\
    /water - Log a watering\n\
    /history - Watering history\n\
    /pending - Plants that need water\n\n\
    *Photos:*\n\
    /photo - Add a photo to a plant\n\
    /photos - See your plant photos\n\n\
    *Groups:*\n\
    /newgroup - Create a group or location\n\
    /groups - List groups and their plants\n\
    /assign - Move a plant into a group\n\n\
    *Other:*\n\
    /stats - Watering statistics\n\
    /notifications - Turn reminders on or off\n\
    /help - Show this message\n\
    /cancel - Cancel the current operation";

pub const NO_PLANTS_YET: &str = "🌵 You have no plants yet.\nUse /add to add your first plant.";

pub fn main_menu() -> ReplyMarkup {
    ReplyMarkup::keyboard(
        vec![
            vec![ADD_BUTTON, WATER_BUTTON],
            vec![PLANTS_BUTTON, PENDING_BUTTON],
            vec![STATS_BUTTON, PHOTOS_BUTTON],
            vec![HELP_BUTTON],
        ],
        false,
    )
}

/// The command behind a main menu button, if `text` is one.
pub fn menu_command(text: &str) -> Option<Command> {
    match text.trim() {
        ADD_BUTTON => Some(Command::Add),
        WATER_BUTTON => Some(Command::Water),
        PLANTS_BUTTON => Some(Command::Plants),
        PENDING_BUTTON => Some(Command::Pending),
        STATS_BUTTON => Some(Command::Stats),
        PHOTOS_BUTTON => Some(Command::Photos),
        HELP_BUTTON => Some(Command::Help),
        _ => None,
    }
}

/// One button per name plus the given trailing buttons.
pub fn picker<'a>(names: impl IntoIterator<Item = &'a str>, trailing: &[&'a str]) -> ReplyMarkup {
    let rows = names
        .into_iter()
        .chain(trailing.iter().copied())
        .map(|name| vec![name])
        .collect();
    ReplyMarkup::keyboard(rows, true)
}

fn day_format(at: NaiveDateTime) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

pub fn plant_list(plants: &[PlantSchedule], now: NaiveDateTime) -> String {
    let mut message = String::from("🌿 *Your plants:*\n\n");
    for plant in plants {
        let evaluation = evaluate(plant.interval_days, plant.last_watered_at, now);
        message.push_str(&format!("🌱 *{}*\n", escape_markdown(&plant.name)));
        if let Some(plant_type) = &plant.plant_type {
            message.push_str(&format!("   Type: {}\n", escape_markdown(plant_type)));
        }
        message.push_str(&format!("   Every {} day(s)\n", plant.interval_days));

        let status = match evaluation.status {
            WateringStatus::NeverWatered => {
                message.push_str("   ⚠️ Never watered. Water it soon!\n\n");
                continue;
            }
            WateringStatus::Overdue { days } => format!("⚠️ Needs water (overdue by {} days)", days),
            WateringStatus::DueToday => "💧 Needs water today".to_string(),
            WateringStatus::OnSchedule { days } => format!("✅ Next watering in {} day(s)", days),
        };
        if let Some(days_ago) = evaluation.days_since_watered {
            message.push_str(&format!("   Last watered: {} day(s) ago\n", days_ago));
        }
        message.push_str(&format!("   {}\n\n", status));
    }
    message
}

pub fn pending_list(pending: &[PendingPlant]) -> String {
    let mut message = String::from("⚠️ *Plants that need water:*\n\n");
    for plant in pending {
        let name = escape_markdown(&plant.name);
        let line = match plant.status {
            WateringStatus::NeverWatered => format!("🌱 {} - Never watered\n", name),
            WateringStatus::DueToday => format!("🌱 {} - Needs water today\n", name),
            WateringStatus::Overdue { days } => format!("🌱 {} - Overdue by {} day(s)\n", name, days),
            WateringStatus::OnSchedule { .. } => continue,
        };
        message.push_str(&line);
    }
    message.push_str("\nUse /water to log a watering.");
    message
}

pub fn history(entries: &[WateringHistoryEntry]) -> String {
    let mut message = String::from("📊 *Watering history:*\n\n");
    for entry in entries {
        message.push_str(&format!(
            "💧 {} - {}\n",
            escape_markdown(&entry.plant_name),
            day_format(entry.watered_at)
        ));
    }
    message
}

pub fn group_list(groups: &[GroupSummary]) -> String {
    let mut message = String::from("📍 *Your groups:*\n\n");
    for group in groups {
        message.push_str(&format!(
            "📦 *{}* - {} plant(s)\n",
            escape_markdown(&group.name),
            group.plant_count
        ));
    }
    message
}

pub fn stats(stats: &WateringStats) -> String {
    let mut message = String::from("📊 *Your statistics:*\n\n");
    message.push_str(&format!("🌱 Total plants: *{}*\n", stats.total_plants));
    message.push_str(&format!("💧 Total waterings: *{}*\n", stats.total_waterings));
    message.push_str(&format!("📅 Days active: *{}*\n", stats.days_active));
    if let Some(top) = &stats.most_watered {
        message.push_str(&format!(
            "🏆 Most watered plant: *{}* ({} waterings)\n",
            escape_markdown(&top.plant_name),
            top.waterings
        ));
    }
    if let Some(average) = stats.average_per_plant() {
        message.push_str(&format!("📈 Average waterings per plant: *{:.1}*\n", average));
    }
    message
}

pub fn photo_caption(photo: &PlantPhoto) -> String {
    let date = photo.uploaded_at.format("%d/%m/%Y");
    match &photo.caption {
        Some(caption) => format!("📅 {}\n{}", date, caption),
        None => format!("📅 {}", date),
    }
}
