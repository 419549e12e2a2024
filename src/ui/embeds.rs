//! Embed builders shared by commands, the dispatcher, and interaction
//! handlers. All due times render as Discord `<t:..>` stamps so every reader
//! sees their own local time.

use crate::db::{GuildConfig, ReminderRecord, ReminderStatus};
use crate::services::reminder::ReminderService;
use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, CreateEmbedFooter};

pub const COLOR_BLURPLE: u32 = 0x5865F2;
pub const COLOR_GREEN: u32 = 0x57F287;
pub const COLOR_RED: u32 = 0xED4245;
pub const COLOR_YELLOW: u32 = 0xFEE75C;

pub fn delivery_embed(reminder: &ReminderRecord) -> CreateEmbed {
    let created = reminder.created_at.timestamp();
    let mut embed = CreateEmbed::new()
        .title("⏰ Reminder")
        .description(format!("```\n{}\n```", upcase_first(&reminder.text)))
        .field(
            "Created",
            format!("<t:{created}:F> (<t:{created}:R>)"),
            false,
        )
        .footer(CreateEmbedFooter::new(format!(
            "Reminder ID: {}",
            reminder.id
        )))
        .color(COLOR_BLURPLE);
    if let Some(recurrence) = reminder.recurring {
        embed = embed.field("Recurring", format!("Every {}", recurrence.as_str()), true);
    }
    embed
}

pub fn confirmation_embed(
    reminder: &ReminderRecord,
    conflict: Option<&ReminderRecord>,
) -> CreateEmbed {
    let ts = reminder.due.timestamp();
    let mut embed = CreateEmbed::new()
        .title("✅ Reminder set")
        .description(reminder.text.clone())
        .field("Due", format!("<t:{ts}:F> (<t:{ts}:R>)"), false)
        .field("Timezone", reminder.timezone.clone(), true)
        .footer(CreateEmbedFooter::new(format!(
            "Reminder ID: {}",
            reminder.id
        )))
        .color(COLOR_GREEN);
    if let Some(recurrence) = reminder.recurring {
        embed = embed.field(
            "Repeats",
            ReminderService::recurrence_label(recurrence),
            true,
        );
    }
    if let Some(other) = conflict {
        let other_ts = other.due.timestamp();
        embed = embed.field(
            "⚠️ Heads up",
            format!(
                "You already have \"{}\" due <t:{other_ts}:R>.",
                truncate(&other.text, 60)
            ),
            false,
        );
    }
    embed
}

pub fn error_embed(title: &str, reason: &str, example: Option<&str>) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("❌ {title}"))
        .description(reason.to_string())
        .color(COLOR_RED);
    if let Some(example) = example {
        embed = embed.field("Example", format!("`{example}`"), false);
    }
    embed
}

/// One listing line per reminder.
pub fn reminder_line(reminder: &ReminderRecord) -> String {
    let ts = reminder.due.timestamp();
    let mut line = format!(
        "`{}` — {} — <t:{ts}:R>",
        reminder.id,
        truncate(&reminder.text, 80)
    );
    if let Some(recurrence) = reminder.recurring {
        line.push_str(&format!(
            " ({})",
            ReminderService::recurrence_label(recurrence)
        ));
    }
    if reminder.status == ReminderStatus::Paused {
        line.push_str(" ⏸️");
    }
    if reminder.undelivered {
        line.push_str(" ⚠️");
    }
    line
}

/// Chunks reminders into listing pages, `per_page` lines each.
pub fn reminder_list_pages(
    title: &str,
    reminders: &[ReminderRecord],
    per_page: usize,
) -> Vec<CreateEmbed> {
    let total_pages = reminders.len().div_ceil(per_page);
    reminders
        .chunks(per_page)
        .enumerate()
        .map(|(i, chunk)| {
            let body: Vec<String> = chunk.iter().map(reminder_line).collect();
            CreateEmbed::new()
                .title(title.to_string())
                .description(body.join("\n"))
                .footer(CreateEmbedFooter::new(format!(
                    "Page {}/{} — {} total",
                    i + 1,
                    total_pages,
                    reminders.len()
                )))
                .color(COLOR_BLURPLE)
        })
        .collect()
}

/// Same chunking for plain text lines, used by the timezone search.
pub fn text_list_pages(title: &str, lines: &[&str], per_page: usize) -> Vec<CreateEmbed> {
    let total_pages = lines.len().div_ceil(per_page);
    lines
        .chunks(per_page)
        .enumerate()
        .map(|(i, chunk)| {
            CreateEmbed::new()
                .title(title.to_string())
                .description(chunk.join("\n"))
                .footer(CreateEmbedFooter::new(format!(
                    "Page {}/{} — {} total",
                    i + 1,
                    total_pages,
                    lines.len()
                )))
                .color(COLOR_BLURPLE)
        })
        .collect()
}

/// Full detail card, used when a listing has exactly one entry.
pub fn reminder_detail_embed(reminder: &ReminderRecord) -> CreateEmbed {
    let ts = reminder.due.timestamp();
    let status = match reminder.status {
        ReminderStatus::Active => "active",
        ReminderStatus::Paused => "paused",
        ReminderStatus::Completed => "completed",
    };
    let repeats = reminder
        .recurring
        .map(ReminderService::recurrence_label)
        .unwrap_or("one-time");
    CreateEmbed::new()
        .title("📌 Reminder")
        .description(reminder.text.clone())
        .field("Due", format!("<t:{ts}:F> (<t:{ts}:R>)"), false)
        .field("Status", status, true)
        .field("Repeats", repeats, true)
        .field("Timezone", reminder.timezone.clone(), true)
        .footer(CreateEmbedFooter::new(format!(
            "Reminder ID: {}",
            reminder.id
        )))
        .color(COLOR_BLURPLE)
}

pub fn guild_config_embed(config: &GuildConfig) -> CreateEmbed {
    let channel = config
        .target_channel
        .as_deref()
        .map(|c| format!("<#{c}>"))
        .unwrap_or_else(|| "not set".to_string());
    let role = config
        .ping_role
        .as_deref()
        .map(|r| format!("<@&{r}>"))
        .unwrap_or_else(|| "not set".to_string());
    let voice = config
        .voice_channel
        .as_deref()
        .map(|c| format!("<#{c}>"))
        .unwrap_or_else(|| "not set".to_string());
    let timezones = if config.timezones.is_empty() {
        "none".to_string()
    } else {
        config.timezones.join(", ")
    };
    CreateEmbed::new()
        .title("🔔 Notification settings")
        .field("Channel", channel, true)
        .field("Ping role", role, true)
        .field("Voice channel", voice, true)
        .field(
            "Speaker",
            config.speaker.as_deref().unwrap_or("not set"),
            true,
        )
        .field("Timezones", timezones, false)
        .color(COLOR_BLURPLE)
}

fn upcase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Recurrence;
    use chrono::{TimeZone, Utc};

    fn record() -> ReminderRecord {
        ReminderRecord {
            id: "42_1748856600".to_string(),
            user_id: "42".to_string(),
            channel_id: Some("555".to_string()),
            guild_id: Some("777".to_string()),
            text: "water the plants".to_string(),
            due: Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            timezone: "UTC".to_string(),
            recurring: None,
            status: ReminderStatus::Active,
            undelivered: false,
            failed_ticks: 0,
            completed_at: None,
            completed_note: None,
            last_delivered_at: None,
        }
    }

    #[test]
    fn test_reminder_line_markers() {
        let mut rec = record();
        let line = reminder_line(&rec);
        assert!(line.contains("42_1748856600"));
        assert!(line.contains("<t:1748856600:R>"));
        assert!(!line.contains("⚠️"));

        rec.undelivered = true;
        rec.recurring = Some(Recurrence::Daily);
        rec.status = ReminderStatus::Paused;
        let line = reminder_line(&rec);
        assert!(line.contains("every day"));
        assert!(line.contains("⏸️"));
        assert!(line.contains("⚠️"));
    }

    #[test]
    fn test_list_pagination_chunks() {
        let records: Vec<ReminderRecord> = (0..12)
            .map(|i| {
                let mut r = record();
                r.id = format!("r{i}");
                r
            })
            .collect();
        let pages = reminder_list_pages("Your reminders", &records, 5);
        assert_eq!(pages.len(), 3);
    }

    #[test]
    fn test_upcase_first() {
        assert_eq!(upcase_first("water the plants"), "Water the plants");
        assert_eq!(upcase_first("übung"), "Übung");
        assert_eq!(upcase_first(""), "");
    }

    #[test]
    fn test_truncate_long_text() {
        let long = "x".repeat(200);
        let t = truncate(&long, 80);
        assert_eq!(t.chars().count(), 81);
        assert!(t.ends_with('…'));
    }
}
