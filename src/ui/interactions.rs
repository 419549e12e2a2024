//! Buttons, selects, and modals attached to reminder messages, plus the
//! global handler that routes them. Component custom ids carry a
//! `rem:{action}:{reminder_id}[:{arg}]` envelope so controls keep working
//! after a restart, when no in-process collector remembers the message.

use crate::db::{Recurrence, ReminderPatch, ReminderRecord, ReminderStatus};
use crate::services::reminder::{NewReminder, ReminderService};
use crate::timeparse;
use crate::ui::embeds;
use crate::Data;
use chrono::Utc;
use chrono_tz::Tz;
use poise::serenity_prelude as serenity;
use serenity::{
    ActionRowComponent, ButtonStyle, ComponentInteraction, ComponentInteractionDataKind,
    CreateActionRow, CreateButton, CreateInputText, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateModal, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, InputTextStyle, Interaction, ModalInteraction,
};
use std::str::FromStr;
use tracing::{debug, warn};

const ENVELOPE_PREFIX: &str = "rem";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Delete,
    Snooze,
    Recur,
    Edit,
    Pause,
    Close,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Delete => "del",
            Action::Snooze => "snooze",
            Action::Recur => "recur",
            Action::Edit => "edit",
            Action::Pause => "pause",
            Action::Close => "close",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "del" => Some(Action::Delete),
            "snooze" => Some(Action::Snooze),
            "recur" => Some(Action::Recur),
            "edit" => Some(Action::Edit),
            "pause" => Some(Action::Pause),
            "close" => Some(Action::Close),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub action: Action,
    pub reminder_id: &'a str,
    pub arg: Option<&'a str>,
}

pub fn encode(action: Action, reminder_id: &str, arg: Option<&str>) -> String {
    match arg {
        Some(arg) => format!("{ENVELOPE_PREFIX}:{}:{reminder_id}:{arg}", action.as_str()),
        None => format!("{ENVELOPE_PREFIX}:{}:{reminder_id}", action.as_str()),
    }
}

/// Reminder ids never contain colons, so a plain split is unambiguous.
pub fn parse(custom_id: &str) -> Option<Envelope<'_>> {
    let mut parts = custom_id.splitn(4, ':');
    if parts.next()? != ENVELOPE_PREFIX {
        return None;
    }
    let action = Action::parse(parts.next()?)?;
    let reminder_id = parts.next()?;
    if reminder_id.is_empty() {
        return None;
    }
    Some(Envelope {
        action,
        reminder_id,
        arg: parts.next(),
    })
}

const SNOOZE_CHOICES: [(&str, &str); 3] = [("30m", "Snooze 30m"), ("1h", "Snooze 1h"), ("1d", "Snooze 1d")];

fn recurrence_select(reminder_id: &str) -> CreateSelectMenu {
    let options = vec![
        CreateSelectMenuOption::new("Repeat daily", "daily"),
        CreateSelectMenuOption::new("Repeat weekly", "weekly"),
        CreateSelectMenuOption::new("Repeat monthly", "monthly"),
        CreateSelectMenuOption::new("One-time", "one-time"),
    ];
    CreateSelectMenu::new(
        encode(Action::Recur, reminder_id, None),
        CreateSelectMenuKind::String { options },
    )
    .placeholder("Set repeat schedule")
    .min_values(1)
    .max_values(1)
}

/// Rows attached to a delivered reminder: snooze shortcuts and a repeat
/// select.
pub fn delivery_components(reminder_id: &str) -> Vec<CreateActionRow> {
    let mut buttons: Vec<CreateButton> = SNOOZE_CHOICES
        .iter()
        .map(|(arg, label)| {
            CreateButton::new(encode(Action::Snooze, reminder_id, Some(arg)))
                .label(*label)
                .style(ButtonStyle::Secondary)
        })
        .collect();
    buttons.push(
        CreateButton::new(encode(Action::Close, reminder_id, None))
            .label("Dismiss")
            .style(ButtonStyle::Primary),
    );
    vec![
        CreateActionRow::Buttons(buttons),
        CreateActionRow::SelectMenu(recurrence_select(reminder_id)),
    ]
}

/// Rows attached to a single-reminder detail card.
pub fn detail_components(record: &ReminderRecord) -> Vec<CreateActionRow> {
    let pause_label = if record.status == ReminderStatus::Paused {
        "Resume"
    } else {
        "Pause"
    };
    vec![
        CreateActionRow::Buttons(vec![
            CreateButton::new(encode(Action::Edit, &record.id, None))
                .label("Edit")
                .style(ButtonStyle::Primary),
            CreateButton::new(encode(Action::Pause, &record.id, None))
                .label(pause_label)
                .style(ButtonStyle::Secondary),
            CreateButton::new(encode(Action::Delete, &record.id, None))
                .label("Delete")
                .style(ButtonStyle::Danger),
            CreateButton::new(encode(Action::Close, &record.id, None))
                .label("Close")
                .style(ButtonStyle::Secondary),
        ]),
        CreateActionRow::SelectMenu(recurrence_select(&record.id)),
    ]
}

pub fn confirm_delete_row(reminder_id: &str) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![CreateButton::new(encode(
        Action::Delete,
        reminder_id,
        None,
    ))
    .label("🗑️ Delete")
    .style(ButtonStyle::Danger)])]
}

/// Entry point wired into the gateway event handler. Interactions whose
/// custom id does not carry the envelope belong to command-local
/// collectors and are left alone.
pub async fn handle_interaction(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &Interaction,
) -> Result<(), crate::Error> {
    match interaction {
        Interaction::Component(component) => handle_component(ctx, data, component).await,
        Interaction::Modal(modal) => handle_modal(ctx, data, modal).await,
        _ => Ok(()),
    }
}

fn authorized(record: &ReminderRecord, user_id: serenity::UserId, member: Option<&serenity::Member>) -> bool {
    if user_id.to_string() == record.user_id {
        return true;
    }
    member
        .and_then(|m| m.permissions)
        .is_some_and(|p| p.manage_guild())
}

async fn handle_component(
    ctx: &serenity::Context,
    data: &Data,
    component: &ComponentInteraction,
) -> Result<(), crate::Error> {
    let Some(envelope) = parse(&component.data.custom_id) else {
        return Ok(());
    };
    debug!(
        custom_id = %component.data.custom_id,
        user = %component.user.id,
        "reminder component interaction"
    );

    let Some(mut record) = data.reminders.get(envelope.reminder_id).await? else {
        respond_ephemeral(ctx, component, "❌ That reminder no longer exists.").await?;
        return Ok(());
    };
    if !authorized(&record, component.user.id, component.member.as_ref()) {
        respond_ephemeral(
            ctx,
            component,
            "❌ Only the reminder's owner can use these controls.",
        )
        .await?;
        return Ok(());
    }

    match envelope.action {
        Action::Close => {
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new().components(Vec::new()),
                    ),
                )
                .await?;
        }
        Action::Delete => {
            data.reminders.delete_any(&record.id).await?;
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new()
                            .content("🗑️ Reminder deleted.")
                            .embeds(Vec::new())
                            .components(Vec::new()),
                    ),
                )
                .await?;
        }
        Action::Pause => {
            if record.status == ReminderStatus::Completed {
                respond_ephemeral(ctx, component, "⏳ That reminder has already completed.")
                    .await?;
                return Ok(());
            }
            let next = if record.status == ReminderStatus::Paused {
                ReminderStatus::Active
            } else {
                ReminderStatus::Paused
            };
            data.reminders.set_status(&record.id, next).await?;
            record.status = next;
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::reminder_detail_embed(&record))
                            .components(detail_components(&record)),
                    ),
                )
                .await?;
        }
        Action::Snooze => {
            let Some(duration) = envelope.arg.and_then(parse_snooze) else {
                warn!(custom_id = %component.data.custom_id, "snooze button with bad duration");
                respond_ephemeral(ctx, component, "❌ Unknown snooze duration.").await?;
                return Ok(());
            };
            let due = Utc::now() + duration;
            if record.status == ReminderStatus::Completed {
                // Delivery marked it done; snoozing schedules a fresh copy.
                let new = NewReminder {
                    user_id: record.user_id.parse().unwrap_or_default(),
                    channel_id: record.channel_id.as_deref().and_then(|c| c.parse().ok()),
                    guild_id: record.guild_id.as_deref().and_then(|g| g.parse().ok()),
                    text: record.text.clone(),
                    due,
                    timezone: Tz::from_str(&record.timezone).unwrap_or(chrono_tz::UTC),
                    recurring: record.recurring,
                };
                data.reminders.create(new).await?;
            } else {
                let patch = ReminderPatch {
                    due: Some(due),
                    undelivered: Some(false),
                    failed_ticks: Some(0),
                    ..Default::default()
                };
                data.reminders.update(&record.id, patch).await?;
            }
            let ts = due.timestamp();
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new()
                            .content(format!("😴 Snoozed, due <t:{ts}:R>."))
                            .components(Vec::new()),
                    ),
                )
                .await?;
        }
        Action::Recur => {
            if record.status == ReminderStatus::Completed {
                respond_ephemeral(ctx, component, "⏳ That reminder has already completed.")
                    .await?;
                return Ok(());
            }
            let ComponentInteractionDataKind::StringSelect { values } = &component.data.kind
            else {
                return Ok(());
            };
            let Some(choice) = values.first() else {
                return Ok(());
            };
            let recurring = Recurrence::parse(choice);
            data.reminders.set_recurrence(&record.id, recurring).await?;
            let ack = match recurring {
                Some(recurrence) => format!(
                    "🔁 This reminder now repeats {}.",
                    ReminderService::recurrence_label(recurrence)
                ),
                None => "🔁 This reminder is now one-time.".to_string(),
            };
            respond_ephemeral(ctx, component, &ack).await?;
        }
        Action::Edit => {
            if record.status == ReminderStatus::Completed {
                respond_ephemeral(ctx, component, "⏳ That reminder has already completed.")
                    .await?;
                return Ok(());
            }
            component
                .create_response(&ctx.http, edit_modal(&record))
                .await?;
        }
    }
    Ok(())
}

fn edit_modal(record: &ReminderRecord) -> CreateInteractionResponse {
    let modal = CreateModal::new(encode(Action::Edit, &record.id, None), "Edit reminder")
        .components(vec![
            CreateActionRow::InputText(
                CreateInputText::new(InputTextStyle::Paragraph, "Text", "text")
                    .value(record.text.clone())
                    .required(false),
            ),
            CreateActionRow::InputText(
                CreateInputText::new(InputTextStyle::Short, "When", "when")
                    .placeholder("tomorrow 9am, in 2 hours, ...")
                    .required(false),
            ),
        ]);
    CreateInteractionResponse::Modal(modal)
}

async fn handle_modal(
    ctx: &serenity::Context,
    data: &Data,
    modal: &ModalInteraction,
) -> Result<(), crate::Error> {
    let Some(envelope) = parse(&modal.data.custom_id) else {
        return Ok(());
    };
    if envelope.action != Action::Edit {
        return Ok(());
    }

    let Some(record) = data.reminders.get(envelope.reminder_id).await? else {
        respond_modal_ephemeral(ctx, modal, "❌ That reminder no longer exists.").await?;
        return Ok(());
    };
    if !authorized(&record, modal.user.id, modal.member.as_ref()) {
        respond_modal_ephemeral(
            ctx,
            modal,
            "❌ Only the reminder's owner can use these controls.",
        )
        .await?;
        return Ok(());
    }

    let mut text_input = None;
    let mut when_input = None;
    for row in &modal.data.components {
        for item in &row.components {
            if let ActionRowComponent::InputText(input) = item {
                let value = input.value.as_deref().unwrap_or("").trim().to_string();
                match input.custom_id.as_str() {
                    "text" => text_input = Some(value),
                    "when" => when_input = Some(value),
                    _ => {}
                }
            }
        }
    }

    let mut patch = ReminderPatch::default();
    if let Some(text) = text_input.filter(|t| !t.is_empty()) {
        let sanitized = ReminderService::sanitize_text(&text);
        if sanitized != record.text {
            patch.text = Some(sanitized);
        }
    }
    if let Some(when) = when_input.filter(|w| !w.is_empty()) {
        let tz = data.timezones.get(modal.user.id.get()).await?;
        match timeparse::parse_when(&when, tz, Utc::now()) {
            Ok(due) => {
                patch.due = Some(due);
                patch.undelivered = Some(false);
                patch.failed_ticks = Some(0);
            }
            Err(e) => {
                modal
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new()
                                .embed(embeds::error_embed(
                                    "Couldn't update the time",
                                    &e.to_string(),
                                    Some("tomorrow 9am"),
                                ))
                                .ephemeral(true),
                        ),
                    )
                    .await?;
                return Ok(());
            }
        }
    }

    if patch.is_empty() {
        respond_modal_ephemeral(ctx, modal, "Nothing to change.").await?;
        return Ok(());
    }
    data.reminders.update(&record.id, patch).await?;
    respond_modal_ephemeral(ctx, modal, "✏️ Reminder updated.").await?;
    Ok(())
}

fn parse_snooze(arg: &str) -> Option<chrono::Duration> {
    let std = humantime::parse_duration(arg).ok()?;
    chrono::Duration::from_std(std).ok()
}

async fn respond_ephemeral(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    content: &str,
) -> serenity::Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await
}

async fn respond_modal_ephemeral(
    ctx: &serenity::Context,
    modal: &ModalInteraction,
    content: &str,
) -> serenity::Result<()> {
    modal
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let id = encode(Action::Snooze, "42_1748856600_3", Some("30m"));
        assert_eq!(id, "rem:snooze:42_1748856600_3:30m");
        let envelope = parse(&id).unwrap();
        assert_eq!(envelope.action, Action::Snooze);
        assert_eq!(envelope.reminder_id, "42_1748856600_3");
        assert_eq!(envelope.arg, Some("30m"));

        let id = encode(Action::Delete, "42_1748856600", None);
        let envelope = parse(&id).unwrap();
        assert_eq!(envelope.action, Action::Delete);
        assert_eq!(envelope.reminder_id, "42_1748856600");
        assert_eq!(envelope.arg, None);
    }

    #[test]
    fn test_parse_rejects_foreign_ids() {
        assert!(parse("page_prev").is_none());
        assert!(parse("rem:unknown:42_1").is_none());
        assert!(parse("rem:del").is_none());
        assert!(parse("rem:del:").is_none());
        assert!(parse("1234567890_next").is_none());
    }

    #[test]
    fn test_snooze_durations() {
        assert_eq!(parse_snooze("30m"), Some(chrono::Duration::minutes(30)));
        assert_eq!(parse_snooze("1h"), Some(chrono::Duration::hours(1)));
        assert_eq!(parse_snooze("1d"), Some(chrono::Duration::days(1)));
        assert!(parse_snooze("soon").is_none());
    }

    #[test]
    fn test_delivery_components_layout() {
        let rows = delivery_components("42_1");
        assert_eq!(rows.len(), 2);
        match &rows[0] {
            CreateActionRow::Buttons(buttons) => assert_eq!(buttons.len(), 4),
            _ => panic!("expected button row"),
        }
        assert!(matches!(rows[1], CreateActionRow::SelectMenu(_)));
    }
}
