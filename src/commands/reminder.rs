use super::send_error;
use crate::services::reminder::{NewReminder, ReminderService};
use crate::timeparse;
use crate::ui::{embeds, interactions, paginator};
use crate::{Context, Error};
use chrono::Utc;
use tracing::info;

const LIST_PAGE_SIZE: usize = 5;
const MAX_LISTED: usize = 100;

/// Set a reminder
#[poise::command(slash_command, prefix_command, aliases("remindme"))]
pub async fn remind(
    ctx: Context<'_>,
    #[description = "When and what, e.g. \"in 2 hours to stretch\""]
    #[rest]
    input: String,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    if !ctx.data().limits.allow_creation(user_id) {
        send_error(
            ctx,
            "Slow down",
            "You can create at most 3 reminders per minute.",
            None,
        )
        .await?;
        return Ok(());
    }

    let tz = ctx.data().timezones.get(user_id).await?;
    let parsed = match timeparse::parse_reminder_input(&input, tz, Utc::now()) {
        Ok(parsed) => parsed,
        Err(e) => {
            send_error(
                ctx,
                "Couldn't set that reminder",
                &e.to_string(),
                Some("remind in 2 hours to stretch"),
            )
            .await?;
            return Ok(());
        }
    };

    let text = ReminderService::sanitize_text(&parsed.text);
    if text.is_empty() {
        send_error(
            ctx,
            "Couldn't set that reminder",
            "The reminder text is empty.",
            Some("remind tomorrow 9am to water the plants"),
        )
        .await?;
        return Ok(());
    }

    let conflict = ctx
        .data()
        .reminders
        .check_conflict(user_id, parsed.due)
        .await?;
    let record = ctx
        .data()
        .reminders
        .create(NewReminder {
            user_id,
            channel_id: Some(ctx.channel_id().get()),
            guild_id: ctx.guild_id().map(|g| g.get()),
            text,
            due: parsed.due,
            timezone: tz,
            recurring: None,
        })
        .await?;
    info!(id = %record.id, user = user_id, due = %record.due, "reminder created");

    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::confirmation_embed(&record, conflict.as_ref()))
            .components(interactions::confirm_delete_row(&record.id)),
    )
    .await?;
    Ok(())
}

/// List your reminders
#[poise::command(slash_command, prefix_command)]
pub async fn reminders(ctx: Context<'_>) -> Result<(), Error> {
    let list = ctx
        .data()
        .reminders
        .list_user(ctx.author().id.get(), MAX_LISTED)
        .await?;
    if list.is_empty() {
        ctx.say("📭 You have no reminders.").await?;
        return Ok(());
    }
    if let [record] = list.as_slice() {
        ctx.send(
            poise::CreateReply::default()
                .embed(embeds::reminder_detail_embed(record))
                .components(interactions::detail_components(record)),
        )
        .await?;
        return Ok(());
    }
    let active = ctx
        .data()
        .reminders
        .count_user_active(ctx.author().id.get())
        .await?;
    let pages = embeds::reminder_list_pages(
        &format!("📋 Your reminders ({active} active)"),
        &list,
        LIST_PAGE_SIZE,
    );
    paginator::paginate_embeds(ctx, pages).await
}

/// Delete one of your reminders by id
#[poise::command(slash_command, prefix_command)]
pub async fn delreminder(
    ctx: Context<'_>,
    #[description = "Reminder id from the listing footer"] id: String,
) -> Result<(), Error> {
    let id = id.trim();
    let deleted = ctx
        .data()
        .reminders
        .delete_own(id, ctx.author().id.get())
        .await?;
    if deleted == 0 {
        send_error(
            ctx,
            "Nothing deleted",
            "You have no reminder with that id.",
            Some("delreminder 42_1748856600"),
        )
        .await?;
        return Ok(());
    }
    ctx.say(format!("🗑️ Reminder `{id}` deleted.")).await?;
    Ok(())
}
