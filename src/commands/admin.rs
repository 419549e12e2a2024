use super::send_error;
use crate::ui::{embeds, paginator};
use crate::{Context, Error};
use chrono::{Duration, Utc};
use tracing::info;

const ADMIN_PAGE_SIZE: usize = 5;
const MAX_ADMIN_LISTED: usize = 200;

/// Administrative reminder tools
#[poise::command(
    slash_command,
    prefix_command,
    subcommands("list", "due", "user", "delete", "cleanup"),
    required_permissions = "MANAGE_GUILD",
    guild_only
)]
pub async fn remindadmin(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn listing_allowed(ctx: Context<'_>) -> Result<bool, Error> {
    if ctx.data().limits.allow_admin_listing(ctx.author().id.get()) {
        return Ok(true);
    }
    send_error(
        ctx,
        "Slow down",
        "You can run at most 2 admin listings per 30 seconds.",
        None,
    )
    .await?;
    Ok(false)
}

async fn send_listing(
    ctx: Context<'_>,
    title: &str,
    records: Vec<crate::db::ReminderRecord>,
) -> Result<(), Error> {
    if records.is_empty() {
        ctx.say("📭 Nothing to show.").await?;
        return Ok(());
    }
    let pages = embeds::reminder_list_pages(title, &records, ADMIN_PAGE_SIZE);
    paginator::paginate_embeds(ctx, pages).await
}

/// List all active reminders
#[poise::command(slash_command, prefix_command)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    if !listing_allowed(ctx).await? {
        return Ok(());
    }
    let records = ctx.data().reminders.list_all_active(MAX_ADMIN_LISTED).await?;
    send_listing(ctx, "📋 All active reminders", records).await
}

/// List reminders due within the next hours
#[poise::command(slash_command, prefix_command)]
pub async fn due(
    ctx: Context<'_>,
    #[description = "Look-ahead window in hours"]
    #[min = 1]
    #[max = 720]
    hours: u32,
) -> Result<(), Error> {
    if !listing_allowed(ctx).await? {
        return Ok(());
    }
    let cutoff = Utc::now() + Duration::hours(i64::from(hours));
    let records = ctx.data().reminders.list_due(cutoff, MAX_ADMIN_LISTED).await?;
    send_listing(ctx, &format!("📋 Due within {hours} h"), records).await
}

/// List a user's reminders
#[poise::command(slash_command, prefix_command)]
pub async fn user(
    ctx: Context<'_>,
    #[description = "Whose reminders to list"] user: poise::serenity_prelude::User,
) -> Result<(), Error> {
    if !listing_allowed(ctx).await? {
        return Ok(());
    }
    let records = ctx
        .data()
        .reminders
        .list_user(user.id.get(), MAX_ADMIN_LISTED)
        .await?;
    send_listing(ctx, &format!("📋 Reminders for {}", user.name), records).await
}

/// Delete any reminder by id
#[poise::command(slash_command, prefix_command)]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Reminder id"] id: String,
) -> Result<(), Error> {
    let id = id.trim();
    let deleted = ctx.data().reminders.delete_any(id).await?;
    if deleted == 0 {
        send_error(ctx, "Nothing deleted", "No reminder has that id.", None).await?;
        return Ok(());
    }
    info!(id, admin = ctx.author().id.get(), "reminder deleted by admin");
    ctx.say(format!("🗑️ Reminder `{id}` deleted.")).await?;
    Ok(())
}

/// Prune completed reminders older than a number of days
#[poise::command(slash_command, prefix_command)]
pub async fn cleanup(
    ctx: Context<'_>,
    #[description = "Age threshold in days"]
    #[min = 1]
    #[max = 365]
    days: u32,
) -> Result<(), Error> {
    let pruned = ctx
        .data()
        .reminders
        .cleanup_completed(i64::from(days))
        .await?;
    info!(pruned, days, admin = ctx.author().id.get(), "manual cleanup");
    ctx.say(format!(
        "🧹 Pruned {pruned} completed reminders older than {days} days."
    ))
    .await?;
    Ok(())
}
