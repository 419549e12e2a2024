use super::send_error;
use crate::timezones;
use crate::ui::{embeds, paginator};
use crate::{Context, Error};
use chrono::Utc;

const SEARCH_LIMIT: usize = 400;
const SEARCH_PAGE_SIZE: usize = 20;
const SUGGESTION_COUNT: usize = 5;

/// Timezone preferences
#[poise::command(slash_command, prefix_command, subcommands("set", "check", "list"))]
pub async fn timezone(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Set your timezone
#[poise::command(slash_command, prefix_command)]
pub async fn set(
    ctx: Context<'_>,
    #[description = "IANA name, country, abbreviation, or flag emoji"]
    #[rest]
    zone: String,
) -> Result<(), Error> {
    let Some(tz) = timezones::resolve_alias(zone.trim()) else {
        let suggestions = timezones::search(zone.trim(), SUGGESTION_COUNT);
        let reason = if suggestions.is_empty() {
            "Unknown timezone.".to_string()
        } else {
            format!("Unknown timezone. Did you mean: {}?", suggestions.join(", "))
        };
        send_error(
            ctx,
            "Couldn't set your timezone",
            &reason,
            Some("timezone set Europe/Berlin"),
        )
        .await?;
        return Ok(());
    };
    ctx.data().timezones.set(ctx.author().id.get(), tz).await?;
    let now = Utc::now().with_timezone(&tz);
    ctx.say(format!(
        "✅ Timezone set to `{}`. Your local time is {}.",
        tz.name(),
        now.format("%H:%M")
    ))
    .await?;
    Ok(())
}

/// Show the current time in a timezone
#[poise::command(slash_command, prefix_command)]
pub async fn check(
    ctx: Context<'_>,
    #[description = "Timezone to check (defaults to yours)"]
    #[rest]
    zone: Option<String>,
) -> Result<(), Error> {
    let tz = match zone.as_deref().map(str::trim).filter(|z| !z.is_empty()) {
        Some(raw) => match timezones::resolve_alias(raw) {
            Some(tz) => tz,
            None => {
                send_error(
                    ctx,
                    "Unknown timezone",
                    "That doesn't match any timezone I know.",
                    Some("timezone check Asia/Tokyo"),
                )
                .await?;
                return Ok(());
            }
        },
        None => ctx.data().timezones.get(ctx.author().id.get()).await?,
    };
    let now = Utc::now().with_timezone(&tz);
    ctx.say(format!(
        "🕒 `{}` — {}",
        tz.name(),
        now.format("%A %H:%M (%Y-%m-%d)")
    ))
    .await?;
    Ok(())
}

/// Search the timezone database
#[poise::command(slash_command, prefix_command)]
pub async fn list(
    ctx: Context<'_>,
    #[description = "Substring to search for"]
    #[rest]
    search: Option<String>,
) -> Result<(), Error> {
    let query = search.unwrap_or_default();
    let matches = timezones::search(query.trim(), SEARCH_LIMIT);
    if matches.is_empty() {
        send_error(
            ctx,
            "No matches",
            "No timezone contains that text.",
            Some("timezone list berlin"),
        )
        .await?;
        return Ok(());
    }
    let lines: Vec<String> = matches.iter().map(|name| format!("`{name}`")).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let pages = embeds::text_list_pages("🌍 Timezones", &refs, SEARCH_PAGE_SIZE);
    paginator::paginate_embeds(ctx, pages).await
}
