use super::send_error;
use crate::db::GuildConfig;
use crate::ui::embeds;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;

/// Reminder notification settings for this server
#[poise::command(
    slash_command,
    prefix_command,
    subcommands("setup", "show"),
    required_permissions = "MANAGE_GUILD",
    guild_only
)]
pub async fn notify(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Splits a comma-separated zone list into resolved names and rejects.
fn parse_zone_list(raw: &str) -> (Vec<String>, Vec<String>) {
    let mut resolved = Vec::new();
    let mut unknown = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match crate::timezones::resolve_alias(part) {
            Some(tz) => resolved.push(tz.name().to_string()),
            None => unknown.push(part.to_string()),
        }
    }
    (resolved, unknown)
}

/// Configure where reminder notifications go
#[poise::command(slash_command, prefix_command)]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Text channel for announcements"]
    #[channel_types("Text")]
    channel: Option<serenity::GuildChannel>,
    #[description = "Role to ping"] role: Option<serenity::Role>,
    #[description = "Voice channel for spoken announcements"]
    #[channel_types("Voice")]
    voice: Option<serenity::GuildChannel>,
    #[description = "Speaker voice name"] speaker: Option<String>,
    #[description = "Comma-separated timezones to announce"] zones: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;

    let (resolved_zones, unknown_zones) = zones
        .as_deref()
        .map(parse_zone_list)
        .unwrap_or((Vec::new(), Vec::new()));
    if !unknown_zones.is_empty() {
        send_error(
            ctx,
            "Couldn't save notification settings",
            &format!("Unknown timezones: {}", unknown_zones.join(", ")),
            Some("Europe/Berlin, America/New_York"),
        )
        .await?;
        return Ok(());
    }

    // Partial setup keeps previously stored fields.
    let mut config = ctx
        .data()
        .guild_configs
        .get(guild_id.get())
        .await?
        .unwrap_or_default();
    config.guild_id = guild_id.get().to_string();
    if let Some(channel) = channel {
        config.target_channel = Some(channel.id.get().to_string());
    }
    if let Some(role) = role {
        config.ping_role = Some(role.id.get().to_string());
    }
    if let Some(voice) = voice {
        config.voice_channel = Some(voice.id.get().to_string());
    }
    if let Some(speaker) = speaker {
        config.speaker = Some(speaker);
    }
    if !resolved_zones.is_empty() {
        config.timezones = resolved_zones;
    }

    ctx.data().guild_configs.set(config.clone()).await?;
    ctx.send(poise::CreateReply::default().embed(embeds::guild_config_embed(&config)))
        .await?;
    Ok(())
}

/// Show the current notification settings
#[poise::command(slash_command, prefix_command)]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    match ctx.data().guild_configs.get(guild_id.get()).await? {
        Some(config) => {
            ctx.send(poise::CreateReply::default().embed(embeds::guild_config_embed(&config)))
                .await?;
        }
        None => {
            ctx.say("📭 No notification settings configured yet. Use `/notify setup`.")
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_zone_list;

    #[test]
    fn test_parse_zone_list() {
        let (resolved, unknown) = parse_zone_list("Europe/Berlin, est, , Atlantis");
        assert_eq!(resolved, vec!["Europe/Berlin", "America/New_York"]);
        assert_eq!(unknown, vec!["Atlantis"]);
    }
}
