pub mod admin;
pub mod notify;
pub mod reminder;
pub mod timezone;

use crate::ui::embeds;
use crate::{Context, Error};

/// Standard failure reply. Ephemeral on slash invocations; prefix
/// invocations fall back to a regular message.
pub(crate) async fn send_error(
    ctx: Context<'_>,
    title: &str,
    reason: &str,
    example: Option<&str>,
) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::error_embed(title, reason, example))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
