//! Page-flipping for multi-page listings. Button ids are prefixed with the
//! invocation id, so each command run gets its own collector and the global
//! interaction handler never sees them.

use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use serenity::{
    ButtonStyle, ComponentInteractionCollector, CreateActionRow, CreateButton, CreateEmbed,
    CreateInteractionResponse, CreateInteractionResponseMessage,
};
use std::time::Duration;

const PAGE_TIMEOUT: Duration = Duration::from_secs(120);

fn step(current: usize, len: usize, forward: bool) -> usize {
    if forward {
        (current + 1) % len
    } else {
        current.checked_sub(1).unwrap_or(len - 1)
    }
}

fn nav_row(prev_id: &str, next_id: &str) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(prev_id)
            .label("◀")
            .style(ButtonStyle::Secondary),
        CreateButton::new(next_id)
            .label("▶")
            .style(ButtonStyle::Secondary),
    ])]
}

/// Sends the first page and flips on button presses until the collector
/// times out, then strips the buttons. Single-page listings go out plain.
pub async fn paginate_embeds(ctx: Context<'_>, pages: Vec<CreateEmbed>) -> Result<(), Error> {
    let Some(first) = pages.first() else {
        return Ok(());
    };
    if pages.len() == 1 {
        ctx.send(poise::CreateReply::default().embed(first.clone()))
            .await?;
        return Ok(());
    }

    let ctx_id = ctx.id();
    let prev_id = format!("{ctx_id}_prev");
    let next_id = format!("{ctx_id}_next");

    let reply = ctx
        .send(
            poise::CreateReply::default()
                .embed(first.clone())
                .components(nav_row(&prev_id, &next_id)),
        )
        .await?;

    let mut current = 0usize;
    while let Some(press) = ComponentInteractionCollector::new(ctx)
        .filter(move |press| press.data.custom_id.starts_with(&ctx_id.to_string()))
        .timeout(PAGE_TIMEOUT)
        .await
    {
        let is_admin = press
            .member
            .as_ref()
            .and_then(|m| m.permissions)
            .is_some_and(|p| p.manage_guild());
        if press.user.id != ctx.author().id && !is_admin {
            press
                .create_response(
                    ctx.serenity_context(),
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Only the person who ran this command can flip pages.")
                            .ephemeral(true),
                    ),
                )
                .await?;
            continue;
        }
        current = step(current, pages.len(), press.data.custom_id == next_id);
        press
            .create_response(
                ctx.serenity_context(),
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new().embed(pages[current].clone()),
                ),
            )
            .await?;
    }

    reply
        .edit(
            ctx,
            poise::CreateReply::default()
                .embed(pages[current].clone())
                .components(Vec::new()),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::step;

    #[test]
    fn test_step_wraps_both_directions() {
        assert_eq!(step(0, 3, true), 1);
        assert_eq!(step(2, 3, true), 0);
        assert_eq!(step(0, 3, false), 2);
        assert_eq!(step(1, 3, false), 0);
    }
}
