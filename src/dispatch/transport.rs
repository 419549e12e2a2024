use crate::db::ReminderRecord;
use crate::ui::{embeds, interactions};
use async_trait::async_trait;
use serenity::all::{
    ChannelId, ChannelType, CreateAllowedMentions, CreateMessage, GuildId, UserId,
};
use serenity::http::{Http, HttpError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("missing permission")]
    Forbidden,
    #[error("target not found")]
    NotFound,
    #[error("transport failure: {0}")]
    Transport(String),
}

impl SendError {
    /// Soft failures advance the fallback chain quietly; anything else is
    /// logged at warn level first.
    pub fn is_soft(&self) -> bool {
        matches!(self, SendError::Forbidden | SendError::NotFound)
    }
}

/// Seam between the delivery engine and Discord, so ticks can be exercised
/// against an in-memory transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_to_channel(
        &self,
        channel_id: u64,
        reminder: &ReminderRecord,
    ) -> Result<(), SendError>;

    /// Text channels of a guild as `(id, name)` pairs.
    async fn guild_text_channels(&self, guild_id: u64) -> Result<Vec<(u64, String)>, SendError>;

    async fn send_dm(&self, user_id: u64, reminder: &ReminderRecord) -> Result<(), SendError>;
}

pub struct DiscordTransport {
    http: Arc<Http>,
}

impl DiscordTransport {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    fn delivery_message(reminder: &ReminderRecord, user_id: u64) -> CreateMessage {
        let allowed_mentions = CreateAllowedMentions::new().users(vec![UserId::new(user_id)]);
        CreateMessage::new()
            .content(format!("⏰ <@{user_id}>"))
            .embed(embeds::delivery_embed(reminder))
            .components(interactions::delivery_components(&reminder.id))
            .allowed_mentions(allowed_mentions)
    }

    fn owner_id(reminder: &ReminderRecord) -> Result<u64, SendError> {
        reminder
            .user_id
            .parse()
            .map_err(|_| SendError::Transport(format!("bad user id '{}'", reminder.user_id)))
    }
}

fn classify(err: serenity::Error) -> SendError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) = &err {
        return match resp.status_code.as_u16() {
            403 => SendError::Forbidden,
            404 => SendError::NotFound,
            _ => SendError::Transport(err.to_string()),
        };
    }
    SendError::Transport(err.to_string())
}

#[async_trait]
impl Transport for DiscordTransport {
    async fn send_to_channel(
        &self,
        channel_id: u64,
        reminder: &ReminderRecord,
    ) -> Result<(), SendError> {
        let user_id = Self::owner_id(reminder)?;
        ChannelId::new(channel_id)
            .send_message(&self.http, Self::delivery_message(reminder, user_id))
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn guild_text_channels(&self, guild_id: u64) -> Result<Vec<(u64, String)>, SendError> {
        let channels = GuildId::new(guild_id)
            .channels(&self.http)
            .await
            .map_err(classify)?;
        Ok(channels
            .into_iter()
            .filter(|(_, c)| c.kind == ChannelType::Text)
            .map(|(id, c)| (id.get(), c.name))
            .collect())
    }

    async fn send_dm(&self, user_id: u64, reminder: &ReminderRecord) -> Result<(), SendError> {
        let dm = UserId::new(user_id)
            .create_dm_channel(&self.http)
            .await
            .map_err(classify)?;
        dm.id
            .send_message(&self.http, Self::delivery_message(reminder, user_id))
            .await
            .map(|_| ())
            .map_err(classify)
    }
}
