use crate::db::{Database, GuildConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Read-through cache over the per-guild notification config.
#[derive(Clone)]
pub struct GuildConfigService {
    db: Database,
    cache: Arc<Mutex<HashMap<u64, Option<GuildConfig>>>>,
}

impl GuildConfigService {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, guild_id: u64) -> anyhow::Result<Option<GuildConfig>> {
        if let Some(cached) = self.cache.lock().unwrap().get(&guild_id) {
            return Ok(cached.clone());
        }
        let key = guild_id.to_string();
        let config = self
            .db
            .run_blocking(move |db| db.get_guild_config(&key))
            .await?;
        self.cache.lock().unwrap().insert(guild_id, config.clone());
        Ok(config)
    }

    pub async fn set(&self, config: GuildConfig) -> anyhow::Result<()> {
        let guild_id: u64 = config.guild_id.parse()?;
        let stored = config.clone();
        self.db
            .run_blocking(move |db| db.set_guild_config(&stored))
            .await?;
        self.cache.lock().unwrap().insert(guild_id, Some(config));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> GuildConfigService {
        let db = Database::open(":memory:").unwrap();
        db.execute_init().unwrap();
        GuildConfigService::new(db)
    }

    #[tokio::test]
    async fn test_get_unset_is_none_and_cached() {
        let service = test_service();
        assert!(service.get(1).await.unwrap().is_none());
        assert!(service.get(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_updates_cache() {
        let service = test_service();
        let config = GuildConfig {
            guild_id: "1".to_string(),
            target_channel: Some("99".to_string()),
            timezones: vec!["UTC".to_string()],
            ..Default::default()
        };
        service.set(config.clone()).await.unwrap();
        assert_eq!(service.get(1).await.unwrap(), Some(config.clone()));

        let updated = GuildConfig {
            target_channel: None,
            ..config
        };
        service.set(updated.clone()).await.unwrap();
        assert_eq!(service.get(1).await.unwrap(), Some(updated));
    }
}
