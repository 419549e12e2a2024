use crate::db::Database;
use chrono_tz::Tz;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Per-user timezone preference with a write-through LRU cache in front of
/// sqlite. Users without a stored preference resolve to UTC.
#[derive(Clone)]
pub struct TimezoneService {
    db: Database,
    cache: Arc<Mutex<LruCache<u64, Tz>>>,
}

impl TimezoneService {
    pub fn new(db: Database, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(500).unwrap());
        Self {
            db,
            cache: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    pub async fn get(&self, user_id: u64) -> anyhow::Result<Tz> {
        if let Some(tz) = self.cache.lock().unwrap().get(&user_id).copied() {
            return Ok(tz);
        }
        let key = user_id.to_string();
        let stored = self
            .db
            .run_blocking(move |db| db.get_user_timezone(&key))
            .await?;
        let tz = match stored {
            Some(name) => Tz::from_str(&name).unwrap_or_else(|_| {
                warn!("Stored timezone '{}' for user {} is invalid", name, user_id);
                chrono_tz::UTC
            }),
            None => chrono_tz::UTC,
        };
        self.cache.lock().unwrap().put(user_id, tz);
        Ok(tz)
    }

    pub async fn set(&self, user_id: u64, tz: Tz) -> anyhow::Result<()> {
        let key = user_id.to_string();
        let name = tz.name().to_string();
        self.db
            .run_blocking(move |db| db.set_user_timezone(&key, &name))
            .await?;
        self.cache.lock().unwrap().put(user_id, tz);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service(capacity: usize) -> TimezoneService {
        let db = Database::open(":memory:").unwrap();
        db.execute_init().unwrap();
        TimezoneService::new(db, capacity)
    }

    #[tokio::test]
    async fn test_default_utc() {
        let service = test_service(10);
        assert_eq!(service.get(1).await.unwrap(), chrono_tz::UTC);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let service = test_service(10);
        service.set(1, chrono_tz::America::La_Paz).await.unwrap();
        assert_eq!(service.get(1).await.unwrap(), chrono_tz::America::La_Paz);

        // Overwrite invalidates the cached value.
        service.set(1, chrono_tz::Asia::Tokyo).await.unwrap();
        assert_eq!(service.get(1).await.unwrap(), chrono_tz::Asia::Tokyo);
    }

    #[tokio::test]
    async fn test_survives_cache_eviction() {
        let service = test_service(1);
        service.set(1, chrono_tz::Europe::Berlin).await.unwrap();
        service.set(2, chrono_tz::Asia::Seoul).await.unwrap();

        // User 1 was evicted from the one-slot cache; sqlite still has it.
        assert_eq!(service.get(1).await.unwrap(), chrono_tz::Europe::Berlin);
        assert_eq!(service.get(2).await.unwrap(), chrono_tz::Asia::Seoul);
    }
}
