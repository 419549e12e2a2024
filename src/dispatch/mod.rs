pub mod transport;

use crate::config::Config;
use crate::db::{ReminderPatch, ReminderRecord};
use crate::services::reminder::ReminderService;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration};
use tracing::{debug, error, info, warn};
use transport::{SendError, Transport};

/// Bound on how long `stop` waits for an in-flight tick before abandoning it.
const STOP_GRACE: Duration = Duration::from_secs(5);

pub struct ReminderDispatcher {
    service: ReminderService,
    transport: Arc<dyn Transport>,
    tick_interval: Duration,
    batch_size: usize,
    max_failed_ticks: i64,
    fallback_channels: Vec<String>,
    tick_lock: tokio::sync::Mutex<()>,
}

pub struct DispatcherHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signals the driver to stop and waits briefly for the in-flight tick.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let mut task = self.task;
        if timeout(STOP_GRACE, &mut task).await.is_err() {
            warn!("Dispatcher did not stop within grace period, aborting");
            task.abort();
        }
    }
}

impl ReminderDispatcher {
    pub fn new(service: ReminderService, transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            service,
            transport,
            tick_interval: Duration::from_secs(config.tick_interval_secs),
            batch_size: config.delivery_batch_size,
            max_failed_ticks: config.max_failed_ticks,
            fallback_channels: config.fallback_channels.clone(),
            tick_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn spawn(self) -> DispatcherHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        DispatcherHandle { stop_tx, task }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        info!(
            "Starting reminder dispatcher (every {}s, batch {})",
            self.tick_interval.as_secs(),
            self.batch_size
        );
        let mut ticker = interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_due().await {
                        error!("Reminder dispatch cycle failed: {e:#}");
                    }
                }
                _ = stop_rx.changed() => {
                    info!("Reminder dispatcher stopping");
                    break;
                }
            }
        }
    }

    async fn dispatch_due(&self) -> anyhow::Result<()> {
        // A tick that outlives the interval must not overlap the next one.
        let Ok(_guard) = self.tick_lock.try_lock() else {
            debug!("Previous tick still in flight, skipping");
            return Ok(());
        };

        let due = self.service.list_due(Utc::now(), self.batch_size).await?;
        if due.is_empty() {
            return Ok(());
        }
        debug!("Dispatching {} due reminders", due.len());

        for reminder in due {
            if let Err(e) = self.process(&reminder).await {
                error!("Failed to process reminder {}: {e:#}", reminder.id);
            }
        }
        Ok(())
    }

    async fn process(&self, reminder: &ReminderRecord) -> anyhow::Result<()> {
        let delivered = self.deliver(reminder).await;

        if let Some(recurrence) = reminder.recurring {
            // Recurring reminders reschedule whether or not delivery worked,
            // so a broken channel cannot wedge the record. Missed occurrences
            // drain one per tick, oldest first.
            let next = ReminderService::next_occurrence(reminder, recurrence);
            let patch = ReminderPatch {
                due: Some(next),
                undelivered: Some(!delivered),
                failed_ticks: Some(if delivered { 0 } else { reminder.failed_ticks + 1 }),
                last_delivered_at: delivered.then(Utc::now),
                ..Default::default()
            };
            self.service.update(&reminder.id, patch).await?;
            return Ok(());
        }

        if delivered {
            let patch = ReminderPatch {
                undelivered: Some(false),
                failed_ticks: Some(0),
                last_delivered_at: Some(Utc::now()),
                ..Default::default()
            };
            self.service.update(&reminder.id, patch).await?;
            self.service.complete(&reminder.id, None).await?;
            return Ok(());
        }

        let failed_ticks = reminder.failed_ticks + 1;
        if failed_ticks >= self.max_failed_ticks {
            warn!(
                "Reminder {} failed {} consecutive ticks, completing as undeliverable",
                reminder.id, failed_ticks
            );
            self.service
                .complete(&reminder.id, Some("delivery_failed"))
                .await?;
        } else {
            let patch = ReminderPatch {
                undelivered: Some(true),
                failed_ticks: Some(failed_ticks),
                ..Default::default()
            };
            self.service.update(&reminder.id, patch).await?;
        }
        Ok(())
    }

    /// Walks the fallback chain, stopping at the first successful send.
    async fn deliver(&self, reminder: &ReminderRecord) -> bool {
        if let Some(channel_id) = parse_id(reminder.channel_id.as_deref()) {
            match self.transport.send_to_channel(channel_id, reminder).await {
                Ok(()) => return true,
                Err(e) => log_send_failure(&reminder.id, "origin channel", &e),
            }
        }

        if let Some(guild_id) = parse_id(reminder.guild_id.as_deref()) {
            match self.transport.guild_text_channels(guild_id).await {
                Ok(channels) => {
                    for name in &self.fallback_channels {
                        let Some((channel_id, _)) =
                            channels.iter().find(|(_, n)| n == name)
                        else {
                            continue;
                        };
                        match self.transport.send_to_channel(*channel_id, reminder).await {
                            Ok(()) => return true,
                            Err(e) => log_send_failure(&reminder.id, name, &e),
                        }
                    }
                }
                Err(e) => log_send_failure(&reminder.id, "guild channel listing", &e),
            }
        }

        match reminder.user_id.parse::<u64>() {
            Ok(user_id) => match self.transport.send_dm(user_id, reminder).await {
                Ok(()) => true,
                Err(e) => {
                    log_send_failure(&reminder.id, "direct message", &e);
                    false
                }
            },
            Err(_) => {
                error!("Reminder {} has malformed user id", reminder.id);
                false
            }
        }
    }
}

fn parse_id(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.parse().ok())
}

fn log_send_failure(reminder_id: &str, path: &str, err: &SendError) {
    if err.is_soft() {
        debug!("Reminder {}: {} unavailable ({})", reminder_id, path, err);
    } else {
        warn!("Reminder {}: send via {} failed: {}", reminder_id, path, err);
    }
}

/// Hourly prune of completed reminders past the retention window.
pub async fn start_retention_task(service: ReminderService, interval_secs: u64, retention_days: i64) {
    info!(
        "Starting reminder retention task ({} day window, every {}s)",
        retention_days, interval_secs
    );
    let mut ticker = interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        match service.cleanup_completed(retention_days).await {
            Ok(0) => {}
            Ok(n) => info!("Retention: removed {} completed reminders", n),
            Err(e) => warn!("Retention cycle failed: {e:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, Recurrence, ReminderStatus};
    use crate::services::reminder::NewReminder;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Timelike};
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct MockTransport {
        /// Channel ids that reject sends with `Forbidden`.
        failing_channels: HashSet<u64>,
        /// `(id, name)` pairs returned for every guild.
        guild_channels: Vec<(u64, String)>,
        dm_ok: bool,
        log: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                failing_channels: HashSet::new(),
                guild_channels: Vec::new(),
                dm_ok: true,
                log: Mutex::new(Vec::new()),
            }
        }

        fn sends(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send_to_channel(
            &self,
            channel_id: u64,
            _reminder: &ReminderRecord,
        ) -> Result<(), SendError> {
            if self.failing_channels.contains(&channel_id) {
                self.log
                    .lock()
                    .unwrap()
                    .push(format!("channel:{channel_id}:fail"));
                return Err(SendError::Forbidden);
            }
            self.log
                .lock()
                .unwrap()
                .push(format!("channel:{channel_id}:ok"));
            Ok(())
        }

        async fn guild_text_channels(
            &self,
            _guild_id: u64,
        ) -> Result<Vec<(u64, String)>, SendError> {
            Ok(self.guild_channels.clone())
        }

        async fn send_dm(
            &self,
            user_id: u64,
            _reminder: &ReminderRecord,
        ) -> Result<(), SendError> {
            if self.dm_ok {
                self.log.lock().unwrap().push(format!("dm:{user_id}:ok"));
                Ok(())
            } else {
                self.log.lock().unwrap().push(format!("dm:{user_id}:fail"));
                Err(SendError::Forbidden)
            }
        }
    }

    struct Fixture {
        service: ReminderService,
        dispatcher: ReminderDispatcher,
        transport: Arc<MockTransport>,
    }

    fn fixture(transport: MockTransport) -> Fixture {
        let db = Database::open(":memory:").unwrap();
        db.execute_init().unwrap();
        let service = ReminderService::new(db.clone());
        let transport = Arc::new(transport);
        let config = Config {
            discord_token: "test".to_string(),
            database_url: ":memory:".to_string(),
            status_message: "test".to_string(),
            command_prefix: "!".to_string(),
            tick_interval_secs: 30,
            delivery_batch_size: 100,
            max_failed_ticks: 10,
            fallback_channels: vec!["bot-spam".to_string(), "general".to_string()],
            retention_days: 30,
            retention_interval_secs: 3600,
            timezone_cache_size: 500,
        };
        let dispatcher = ReminderDispatcher::new(
            ReminderService::new(db),
            transport.clone(),
            &config,
        );
        Fixture {
            service,
            dispatcher,
            transport,
        }
    }

    fn overdue(user_id: u64) -> NewReminder {
        // Second precision, matching what the store round-trips.
        let due = (Utc::now() - ChronoDuration::minutes(1))
            .with_nanosecond(0)
            .unwrap();
        NewReminder {
            user_id,
            channel_id: Some(555),
            guild_id: Some(777),
            text: "water the plants".to_string(),
            due,
            timezone: chrono_tz::UTC,
            recurring: None,
        }
    }

    #[tokio::test]
    async fn test_delivery_to_origin_completes() {
        let f = fixture(MockTransport::new());
        let rec = f.service.create(overdue(42)).await.unwrap();

        f.dispatcher.dispatch_due().await.unwrap();

        assert_eq!(f.transport.sends(), vec!["channel:555:ok"]);
        let stored = f.service.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Completed);
        assert!(stored.last_delivered_at.is_some());
    }

    #[tokio::test]
    async fn test_fallback_skips_missing_and_failing_channels() {
        let mut transport = MockTransport::new();
        transport.failing_channels.insert(555);
        // No "bot-spam" channel exists; "general" works.
        transport.guild_channels = vec![(3, "general".to_string()), (4, "chat".to_string())];
        let f = fixture(transport);
        let rec = f.service.create(overdue(42)).await.unwrap();

        f.dispatcher.dispatch_due().await.unwrap();

        assert_eq!(
            f.transport.sends(),
            vec!["channel:555:fail", "channel:3:ok"]
        );
        let stored = f.service.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Completed);
    }

    #[tokio::test]
    async fn test_dm_fallback_when_guild_paths_fail() {
        let mut transport = MockTransport::new();
        transport.failing_channels.extend([555, 2]);
        transport.guild_channels = vec![(2, "bot-spam".to_string())];
        let f = fixture(transport);
        let rec = f.service.create(overdue(42)).await.unwrap();

        f.dispatcher.dispatch_due().await.unwrap();

        assert_eq!(
            f.transport.sends(),
            vec!["channel:555:fail", "channel:2:fail", "dm:42:ok"]
        );
        let stored = f.service.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Completed);
    }

    #[tokio::test]
    async fn test_all_paths_failed_marks_undelivered_and_retries() {
        let mut transport = MockTransport::new();
        transport.failing_channels.insert(555);
        transport.dm_ok = false;
        let f = fixture(transport);
        let rec = f.service.create(overdue(42)).await.unwrap();

        f.dispatcher.dispatch_due().await.unwrap();

        let stored = f.service.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Active);
        assert!(stored.undelivered);
        assert_eq!(stored.failed_ticks, 1);
        assert!(stored.last_delivered_at.is_none());

        // Next tick retries the same record.
        f.dispatcher.dispatch_due().await.unwrap();
        let stored = f.service.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_ticks, 2);
        assert_eq!(stored.status, ReminderStatus::Active);
    }

    #[tokio::test]
    async fn test_undelivered_escalates_to_delivery_failed() {
        let mut transport = MockTransport::new();
        transport.failing_channels.insert(555);
        transport.dm_ok = false;
        let f = fixture(transport);
        let rec = f.service.create(overdue(42)).await.unwrap();
        f.service
            .update(
                &rec.id,
                ReminderPatch {
                    failed_ticks: Some(9),
                    undelivered: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        f.dispatcher.dispatch_due().await.unwrap();

        let stored = f.service.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Completed);
        assert_eq!(stored.completed_note.as_deref(), Some("delivery_failed"));
    }

    #[tokio::test]
    async fn test_recurring_reschedules_on_success() {
        let f = fixture(MockTransport::new());
        let mut new = overdue(42);
        new.recurring = Some(Recurrence::Daily);
        let rec = f.service.create(new).await.unwrap();
        let original_due = rec.due;

        f.dispatcher.dispatch_due().await.unwrap();

        let stored = f.service.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Active);
        assert_eq!(stored.due, original_due + ChronoDuration::days(1));
        assert!(!stored.undelivered);
        assert!(stored.last_delivered_at.is_some());
    }

    #[tokio::test]
    async fn test_recurring_reschedules_even_on_failure() {
        let mut transport = MockTransport::new();
        transport.failing_channels.insert(555);
        transport.dm_ok = false;
        let f = fixture(transport);
        let mut new = overdue(42);
        new.recurring = Some(Recurrence::Weekly);
        let rec = f.service.create(new).await.unwrap();
        let original_due = rec.due;

        f.dispatcher.dispatch_due().await.unwrap();

        let stored = f.service.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Active);
        assert_eq!(stored.due, original_due + ChronoDuration::weeks(1));
        assert!(stored.undelivered);
    }

    #[tokio::test]
    async fn test_due_ordering_within_tick() {
        let f = fixture(MockTransport::new());
        let mut late = overdue(42);
        late.channel_id = Some(20);
        late.due = Utc::now() - ChronoDuration::minutes(1);
        let mut early = overdue(43);
        early.channel_id = Some(10);
        early.due = Utc::now() - ChronoDuration::hours(1);
        f.service.create(late).await.unwrap();
        f.service.create(early).await.unwrap();

        f.dispatcher.dispatch_due().await.unwrap();

        assert_eq!(f.transport.sends(), vec!["channel:10:ok", "channel:20:ok"]);
    }

    #[tokio::test]
    async fn test_dm_only_reminder_without_guild() {
        let f = fixture(MockTransport::new());
        let mut new = overdue(42);
        new.channel_id = None;
        new.guild_id = None;
        let rec = f.service.create(new).await.unwrap();

        f.dispatcher.dispatch_due().await.unwrap();

        assert_eq!(f.transport.sends(), vec!["dm:42:ok"]);
        let stored = f.service.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Completed);
    }
}
