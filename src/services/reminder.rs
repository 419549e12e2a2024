use crate::config::MAX_REMINDER_TEXT_CHARS;
use crate::db::{Database, Recurrence, ReminderPatch, ReminderRecord, ReminderStatus};
use crate::timeparse::resolve_local;
use chrono::{DateTime, Duration, Months, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Window (minutes) around a candidate instant inside which another active
/// reminder counts as a scheduling conflict. Advisory only.
pub const CONFLICT_WINDOW_MINS: i64 = 5;

pub struct NewReminder {
    pub user_id: u64,
    pub channel_id: Option<u64>,
    pub guild_id: Option<u64>,
    pub text: String,
    pub due: DateTime<Utc>,
    pub timezone: Tz,
    pub recurring: Option<Recurrence>,
}

#[derive(Clone)]
pub struct ReminderService {
    db: Database,
}

impl ReminderService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Strips control characters, collapses runs of whitespace and dashes,
    /// and caps the result at the reminder text limit.
    pub fn sanitize_text(raw: &str) -> String {
        let cleaned: String = raw
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        let mut collapsed = String::with_capacity(cleaned.len());
        let mut last_space = false;
        let mut dash_run = 0usize;
        for c in cleaned.chars() {
            if c == '-' {
                dash_run += 1;
                if dash_run > 2 {
                    continue;
                }
            } else {
                dash_run = 0;
            }
            if c.is_whitespace() {
                if last_space {
                    continue;
                }
                last_space = true;
                collapsed.push(' ');
            } else {
                last_space = false;
                collapsed.push(c);
            }
        }
        let trimmed = collapsed.trim();
        trimmed.chars().take(MAX_REMINDER_TEXT_CHARS).collect()
    }

    /// Inserts a reminder under a synthesized `{user}_{epoch}` id, retrying
    /// with a counter suffix until the id is free.
    pub async fn create(&self, new: NewReminder) -> anyhow::Result<ReminderRecord> {
        let base = format!("{}_{}", new.user_id, new.due.timestamp());
        let record = ReminderRecord {
            id: base.clone(),
            user_id: new.user_id.to_string(),
            channel_id: new.channel_id.map(|c| c.to_string()),
            guild_id: new.guild_id.map(|g| g.to_string()),
            text: new.text,
            due: new.due,
            created_at: Utc::now(),
            timezone: new.timezone.name().to_string(),
            recurring: new.recurring,
            status: ReminderStatus::Active,
            undelivered: false,
            failed_ticks: 0,
            completed_at: None,
            completed_note: None,
            last_delivered_at: None,
        };
        self.db
            .run_blocking(move |db| {
                let mut record = record;
                for n in 0u32.. {
                    record.id = if n == 0 {
                        base.clone()
                    } else {
                        format!("{base}_{n}")
                    };
                    if db.insert_reminder(&record)? {
                        return Ok(record);
                    }
                }
                unreachable!()
            })
            .await
    }

    pub async fn check_conflict(
        &self,
        user_id: u64,
        due: DateTime<Utc>,
    ) -> anyhow::Result<Option<ReminderRecord>> {
        let user_id = user_id.to_string();
        self.db
            .run_blocking(move |db| db.check_conflict(&user_id, due, CONFLICT_WINDOW_MINS))
            .await
    }

    pub async fn get(&self, id: &str) -> anyhow::Result<Option<ReminderRecord>> {
        let id = id.to_string();
        self.db.run_blocking(move |db| db.get_reminder(&id)).await
    }

    pub async fn list_user(
        &self,
        user_id: u64,
        limit: usize,
    ) -> anyhow::Result<Vec<ReminderRecord>> {
        let user_id = user_id.to_string();
        self.db
            .run_blocking(move |db| db.get_user_reminders(&user_id, limit))
            .await
    }

    pub async fn count_user_active(&self, user_id: u64) -> anyhow::Result<i64> {
        let user_id = user_id.to_string();
        self.db
            .run_blocking(move |db| db.count_user_active(&user_id))
            .await
    }

    pub async fn list_all_active(&self, limit: usize) -> anyhow::Result<Vec<ReminderRecord>> {
        self.db
            .run_blocking(move |db| db.get_all_active(limit))
            .await
    }

    pub async fn list_due(
        &self,
        now: DateTime<Utc>,
        batch: usize,
    ) -> anyhow::Result<Vec<ReminderRecord>> {
        self.db.run_blocking(move |db| db.get_due(now, batch)).await
    }

    pub async fn update(&self, id: &str, patch: ReminderPatch) -> anyhow::Result<bool> {
        let id = id.to_string();
        self.db
            .run_blocking(move |db| db.update_reminder(&id, &patch))
            .await
    }

    pub async fn set_status(&self, id: &str, status: ReminderStatus) -> anyhow::Result<bool> {
        let id = id.to_string();
        self.db
            .run_blocking(move |db| db.set_status(&id, status))
            .await
    }

    pub async fn set_recurrence(
        &self,
        id: &str,
        recurring: Option<Recurrence>,
    ) -> anyhow::Result<bool> {
        let id = id.to_string();
        self.db
            .run_blocking(move |db| db.set_recurring(&id, recurring))
            .await
    }

    pub async fn complete(&self, id: &str, note: Option<&str>) -> anyhow::Result<bool> {
        let id = id.to_string();
        let note = note.map(|n| n.to_string());
        self.db
            .run_blocking(move |db| db.mark_completed(&id, note.as_deref()))
            .await
    }

    pub async fn delete_own(&self, id: &str, user_id: u64) -> anyhow::Result<usize> {
        let id = id.to_string();
        let user_id = user_id.to_string();
        self.db
            .run_blocking(move |db| db.delete_user_reminder(&id, &user_id))
            .await
    }

    pub async fn delete_any(&self, id: &str) -> anyhow::Result<usize> {
        let id = id.to_string();
        self.db.run_blocking(move |db| db.delete_reminder(&id)).await
    }

    pub async fn cleanup_completed(&self, days: i64) -> anyhow::Result<usize> {
        self.db
            .run_blocking(move |db| db.cleanup_completed(days))
            .await
    }

    /// Next occurrence of a recurring reminder, computed in the owner's
    /// timezone so wall-clock time is preserved across DST transitions.
    /// Monthly steps clamp to the last day of shorter months.
    pub fn next_occurrence(record: &ReminderRecord, recurrence: Recurrence) -> DateTime<Utc> {
        let tz = Tz::from_str(&record.timezone).unwrap_or(chrono_tz::UTC);
        let local = record.due.with_timezone(&tz).naive_local();
        let next_local = match recurrence {
            Recurrence::Daily => local + Duration::days(1),
            Recurrence::Weekly => local + Duration::weeks(1),
            Recurrence::Monthly => local
                .checked_add_months(Months::new(1))
                .unwrap_or(local + Duration::days(30)),
        };
        resolve_local(tz, next_local).unwrap_or_else(|| match recurrence {
            Recurrence::Daily => record.due + Duration::days(1),
            Recurrence::Weekly => record.due + Duration::weeks(1),
            Recurrence::Monthly => record.due + Duration::days(30),
        })
    }

    /// Human label for listings, e.g. "every week".
    pub fn recurrence_label(recurrence: Recurrence) -> &'static str {
        match recurrence {
            Recurrence::Daily => "every day",
            Recurrence::Weekly => "every week",
            Recurrence::Monthly => "every month",
        }
    }
}
