use crate::config::Config;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Result, Row};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Storage format for all timestamp columns (UTC, lexicographically sortable).
pub const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "daily" => Some(Recurrence::Daily),
            "weekly" => Some(Recurrence::Weekly),
            "monthly" => Some(Recurrence::Monthly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStatus {
    Active,
    Paused,
    Completed,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Active => "active",
            ReminderStatus::Paused => "paused",
            ReminderStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReminderRecord {
    pub id: String,
    pub user_id: String,
    pub channel_id: Option<String>,
    pub guild_id: Option<String>,
    pub text: String,
    pub due: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub timezone: String,
    pub recurring: Option<Recurrence>,
    pub status: ReminderStatus,
    pub undelivered: bool,
    pub failed_ticks: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_note: Option<String>,
    pub last_delivered_at: Option<DateTime<Utc>>,
}

/// Field-level partial update, applied last-write-wins.
#[derive(Debug, Default, Clone)]
pub struct ReminderPatch {
    pub text: Option<String>,
    pub due: Option<DateTime<Utc>>,
    pub undelivered: Option<bool>,
    pub failed_ticks: Option<i64>,
    pub last_delivered_at: Option<DateTime<Utc>>,
}

impl ReminderPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.due.is_none()
            && self.undelivered.is_none()
            && self.failed_ticks.is_none()
            && self.last_delivered_at.is_none()
    }
}

/// Per-guild notification routing. `timezones` is stored as a JSON array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuildConfig {
    pub guild_id: String,
    pub target_channel: Option<String>,
    pub ping_role: Option<String>,
    pub voice_channel: Option<String>,
    pub speaker: Option<String>,
    pub timezones: Vec<String>,
}

pub fn to_sqlite(ts: DateTime<Utc>) -> String {
    ts.format(SQLITE_DATETIME).to_string()
}

pub fn from_sqlite(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME).ok()?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

fn column_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    from_sqlite(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("bad datetime '{raw}'").into(),
        )
    })
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> Result<Self> {
        Self::open(&config.database_url)
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs a closure over this database on the blocking thread pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let sql = "
            CREATE TABLE IF NOT EXISTS reminders (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                channel_id TEXT,
                guild_id TEXT,
                text TEXT NOT NULL,
                due DATETIME NOT NULL,
                created_at DATETIME NOT NULL,
                timezone TEXT NOT NULL DEFAULT 'UTC',
                recurring TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                undelivered BOOLEAN NOT NULL DEFAULT FALSE,
                failed_ticks INTEGER NOT NULL DEFAULT 0,
                completed_at DATETIME,
                completed_note TEXT,
                last_delivered_at DATETIME
            );
            CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders (due);
            CREATE INDEX IF NOT EXISTS idx_reminders_user ON reminders (user_id);
            CREATE INDEX IF NOT EXISTS idx_reminders_status_due ON reminders (status, due);

            CREATE TABLE IF NOT EXISTS user_timezones (
                user_id TEXT PRIMARY KEY,
                timezone TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS guild_configs (
                guild_id TEXT PRIMARY KEY,
                target_channel TEXT,
                ping_role TEXT,
                voice_channel TEXT,
                speaker TEXT,
                timezones TEXT NOT NULL DEFAULT '[]'
            );
        ";
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(sql)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    // --- Reminders ---

    /// Inserts a reminder. Returns false when the id is already taken, so
    /// callers can retry with a fresh id.
    pub fn insert_reminder(&self, rec: &ReminderRecord) -> anyhow::Result<bool> {
        debug!(
            "Database: Inserting reminder {} for user {}",
            rec.id, rec.user_id
        );
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO reminders
                (id, user_id, channel_id, guild_id, text, due, created_at, timezone,
                 recurring, status, undelivered, failed_ticks)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                rec.id,
                rec.user_id,
                rec.channel_id,
                rec.guild_id,
                rec.text,
                to_sqlite(rec.due),
                to_sqlite(rec.created_at),
                rec.timezone,
                rec.recurring.map(|r| r.as_str()),
                rec.status.as_str(),
                rec.undelivered,
                rec.failed_ticks,
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn get_reminder(&self, id: &str) -> anyhow::Result<Option<ReminderRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map([id], reminder_from_row)?;
        Ok(rows.next().transpose()?)
    }

    /// Active reminders with `due <= now`, oldest first, ties broken by id.
    pub fn get_due(&self, now: DateTime<Utc>, limit: usize) -> anyhow::Result<Vec<ReminderRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE status = 'active' AND due <= ?1
             ORDER BY due, id LIMIT ?2"
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![to_sqlite(now), limit],
            reminder_from_row,
        )?;
        collect_rows(rows)
    }

    /// Listings include paused reminders so they can be resumed; only
    /// completed ones are hidden.
    pub fn get_user_reminders(
        &self,
        user_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ReminderRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE status != 'completed' AND user_id = ?1
             ORDER BY due, id LIMIT ?2"
        ))?;
        let rows = stmt.query_map(rusqlite::params![user_id, limit], reminder_from_row)?;
        collect_rows(rows)
    }

    pub fn get_all_active(&self, limit: usize) -> anyhow::Result<Vec<ReminderRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE status != 'completed'
             ORDER BY due, id LIMIT ?1"
        ))?;
        let rows = stmt.query_map([limit], reminder_from_row)?;
        collect_rows(rows)
    }

    pub fn count_user_active(&self, user_id: &str) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM reminders WHERE status != 'completed' AND user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Pause/resume toggle target. Completed reminders are not revivable.
    pub fn set_status(&self, id: &str, status: ReminderStatus) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE reminders SET status = ?1 WHERE id = ?2 AND status != 'completed'",
            rusqlite::params![status.as_str(), id],
        )?;
        Ok(changed == 1)
    }

    pub fn set_recurring(&self, id: &str, recurring: Option<Recurrence>) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE reminders SET recurring = ?1 WHERE id = ?2 AND status != 'completed'",
            rusqlite::params![recurring.map(|r| r.as_str()), id],
        )?;
        Ok(changed == 1)
    }

    /// Applies a partial update. Returns false when the id does not exist.
    pub fn update_reminder(&self, id: &str, patch: &ReminderPatch) -> anyhow::Result<bool> {
        if patch.is_empty() {
            return Ok(false);
        }
        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(text) = &patch.text {
            sets.push("text = ?");
            params.push(Box::new(text.clone()));
        }
        if let Some(due) = patch.due {
            sets.push("due = ?");
            params.push(Box::new(to_sqlite(due)));
        }
        if let Some(undelivered) = patch.undelivered {
            sets.push("undelivered = ?");
            params.push(Box::new(undelivered));
        }
        if let Some(ticks) = patch.failed_ticks {
            sets.push("failed_ticks = ?");
            params.push(Box::new(ticks));
        }
        if let Some(ts) = patch.last_delivered_at {
            sets.push("last_delivered_at = ?");
            params.push(Box::new(to_sqlite(ts)));
        }
        let sql = format!("UPDATE reminders SET {} WHERE id = ?", sets.join(", "));
        params.push(Box::new(id.to_string()));

        let conn = self.conn.lock().unwrap();
        let params_slice: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let changed = conn.execute(&sql, &params_slice[..])?;
        Ok(changed == 1)
    }

    pub fn mark_completed(&self, id: &str, note: Option<&str>) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE reminders
             SET status = 'completed', completed_at = ?1, completed_note = ?2
             WHERE id = ?3 AND status = 'active'",
            rusqlite::params![to_sqlite(Utc::now()), note, id],
        )?;
        Ok(changed == 1)
    }

    /// Owner-scoped delete for user commands.
    pub fn delete_user_reminder(&self, id: &str, user_id: &str) -> anyhow::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM reminders WHERE id = ?1 AND user_id = ?2",
            [id, user_id],
        )?;
        Ok(deleted)
    }

    /// Unscoped delete for admin commands.
    pub fn delete_reminder(&self, id: &str) -> anyhow::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM reminders WHERE id = ?1", [id])?;
        Ok(deleted)
    }

    /// Removes completed reminders older than `days`. Returns the count.
    pub fn cleanup_completed(&self, days: i64) -> anyhow::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM reminders
             WHERE status = 'completed' AND completed_at < datetime('now', ?1)",
            (format!("-{} days", days),),
        )?;
        Ok(count)
    }

    /// Advisory lookup: any active reminder of this user due within
    /// `window_mins` of the candidate instant.
    pub fn check_conflict(
        &self,
        user_id: &str,
        due: DateTime<Utc>,
        window_mins: i64,
    ) -> anyhow::Result<Option<ReminderRecord>> {
        let lo = due - Duration::minutes(window_mins);
        let hi = due + Duration::minutes(window_mins);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE status = 'active' AND user_id = ?1 AND due BETWEEN ?2 AND ?3
             ORDER BY due, id LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(
            rusqlite::params![user_id, to_sqlite(lo), to_sqlite(hi)],
            reminder_from_row,
        )?;
        Ok(rows.next().transpose()?)
    }

    // --- User timezones ---

    pub fn get_user_timezone(&self, user_id: &str) -> anyhow::Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT timezone FROM user_timezones WHERE user_id = ?1")?;
        let mut rows = stmt.query([user_id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn set_user_timezone(&self, user_id: &str, timezone: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_timezones (user_id, timezone) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET timezone = ?2",
            [user_id, timezone],
        )?;
        Ok(())
    }

    // --- Guild configs ---

    pub fn get_guild_config(&self, guild_id: &str) -> anyhow::Result<Option<GuildConfig>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guild_id, target_channel, ping_role, voice_channel, speaker, timezones
             FROM guild_configs WHERE guild_id = ?1",
        )?;
        let mut rows = stmt.query([guild_id])?;

        if let Some(row) = rows.next()? {
            let raw: String = row.get(5)?;
            Ok(Some(GuildConfig {
                guild_id: row.get(0)?,
                target_channel: row.get(1)?,
                ping_role: row.get(2)?,
                voice_channel: row.get(3)?,
                speaker: row.get(4)?,
                timezones: serde_json::from_str(&raw).unwrap_or_default(),
            }))
        } else {
            Ok(None)
        }
    }

    pub fn set_guild_config(&self, config: &GuildConfig) -> anyhow::Result<()> {
        let timezones = serde_json::to_string(&config.timezones)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO guild_configs
                (guild_id, target_channel, ping_role, voice_channel, speaker, timezones)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(guild_id) DO UPDATE SET
                target_channel = ?2, ping_role = ?3, voice_channel = ?4,
                speaker = ?5, timezones = ?6",
            rusqlite::params![
                config.guild_id,
                config.target_channel,
                config.ping_role,
                config.voice_channel,
                config.speaker,
                timezones,
            ],
        )?;
        Ok(())
    }
}

const REMINDER_COLUMNS: &str = "id, user_id, channel_id, guild_id, text, due, created_at, \
     timezone, recurring, status, undelivered, failed_ticks, completed_at, completed_note, \
     last_delivered_at";

fn reminder_from_row(row: &Row) -> rusqlite::Result<ReminderRecord> {
    let due: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let recurring: Option<String> = row.get(8)?;
    let status: String = row.get(9)?;
    let completed_at: Option<String> = row.get(12)?;
    let last_delivered_at: Option<String> = row.get(14)?;

    Ok(ReminderRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        channel_id: row.get(2)?,
        guild_id: row.get(3)?,
        text: row.get(4)?,
        due: column_ts(5, due)?,
        created_at: column_ts(6, created_at)?,
        timezone: row.get(7)?,
        recurring: recurring.as_deref().and_then(Recurrence::parse),
        status: match status.as_str() {
            "completed" => ReminderStatus::Completed,
            "paused" => ReminderStatus::Paused,
            _ => ReminderStatus::Active,
        },
        undelivered: row.get(10)?,
        failed_ticks: row.get(11)?,
        completed_at: completed_at.as_deref().and_then(from_sqlite),
        completed_note: row.get(13)?,
        last_delivered_at: last_delivered_at.as_deref().and_then(from_sqlite),
    })
}

fn collect_rows<I>(rows: I) -> anyhow::Result<Vec<ReminderRecord>>
where
    I: Iterator<Item = rusqlite::Result<ReminderRecord>>,
{
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}
