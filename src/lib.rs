pub mod commands;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod limits;
pub mod services;
pub mod timeparse;
pub mod timezones;
pub mod ui;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub db: db::Database,
    pub reminders: services::reminder::ReminderService,
    pub timezones: services::timezone::TimezoneService,
    pub guild_configs: services::guild_config::GuildConfigService,
    pub limits: limits::RateLimits,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
