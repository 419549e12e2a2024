use chime::commands::{admin, notify, reminder, timezone};
use chime::config::Config;
use chime::dispatch::transport::DiscordTransport;
use chime::dispatch::{self, ReminderDispatcher};
use chime::limits::RateLimits;
use chime::services::guild_config::GuildConfigService;
use chime::services::reminder::ReminderService;
use chime::services::timezone::TimezoneService;
use chime::{ui, Data};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let discord_token = config.discord_token.clone();

    let db = chime::db::Database::new(&config)?;
    db.execute_init()?;

    let reminders = ReminderService::new(db.clone());
    let timezones = TimezoneService::new(db.clone(), config.timezone_cache_size);
    let guild_configs = GuildConfigService::new(db.clone());

    let dispatcher_service = reminders.clone();
    let retention_service = reminders.clone();
    let driver_config = config.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                reminder::remind(),
                reminder::reminders(),
                reminder::delreminder(),
                timezone::timezone(),
                admin::remindadmin(),
                notify::notify(),
            ],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.command_prefix.clone()),
                ..Default::default()
            },
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    if let serenity::FullEvent::InteractionCreate { interaction } = event {
                        if let Err(e) =
                            ui::interactions::handle_interaction(ctx, data, interaction).await
                        {
                            error!("interaction handler failed: {e}");
                        }
                    }
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready!");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                Ok(Data {
                    config,
                    db,
                    reminders,
                    timezones,
                    guild_configs,
                    limits: RateLimits::new(),
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    let transport = Arc::new(DiscordTransport::new(client.http.clone()));
    let dispatcher = ReminderDispatcher::new(dispatcher_service, transport, &driver_config);
    let dispatcher_handle = dispatcher.spawn();
    tokio::spawn(dispatch::start_retention_task(
        retention_service,
        driver_config.retention_interval_secs,
        driver_config.retention_days,
    ));

    info!("Starting bot...");
    tokio::select! {
        result = client.start() => {
            if let Err(why) = result {
                error!("Client error: {:?}", why);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    dispatcher_handle.stop().await;
    Ok(())
}
