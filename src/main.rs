use std::sync::Arc;

use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenvy::dotenv;
use log::info;
use submission_watch::{
    config::Config,
    db,
    queries::{accounts::Registry, leetcode::LeetCodeFetcher, telegram::TelegramClient},
    routes::gets::{health, keep_alive},
    tasks::{
        check_accounts::Poller,
        listen_commands::listen_commands,
        scheduler::{FIRST_POLL_DELAY, start_polling},
    },
    types::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env()?;

    info!("Connecting to Database");
    let registry = Registry::new(db::get_database(&config.database).await?);
    info!("Connected to Database. Migrating");
    db::migrate_db(registry.connect()?).await?;
    info!("Migrated Database");

    let telegram = TelegramClient::new(&config.telegram_api_url, &config.bot_token)?;
    let poller = Poller {
        registry: registry.clone(),
        fetcher: Arc::new(LeetCodeFetcher::new(&config.leetcode_url)?),
        notifier: Arc::new(telegram.clone()),
        destination: config.group_chat_id.clone(),
        site: config.leetcode_url.clone(),
        policy: config.watermark_policy,
        max_in_flight: config.fetch_concurrency,
    };

    let mut scheduler = start_polling(poller, config.poll_interval, FIRST_POLL_DELAY).await?;
    let commands = tokio::spawn(listen_commands(telegram, registry.clone()));

    let server = match config.port {
        Some(port) => {
            let app_data = web::Data::new(AppState { registry });
            let server = HttpServer::new(move || {
                App::new()
                    .wrap(Logger::default())
                    .app_data(app_data.clone())
                    .service(keep_alive)
                    .service(health)
            })
            .bind(("0.0.0.0", port))?
            .run();
            info!("HTTP server running on port {port}");
            Some(server)
        }
        None => None,
    };

    let liveness = async move {
        match server {
            Some(server) => server.await,
            None => std::future::pending::<std::io::Result<()>>().await,
        }
    };

    info!("Bot running");
    tokio::select! {
        res = liveness => res?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
    }

    commands.abort();
    scheduler.shutdown().await?;
    info!("Bot stopped");

    Ok(())
}
