use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use kstats_core::manager::ConnectionManager;
use kstats_irc::IrcConnector;

mod config;

use config::BotConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kstats_bot=debug,kstats_core=debug,kstats_irc=debug,kstats_db=debug".into()
            }),
        )
        .init();

    let config = BotConfig::from_env()?;
    let db = kstats_db::Database::open(&PathBuf::from(&config.db_path))?;

    info!(server = %config.irc.server, nick = %config.irc.nick, "starting analytics session");

    let connector = IrcConnector::new(config.irc);
    let manager = ConnectionManager::new(connector, Arc::new(db));
    manager.run().await
}
