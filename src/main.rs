use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod content;
mod dispatch;
mod error;
mod game;
mod store;
mod users;
mod vk;

use crate::config::{ContentSourceType, load_settings};
use crate::content::QuestionCatalog;
use crate::dispatch::{ChatTransport, DispatcherHandle};
use crate::error::Result as AppResult;
use crate::store::{GameStore, SnapshotStore};
use crate::vk::{LongPoller, VkApiClient};

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_PKG_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = load_settings()?;
    tracing::info!(
        vk.group_id = settings.vk.group_id,
        game.min_players = settings.game.min_players,
        game.max_players = settings.game.max_players,
        content.source = ?settings.content.source_type,
        store.path = ?settings.store.path,
        "Configuration loaded"
    );

    let catalog = Arc::new(QuestionCatalog::new(settings.content.clone()).await);
    if catalog.len().await == 0 {
        tracing::warn!("Question catalog is empty; games cannot be created until it is refreshed");
    }

    let store: Arc<dyn GameStore> = match &settings.store.path {
        Some(path) => Arc::new(SnapshotStore::open(path).await?),
        None => {
            tracing::warn!("No store path configured; sessions will not survive a restart");
            Arc::new(SnapshotStore::in_memory())
        }
    };

    if settings.content.refresh_interval_secs > 0
        && settings.content.source_type != ContentSourceType::None
    {
        let refresh_catalog = Arc::clone(&catalog);
        let period = Duration::from_secs(settings.content.refresh_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // the initial load already happened
            loop {
                interval.tick().await;
                if let Err(e) = refresh_catalog.refresh().await {
                    tracing::warn!(error = %e, "Question catalog refresh failed");
                }
            }
        });
    }

    let client = Arc::new(VkApiClient::new(&settings.vk)?);
    let dispatcher = DispatcherHandle::spawn(
        32,
        Arc::clone(&client) as Arc<dyn ChatTransport>,
        store,
        catalog,
        settings.game.clone(),
    );

    let heartbeat = dispatcher.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let live = heartbeat.live_session_count().await;
            tracing::info!(
                sessions.live = live,
                "Live session heartbeat"
            );
        }
    });

    let poller = LongPoller::new(client, dispatcher, settings.vk.poll_wait_secs);

    tokio::select! {
        _ = poller.run() => {
            tracing::warn!("Long poller stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
