//! # Main Entry Point
//!
//! Initializes the board using the layered architecture:
//! - Domain: Configuration, Types, Events and Traits
//! - Infrastructure: Matrix, Store backends, Clock
//! - Application: Lifecycle, Sequence, Comments, Fanout, Sessions, Router
//! - Interface: Command Handlers
//!

mod application;
mod domain;
mod infrastructure;
mod interface;
mod strings;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result, bail};
use clap::Parser;
use matrix_sdk::{
    Client,
    config::SyncSettings,
    room::Room,
    ruma::events::room::{
        member::{MembershipState, StrippedRoomMemberEvent},
        message::OriginalSyncRoomMessageEvent,
    },
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::application::Board;
use crate::application::router::CommandRouter;
use crate::domain::config::{AppConfig, StoreBackend};
use crate::domain::traits::Store;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::matrix::{MatrixService, decode_message};
use crate::infrastructure::store::memory::MemoryStore;

#[derive(Debug, Parser)]
#[command(name = "murmur", about = "Anonymous moderated submission board for Matrix")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "data/config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load Configuration
    let mut config = AppConfig::load(&args.config)?;

    // 2. Logging Setup
    if !std::path::Path::new("data").exists() {
        fs::create_dir("data").context("Failed to create data directory")?;
    }

    let file_appender = tracing_appender::rolling::never("data", "murmur.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,matrix_sdk=warn,ruma=warn,hyper=warn")
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::info!("Starting Murmur...");

    // 3. Store
    let store = build_store(&config).await?;

    // 4. Matrix Setup
    let client = Client::builder()
        .homeserver_url(&config.services.matrix.homeserver)
        .build()
        .await?;

    client
        .matrix_auth()
        .login_username(
            &config.services.matrix.username,
            &config.services.matrix.password,
        )
        .initial_device_display_name("murmur")
        .send()
        .await
        .context("Matrix login failed")?;

    tracing::info!("Logged in as {}", config.services.matrix.username);

    if let Some(name) = &config.services.matrix.display_name {
        if let Err(e) = client.account().set_display_name(Some(name.as_str())).await {
            tracing::warn!("Failed to set display name: {}", e);
        }
    }
    if config.board.bot_handle.is_empty() {
        if let Some(own_id) = client.user_id() {
            config.board.bot_handle = own_id.to_string();
        }
    }

    // 5. Application
    let matrix = Arc::new(MatrixService::new(client.clone()));
    let board = Arc::new(Board::new(
        config,
        store,
        matrix.clone(),
        matrix,
        Arc::new(SystemClock),
    ));
    tracing::info!(
        channel = %board.config.board.channel,
        admins = board.config.board.admins.len(),
        "Board ready"
    );
    let channel = board.config.board.channel.clone();
    let router = Arc::new(CommandRouter::new(board));

    // 6. Event Handlers
    let start_time = std::time::SystemTime::now();

    client.add_event_handler(move |ev: OriginalSyncRoomMessageEvent, room: Room| {
        let router = router.clone();
        let channel = channel.clone();
        async move {
            // Ignore events older than start_time
            let event_time = std::time::UNIX_EPOCH
                + std::time::Duration::from_millis(ev.origin_server_ts.get().into());
            if event_time < start_time {
                return;
            }
            if ev.sender == room.own_user_id() {
                return;
            }

            let Some(event) = decode_message(&ev, &room, &channel).await else {
                return;
            };
            tracing::debug!("Received message from {} in {}", event.sender(), room.room_id());

            if let Err(e) = router.route(event).await {
                tracing::error!("Failed to route message: {:#}", e);
            }
        }
    });

    // Handle Invites
    client.add_event_handler(|ev: StrippedRoomMemberEvent, room: Room| async move {
        if ev.content.membership == MembershipState::Invite {
            match room.join().await {
                Ok(()) => tracing::info!("Joined room {}", room.room_id()),
                Err(e) => tracing::warn!("Failed to join room {}: {}", room.room_id(), e),
            }
        }
    });

    // 7. Sync forever
    client
        .sync(SyncSettings::default())
        .await
        .context("Matrix sync stopped")?;
    Ok(())
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    let store_config = &config.services.store;
    match store_config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => connect_redis(store_config).await,
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(store: &crate::domain::config::StoreConfig) -> Result<Arc<dyn Store>> {
    let Some(url) = store.url.as_deref() else {
        bail!("services.store.url (or MURMUR_STORE_URL) is required for the redis backend");
    };
    let redis = crate::infrastructure::store::redis::RedisStore::connect(url, &store.prefix).await?;
    Ok(Arc::new(redis))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_store: &crate::domain::config::StoreConfig) -> Result<Arc<dyn Store>> {
    bail!("This build has no redis support; rebuild with `--features redis`")
}
