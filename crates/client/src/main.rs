//! chatlink-listen - connect to the chat backend and print realtime events.
//!
//! Credentials come from `CHATLINK_SESSION_TOKEN` / `CHATLINK_USER_ID`, or
//! from the session file the host application saved.

use std::sync::Arc;

use anyhow::{bail, Context};
use chatlink_client::{
    FileSessionStore, Notification, NotificationBus, ReachabilityMonitor, SessionCredentials,
    SessionStore, SocketConfig, SocketManager, WsConnector,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

fn credentials_from_env() -> anyhow::Result<Option<SessionCredentials>> {
    let (Ok(token), Ok(user_id)) = (
        std::env::var("CHATLINK_SESSION_TOKEN"),
        std::env::var("CHATLINK_USER_ID"),
    ) else {
        return Ok(None);
    };
    let user_id = user_id
        .trim()
        .parse::<i64>()
        .context("CHATLINK_USER_ID must be an integer")?;
    Ok(Some(SessionCredentials::new(token, user_id)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatlink_client=debug")),
        )
        .init();

    let credentials = match credentials_from_env()? {
        Some(credentials) => credentials,
        None => {
            let store = FileSessionStore::open_default()?;
            match store.credentials() {
                Some(credentials) => credentials,
                None => bail!(
                    "no session: set CHATLINK_SESSION_TOKEN and CHATLINK_USER_ID or save one to {}",
                    store.path().display()
                ),
            }
        }
    };

    let config = SocketConfig::from_env();
    let bus = NotificationBus::new();
    let reachability = ReachabilityMonitor::new(config.probe.clone());
    let manager = SocketManager::spawn(config, Arc::new(WsConnector), reachability, bus.clone());

    let mut notifications = bus.subscribe();
    manager.connect(credentials);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                manager.shutdown();
                break;
            }
            received = notifications.recv() => match received {
                Ok(Notification::NewMessageReceived(message)) => {
                    println!("{}", serde_json::to_string(&message)?);
                }
                Ok(other) => tracing::info!("{}", other.name()),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} notifications", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
