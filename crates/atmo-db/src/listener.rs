//! Dedicated `LISTEN` connection for store change notifications.
//!
//! [`StoreListener`] owns its own connection rather than borrowing one from
//! the shared pool: it must stay open for the lifetime of the process, and
//! holding a pooled connection forever would shrink the pool.
//!
//! `sqlx`'s [`PgListener`] transparently reconnects and re-issues `LISTEN`
//! after a dropped connection. Notifications sent while it was down are
//! lost, which matches the best-effort delivery model.

use atmo_types::Notification;
use sqlx::postgres::PgListener;

use crate::error::DbError;
use crate::postgres::PostgresConfig;

/// A long-lived connection subscribed to one or more channels.
pub struct StoreListener {
    inner: PgListener,
    channels: Vec<String>,
}

impl StoreListener {
    /// Open a dedicated connection and `LISTEN` on every channel.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL is malformed, or
    /// [`DbError::Postgres`] if connecting or any `LISTEN` fails.
    pub async fn connect(config: &PostgresConfig, channels: &[&str]) -> Result<Self, DbError> {
        // Validate up front so a bad URL surfaces as a config error.
        config.connect_options()?;

        let mut inner = PgListener::connect(&config.url).await?;
        inner.listen_all(channels.iter().copied()).await?;

        tracing::info!(?channels, "PostgreSQL listener subscribed");

        Ok(Self {
            inner,
            channels: channels.iter().map(|c| (*c).to_owned()).collect(),
        })
    }

    /// The channels this listener is subscribed to.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Wait for the next notification.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the connection was lost and could
    /// not be re-established. The listener remains usable; the next call
    /// tries to reconnect again.
    pub async fn recv(&mut self) -> Result<Notification, DbError> {
        let notification = self.inner.recv().await?;
        Ok(Notification::new(
            notification.channel(),
            notification.payload(),
        ))
    }
}
