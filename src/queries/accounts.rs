use std::{sync::Arc, time::Duration};

use libsql::{Connection, Database, Row, params};
use log::debug;

use crate::{db::USERS_T, types::TrackedAccount};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable owner → account map shared by the command handlers and the poller.
///
/// Every operation opens its own connection from the shared database handle and
/// drops it when done, so callers never hold a connection across a network call.
#[derive(Clone)]
pub struct Registry {
    db: Arc<Database>,
}

fn account_from_row(row: &Row) -> anyhow::Result<TrackedAccount> {
    Ok(TrackedAccount {
        owner_id: row.get(0)?,
        external_name: row.get(1)?,
        last_seen_timestamp: row.get(2)?,
    })
}

impl Registry {
    pub fn new(db: Database) -> Self {
        Registry { db: Arc::new(db) }
    }

    pub fn connect(&self) -> anyhow::Result<Connection> {
        let conn = self.db.connect()?;
        // Remote connections have no busy handler to configure
        let _ = conn.busy_timeout(BUSY_TIMEOUT);

        Ok(conn)
    }

    /// Links `external_name` to `owner_id`. An existing row keeps its watermark.
    pub async fn upsert(&self, owner_id: &str, external_name: &str) -> anyhow::Result<()> {
        let db = self.connect()?;
        db.execute(
            &format!(
                "INSERT INTO {USERS_T} (owner_id, external_name, last_seen_timestamp)
                VALUES (?1, ?2, 0)
                ON CONFLICT (owner_id) DO UPDATE
                SET external_name = excluded.external_name"
            ),
            params![owner_id, external_name],
        )
        .await?;

        Ok(())
    }

    pub async fn remove(&self, owner_id: &str) -> anyhow::Result<()> {
        let db = self.connect()?;
        let removed = db
            .execute(&format!("DELETE FROM {USERS_T} WHERE owner_id = ?1"), [owner_id])
            .await?;
        debug!("[Registry] Removed {removed} rows for owner {owner_id}");

        Ok(())
    }

    /// Every tracked account, ordered by external name.
    pub async fn list_all(&self) -> anyhow::Result<Vec<TrackedAccount>> {
        let db = self.connect()?;
        let mut result = db
            .query(
                &format!(
                    "SELECT owner_id, external_name, last_seen_timestamp
                    FROM {USERS_T}
                    ORDER BY external_name"
                ),
                params!(),
            )
            .await?;

        let mut accounts = Vec::new();
        while let Some(row) = result.next().await? {
            accounts.push(account_from_row(&row)?);
        }

        Ok(accounts)
    }

    pub async fn get(&self, owner_id: &str) -> anyhow::Result<Option<TrackedAccount>> {
        let db = self.connect()?;
        let mut result = db
            .query(
                &format!(
                    "SELECT owner_id, external_name, last_seen_timestamp
                    FROM {USERS_T}
                    WHERE owner_id = ?1"
                ),
                [owner_id],
            )
            .await?;

        match result.next().await? {
            Some(row) => Ok(Some(account_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Sets the watermark without comparing it to the stored one.
    ///
    /// Returns whether a row was touched; `false` means the owner unregistered
    /// while the pass was running.
    pub async fn advance_watermark(&self, owner_id: &str, timestamp: i64) -> anyhow::Result<bool> {
        let db = self.connect()?;
        let updated = db
            .execute(
                &format!("UPDATE {USERS_T} SET last_seen_timestamp = ?1 WHERE owner_id = ?2"),
                params![timestamp, owner_id],
            )
            .await?;

        Ok(updated > 0)
    }

    /// Cheap round trip used by the health check.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let db = self.connect()?;
        let mut result = db.query("SELECT 1", params!()).await?;
        let _ = result.next().await?;

        Ok(())
    }

    /// External names only, sorted ascending, for the `/list` command.
    pub async fn list_registered(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .map(|a| a.external_name)
            .collect())
    }
}
