use libsql::{Builder, Connection, Database, OpenFlags};

use crate::config::DatabaseTarget;

pub async fn get_database(target: &DatabaseTarget) -> anyhow::Result<Database> {
    let db = match target {
        DatabaseTarget::Remote { url, auth_token } => {
            Builder::new_remote(url.clone(), auth_token.clone())
                .build()
                .await?
        }
        DatabaseTarget::Local(path) => {
            Builder::new_local(path)
                .flags(OpenFlags::default())
                .build()
                .await?
        }
    };

    Ok(db)
}

pub const USERS_T: &str = "users";

pub async fn migrate_db(conn: Connection) -> anyhow::Result<()> {
    #[rustfmt::skip]
    let stmnts = [
        format!(
            "CREATE TABLE IF NOT EXISTS `{USERS_T}`(
                `owner_id` TEXT NOT NULL PRIMARY KEY,
                `external_name` TEXT NOT NULL,
                `last_seen_timestamp` INTEGER NOT NULL DEFAULT 0
            )"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_external_name ON {USERS_T} (external_name)"),
    ];

    let mut _res = conn
        .execute_transactional_batch(&stmnts.join(";\n"))
        .await?;

    Ok(())
}
