//! Settings database access
//!
//! Key-value settings for this kiosk. Only the selected scanner port is
//! persisted today; it is rebound on the next start.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

const SCANNER_PORT_KEY: &str = "scanner_port";

/// Device id of the last selected scanner port
pub async fn load_scanner_port(db: &Pool<Sqlite>) -> Result<Option<String>> {
    let port = get_setting::<String>(db, SCANNER_PORT_KEY).await?;
    Ok(port.filter(|p| !p.trim().is_empty()))
}

pub async fn save_scanner_port(db: &Pool<Sqlite>, device_id: &str) -> Result<()> {
    set_setting(db, SCANNER_PORT_KEY, device_id).await
}

/// Forget the stored port after an explicit release
pub async fn clear_scanner_port(db: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(SCANNER_PORT_KEY)
        .execute(db)
        .await?;
    Ok(())
}

/// Generic setting getter
///
/// Returns `None` if the key is absent; a stored value that fails to parse
/// is a configuration error.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter (insert or update)
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_common::db::create_settings_table;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        // One connection so every query sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_settings_table(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_scanner_port_roundtrip() {
        let db = setup_test_db().await;
        assert_eq!(load_scanner_port(&db).await.unwrap(), None);

        save_scanner_port(&db, "ttyACM0").await.unwrap();
        assert_eq!(load_scanner_port(&db).await.unwrap().as_deref(), Some("ttyACM0"));

        save_scanner_port(&db, "ttyUSB1").await.unwrap();
        assert_eq!(load_scanner_port(&db).await.unwrap().as_deref(), Some("ttyUSB1"));

        clear_scanner_port(&db).await.unwrap();
        assert_eq!(load_scanner_port(&db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_port_is_none() {
        let db = setup_test_db().await;
        save_scanner_port(&db, "  ").await.unwrap();
        assert_eq!(load_scanner_port(&db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unparseable_setting() {
        let db = setup_test_db().await;
        set_setting(&db, "countdown", "soon").await.unwrap();
        assert!(matches!(
            get_setting::<u64>(&db, "countdown").await,
            Err(Error::Config(_))
        ));
        set_setting(&db, "countdown", 30).await.unwrap();
        assert_eq!(get_setting::<u64>(&db, "countdown").await.unwrap(), Some(30));
    }
}
