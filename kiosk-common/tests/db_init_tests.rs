//! Settings database bootstrap tests

use kiosk_common::db::init_database;
use tempfile::TempDir;

#[tokio::test]
async fn test_init_creates_database_and_parent_directory() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("kiosk.db");

    let pool = init_database(&db_path).await.expect("init failed");
    assert!(db_path.exists());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_init_is_idempotent_and_keeps_settings() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("kiosk.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO settings (key, value) VALUES ('scanner_port', '/dev/ttyACM0')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let value: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'scanner_port'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(value, "/dev/ttyACM0");
}
