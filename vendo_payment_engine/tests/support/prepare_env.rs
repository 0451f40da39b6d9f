use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};
use vendo_payment_engine::SqliteDatabase;

/// Spins up an empty, fully migrated store in a throwaway SQLite file and hands back the
/// connection. The random suffix keeps parallel test binaries out of each other's way.
pub async fn prepare_test_env() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = format!("sqlite://{}/vendo_test_store_{}.db", std::env::temp_dir().display(), rand::random::<u64>());
    Sqlite::create_database(&url).await.expect("Error creating test database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Error running DB migrations");
    debug!("🚀️ Test store {url} migrated and ready");
    db
}
