use farm_payment_engine::{ReconciliationDatabase, SqliteDatabase};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

/// Creates a fresh database at `url` and brings the schema up to date.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("Could not drop database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Created and migrated database {url}");
    db
}

pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("farm_store_it_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Failed to remove database {url}: {e}");
    }
}
