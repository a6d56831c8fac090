use std::time::Duration;

use cucumber::World;
use farm_payment_engine::{
    events::EventProducers,
    LookupRetry,
    ReconciliationApi,
    ReconciliationError,
    ReconciliationOutcome,
    ReconciliationSettings,
    SqliteDatabase,
};
use log::*;

use crate::support::prepare_env::{prepare_test_env, random_db_path};

#[derive(Default, Debug, World)]
pub struct FarmWorld {
    pub system: Option<ReconciliationSystem>,
    pub last_outcome: Option<Result<ReconciliationOutcome, ReconciliationError>>,
}

#[derive(Debug)]
pub struct ReconciliationSystem {
    pub db_path: String,
    pub api: ReconciliationApi<SqliteDatabase>,
}

impl FarmWorld {
    pub fn api(&self) -> &ReconciliationApi<SqliteDatabase> {
        &self.system.as_ref().expect("ReconciliationApi not initialised").api
    }

    pub fn db(&self) -> &SqliteDatabase {
        self.api().db()
    }
}

impl ReconciliationSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        debug!("Created database: {url}");
        let settings =
            ReconciliationSettings::default().with_lookup_retry(LookupRetry::new(3, Duration::from_millis(200)));
        let api = ReconciliationApi::new(db, EventProducers::default(), settings);
        Self { db_path: url, api }
    }
}
