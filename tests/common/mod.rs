// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use workout_tracker::config::RepositoryConfig;
use workout_tracker::db::documents::encode_record;
use workout_tracker::db::{Fields, InMemoryStore};
use workout_tracker::events::RecordingSink;
use workout_tracker::models::WorkoutRecord;
use workout_tracker::services::{RecordList, SyncRepository};

/// How long a test waits for asynchronous effects.
#[allow(dead_code)]
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Check if both Firebase emulators are available via environment variables.
#[allow(dead_code)]
pub fn emulators_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
        && std::env::var("FIREBASE_AUTH_EMULATOR_HOST").is_ok()
}

/// Skip test with message if the emulators are not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulators_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST / FIREBASE_AUTH_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Start a repository on `store` with the default app id and a recording sink.
#[allow(dead_code)]
pub fn start_repository(store: &InMemoryStore) -> (Arc<SyncRepository>, Arc<RecordingSink>) {
    start_repository_with(store, RepositoryConfig::default())
}

/// Start a repository on `store` with a custom configuration.
#[allow(dead_code)]
pub fn start_repository_with(
    store: &InMemoryStore,
    config: RepositoryConfig,
) -> (Arc<SyncRepository>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let repository = SyncRepository::start(Arc::new(store.clone()), config, sink.clone())
        .expect("started inside a runtime");
    (Arc::new(repository), sink)
}

/// Poll `condition` until it holds, failing the test after [`WAIT_TIMEOUT`].
#[allow(dead_code)]
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {:?}",
            WAIT_TIMEOUT
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until the published list satisfies `predicate` and return it.
#[allow(dead_code)]
pub async fn wait_for_records(
    repository: &SyncRepository,
    predicate: impl Fn(&[WorkoutRecord]) -> bool,
) -> RecordList {
    let mut rx = repository.observe_records();
    let guard = tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(|r| predicate(r.as_slice())))
        .await
        .expect("Timed out waiting for records")
        .expect("Record channel closed");
    Arc::clone(&guard)
}

/// Stored fields of a workout completed at `date`.
#[allow(dead_code)]
pub fn workout_fields(workout_type: &str, date: DateTime<Utc>) -> Fields {
    encode_record(&WorkoutRecord::new(workout_type, 30, 250, date))
}

/// Parse an RFC3339 timestamp (test helper).
#[allow(dead_code)]
pub fn parse_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("valid RFC3339 timestamp")
        .with_timezone(&Utc)
}
