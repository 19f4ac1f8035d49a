// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout Tracker console
//!
//! Line-oriented shell over the sync repository. Reads commands from stdin
//! and prints the workout list whenever a new snapshot arrives.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workout_tracker::{
    config::Config,
    db::{FirebaseStore, InMemoryStore, RemoteStore},
    models::WorkoutRecord,
    services::{SyncRepository, WorkoutEntryForm},
    time_utils::format_utc_rfc3339,
};

const HELP: &str = "commands: add <type> <minutes> <calories> | list | types | whoami | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging on stderr
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(app_id = %config.repository.app_id, "Starting Workout Tracker");

    let store: Arc<dyn RemoteStore> = match &config.firebase {
        Some(firebase) => {
            tracing::info!(project = %firebase.project_id, "Using Firebase backend");
            Arc::new(FirebaseStore::new(firebase))
        }
        None => {
            tracing::info!("No Firebase credentials, using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let repository = Arc::new(SyncRepository::start_with_tracing(
        store,
        config.repository.clone(),
    )?);
    let form = WorkoutEntryForm::new(repository.clone());

    // Print every new snapshot
    let mut records = repository.observe_records();
    let printer = tokio::spawn(async move {
        while records.changed().await.is_ok() {
            let snapshot = records.borrow_and_update().clone();
            print_records(&snapshot);
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => continue,
            ["add", workout_type, minutes, calories] => {
                match form.submit(workout_type, minutes, calories) {
                    Ok(record) => println!("queued {} ({} min)", record.workout_type, minutes),
                    Err(e) => println!("rejected: {e}"),
                }
            }
            ["list"] => print_records(&repository.records()),
            ["types"] => println!("{}", form.workout_types().join(", ")),
            ["whoami"] => match repository.current_user() {
                Some(user_id) => println!("{user_id}"),
                None => println!("not signed in"),
            },
            ["quit"] | ["exit"] => break,
            _ => println!("{HELP}"),
        }
    }

    repository.shutdown();
    printer.abort();
    Ok(())
}

fn print_records(records: &[WorkoutRecord]) {
    if records.is_empty() {
        println!("(no workouts)");
        return;
    }
    for record in records {
        println!(
            "{}  {:<10} {:>4} min {:>5} kcal  [{}]",
            format_utc_rfc3339(record.date),
            record.workout_type,
            record.duration_minutes,
            record.calories_burned,
            record.id
        );
    }
}

/// Initialize structured JSON logging (stdout is reserved for the shell).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("workout_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
