// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier carried by a record until the store assigns a real one.
pub const PLACEHOLDER_ID: &str = "temp_id";

/// One logged workout session.
///
/// The type itself accepts any values; positivity of the numeric fields and
/// a non-blank type are checked by the entry form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRecord {
    /// Store document ID, or [`PLACEHOLDER_ID`] before the first write
    pub id: String,
    /// Activity kind (Running, Yoga, ...)
    #[serde(rename = "type")]
    pub workout_type: String,
    /// Length of the session in minutes
    pub duration_minutes: i32,
    /// Estimated calories burned
    pub calories_burned: i32,
    /// When the workout was completed
    pub date: DateTime<Utc>,
    /// Free-form notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl WorkoutRecord {
    /// Build a record that has not been stored yet.
    pub fn new(
        workout_type: impl Into<String>,
        duration_minutes: i32,
        calories_burned: i32,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PLACEHOLDER_ID.to_string(),
            workout_type: workout_type.into(),
            duration_minutes,
            calories_burned,
            date,
            notes: None,
        }
    }

    /// Whether the store has assigned this record an id.
    pub fn is_stored(&self) -> bool {
        self.id != PLACEHOLDER_ID
    }
}
