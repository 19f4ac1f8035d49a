// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entry form: turns raw text input into a workout record.

use crate::error::ValidationError;
use crate::models::WorkoutRecord;
use crate::services::SyncRepository;
use chrono::Utc;
use std::sync::Arc;

/// Suggested workout types for pickers. Advisory only: any non-blank type
/// is accepted.
pub const WORKOUT_TYPES: [&str; 6] = [
    "Running", "Lifting", "Yoga", "Cycling", "Swimming", "Walking",
];

/// Validates input and hands accepted records to the repository.
pub struct WorkoutEntryForm {
    repository: Arc<SyncRepository>,
}

impl WorkoutEntryForm {
    pub fn new(repository: Arc<SyncRepository>) -> Self {
        Self { repository }
    }

    pub fn workout_types(&self) -> &'static [&'static str] {
        &WORKOUT_TYPES
    }

    /// Validate the input and queue the record for saving.
    ///
    /// `Ok` only means the input was valid; whether the record is stored
    /// shows up later in the repository's live list.
    pub fn submit(
        &self,
        workout_type: &str,
        duration_text: &str,
        calories_text: &str,
    ) -> Result<WorkoutRecord, ValidationError> {
        let record = validate_and_build(workout_type, duration_text, calories_text)?;
        self.repository.add_record(record.clone());
        Ok(record)
    }
}

/// Build a record from raw input, dated now, or reject the input as a whole.
///
/// Numbers must be plain integers (no surrounding whitespace) and both must
/// be positive; the type must contain a non-whitespace character.
pub fn validate_and_build(
    workout_type: &str,
    duration_text: &str,
    calories_text: &str,
) -> Result<WorkoutRecord, ValidationError> {
    if workout_type.trim().is_empty() {
        return Err(ValidationError::BlankType);
    }

    let duration: i32 = duration_text
        .parse()
        .map_err(|_| ValidationError::InvalidDuration(duration_text.to_string()))?;
    let calories: i32 = calories_text
        .parse()
        .map_err(|_| ValidationError::InvalidCalories(calories_text.to_string()))?;

    if duration <= 0 {
        return Err(ValidationError::NonPositiveDuration(duration));
    }
    if calories <= 0 {
        return Err(ValidationError::NonPositiveCalories(calories));
    }

    Ok(WorkoutRecord::new(workout_type, duration, calories, Utc::now()))
}
