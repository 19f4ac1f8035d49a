// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mapping between workout records and stored documents.
//!
//! Stored shape (field names are stable):
//! - `type`: string
//! - `durationMinutes`: integer
//! - `caloriesBurned`: integer
//! - `date`: timestamp
//! - `notes`: optional string, read but never written

use crate::db::{FieldValue, Fields, RawDocument};
use crate::error::StoreError;
use crate::models::WorkoutRecord;
use chrono::{DateTime, Utc};

pub const FIELD_TYPE: &str = "type";
pub const FIELD_DURATION: &str = "durationMinutes";
pub const FIELD_CALORIES: &str = "caloriesBurned";
pub const FIELD_DATE: &str = "date";
pub const FIELD_NOTES: &str = "notes";

/// Type used for documents stored without one.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// Convert a record to document fields for insertion.
///
/// The id is assigned by the store and is not written. Notes are not part
/// of the write path yet.
pub fn encode_record(record: &WorkoutRecord) -> Fields {
    Fields::from([
        (
            FIELD_TYPE.to_string(),
            FieldValue::String(record.workout_type.clone()),
        ),
        (
            FIELD_DURATION.to_string(),
            FieldValue::Integer(record.duration_minutes.into()),
        ),
        (
            FIELD_CALORIES.to_string(),
            FieldValue::Integer(record.calories_burned.into()),
        ),
        (FIELD_DATE.to_string(), FieldValue::Timestamp(record.date)),
    ])
}

/// Decode one stored document. Missing fields take defaults; fields of the
/// wrong kind fail the whole document.
pub fn decode_document(
    doc: &RawDocument,
    now: DateTime<Utc>,
) -> Result<WorkoutRecord, StoreError> {
    let workout_type = match present(&doc.fields, FIELD_TYPE) {
        None => UNKNOWN_TYPE.to_string(),
        Some(FieldValue::String(s)) => s.clone(),
        Some(other) => return Err(wrong_kind(FIELD_TYPE, "string", other)),
    };

    let duration_minutes = decode_int(&doc.fields, FIELD_DURATION)?;
    let calories_burned = decode_int(&doc.fields, FIELD_CALORIES)?;

    let date = match present(&doc.fields, FIELD_DATE) {
        None => now,
        Some(FieldValue::Timestamp(ts)) => *ts,
        Some(other) => return Err(wrong_kind(FIELD_DATE, "timestamp", other)),
    };

    let notes = match present(&doc.fields, FIELD_NOTES) {
        None => None,
        Some(FieldValue::String(s)) => Some(s.clone()),
        Some(other) => return Err(wrong_kind(FIELD_NOTES, "string", other)),
    };

    Ok(WorkoutRecord {
        id: doc.id.clone(),
        workout_type,
        duration_minutes,
        calories_burned,
        date,
        notes,
    })
}

/// A document that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeFailure {
    pub document_id: String,
    pub error: StoreError,
}

/// Decode every document of a snapshot and order the result newest first.
///
/// Undecodable documents are returned separately and left out of the list.
pub fn decode_snapshot(
    docs: &[RawDocument],
    now: DateTime<Utc>,
) -> (Vec<WorkoutRecord>, Vec<DecodeFailure>) {
    let mut records = Vec::with_capacity(docs.len());
    let mut failures = Vec::new();

    for doc in docs {
        match decode_document(doc, now) {
            Ok(record) => records.push(record),
            Err(error) => failures.push(DecodeFailure {
                document_id: doc.id.clone(),
                error,
            }),
        }
    }

    sort_newest_first(&mut records);
    (records, failures)
}

/// Order by `date` descending; ties keep snapshot order.
pub fn sort_newest_first(records: &mut [WorkoutRecord]) {
    records.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Field value, treating explicit nulls as absent.
fn present<'a>(fields: &'a Fields, name: &str) -> Option<&'a FieldValue> {
    fields.get(name).filter(|v| !matches!(v, FieldValue::Null))
}

fn decode_int(fields: &Fields, name: &str) -> Result<i32, StoreError> {
    match present(fields, name) {
        None => Ok(0),
        Some(FieldValue::Integer(n)) => i32::try_from(*n)
            .map_err(|_| StoreError::Decode(format!("field {name} out of range: {n}"))),
        // Numbers written by JavaScript clients arrive as doubles.
        Some(FieldValue::Double(d))
            if d.fract() == 0.0 && *d >= i32::MIN as f64 && *d <= i32::MAX as f64 =>
        {
            Ok(*d as i32)
        }
        Some(other) => Err(wrong_kind(name, "integer", other)),
    }
}

fn wrong_kind(name: &str, expected: &str, found: &FieldValue) -> StoreError {
    StoreError::Decode(format!("field {name}: expected {expected}, found {found:?}"))
}
