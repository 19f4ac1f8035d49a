// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod entry_form;
pub mod sync;

pub use entry_form::{validate_and_build, WorkoutEntryForm, WORKOUT_TYPES};
pub use sync::{RecordList, SyncRepository};
