// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Workout tracker: log workout sessions and keep a live, newest-first view
//! of them in sync with a cloud document store.
//!
//! The [`services::SyncRepository`] owns the anonymous session and the live
//! record list; the [`services::WorkoutEntryForm`] validates raw input before
//! it reaches the repository.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod time_utils;
