// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the store layer and the entry form.
//!
//! Store errors never leave the repository: they are reported to the
//! event sink and the repository keeps running in its prior state.

/// Failure reported by a remote store operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Listen failed: {0}")]
    Listen(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Short machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Auth(_) => "auth",
            StoreError::Write(_) => "write",
            StoreError::Listen(_) => "listen",
            StoreError::Decode(_) => "decode",
            StoreError::Transport(_) => "transport",
        }
    }
}

/// Failure to start the sync repository.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("Sync repository must be started inside a Tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Rejection of raw entry-form input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Workout type must not be blank")]
    BlankType,

    #[error("Duration is not a whole number: {0:?}")]
    InvalidDuration(String),

    #[error("Calories is not a whole number: {0:?}")]
    InvalidCalories(String),

    #[error("Duration must be positive, got {0}")]
    NonPositiveDuration(i32),

    #[error("Calories must be positive, got {0}")]
    NonPositiveCalories(i32),
}
