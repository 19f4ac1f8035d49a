// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Repository events and the sinks that receive them.
//!
//! Store failures never propagate to callers of the repository; they are
//! reported here instead. [`TracingSink`] forwards events to `tracing`,
//! [`RecordingSink`] keeps them in memory so tests can assert on them.

use crate::error::StoreError;
use std::sync::{Mutex, PoisonError};

/// Something the sync repository did or failed to do.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The store reported a signed-in user.
    SignedIn { user_id: String },
    /// The store reported that nobody is signed in.
    SignedOut,
    /// Anonymous sign-in was requested and succeeded.
    AnonymousSignIn { user_id: String },
    /// Anonymous sign-in was requested and failed.
    AuthFailed { error: StoreError },
    /// The user's collection was bound and a listen started.
    CollectionBound { path: String },
    /// A record write was accepted by the store.
    RecordAdded { path: String, document_id: String },
    /// A record write was rejected or could not be sent.
    WriteFailed { path: String, error: StoreError },
    /// `add_record` was called before any user was signed in.
    WriteSkipped { workout_type: String },
    /// The listen on a collection failed and ended.
    ListenFailed { path: String, error: StoreError },
    /// The store closed the listen without reporting an error.
    ListenClosed { path: String },
    /// A document in a snapshot could not be decoded and was dropped.
    DecodeFailed {
        path: String,
        document_id: String,
        error: StoreError,
    },
    /// A new snapshot was published to observers.
    SnapshotPublished { path: String, count: usize },
}

/// Receiver of repository events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: SyncEvent);
}

/// Sink that logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: SyncEvent) {
        match event {
            SyncEvent::SignedIn { user_id } => tracing::info!(user_id = %user_id, "User signed in"),
            SyncEvent::SignedOut => tracing::info!("No user signed in"),
            SyncEvent::AnonymousSignIn { user_id } => {
                tracing::info!(user_id = %user_id, "Anonymous sign in successful")
            }
            SyncEvent::AuthFailed { error } => {
                tracing::error!(error = %error, "Anonymous sign in failed")
            }
            SyncEvent::CollectionBound { path } => {
                tracing::debug!(path = %path, "Collection bound, listening for changes")
            }
            SyncEvent::RecordAdded { path, document_id } => {
                tracing::info!(path = %path, document_id = %document_id, "Workout added")
            }
            SyncEvent::WriteFailed { path, error } => {
                tracing::error!(path = %path, error = %error, "Error adding workout")
            }
            SyncEvent::WriteSkipped { workout_type } => tracing::warn!(
                workout_type = %workout_type,
                "Attempted to add workout before user was authenticated"
            ),
            SyncEvent::ListenFailed { path, error } => {
                tracing::error!(path = %path, error = %error, "Listen failed")
            }
            SyncEvent::ListenClosed { path } => {
                tracing::warn!(path = %path, "Listen closed by store")
            }
            SyncEvent::DecodeFailed {
                path,
                document_id,
                error,
            } => tracing::error!(
                path = %path,
                document_id = %document_id,
                error = %error,
                "Error converting document"
            ),
            SyncEvent::SnapshotPublished { path, count } => {
                tracing::debug!(path = %path, count, "Workouts updated")
            }
        }
    }
}

/// Sink that keeps events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&SyncEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: SyncEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_counts_matching_events() {
        let sink = RecordingSink::new();
        sink.record(SyncEvent::SignedOut);
        sink.record(SyncEvent::WriteSkipped {
            workout_type: "Yoga".to_string(),
        });
        sink.record(SyncEvent::SignedOut);

        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.count(|e| matches!(e, SyncEvent::SignedOut)), 2);
    }
}
