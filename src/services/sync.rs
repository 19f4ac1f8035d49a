// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync repository: the live, sorted view of the signed-in user's workouts.
//!
//! A single driver task owns the session. It reacts to auth-state changes
//! from the store (binding the user's collection on sign-in, requesting an
//! anonymous session on sign-out) and to snapshot deliveries (decode, sort,
//! publish). Writes are fire-and-forget: their outcome only reaches the
//! event sink, and callers see new records once the next snapshot arrives.

use crate::config::RepositoryConfig;
use crate::db::documents::{decode_snapshot, encode_record};
use crate::db::{collections, CollectionHandle, RawDocument, RemoteStore, SnapshotEvent};
use crate::error::StartError;
use crate::events::{EventSink, SyncEvent, TracingSink};
use crate::models::WorkoutRecord;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Published list of records, newest first.
pub type RecordList = Arc<Vec<WorkoutRecord>>;

/// Repository keeping the current user's workouts in sync with the store.
pub struct SyncRepository {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    store: Arc<dyn RemoteStore>,
    config: RepositoryConfig,
    sink: Arc<dyn EventSink>,
    records: watch::Sender<RecordList>,
    binding: RwLock<Option<Binding>>,
    runtime: Handle,
}

/// The signed-in user and their collection.
#[derive(Clone)]
struct Binding {
    user_id: String,
    collection: Arc<dyn CollectionHandle>,
}

/// The single active subscription.
struct Listen {
    path: String,
    rx: mpsc::UnboundedReceiver<SnapshotEvent>,
}

impl SyncRepository {
    /// Start the repository and its driver task on the current Tokio runtime.
    pub fn start(
        store: Arc<dyn RemoteStore>,
        config: RepositoryConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, StartError> {
        let runtime = Handle::try_current()?;
        let (records, _) = watch::channel(RecordList::default());

        let shared = Arc::new(Shared {
            store,
            config,
            sink,
            records,
            binding: RwLock::new(None),
            runtime: runtime.clone(),
        });

        let driver = runtime.spawn(run(shared.clone()));

        Ok(Self {
            shared,
            driver: Mutex::new(Some(driver)),
        })
    }

    /// Start the repository with events logged through `tracing`.
    pub fn start_with_tracing(
        store: Arc<dyn RemoteStore>,
        config: RepositoryConfig,
    ) -> Result<Self, StartError> {
        Self::start(store, config, Arc::new(TracingSink))
    }

    /// Live view of the records. Starts as an empty list; every snapshot
    /// from the store replaces the whole list.
    pub fn observe_records(&self) -> watch::Receiver<RecordList> {
        self.shared.records.subscribe()
    }

    /// Most recently published list.
    pub fn records(&self) -> RecordList {
        self.shared.records.borrow().clone()
    }

    /// Id of the signed-in user, if any.
    pub fn current_user(&self) -> Option<String> {
        read(&self.shared.binding)
            .as_ref()
            .map(|b| b.user_id.clone())
    }

    /// Queue a record for insertion and return immediately.
    ///
    /// Without a signed-in user the record is dropped. The store assigns
    /// the id; `id` and `notes` of `record` are not written. Neither outcome
    /// is reported to the caller.
    pub fn add_record(&self, record: WorkoutRecord) {
        let binding = read(&self.shared.binding).clone();
        let Some(binding) = binding else {
            self.shared.sink.record(SyncEvent::WriteSkipped {
                workout_type: record.workout_type,
            });
            return;
        };

        let path = binding.collection.path().to_string();
        let write = binding.collection.add_document(encode_record(&record));
        let sink = self.shared.sink.clone();

        self.shared.runtime.spawn(async move {
            match write.await {
                Ok(document_id) => sink.record(SyncEvent::RecordAdded { path, document_id }),
                Err(error) => sink.record(SyncEvent::WriteFailed { path, error }),
            }
        });
    }

    /// Stop the driver task and drop the active subscription.
    pub fn shutdown(&self) {
        if let Some(driver) = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            driver.abort();
        }
        *write(&self.shared.binding) = None;
    }
}

impl Drop for SyncRepository {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Driver loop: the only place the session and the subscription change.
async fn run(shared: Arc<Shared>) {
    let mut auth = shared.store.auth_state();

    // The state at startup counts as the first notification.
    let initial = auth.borrow_and_update().clone();
    let mut listen = shared.on_auth_state(initial, None).await;

    loop {
        tokio::select! {
            changed = auth.changed() => {
                if changed.is_err() {
                    tracing::debug!("Auth state channel closed, stopping sync driver");
                    break;
                }
                let state = auth.borrow_and_update().clone();
                listen = shared.on_auth_state(state, listen.take()).await;
            }
            event = next_event(&mut listen) => {
                shared.on_listen_event(&mut listen, event);
            }
        }
    }
}

/// Next delivery of the active subscription; never resolves without one.
async fn next_event(listen: &mut Option<Listen>) -> Option<SnapshotEvent> {
    match listen {
        Some(listen) => listen.rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Shared {
    /// Apply an auth-state notification, returning the subscription to keep.
    async fn on_auth_state(
        &self,
        state: Option<String>,
        current: Option<Listen>,
    ) -> Option<Listen> {
        match state {
            Some(user_id) => {
                let already_bound = current.is_some()
                    && read(&self.binding)
                        .as_ref()
                        .is_some_and(|b| b.user_id == user_id);
                if already_bound {
                    return current;
                }

                // Release the previous listen before opening the next one.
                drop(current);
                self.sink.record(SyncEvent::SignedIn {
                    user_id: user_id.clone(),
                });
                Some(self.bind_user_collection(user_id))
            }
            None => {
                drop(current);
                *write(&self.binding) = None;
                self.sink.record(SyncEvent::SignedOut);
                self.ensure_authenticated().await;
                None
            }
        }
    }

    /// Request an anonymous session. The resulting sign-in arrives as an
    /// auth-state change; failures are only reported.
    async fn ensure_authenticated(&self) {
        match self.store.sign_in_anonymously().await {
            Ok(user_id) => self.sink.record(SyncEvent::AnonymousSignIn { user_id }),
            Err(error) => self.sink.record(SyncEvent::AuthFailed { error }),
        }
    }

    fn bind_user_collection(&self, user_id: String) -> Listen {
        let path = collections::user_workouts(&self.config.app_id, &user_id);
        let collection = self.store.collection(&path);
        let rx = collection.subscribe();

        *write(&self.binding) = Some(Binding {
            user_id,
            collection,
        });
        self.sink
            .record(SyncEvent::CollectionBound { path: path.clone() });

        Listen { path, rx }
    }

    fn on_listen_event(&self, listen: &mut Option<Listen>, event: Option<SnapshotEvent>) {
        let Some(path) = listen.as_ref().map(|l| l.path.clone()) else {
            return;
        };

        match event {
            Some(Ok(documents)) => self.on_snapshot(path, &documents),
            Some(Err(error)) => {
                // No resubscription until the next auth transition.
                *listen = None;
                self.sink.record(SyncEvent::ListenFailed { path, error });
            }
            None => {
                *listen = None;
                self.sink.record(SyncEvent::ListenClosed { path });
            }
        }
    }

    fn on_snapshot(&self, path: String, documents: &[RawDocument]) {
        let (records, failures) = decode_snapshot(documents, Utc::now());

        for failure in failures {
            self.sink.record(SyncEvent::DecodeFailed {
                path: path.clone(),
                document_id: failure.document_id,
                error: failure.error,
            });
        }

        let count = records.len();
        self.records.send_replace(Arc::new(records));
        self.sink.record(SyncEvent::SnapshotPublished { path, count });
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
