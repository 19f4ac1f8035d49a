// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store.
//!
//! Implements the full store contract without a network: anonymous sign-in
//! hands out random user ids, writes are applied immediately, and every
//! listener on a collection receives the complete document list after each
//! change. Used for offline runs and as the fake store in tests, which is
//! why it also exposes failure switches and listener counts.

use crate::db::{
    auto_id, CollectionHandle, Fields, RawDocument, RemoteStore, SnapshotEvent, DOCUMENT_ID_LEN,
};
use crate::error::StoreError;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use ring::rand::SystemRandom;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};

/// Length of generated anonymous user ids.
const USER_ID_LEN: usize = 28;

/// In-memory store, cheap to clone (all clones share state).
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    auth: watch::Sender<Option<String>>,
    collections: DashMap<String, CollectionState>,
    rng: SystemRandom,
    sign_in_failure: Mutex<Option<String>>,
    write_failure: Mutex<Option<String>>,
    sign_in_attempts: AtomicUsize,
    write_attempts: AtomicUsize,
}

#[derive(Default)]
struct CollectionState {
    documents: Vec<RawDocument>,
    listeners: Vec<mpsc::UnboundedSender<SnapshotEvent>>,
}

impl CollectionState {
    /// Send the full document list to every listener, dropping closed ones.
    fn broadcast(&mut self) {
        let snapshot = self.documents.clone();
        self.listeners
            .retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store with nobody signed in.
    pub fn new() -> Self {
        let (auth, _) = watch::channel(None);
        Self {
            inner: Arc::new(MemoryInner {
                auth,
                collections: DashMap::new(),
                rng: SystemRandom::new(),
                sign_in_failure: Mutex::new(None),
                write_failure: Mutex::new(None),
                sign_in_attempts: AtomicUsize::new(0),
                write_attempts: AtomicUsize::new(0),
            }),
        }
    }

    /// Sign in with a known user id, bypassing anonymous sign-in.
    pub fn sign_in_as(&self, user_id: &str) {
        self.inner.auth.send_replace(Some(user_id.to_string()));
    }

    /// Make subsequent anonymous sign-ins fail with `message` (`None` clears).
    pub fn fail_sign_in(&self, message: Option<&str>) {
        *lock(&self.inner.sign_in_failure) = message.map(str::to_string);
    }

    /// Make subsequent writes fail with `message` (`None` clears).
    pub fn fail_writes(&self, message: Option<&str>) {
        *lock(&self.inner.write_failure) = message.map(str::to_string);
    }

    /// End every listen on `path` with a listen error.
    pub fn fail_listen(&self, path: &str, message: &str) {
        if let Some(mut state) = self.inner.collections.get_mut(path) {
            for tx in state.listeners.drain(..) {
                let _ = tx.send(Err(StoreError::Listen(message.to_string())));
            }
        }
    }

    /// Store a document with a chosen id and notify listeners.
    ///
    /// Bypasses the write path, so arbitrary (even undecodable) documents
    /// can be seeded.
    pub fn insert_document(&self, path: &str, id: &str, fields: Fields) {
        let mut state = self.inner.collections.entry(path.to_string()).or_default();
        state.documents.push(RawDocument {
            id: id.to_string(),
            fields,
        });
        state.broadcast();
    }

    /// Documents currently stored at `path`, in insertion order.
    pub fn documents(&self, path: &str) -> Vec<RawDocument> {
        self.inner
            .collections
            .get(path)
            .map(|state| state.documents.clone())
            .unwrap_or_default()
    }

    /// Number of live listeners on `path`.
    pub fn active_listeners(&self, path: &str) -> usize {
        self.inner
            .collections
            .get_mut(path)
            .map(|mut state| {
                state.listeners.retain(|tx| !tx.is_closed());
                state.listeners.len()
            })
            .unwrap_or(0)
    }

    /// Number of anonymous sign-in requests received.
    pub fn sign_in_attempts(&self) -> usize {
        self.inner.sign_in_attempts.load(Ordering::SeqCst)
    }

    /// Number of document writes received, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.inner.write_attempts.load(Ordering::SeqCst)
    }
}

impl RemoteStore for InMemoryStore {
    fn auth_state(&self) -> watch::Receiver<Option<String>> {
        self.inner.auth.subscribe()
    }

    fn sign_in_anonymously(&self) -> BoxFuture<'_, Result<String, StoreError>> {
        Box::pin(async move {
            self.inner.sign_in_attempts.fetch_add(1, Ordering::SeqCst);

            if let Some(message) = lock(&self.inner.sign_in_failure).clone() {
                return Err(StoreError::Auth(message));
            }

            let user_id = auto_id(&self.inner.rng, USER_ID_LEN)
                .map_err(|e| StoreError::Auth(e.to_string()))?;
            self.inner.auth.send_replace(Some(user_id.clone()));
            Ok(user_id)
        })
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.inner.auth.send_replace(None);
            Ok(())
        })
    }

    fn collection(&self, path: &str) -> Arc<dyn CollectionHandle> {
        Arc::new(MemoryCollection {
            inner: self.inner.clone(),
            path: path.to_string(),
        })
    }
}

struct MemoryCollection {
    inner: Arc<MemoryInner>,
    path: String,
}

impl CollectionHandle for MemoryCollection {
    fn path(&self) -> &str {
        &self.path
    }

    fn add_document(&self, fields: Fields) -> BoxFuture<'static, Result<String, StoreError>> {
        let inner = self.inner.clone();
        let path = self.path.clone();

        Box::pin(async move {
            inner.write_attempts.fetch_add(1, Ordering::SeqCst);

            if let Some(message) = lock(&inner.write_failure).clone() {
                return Err(StoreError::Write(message));
            }

            let id = auto_id(&inner.rng, DOCUMENT_ID_LEN)?;
            let mut state = inner.collections.entry(path).or_default();
            state.documents.push(RawDocument {
                id: id.clone(),
                fields,
            });
            state.broadcast();
            Ok(id)
        })
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SnapshotEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.collections.entry(self.path.clone()).or_default();
        if tx.send(Ok(state.documents.clone())).is_ok() {
            state.listeners.push(tx);
        }
        rx
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FieldValue;

    #[tokio::test]
    async fn test_anonymous_sign_in_updates_auth_state() {
        let store = InMemoryStore::new();
        let auth = store.auth_state();
        assert_eq!(*auth.borrow(), None);

        let user_id = store.sign_in_anonymously().await.unwrap();
        assert_eq!(user_id.len(), USER_ID_LEN);
        assert_eq!(auth.borrow().as_deref(), Some(user_id.as_str()));

        store.sign_out().await.unwrap();
        assert_eq!(*auth.borrow(), None);
    }

    #[tokio::test]
    async fn test_sign_in_failure_leaves_state_unchanged() {
        let store = InMemoryStore::new();
        store.fail_sign_in(Some("quota exceeded"));

        let err = store.sign_in_anonymously().await.unwrap_err();
        assert_eq!(err, StoreError::Auth("quota exceeded".to_string()));
        assert_eq!(*store.auth_state().borrow(), None);
        assert_eq!(store.sign_in_attempts(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_and_updated_lists() {
        let store = InMemoryStore::new();
        let col = store.collection("a/b");
        let mut rx = col.subscribe();

        assert_eq!(rx.recv().await.unwrap().unwrap(), vec![]);

        let fields = Fields::from([("type".to_string(), FieldValue::String("Yoga".into()))]);
        let id = col.add_document(fields.clone()).await.unwrap();

        let docs = rx.recv().await.unwrap().unwrap();
        assert_eq!(docs, vec![RawDocument { id, fields }]);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_not_counted() {
        let store = InMemoryStore::new();
        let col = store.collection("a/b");

        let first = col.subscribe();
        let _second = col.subscribe();
        assert_eq!(store.active_listeners("a/b"), 2);

        drop(first);
        assert_eq!(store.active_listeners("a/b"), 1);
    }

    #[tokio::test]
    async fn test_write_failure_stores_nothing() {
        let store = InMemoryStore::new();
        store.fail_writes(Some("permission denied"));

        let result = store.collection("a/b").add_document(Fields::new()).await;
        assert!(matches!(result, Err(StoreError::Write(_))));
        assert!(store.documents("a/b").is_empty());
        assert_eq!(store.write_attempts(), 1);
    }

    #[tokio::test]
    async fn test_fail_listen_ends_subscription() {
        let store = InMemoryStore::new();
        let mut rx = store.collection("a/b").subscribe();
        let _ = rx.recv().await;

        store.fail_listen("a/b", "unavailable");
        assert!(matches!(rx.recv().await, Some(Err(StoreError::Listen(_)))));
        assert!(rx.recv().await.is_none());
        assert_eq!(store.active_listeners("a/b"), 0);
    }
}
