// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: the remote store contract and its implementations.
//!
//! The repository only talks to [`RemoteStore`] and [`CollectionHandle`].
//! [`InMemoryStore`] backs offline runs and tests; [`FirebaseStore`] talks to
//! Firebase Auth and Firestore.

pub mod documents;
pub mod firebase;
pub mod memory;

pub use firebase::FirebaseStore;
pub use memory::InMemoryStore;

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Collection names and path builders.
pub mod collections {
    pub const ARTIFACTS: &str = "artifacts";
    pub const USERS: &str = "users";
    pub const WORKOUTS: &str = "workouts";

    /// Per-user workout collection: `artifacts/{app_id}/users/{user_id}/workouts`.
    pub fn user_workouts(app_id: &str, user_id: &str) -> String {
        format!("{ARTIFACTS}/{app_id}/{USERS}/{user_id}/{WORKOUTS}")
    }
}

/// A single stored field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    /// A value kind this crate does not model (maps, arrays, ...)
    Unsupported(String),
}

/// Field name to value mapping of one document.
pub type Fields = BTreeMap<String, FieldValue>;

/// A document as delivered by a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub fields: Fields,
}

/// One delivery from a subscription: the full document list, or the
/// failure that ended the listen.
pub type SnapshotEvent = Result<Vec<RawDocument>, StoreError>;

/// Authentication and collection access of a document store.
pub trait RemoteStore: Send + Sync + 'static {
    /// Current signed-in user id. The initial value is the state at startup;
    /// every later sign-in or sign-out is a change.
    fn auth_state(&self) -> watch::Receiver<Option<String>>;

    /// Create an anonymous session, returning its user id.
    fn sign_in_anonymously(&self) -> BoxFuture<'_, Result<String, StoreError>>;

    /// End the current session.
    fn sign_out(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Handle to the collection at `path`.
    fn collection(&self, path: &str) -> Arc<dyn CollectionHandle>;
}

/// Access to a single collection.
pub trait CollectionHandle: Send + Sync {
    fn path(&self) -> &str;

    /// Insert a document under a store-generated id and return that id.
    fn add_document(&self, fields: Fields) -> BoxFuture<'static, Result<String, StoreError>>;

    /// Start listening. The current contents are delivered first, then a
    /// full list after every change. Dropping the receiver ends the listen.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SnapshotEvent>;
}

const AUTO_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated document ids.
pub const DOCUMENT_ID_LEN: usize = 20;

/// Generate a random alphanumeric id of `len` characters.
pub fn auto_id(rng: &SystemRandom, len: usize) -> Result<String, StoreError> {
    let mut id = String::with_capacity(len);
    let mut buf = [0u8; 32];

    while id.len() < len {
        rng.fill(&mut buf)
            .map_err(|_| StoreError::Write("random source unavailable".to_string()))?;
        // Reject bytes past the largest multiple of the alphabet size to avoid bias.
        let limit = 256 - (256 % AUTO_ID_ALPHABET.len());
        for b in buf.iter().map(|&b| b as usize).filter(|&b| b < limit) {
            if id.len() == len {
                break;
            }
            id.push(AUTO_ID_ALPHABET[b % AUTO_ID_ALPHABET.len()] as char);
        }
    }

    Ok(id)
}
