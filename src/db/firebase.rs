// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase-backed store: anonymous auth plus Firestore.
//!
//! Handles:
//! - Anonymous sign-up through the Identity Toolkit API
//! - ID token refresh shortly before expiry
//! - Document inserts under client-generated ids
//! - Live collection snapshots through a Firestore listener
//!
//! Firestore requests carry the signed-in user's ID token, so security rules
//! see the anonymous user. For local development set
//! `FIREBASE_AUTH_EMULATOR_HOST` and `FIRESTORE_EMULATOR_HOST`.

use crate::config::FirebaseConfig;
use crate::db::{
    auto_id, CollectionHandle, FieldValue, Fields, RawDocument, RemoteStore, SnapshotEvent,
    DOCUMENT_ID_LEN,
};
use crate::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use firestore::{FirestoreListenEvent, FirestoreListenerTarget, FirestoreMemListenStateStorage};
use futures_util::future::BoxFuture;
use gcloud_sdk::google::firestore::v1::target_change::TargetChangeType;
use gcloud_sdk::google::firestore::v1::{value::ValueType, Document, TargetChange, Value};
use ring::rand::SystemRandom;
use serde::ser::{Serialize, Serializer};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::{mpsc, watch, Mutex};

/// Margin before ID token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Listen target id; every subscription has its own listener.
const WORKOUTS_TARGET: FirestoreListenerTarget = FirestoreListenerTarget::new(1);

type CollectionListener =
    firestore::FirestoreListener<firestore::FirestoreDb, FirestoreMemListenStateStorage>;

/// Base URLs of the Firebase Auth APIs.
#[derive(Debug, Clone)]
struct Endpoints {
    identity_toolkit: String,
    secure_token: String,
}

impl Endpoints {
    fn from_env() -> Self {
        match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) => {
                tracing::info!(host = %host, "Using Firebase Auth emulator");
                Self {
                    identity_toolkit: format!("http://{host}/identitytoolkit.googleapis.com"),
                    secure_token: format!("http://{host}/securetoken.googleapis.com"),
                }
            }
            Err(_) => Self {
                identity_toolkit: "https://identitytoolkit.googleapis.com".to_string(),
                secure_token: "https://securetoken.googleapis.com".to_string(),
            },
        }
    }
}

/// Tokens of the signed-in anonymous user.
#[derive(Clone)]
struct Session {
    user_id: String,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

/// Firebase Auth client holding the current session.
struct AuthClient {
    http: reqwest::Client,
    api_key: String,
    endpoints: Endpoints,
    /// Held across refreshes so only one refresh runs at a time.
    session: Mutex<Option<Session>>,
}

/// Firestore client bound to the session of one user.
struct SessionClient {
    user_id: String,
    db: firestore::FirestoreDb,
}

/// Firebase store client, cheap to clone.
#[derive(Clone)]
pub struct FirebaseStore {
    inner: Arc<FirebaseInner>,
}

struct FirebaseInner {
    project_id: String,
    auth: Arc<AuthClient>,
    auth_state: watch::Sender<Option<String>>,
    rng: SystemRandom,
    firestore: Mutex<Option<SessionClient>>,
}

impl FirebaseStore {
    /// Create a client for the configured project. Nobody is signed in.
    pub fn new(config: &FirebaseConfig) -> Self {
        let (auth_state, _) = watch::channel(None);
        Self {
            inner: Arc::new(FirebaseInner {
                project_id: config.project_id.clone(),
                auth: Arc::new(AuthClient {
                    http: reqwest::Client::new(),
                    api_key: config.api_key.clone(),
                    endpoints: Endpoints::from_env(),
                    session: Mutex::new(None),
                }),
                auth_state,
                rng: SystemRandom::new(),
                firestore: Mutex::new(None),
            }),
        }
    }
}

impl RemoteStore for FirebaseStore {
    fn auth_state(&self) -> watch::Receiver<Option<String>> {
        self.inner.auth_state.subscribe()
    }

    fn sign_in_anonymously(&self) -> BoxFuture<'_, Result<String, StoreError>> {
        Box::pin(async move {
            let session = self.inner.auth.sign_up().await?;
            let user_id = session.user_id.clone();

            *self.inner.auth.session.lock().await = Some(session);
            self.inner.auth_state.send_replace(Some(user_id.clone()));
            tracing::info!(user_id = %user_id, "Firebase anonymous session created");

            Ok(user_id)
        })
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            *self.inner.auth.session.lock().await = None;
            *self.inner.firestore.lock().await = None;
            self.inner.auth_state.send_replace(None);
            Ok(())
        })
    }

    fn collection(&self, path: &str) -> Arc<dyn CollectionHandle> {
        Arc::new(FirestoreCollection {
            inner: self.inner.clone(),
            path: path.to_string(),
        })
    }
}

struct FirestoreCollection {
    inner: Arc<FirebaseInner>,
    path: String,
}

impl CollectionHandle for FirestoreCollection {
    fn path(&self) -> &str {
        &self.path
    }

    fn add_document(&self, fields: Fields) -> BoxFuture<'static, Result<String, StoreError>> {
        let inner = self.inner.clone();
        let path = self.path.clone();
        Box::pin(async move { inner.create_document(&path, &fields).await })
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SnapshotEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(listen_collection(self.inner.clone(), self.path.clone(), tx));
        rx
    }
}

/// Run a listener on `path` until the receiver is dropped.
async fn listen_collection(
    inner: Arc<FirebaseInner>,
    path: String,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
) {
    let mut listener = match inner.start_listener(&path, tx.clone()).await {
        Ok(listener) => listener,
        Err(error) => {
            let _ = tx.send(Err(error));
            return;
        }
    };

    tx.closed().await;
    tracing::debug!(path = %path, "Snapshot receiver dropped, stopping listener");
    if let Err(e) = listener.shutdown().await {
        tracing::warn!(path = %path, error = %e, "Failed to stop Firestore listener");
    }
}

impl FirebaseInner {
    /// Firestore client for the current session, created on first use.
    async fn firestore(&self) -> Result<firestore::FirestoreDb, StoreError> {
        let user_id = self
            .auth
            .user_id()
            .await
            .ok_or_else(|| StoreError::Auth("No signed-in user".to_string()))?;

        let mut cached = self.firestore.lock().await;
        if let Some(client) = cached.as_ref().filter(|c| c.user_id == user_id) {
            return Ok(client.db.clone());
        }

        let db = connect(&self.project_id, self.auth.clone()).await?;
        *cached = Some(SessionClient {
            user_id,
            db: db.clone(),
        });
        Ok(db)
    }

    /// Insert a document under a generated id and return the id.
    async fn create_document(&self, path: &str, fields: &Fields) -> Result<String, StoreError> {
        let (parent, collection_id) = split_collection_path(path)
            .ok_or_else(|| StoreError::Write(format!("Not a collection path: {path}")))?;
        let db = self.firestore().await?;
        let parent = documents_parent(db.get_documents_path(), parent);
        let document_id = auto_id(&self.rng, DOCUMENT_ID_LEN)?;

        let _: () = db
            .fluent()
            .insert()
            .into(collection_id)
            .document_id(&document_id)
            .parent(&parent)
            .object(&StoredFields(fields))
            .execute()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        tracing::debug!(path = %path, document_id = %document_id, "Document created");
        Ok(document_id)
    }

    /// Register a listen target on the collection and start delivering snapshots.
    async fn start_listener(
        &self,
        path: &str,
        tx: mpsc::UnboundedSender<SnapshotEvent>,
    ) -> Result<CollectionListener, StoreError> {
        let (parent, collection_id) = split_collection_path(path)
            .ok_or_else(|| StoreError::Listen(format!("Not a collection path: {path}")))?;
        let db = self.firestore().await?;
        let parent = documents_parent(db.get_documents_path(), parent);

        let mut listener = db
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(|e| StoreError::Listen(e.to_string()))?;

        db.fluent()
            .select()
            .from(collection_id)
            .parent(&parent)
            .listen()
            .add_target(WORKOUTS_TARGET, &mut listener)
            .map_err(|e| StoreError::Listen(e.to_string()))?;

        let assembler = Arc::new(std::sync::Mutex::new(SnapshotAssembler::default()));
        listener
            .start(move |event| {
                let assembler = assembler.clone();
                let tx = tx.clone();
                async move {
                    let snapshot = assembler
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .apply(event);
                    if let Some(snapshot) = snapshot {
                        let _ = tx.send(snapshot);
                    }
                    Ok(())
                }
            })
            .await
            .map_err(|e| StoreError::Listen(e.to_string()))?;

        tracing::info!(path = %path, "Listening to collection");
        Ok(listener)
    }
}

/// Connect to Firestore with the session's ID token as bearer credentials.
async fn connect(
    project_id: &str,
    auth: Arc<AuthClient>,
) -> Result<firestore::FirestoreDb, StoreError> {
    if let Ok(host) = std::env::var("FIRESTORE_EMULATOR_HOST") {
        tracing::info!(host = %host, "Using Firestore emulator");
    }

    let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(move || {
        let auth = auth.clone();
        async move {
            // Without a session the request goes out unauthenticated and is
            // rejected by Firestore.
            let (token, expiry) = match auth.id_token().await {
                Ok(current) => current,
                Err(e) => {
                    tracing::warn!(error = %e, "No Firebase ID token for Firestore request");
                    (String::new(), Utc::now())
                }
            };
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(token.into()),
                expiry,
            })
        }
    });

    let options = firestore::FirestoreDbOptions::new(project_id.to_string());

    let db = firestore::FirestoreDb::with_options_token_source(
        options,
        gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
        gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
    )
    .await
    .map_err(|e| StoreError::Transport(format!("Failed to connect to Firestore: {}", e)))?;

    tracing::info!(project = project_id, "Connected to Firestore");
    Ok(db)
}

impl AuthClient {
    /// Create a new anonymous account.
    async fn sign_up(&self) -> Result<Session, StoreError> {
        let url = format!("{}/v1/accounts:signUp", self.endpoints.identity_toolkit);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "returnSecureToken": true }))
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("Sign-up request failed: {}", e)))?;

        let body: SignUpResponse = check_response_json(response, StoreError::Auth).await?;
        Ok(Session {
            user_id: body.local_id,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_at: expiry_from(&body.expires_in),
        })
    }

    async fn user_id(&self) -> Option<String> {
        self.session.lock().await.as_ref().map(|s| s.user_id.clone())
    }

    /// ID token of the current session and its expiry, refreshed if it is
    /// about to expire.
    async fn id_token(&self) -> Result<(String, DateTime<Utc>), StoreError> {
        let mut session = self.session.lock().await;
        let current = session
            .as_mut()
            .ok_or_else(|| StoreError::Auth("No signed-in user".to_string()))?;

        if !needs_refresh(current.expires_at, Utc::now()) {
            return Ok((current.id_token.clone(), current.expires_at));
        }

        tracing::debug!(user_id = %current.user_id, "Refreshing Firebase ID token");
        let url = format!("{}/v1/token", self.endpoints.secure_token);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("Token refresh request failed: {}", e)))?;

        let body: RefreshResponse = check_response_json(response, StoreError::Auth).await?;
        current.id_token = body.id_token;
        current.refresh_token = body.refresh_token;
        current.expires_at = expiry_from(&body.expires_in);

        Ok((current.id_token.clone(), current.expires_at))
    }
}

/// Whether a token expiring at `expires_at` is due for refresh at `now`.
fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) >= expires_at
}

/// Check response status and parse JSON body, mapping failures with `on_error`.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
    on_error: fn(String) -> StoreError,
) -> Result<T, StoreError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        return Err(on_error(format!("HTTP {}: {}", status, message)));
    }

    response
        .json()
        .await
        .map_err(|e| on_error(format!("JSON parse error: {}", e)))
}

/// Expiry instant from an `expiresIn` seconds string (one hour if unparsable).
fn expiry_from(expires_in: &str) -> DateTime<Utc> {
    let secs = expires_in.parse::<i64>().unwrap_or(3600);
    Utc::now() + Duration::seconds(secs)
}

// ─── Paths ──────────────────────────────────────────────────────

/// Split `a/b/c/d/coll` into the parent document path `a/b/c/d` and the
/// collection id `coll`. The parent is empty for a top-level collection.
fn split_collection_path(path: &str) -> Option<(&str, &str)> {
    let segments = path.split('/').count();
    if segments % 2 == 0 || path.split('/').any(str::is_empty) {
        return None;
    }
    Some(path.rsplit_once('/').unwrap_or(("", path)))
}

/// Full resource name of a parent document under the database's documents root.
fn documents_parent(documents_path: &str, parent: &str) -> String {
    if parent.is_empty() {
        documents_path.to_string()
    } else {
        format!("{documents_path}/{parent}")
    }
}

// ─── Documents ──────────────────────────────────────────────────

/// Document fields serialized through the Firestore serializer.
struct StoredFields<'a>(&'a Fields);

impl Serialize for StoredFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, value)| (name, StoredValue(value))))
    }
}

struct StoredValue<'a>(&'a FieldValue);

impl Serialize for StoredValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Integer(n) => serializer.serialize_i64(*n),
            FieldValue::Double(d) => serializer.serialize_f64(*d),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Timestamp(ts) => {
                firestore::serialize_as_timestamp::serialize(ts, serializer)
            }
            FieldValue::Unsupported(kind) => {
                tracing::warn!(kind = %kind, "Writing unsupported field value as null");
                serializer.serialize_none()
            }
        }
    }
}

/// Convert a listened document to the store-neutral shape.
fn raw_document(doc: &Document) -> RawDocument {
    RawDocument {
        id: document_id(&doc.name).to_string(),
        fields: doc
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), field_value(value)))
            .collect(),
    }
}

/// Last segment of a full document resource name.
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn field_value(value: &Value) -> FieldValue {
    match &value.value_type {
        Some(ValueType::NullValue(_)) => FieldValue::Null,
        Some(ValueType::BooleanValue(b)) => FieldValue::Boolean(*b),
        Some(ValueType::IntegerValue(n)) => FieldValue::Integer(*n),
        Some(ValueType::DoubleValue(d)) => FieldValue::Double(*d),
        Some(ValueType::StringValue(s)) => FieldValue::String(s.clone()),
        Some(ValueType::TimestampValue(ts)) => u32::try_from(ts.nanos)
            .ok()
            .and_then(|nanos| DateTime::from_timestamp(ts.seconds, nanos))
            .map(FieldValue::Timestamp)
            .unwrap_or_else(|| FieldValue::Unsupported("timestampValue".to_string())),
        Some(ValueType::BytesValue(_)) => FieldValue::Unsupported("bytesValue".to_string()),
        Some(ValueType::ReferenceValue(_)) => {
            FieldValue::Unsupported("referenceValue".to_string())
        }
        Some(ValueType::GeoPointValue(_)) => FieldValue::Unsupported("geoPointValue".to_string()),
        Some(ValueType::ArrayValue(_)) => FieldValue::Unsupported("arrayValue".to_string()),
        Some(ValueType::MapValue(_)) => FieldValue::Unsupported("mapValue".to_string()),
        Some(_) => FieldValue::Unsupported("other".to_string()),
        None => FieldValue::Unsupported("empty".to_string()),
    }
}

// ─── Snapshots ──────────────────────────────────────────────────

/// Builds full collection snapshots from listen events.
///
/// Document changes are buffered; a snapshot is emitted once the server
/// marks the target consistent (`CURRENT`, or `NO_CHANGE` with a read
/// time) and something changed since the last one. The first consistent
/// point always emits, so an empty collection still delivers a snapshot.
#[derive(Default)]
struct SnapshotAssembler {
    documents: BTreeMap<String, RawDocument>,
    dirty: bool,
    delivered: bool,
}

impl SnapshotAssembler {
    fn apply(&mut self, event: FirestoreListenEvent) -> Option<SnapshotEvent> {
        match event {
            FirestoreListenEvent::DocumentChange(change) => {
                let document = change.document?;
                if change.target_ids.is_empty() && !change.removed_target_ids.is_empty() {
                    self.remove(&document.name);
                } else {
                    let raw = raw_document(&document);
                    self.documents.insert(raw.id.clone(), raw);
                    self.dirty = true;
                }
                None
            }
            FirestoreListenEvent::DocumentDelete(delete) => {
                self.remove(&delete.document);
                None
            }
            FirestoreListenEvent::DocumentRemove(remove) => {
                self.remove(&remove.document);
                None
            }
            FirestoreListenEvent::TargetChange(change) => self.on_target_change(change),
            _ => None,
        }
    }

    fn remove(&mut self, name: &str) {
        if self.documents.remove(document_id(name)).is_some() {
            self.dirty = true;
        }
    }

    fn on_target_change(&mut self, change: TargetChange) -> Option<SnapshotEvent> {
        let kind = change.target_change_type;

        if kind == TargetChangeType::Remove as i32 {
            let message = change
                .cause
                .map(|status| status.message)
                .unwrap_or_else(|| "Listen target removed".to_string());
            return Some(Err(StoreError::Listen(message)));
        }

        if kind == TargetChangeType::Reset as i32 {
            self.documents.clear();
            self.dirty = true;
            return None;
        }

        let consistent = kind == TargetChangeType::Current as i32
            || (kind == TargetChangeType::NoChange as i32 && change.read_time.is_some());
        if !consistent || (self.delivered && !self.dirty) {
            return None;
        }

        self.dirty = false;
        self.delivered = true;
        Some(Ok(self.documents.values().cloned().collect()))
    }
}

// ─── Wire types ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gcloud_sdk::google::firestore::v1::{DocumentChange, DocumentDelete};
    use gcloud_sdk::prost_types::Timestamp;
    use std::collections::HashMap;

    const WORKOUTS: &str =
        "projects/demo/databases/(default)/documents/artifacts/a/users/u/workouts";

    fn value(value_type: ValueType) -> Value {
        Value {
            value_type: Some(value_type),
        }
    }

    fn document(id: &str, workout_type: &str) -> Document {
        Document {
            name: format!("{WORKOUTS}/{id}"),
            fields: HashMap::from([(
                "type".to_string(),
                value(ValueType::StringValue(workout_type.to_string())),
            )]),
            ..Default::default()
        }
    }

    fn changed(id: &str, workout_type: &str) -> FirestoreListenEvent {
        FirestoreListenEvent::DocumentChange(DocumentChange {
            document: Some(document(id, workout_type)),
            target_ids: vec![1],
            ..Default::default()
        })
    }

    fn deleted(id: &str) -> FirestoreListenEvent {
        FirestoreListenEvent::DocumentDelete(DocumentDelete {
            document: format!("{WORKOUTS}/{id}"),
            ..Default::default()
        })
    }

    fn target(kind: TargetChangeType) -> FirestoreListenEvent {
        FirestoreListenEvent::TargetChange(TargetChange {
            target_change_type: kind as i32,
            read_time: Some(Timestamp {
                seconds: 1_700_000_000,
                nanos: 0,
            }),
            ..Default::default()
        })
    }

    fn ids(snapshot: Option<SnapshotEvent>) -> Vec<String> {
        snapshot
            .expect("snapshot emitted")
            .expect("snapshot is not an error")
            .into_iter()
            .map(|d| d.id)
            .collect()
    }

    #[test]
    fn test_typed_values_convert_to_fields() {
        let mut doc = document("doc42", "Running");
        doc.fields.extend([
            (
                "durationMinutes".to_string(),
                value(ValueType::IntegerValue(30)),
            ),
            (
                "caloriesBurned".to_string(),
                value(ValueType::DoubleValue(310.0)),
            ),
            (
                "date".to_string(),
                value(ValueType::TimestampValue(Timestamp {
                    seconds: 1_709_277_300,
                    nanos: 250_000_000,
                })),
            ),
            ("notes".to_string(), value(ValueType::NullValue(0))),
            (
                "tags".to_string(),
                value(ValueType::ArrayValue(Default::default())),
            ),
        ]);

        let raw = raw_document(&doc);

        assert_eq!(raw.id, "doc42");
        assert_eq!(raw.fields["type"], FieldValue::String("Running".to_string()));
        assert_eq!(raw.fields["durationMinutes"], FieldValue::Integer(30));
        assert_eq!(raw.fields["caloriesBurned"], FieldValue::Double(310.0));
        assert_eq!(
            raw.fields["date"],
            FieldValue::Timestamp(
                Utc.with_ymd_and_hms(2024, 3, 1, 7, 15, 0).unwrap() + Duration::milliseconds(250)
            )
        );
        assert_eq!(raw.fields["notes"], FieldValue::Null);
        assert_eq!(
            raw.fields["tags"],
            FieldValue::Unsupported("arrayValue".to_string())
        );
    }

    #[test]
    fn test_empty_collection_emits_on_current() {
        let mut assembler = SnapshotAssembler::default();
        assert!(assembler.apply(target(TargetChangeType::Add)).is_none());
        assert!(ids(assembler.apply(target(TargetChangeType::Current))).is_empty());
    }

    #[test]
    fn test_initial_documents_arrive_as_one_snapshot() {
        let mut assembler = SnapshotAssembler::default();
        assert!(assembler.apply(changed("d1", "Yoga")).is_none());
        assert!(assembler.apply(changed("d2", "Running")).is_none());

        assert_eq!(
            ids(assembler.apply(target(TargetChangeType::Current))),
            vec!["d1", "d2"]
        );
        // Nothing changed since the last snapshot.
        assert!(assembler.apply(target(TargetChangeType::NoChange)).is_none());
    }

    #[test]
    fn test_every_change_reaches_a_snapshot() {
        let mut assembler = SnapshotAssembler::default();
        assembler.apply(changed("d1", "Yoga"));
        ids(assembler.apply(target(TargetChangeType::Current)));

        // A write followed by its deletion still produces a delivery.
        assembler.apply(changed("d2", "Cycling"));
        assert_eq!(
            ids(assembler.apply(target(TargetChangeType::NoChange))),
            vec!["d1", "d2"]
        );
        assembler.apply(deleted("d2"));
        assert_eq!(
            ids(assembler.apply(target(TargetChangeType::NoChange))),
            vec!["d1"]
        );
    }

    #[test]
    fn test_changed_document_replaces_previous_version() {
        let mut assembler = SnapshotAssembler::default();
        assembler.apply(changed("d1", "Yoga"));
        assembler.apply(changed("d1", "Swimming"));

        let snapshot = assembler
            .apply(target(TargetChangeType::Current))
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot[0].fields["type"],
            FieldValue::String("Swimming".to_string())
        );
    }

    #[test]
    fn test_reset_drops_buffered_documents() {
        let mut assembler = SnapshotAssembler::default();
        assembler.apply(changed("d1", "Yoga"));
        ids(assembler.apply(target(TargetChangeType::Current)));

        assembler.apply(target(TargetChangeType::Reset));
        assembler.apply(changed("d3", "Walking"));
        assert_eq!(
            ids(assembler.apply(target(TargetChangeType::Current))),
            vec!["d3"]
        );
    }

    #[test]
    fn test_removed_target_reports_listen_failure() {
        let mut assembler = SnapshotAssembler::default();
        let removed = FirestoreListenEvent::TargetChange(TargetChange {
            target_change_type: TargetChangeType::Remove as i32,
            cause: Some(gcloud_sdk::google::rpc::Status {
                code: 7,
                message: "Missing or insufficient permissions.".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });

        let error = assembler.apply(removed).unwrap().unwrap_err();
        assert_eq!(
            error,
            StoreError::Listen("Missing or insufficient permissions.".to_string())
        );
    }

    #[test]
    fn test_token_refresh_margin() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert!(!needs_refresh(now + Duration::minutes(30), now));
        assert!(!needs_refresh(now + Duration::minutes(6), now));
        assert!(needs_refresh(now + Duration::minutes(5), now));
        assert!(needs_refresh(now + Duration::minutes(1), now));
        assert!(needs_refresh(now - Duration::minutes(1), now));
    }

    #[test]
    fn test_collection_path_split() {
        assert_eq!(
            split_collection_path("artifacts/app/users/u1/workouts"),
            Some(("artifacts/app/users/u1", "workouts"))
        );
        assert_eq!(split_collection_path("workouts"), Some(("", "workouts")));
        assert_eq!(split_collection_path("artifacts/app"), None);
        assert_eq!(split_collection_path("artifacts//users"), None);
    }

    #[test]
    fn test_documents_parent() {
        let root = "projects/demo/databases/(default)/documents";
        assert_eq!(documents_parent(root, ""), root);
        assert_eq!(
            documents_parent(root, "artifacts/app/users/u1"),
            format!("{root}/artifacts/app/users/u1")
        );
    }

    #[test]
    fn test_expiry_from_seconds() {
        let before = Utc::now();
        let expiry = expiry_from("3600");
        assert!(expiry >= before + Duration::seconds(3600));
        assert!(expiry_from("garbage") > before + Duration::seconds(3000));
    }
}
