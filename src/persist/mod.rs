//! Persistence-service contract: a hosted document store with live
//! change feeds and an atomic counter-increment primitive.

mod memory;
mod sqlite;

pub use memory::{MemoryBackend, Op};
pub use sqlite::SqliteBackend;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::PersistError;

/// One stored document: the storage key plus the JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub body: Value,
}

/// A change-feed notification: the full ordered snapshot of a
/// collection, or the error that interrupted the feed.
pub type FeedEvent = Result<Vec<Document>, PersistError>;

/// Handle for one live collection feed. Dropping it cancels the
/// subscription; the backend prunes the closed channel on its next
/// notification pass.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<FeedEvent>,
}

impl Subscription {
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }
}

pub(crate) struct Feed {
    collection: String,
    order_key: String,
    tx: mpsc::UnboundedSender<FeedEvent>,
}

impl Feed {
    fn open(collection: &str, order_key: &str) -> (Feed, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed = Feed {
            collection: collection.to_string(),
            order_key: order_key.to_string(),
            tx,
        };
        (feed, Subscription { rx })
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Store a new document and return its generated id.
    async fn create(&self, collection: &str, body: Value) -> Result<String, PersistError>;

    /// Merge `patch`'s top-level fields into the stored document.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), PersistError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), PersistError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, PersistError>;

    /// Equality filter on one top-level field; `None` lists the whole
    /// collection. Results are unordered.
    async fn query(
        &self,
        collection: &str,
        filter: Option<(&str, Value)>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, PersistError>;

    /// Atomic add-by-delta on a numeric top-level field. A missing field
    /// starts at zero.
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), PersistError>;

    /// Open a live snapshot feed, ordered ascending by `order_key`. The
    /// current snapshot is delivered immediately.
    fn subscribe(&self, collection: &str, order_key: &str) -> Subscription;
}

/// Ascending, case-insensitive string order on `order_key`, with the id
/// as tiebreak so snapshots are stable.
pub(crate) fn order_docs(docs: &mut [Document], order_key: &str) {
    docs.sort_by(|a, b| {
        sort_key(&a.body, order_key)
            .cmp(&sort_key(&b.body, order_key))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn sort_key(body: &Value, key: &str) -> String {
    body.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase()
}

/// Merge `patch` into `target` at the top level. Nested objects are
/// replaced wholesale, matching the store's partial-update semantics.
pub(crate) fn merge_patch(target: &mut Value, patch: Value) -> Result<(), PersistError> {
    let Value::Object(fields) = patch else {
        return Err(PersistError::Storage(
            "update patch must be a JSON object".to_string(),
        ));
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(existing) = target {
        for (key, value) in fields {
            existing.insert(key, value);
        }
    }
    Ok(())
}
