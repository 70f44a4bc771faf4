//! In-process backend. Used by the test suite and as the offline
//! stand-in for the hosted store; keeps an op log so tests can assert on
//! exact compensation traffic.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{merge_patch, order_docs, Backend, Document, Feed, Subscription};
use crate::error::PersistError;

/// What the backend was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Create {
        collection: String,
        id: String,
    },
    Update {
        collection: String,
        id: String,
    },
    Delete {
        collection: String,
        id: String,
    },
    Increment {
        collection: String,
        id: String,
        field: String,
        delta: i64,
    },
}

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    feeds: Vec<Feed>,
    ops: Vec<Op>,
    fail_increments: bool,
}

#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the op log.
    pub fn take_ops(&self) -> Vec<Op> {
        std::mem::take(&mut self.lock().ops)
    }

    /// Make every subsequent `increment` fail, simulating lost
    /// compensating writes.
    pub fn fail_increments(&self, fail: bool) {
        self.lock().fail_increments = fail;
    }

    /// Push an error notification into every open feed on `collection`,
    /// simulating a dropped change-feed connection.
    pub fn inject_feed_error(&self, collection: &str, error: PersistError) {
        let inner = self.lock();
        for feed in inner.feeds.iter().filter(|f| f.collection == collection) {
            let _ = feed.tx.send(Err(error.clone()));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(inner: &Inner, collection: &str, order_key: &str) -> Vec<Document> {
        let mut docs: Vec<Document> = inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, body)| Document {
                        id: id.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        order_docs(&mut docs, order_key);
        docs
    }

    fn notify(inner: &mut Inner, collection: &str) {
        inner.feeds.retain(|feed| !feed.tx.is_closed());
        for feed in inner.feeds.iter().filter(|f| f.collection == collection) {
            let snap = Self::snapshot(inner, collection, &feed.order_key);
            let _ = feed.tx.send(Ok(snap));
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn create(&self, collection: &str, body: Value) -> Result<String, PersistError> {
        let id = Uuid::new_v4().to_string();
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), body);
        inner.ops.push(Op::Create {
            collection: collection.to_string(),
            id: id.clone(),
        });
        Self::notify(&mut inner, collection);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), PersistError> {
        let mut inner = self.lock();
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| PersistError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_patch(doc, patch)?;
        inner.ops.push(Op::Update {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        Self::notify(&mut inner, collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), PersistError> {
        let mut inner = self.lock();
        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_none() {
            return Err(PersistError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        inner.ops.push(Op::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        Self::notify(&mut inner, collection);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, PersistError> {
        let inner = self.lock();
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|body| Document {
                id: id.to_string(),
                body: body.clone(),
            }))
    }

    async fn query(
        &self,
        collection: &str,
        filter: Option<(&str, Value)>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, PersistError> {
        let inner = self.lock();
        let mut out = Vec::new();
        if let Some(docs) = inner.collections.get(collection) {
            for (id, body) in docs {
                let matches = match &filter {
                    Some((field, value)) => body.get(*field) == Some(value),
                    None => true,
                };
                if matches {
                    out.push(Document {
                        id: id.clone(),
                        body: body.clone(),
                    });
                }
                if limit.is_some_and(|n| out.len() >= n) {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), PersistError> {
        let mut inner = self.lock();
        if inner.fail_increments {
            return Err(PersistError::Unavailable(
                "injected increment failure".to_string(),
            ));
        }
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| PersistError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
        if let Value::Object(fields) = doc {
            fields.insert(field.to_string(), Value::from(current + delta));
        }
        inner.ops.push(Op::Increment {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            delta,
        });
        Self::notify(&mut inner, collection);
        Ok(())
    }

    fn subscribe(&self, collection: &str, order_key: &str) -> Subscription {
        let (feed, sub) = Feed::open(collection, order_key);
        let mut inner = self.lock();
        let snap = Self::snapshot(&inner, collection, order_key);
        debug!(collection, docs = snap.len(), "feed opened");
        let _ = feed.tx.send(Ok(snap));
        inner.feeds.push(feed);
        sub
    }
}
