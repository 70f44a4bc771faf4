//! Local document store on sqlite. One row per document, JSON body in a
//! TEXT column; collections share a single table.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{merge_patch, order_docs, Backend, Document, Feed, Subscription};
use crate::error::PersistError;

struct Inner {
    conn: Connection,
    feeds: Vec<Feed>,
}

pub struct SqliteBackend {
    inner: Mutex<Inner>,
}

impl SqliteBackend {
    pub fn open(workspace: &Path) -> Result<Self, PersistError> {
        std::fs::create_dir_all(workspace)
            .map_err(|e| PersistError::Storage(e.to_string()))?;
        let db_path = workspace.join("odevd.sqlite3");
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents(
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY(collection, id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
            [],
        )?;

        Ok(SqliteBackend {
            inner: Mutex::new(Inner {
                conn,
                feeds: Vec::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(inner: &Inner, collection: &str) -> Result<Vec<Document>, PersistError> {
        let mut stmt = inner
            .conn
            .prepare("SELECT id, body FROM documents WHERE collection = ?")?;
        let rows = stmt.query_map([collection], |row| {
            let id: String = row.get(0)?;
            let body: String = row.get(1)?;
            Ok((id, body))
        })?;
        let mut docs = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let body: Value = serde_json::from_str(&body).map_err(|e| {
                PersistError::BadDocument {
                    collection: collection.to_string(),
                    reason: e.to_string(),
                }
            })?;
            docs.push(Document { id, body });
        }
        Ok(docs)
    }

    fn read_one(
        inner: &Inner,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>, PersistError> {
        let body: Option<String> = inner
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ? AND id = ?",
                [collection, id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(raw) => {
                let value = serde_json::from_str(&raw).map_err(|e| PersistError::BadDocument {
                    collection: collection.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn write_back(
        inner: &Inner,
        collection: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), PersistError> {
        inner.conn.execute(
            "UPDATE documents SET body = ? WHERE collection = ? AND id = ?",
            (body.to_string(), collection, id),
        )?;
        Ok(())
    }

    fn notify(inner: &mut Inner, collection: &str) {
        inner.feeds.retain(|feed| !feed.tx.is_closed());
        for feed in inner.feeds.iter().filter(|f| f.collection == collection) {
            let event = Self::load(inner, collection).map(|mut docs| {
                order_docs(&mut docs, &feed.order_key);
                docs
            });
            let _ = feed.tx.send(event);
        }
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn create(&self, collection: &str, body: Value) -> Result<String, PersistError> {
        let id = Uuid::new_v4().to_string();
        let mut inner = self.lock();
        inner.conn.execute(
            "INSERT INTO documents(collection, id, body) VALUES(?, ?, ?)",
            (collection, &id, body.to_string()),
        )?;
        Self::notify(&mut inner, collection);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), PersistError> {
        let mut inner = self.lock();
        let mut body = Self::read_one(&inner, collection, id)?.ok_or_else(|| {
            PersistError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }
        })?;
        merge_patch(&mut body, patch)?;
        Self::write_back(&inner, collection, id, &body)?;
        Self::notify(&mut inner, collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), PersistError> {
        let mut inner = self.lock();
        let changed = inner.conn.execute(
            "DELETE FROM documents WHERE collection = ? AND id = ?",
            [collection, id],
        )?;
        if changed == 0 {
            return Err(PersistError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Self::notify(&mut inner, collection);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, PersistError> {
        let inner = self.lock();
        Ok(Self::read_one(&inner, collection, id)?.map(|body| Document {
            id: id.to_string(),
            body,
        }))
    }

    async fn query(
        &self,
        collection: &str,
        filter: Option<(&str, Value)>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, PersistError> {
        let inner = self.lock();
        // Filter after load; collections here are small and the filter is
        // a single top-level equality.
        let docs = Self::load(&inner, collection)?;
        let mut out = Vec::new();
        for doc in docs {
            let matches = match &filter {
                Some((field, value)) => doc.body.get(*field) == Some(value),
                None => true,
            };
            if matches {
                out.push(doc);
            }
            if limit.is_some_and(|n| out.len() >= n) {
                break;
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
        let tx = inner.conn.unchecked_transaction()?;
        let raw: Option<String> = tx
            .query_row(
                "SELECT body FROM documents WHERE collection = ? AND id = ?",
                [collection, id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw) = raw else {
            return Err(PersistError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        let mut body: Value = serde_json::from_str(&raw).map_err(|e| {
            PersistError::BadDocument {
                collection: collection.to_string(),
                reason: e.to_string(),
            }
        })?;
        let current = body.get(field).and_then(Value::as_i64).unwrap_or(0);
        if let Value::Object(fields) = &mut body {
            fields.insert(field.to_string(), Value::from(current + delta));
        }
        tx.execute(
            "UPDATE documents SET body = ? WHERE collection = ? AND id = ?",
            (body.to_string(), collection, id),
        )?;
        tx.commit()?;
        Self::notify(&mut inner, collection);
        Ok(())
    }

    fn subscribe(&self, collection: &str, order_key: &str) -> Subscription {
        let (feed, sub) = Feed::open(collection, order_key);
        let mut inner = self.lock();
        let event = Self::load(&inner, collection).map(|mut docs| {
            order_docs(&mut docs, order_key);
            docs
        });
        debug!(collection, "feed opened");
        let _ = feed.tx.send(event);
        inner.feeds.push(feed);
        sub
    }
}
