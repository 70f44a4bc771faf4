//! Entity Store: the live, read-only snapshot of one collection that a
//! screen renders from. All writes go through `orchestrate`; the store
//! only ever reflects what the change feed delivers.

use tracing::warn;

use crate::context::AppContext;
use crate::error::PersistError;
use crate::model::Entity;
use crate::persist::Subscription;

pub struct Store<T> {
    sub: Subscription,
    snapshot: Vec<T>,
    last_error: Option<PersistError>,
}

impl<T: Entity> Store<T> {
    /// Open the live feed for `T`'s collection. Dropping the store
    /// releases the subscription.
    pub fn subscribe(ctx: &AppContext) -> Store<T> {
        let sub = ctx.persist.subscribe(T::COLLECTION, T::ORDER_KEY);
        Store {
            sub,
            snapshot: Vec::new(),
            last_error: None,
        }
    }

    /// Wait for the next feed event and fold it into the snapshot.
    /// Returns false once the feed has ended. A feed error keeps the
    /// last good snapshot in place.
    pub async fn refresh(&mut self) -> bool {
        match self.sub.next().await {
            Some(Ok(docs)) => {
                let mut decoded = Vec::with_capacity(docs.len());
                for doc in &docs {
                    match T::from_doc(&doc.id, &doc.body) {
                        Ok(entity) => decoded.push(entity),
                        Err(err) => warn!(
                            collection = T::COLLECTION,
                            id = %doc.id,
                            %err,
                            "skipping undecodable document"
                        ),
                    }
                }
                self.snapshot = decoded;
                self.last_error = None;
                true
            }
            Some(Err(err)) => {
                warn!(
                    collection = T::COLLECTION,
                    %err,
                    "change feed error; keeping last snapshot"
                );
                self.last_error = Some(err);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> &[T] {
        &self.snapshot
    }

    pub fn last_error(&self) -> Option<&PersistError> {
        self.last_error.as_ref()
    }
}
