//! In-process document store.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::{Mutex, watch};

use super::{DocumentStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    docs: HashMap<String, Value>,
    watchers: HashMap<String, watch::Sender<Option<Value>>>,
}

impl Inner {
    fn write(&mut self, path: &str, value: Option<Value>) {
        match &value {
            Some(v) => {
                self.docs.insert(path.to_string(), v.clone());
            }
            None => {
                self.docs.remove(path);
            }
        }
        if self.watchers.get(path).is_some_and(watch::Sender::is_closed) {
            self.watchers.remove(path);
        } else if let Some(tx) = self.watchers.get(path) {
            tx.send_replace(value);
        }
    }
}

/// Document store held in memory
///
/// All operations on one store are serialized, which makes
/// `compare_and_swap` atomic across tasks.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.inner.lock().await.docs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        Ok(self.inner.lock().await.docs.get(path).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        let value = (!value.is_null()).then_some(value);
        self.inner.lock().await.write(path, value);
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let mut doc = match inner.docs.get(path) {
            Some(Value::Object(existing)) => existing.clone(),
            Some(_) => {
                return Err(StoreError::NotAnObject {
                    path: path.to_string(),
                });
            }
            None => Map::new(),
        };
        doc.extend(fields);
        inner.write(path, Some(Value::Object(doc)));
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        path: &str,
        expected: Option<&Value>,
        new: Option<Value>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        if inner.docs.get(path) != expected {
            return Ok(false);
        }
        inner.write(path, new);
        Ok(true)
    }

    async fn subscribe(&self, path: &str) -> StoreResult<watch::Receiver<Option<Value>>> {
        let mut inner = self.inner.lock().await;
        inner.watchers.retain(|_, tx| !tx.is_closed());
        let current = inner.docs.get(path).cloned();
        let tx = inner
            .watchers
            .entry(path.to_string())
            .or_insert_with(|| watch::channel(current).0);
        Ok(tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_and_remove() {
        let store = MemoryStore::new();
        store.set("a/b", json!({"x": 1})).await.unwrap();
        assert_eq!(store.get("a/b").await.unwrap(), Some(json!({"x": 1})));

        store.set("a/b", Value::Null).await.unwrap();
        assert_eq!(store.get("a/b").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_merges_top_level_fields() {
        let store = MemoryStore::new();
        store
            .set("m", json!({"slot_a": "x", "slot_b": "y", "status": "pending"}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("slot_b".to_string(), json!("z"));
        store.update("m", fields).await.unwrap();

        assert_eq!(
            store.get("m").await.unwrap(),
            Some(json!({"slot_a": "x", "slot_b": "z", "status": "pending"}))
        );
    }

    #[tokio::test]
    async fn test_update_rejects_non_objects() {
        let store = MemoryStore::new();
        store.set("n", json!(3)).await.unwrap();
        assert!(matches!(
            store.update("n", Map::new()).await,
            Err(StoreError::NotAnObject { .. })
        ));
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = MemoryStore::new();
        assert!(store.compare_and_swap("l", None, Some(json!("mat-1"))).await.unwrap());
        assert!(!store.compare_and_swap("l", None, Some(json!("mat-2"))).await.unwrap());
        assert_eq!(store.get("l").await.unwrap(), Some(json!("mat-1")));

        assert!(
            store
                .compare_and_swap("l", Some(&json!("mat-1")), None)
                .await
                .unwrap()
        );
        assert_eq!(store.get("l").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_subscribe_sees_changes() {
        let store = MemoryStore::new();
        store.set("m", json!({"status": "pending"})).await.unwrap();

        let mut rx = store.subscribe("m").await.unwrap();
        assert_eq!(*rx.borrow(), Some(json!({"status": "pending"})));

        store.set("m", json!({"status": "locked"})).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(json!({"status": "locked"})));
    }

    #[tokio::test]
    async fn test_dropped_subscriptions_are_pruned() {
        let store = MemoryStore::new();
        let rx = store.subscribe("a").await.unwrap();
        drop(store.subscribe("b").await.unwrap());

        store.set("b", json!(1)).await.unwrap();
        assert_eq!(store.inner.lock().await.watchers.len(), 1);

        drop(rx);
        let mut again = store.subscribe("c").await.unwrap();
        assert_eq!(store.inner.lock().await.watchers.len(), 1);
        assert_eq!(*again.borrow_and_update(), None);

        // a fresh subscription to a pruned path still starts from the document
        store.set("b", json!(2)).await.unwrap();
        let rx = store.subscribe("b").await.unwrap();
        assert_eq!(*rx.borrow(), Some(json!(2)));
    }
}
