#![allow(dead_code)]

use formation_core::{Collection, Document, DocumentStore, Fields, Filter, StoreError, StoreResult};
use std::cell::RefCell;
use std::collections::HashMap;

/// Store wrapper that records every call made through it.
pub struct RecordingStore<S> {
    inner: S,
    calls: RefCell<Vec<String>>,
}

impl<S: DocumentStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl<S: DocumentStore> DocumentStore for RecordingStore<S> {
    fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: u32,
    ) -> StoreResult<Vec<Document>> {
        self.calls
            .borrow_mut()
            .push(format!("find {collection} limit={limit}"));
        self.inner.find(collection, filter, limit)
    }

    fn create(&self, collection: Collection, fields: &Fields) -> StoreResult<Document> {
        self.calls.borrow_mut().push(format!("create {collection}"));
        self.inner.create(collection, fields)
    }
}

/// Store wrapper that replays scripted anomalies before delegating.
///
/// - A stale find answers "no match" as if it ran before a concurrent
///   writer committed.
/// - A scripted create failure is returned once instead of writing.
pub struct ScriptedStore<S> {
    inner: S,
    stale_finds: RefCell<HashMap<Collection, u32>>,
    create_failures: RefCell<HashMap<Collection, StoreError>>,
    find_failures: RefCell<HashMap<Collection, StoreError>>,
}

impl<S: DocumentStore> ScriptedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            stale_finds: RefCell::new(HashMap::new()),
            create_failures: RefCell::new(HashMap::new()),
            find_failures: RefCell::new(HashMap::new()),
        }
    }

    pub fn stale_finds(self, collection: Collection, count: u32) -> Self {
        self.stale_finds.borrow_mut().insert(collection, count);
        self
    }

    pub fn fail_next_create(self, collection: Collection, err: StoreError) -> Self {
        self.create_failures.borrow_mut().insert(collection, err);
        self
    }

    pub fn fail_next_find(self, collection: Collection, err: StoreError) -> Self {
        self.find_failures.borrow_mut().insert(collection, err);
        self
    }
}

impl<S: DocumentStore> DocumentStore for ScriptedStore<S> {
    fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: u32,
    ) -> StoreResult<Vec<Document>> {
        if let Some(err) = self.find_failures.borrow_mut().remove(&collection) {
            return Err(err);
        }
        if let Some(remaining) = self.stale_finds.borrow_mut().get_mut(&collection) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(Vec::new());
            }
        }
        self.inner.find(collection, filter, limit)
    }

    fn create(&self, collection: Collection, fields: &Fields) -> StoreResult<Document> {
        if let Some(err) = self.create_failures.borrow_mut().remove(&collection) {
            return Err(err);
        }
        self.inner.create(collection, fields)
    }
}
