//! Keyed-collection storage abstraction with an in-memory and a MongoDB
//! backend. Core components depend only on [`DocumentCollection`], never on a
//! concrete backend.

pub mod memory;
pub mod mongo;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate document")]
    Duplicate,

    #[error("codec error: {0}")]
    Codec(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ordering comparison operators supported by the filter language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Arithmetic combination of field references and constants, usable on one
/// side of a computed `<` comparison. Only time-based expiry sweeps need
/// this form.
#[derive(Debug, Clone)]
pub enum NumExpr {
    Field(String),
    Const(f64),
    Sum(Vec<NumExpr>),
    Product(Vec<NumExpr>),
}

#[derive(Debug, Clone)]
pub(crate) enum Clause {
    Eq(String, Value),
    Cmp(String, Cmp, Value),
    /// left < right
    ExprLt(NumExpr, NumExpr),
}

/// Conjunctive filter over top-level wire-named fields. An empty filter
/// matches every document.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub(crate) clauses: Vec<Clause>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(field, value)
    }

    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(field.into(), value.into()));
        self
    }

    pub fn cmp(field: impl Into<String>, op: Cmp, value: impl Into<Value>) -> Self {
        Self::all().and_cmp(field, op, value)
    }

    pub fn and_cmp(mut self, field: impl Into<String>, op: Cmp, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Cmp(field.into(), op, value.into()));
        self
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, Cmp::Lt, value)
    }

    pub fn expr_lt(left: NumExpr, right: NumExpr) -> Self {
        let mut filter = Self::all();
        filter.clauses.push(Clause::ExprLt(left, right));
        filter
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Async view of one named collection, keyed by a caller-chosen identity
/// field. `upsert` replaces the first document matching the filter, or
/// inserts the given document when nothing matches.
#[async_trait]
pub trait DocumentCollection<T>: Send + Sync {
    async fn find_one(&self, filter: Filter) -> StoreResult<Option<T>>;
    async fn find(&self, filter: Filter) -> StoreResult<Vec<T>>;
    async fn upsert(&self, filter: Filter, doc: &T) -> StoreResult<()>;
    /// Fails with [`StoreError::Duplicate`] when the identity already exists.
    async fn insert_one(&self, doc: &T) -> StoreResult<()>;
    async fn delete_one(&self, filter: Filter) -> StoreResult<u64>;
    async fn delete_many(&self, filter: Filter) -> StoreResult<u64>;
    async fn count(&self, filter: Filter) -> StoreResult<u64>;
}

/// Backend selector built once at startup from configuration.
pub enum Storage {
    Memory(MemoryStore),
    Mongo(mongodb::Database),
}

impl Storage {
    pub fn memory() -> Self {
        Storage::Memory(MemoryStore::new())
    }

    pub fn collection<T>(&self, name: &str, id_field: &str) -> Arc<dyn DocumentCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + 'static,
    {
        match self {
            Storage::Memory(store) => Arc::new(store.collection::<T>(name, id_field)),
            Storage::Mongo(db) => Arc::new(mongo::MongoCollection::new(db.collection::<T>(name))),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Storage::Memory(_) => "memory",
            Storage::Mongo(_) => "mongodb",
        }
    }
}
