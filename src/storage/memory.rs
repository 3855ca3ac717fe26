//! In-memory backend: one `DashMap` of JSON documents per named collection,
//! serde at the boundary. Shares data between repeated `collection()` calls
//! for the same name so foreground handlers and the sweep task observe the
//! same state.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{Clause, Cmp, DocumentCollection, Filter, NumExpr, StoreError, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Arc<DashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection<T>(&self, name: &str, id_field: &str) -> MemoryCollection<T> {
        let data = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone();
        MemoryCollection {
            data,
            id_field: id_field.to_string(),
            _marker: PhantomData,
        }
    }
}

pub struct MemoryCollection<T> {
    data: Arc<DashMap<String, Value>>,
    id_field: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MemoryCollection<T> {
    fn doc_id(&self, doc: &Value) -> StoreResult<String> {
        doc.get(&self.id_field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::Codec(format!(
                    "document missing string id field `{}`",
                    self.id_field
                ))
            })
    }

    fn matching_keys(&self, filter: &Filter) -> Vec<String> {
        self.data
            .iter()
            .filter(|entry| matches(entry.value(), filter))
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[async_trait]
impl<T> DocumentCollection<T> for MemoryCollection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn find_one(&self, filter: Filter) -> StoreResult<Option<T>> {
        for entry in self.data.iter() {
            if matches(entry.value(), &filter) {
                return Ok(Some(serde_json::from_value(entry.value().clone())?));
            }
        }
        Ok(None)
    }

    async fn find(&self, filter: Filter) -> StoreResult<Vec<T>> {
        let mut out = Vec::new();
        for entry in self.data.iter() {
            if matches(entry.value(), &filter) {
                out.push(serde_json::from_value(entry.value().clone())?);
            }
        }
        Ok(out)
    }

    async fn upsert(&self, filter: Filter, doc: &T) -> StoreResult<()> {
        let value = serde_json::to_value(doc)?;
        let key = match self.matching_keys(&filter).into_iter().next() {
            Some(existing) => existing,
            None => self.doc_id(&value)?,
        };
        self.data.insert(key, value);
        Ok(())
    }

    async fn insert_one(&self, doc: &T) -> StoreResult<()> {
        let value = serde_json::to_value(doc)?;
        let key = self.doc_id(&value)?;
        if self.data.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        self.data.insert(key, value);
        Ok(())
    }

    async fn delete_one(&self, filter: Filter) -> StoreResult<u64> {
        match self.matching_keys(&filter).into_iter().next() {
            Some(key) => Ok(u64::from(self.data.remove(&key).is_some())),
            None => Ok(0),
        }
    }

    async fn delete_many(&self, filter: Filter) -> StoreResult<u64> {
        let mut deleted = 0;
        for key in self.matching_keys(&filter) {
            if self.data.remove(&key).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn count(&self, filter: Filter) -> StoreResult<u64> {
        Ok(self.matching_keys(&filter).len() as u64)
    }
}

fn matches(doc: &Value, filter: &Filter) -> bool {
    filter.clauses.iter().all(|clause| match clause {
        Clause::Eq(field, expected) => doc.get(field) == Some(expected),
        Clause::Cmp(field, op, bound) => doc
            .get(field)
            .and_then(|actual| compare(actual, bound))
            .is_some_and(|ord| accepts(*op, ord)),
        Clause::ExprLt(left, right) => match (eval(doc, left), eval(doc, right)) {
            (Some(l), Some(r)) => l < r,
            _ => false,
        },
    })
}

fn accepts(op: Cmp, ord: Ordering) -> bool {
    match op {
        Cmp::Lt => ord == Ordering::Less,
        Cmp::Lte => ord != Ordering::Greater,
        Cmp::Gt => ord == Ordering::Greater,
        Cmp::Gte => ord != Ordering::Less,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y.as_str())),
        _ => None,
    }
}

fn eval(doc: &Value, expr: &NumExpr) -> Option<f64> {
    match expr {
        NumExpr::Field(field) => doc.get(field)?.as_f64(),
        NumExpr::Const(x) => Some(*x),
        NumExpr::Sum(parts) => parts
            .iter()
            .map(|p| eval(doc, p))
            .try_fold(0.0, |acc, v| v.map(|v| acc + v)),
        NumExpr::Product(parts) => parts
            .iter()
            .map(|p| eval(doc, p))
            .try_fold(1.0, |acc, v| v.map(|v| acc * v)),
    }
}
