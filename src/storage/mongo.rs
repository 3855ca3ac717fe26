//! MongoDB backend. Lowers [`Filter`] clauses onto the driver's query
//! language; the computed-expression form becomes a `$expr` document.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReplaceOptions;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Clause, Cmp, DocumentCollection, Filter, NumExpr, StoreError, StoreResult};

pub struct MongoCollection<T> {
    inner: mongodb::Collection<T>,
}

impl<T> MongoCollection<T> {
    pub fn new(inner: mongodb::Collection<T>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T> DocumentCollection<T> for MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    async fn find_one(&self, filter: Filter) -> StoreResult<Option<T>> {
        Ok(self.inner.find_one(to_document(&filter)?, None).await?)
    }

    async fn find(&self, filter: Filter) -> StoreResult<Vec<T>> {
        let cursor = self.inner.find(to_document(&filter)?, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn upsert(&self, filter: Filter, doc: &T) -> StoreResult<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.inner
            .replace_one(to_document(&filter)?, doc, options)
            .await?;
        Ok(())
    }

    async fn insert_one(&self, doc: &T) -> StoreResult<()> {
        match self.inner.insert_one(doc, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StoreError::Duplicate),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_one(&self, filter: Filter) -> StoreResult<u64> {
        let result = self.inner.delete_one(to_document(&filter)?, None).await?;
        Ok(result.deleted_count)
    }

    async fn delete_many(&self, filter: Filter) -> StoreResult<u64> {
        let result = self.inner.delete_many(to_document(&filter)?, None).await?;
        Ok(result.deleted_count)
    }

    async fn count(&self, filter: Filter) -> StoreResult<u64> {
        Ok(self
            .inner
            .count_documents(to_document(&filter)?, None)
            .await?)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}

fn to_document(filter: &Filter) -> StoreResult<Document> {
    let mut out = Document::new();
    for clause in &filter.clauses {
        match clause {
            Clause::Eq(field, value) => {
                out.insert(field, to_bson(value)?);
            }
            Clause::Cmp(field, op, value) => {
                out.insert(field, doc! { mongo_op(*op): to_bson(value)? });
            }
            Clause::ExprLt(left, right) => {
                out.insert("$expr", doc! { "$lt": [expr_to_bson(left), expr_to_bson(right)] });
            }
        }
    }
    Ok(out)
}

fn to_bson(value: &serde_json::Value) -> StoreResult<Bson> {
    Bson::try_from(value.clone()).map_err(|e| StoreError::Codec(e.to_string()))
}

fn mongo_op(op: Cmp) -> &'static str {
    match op {
        Cmp::Lt => "$lt",
        Cmp::Lte => "$lte",
        Cmp::Gt => "$gt",
        Cmp::Gte => "$gte",
    }
}

fn expr_to_bson(expr: &NumExpr) -> Bson {
    match expr {
        NumExpr::Field(field) => Bson::String(format!("${field}")),
        NumExpr::Const(x) => Bson::Double(*x),
        NumExpr::Sum(parts) => {
            Bson::Document(doc! { "$add": parts.iter().map(expr_to_bson).collect::<Vec<_>>() })
        }
        NumExpr::Product(parts) => {
            Bson::Document(doc! { "$multiply": parts.iter().map(expr_to_bson).collect::<Vec<_>>() })
        }
    }
}
