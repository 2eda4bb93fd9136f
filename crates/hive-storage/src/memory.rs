use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use hive_core::decode::text_value;
use hive_core::ViewerStatus;
use hive_query::ComposedQuery;
use serde_json::{Map, Value};
use tokio::fs;

use crate::{ListingStore, StoreError, ViewerDirectory};

type Row = Map<String, Value>;

/// Tables loaded from a JSON document shaped `{"<table>": [ {row}, ... ]}`.
///
/// Queries run by evaluating the composed query's predicates and sort against
/// each row, so results line up with what Postgres returns for the same SQL.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<Row>>,
}

impl MemoryStore {
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading fixtures {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("parsing fixtures {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let tables: HashMap<String, Vec<Row>> = serde_json::from_str(raw)?;
        Ok(Self { tables })
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.tables.get(table).map(Vec::len).unwrap_or(0)
    }

    fn matching_rows<'a>(
        &'a self,
        table: &str,
        query: &ComposedQuery,
    ) -> Result<Vec<&'a Row>, StoreError> {
        let predicates = query.structural_predicates().ok_or_else(|| {
            StoreError::Unsupported(format!(
                "query on {table} has hand-written SQL the memory store cannot evaluate"
            ))
        })?;
        let rows = self.tables.get(table).map(Vec::as_slice).unwrap_or_default();
        Ok(rows
            .iter()
            .filter(|row| predicates.iter().all(|p| p.matches(row)))
            .collect())
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn count(&self, table: &str, query: &ComposedQuery) -> Result<i64, StoreError> {
        let matched = self.matching_rows(table, query)?.len();
        Ok(i64::try_from(matched).unwrap_or(i64::MAX))
    }

    async fn fetch_rows(
        &self,
        table: &str,
        query: &ComposedQuery,
    ) -> Result<Vec<Value>, StoreError> {
        let mut rows = self.matching_rows(table, query)?;
        rows.sort_by(|a, b| query.sort.compare_rows(a, b));
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .map(|row| Value::Object(row.clone()))
            .collect())
    }
}

#[async_trait]
impl ViewerDirectory for MemoryStore {
    async fn viewer_status(&self, viewer_id: &str) -> Result<Option<ViewerStatus>, StoreError> {
        let Some(users) = self.tables.get("users") else {
            return Ok(None);
        };
        let found = users.iter().find(|row| {
            ["userid", "user_id"]
                .iter()
                .filter_map(|key| row.get(*key).and_then(text_value))
                .any(|id| id == viewer_id)
        });
        match found {
            Some(row) => serde_json::from_value(Value::Object(row.clone()))
                .map(Some)
                .map_err(|source| StoreError::Decode { table: "users", source }),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hive_core::{FilterRequest, Pagination};
    use hive_query::{compose, JobListing, ListingQueryBuilder, PredicateFragment, SortSpec};
    use std::io::Write;

    const DOC: &str = r#"{
        "job_offers": [
            {"id": 1, "title": "Rust backend", "published": "true", "budget": "3,000",
             "created_at": "2026-09-01T00:00:00Z"},
            {"id": 2, "title": "Solidity auditor", "published": 1, "budget": "12000",
             "created_at": "2026-09-03T00:00:00Z"},
            {"id": 3, "title": "Rust draft", "published": false, "budget": null,
             "created_at": "2026-09-05T00:00:00Z"}
        ],
        "users": [
            {"userid": "u-1", "talent_status": "approved", "mentor_status": "pending"}
        ]
    }"#;

    #[tokio::test]
    async fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();
        let store = MemoryStore::load(file.path()).await.unwrap();
        assert_eq!(store.table_len("job_offers"), 3);
        assert_eq!(store.table_len("missing"), 0);

        let err = MemoryStore::load(file.path().with_extension("nope")).await.unwrap_err();
        assert!(err.to_string().contains("reading fixtures"));
    }

    #[tokio::test]
    async fn filters_sorts_and_pages() {
        let store = MemoryStore::from_json_str(DOC).unwrap();
        let filters = FilterRequest::from_query_str("search=rust").unwrap();
        let query = JobListing.compose(&filters, Pagination::new(1, 10), Utc::now()).unwrap();
        assert_eq!(store.count("job_offers", &query).await.unwrap(), 1);

        let all = JobListing
            .compose(&FilterRequest::default(), Pagination::new(1, 1), Utc::now())
            .unwrap();
        assert_eq!(store.count("job_offers", &all).await.unwrap(), 2);
        let rows = store.fetch_rows("job_offers", &all).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], 2);
    }

    #[tokio::test]
    async fn raw_fragments_are_rejected() {
        let store = MemoryStore::from_json_str(DOC).unwrap();
        let query = compose(
            vec![PredicateFragment::raw("title ~* $1", vec!["^rust".into()])],
            SortSpec::LATEST,
            Pagination::new(1, 10),
        )
        .unwrap();
        assert!(matches!(
            store.count("job_offers", &query).await,
            Err(StoreError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn viewer_lookup_by_id() {
        let store = MemoryStore::from_json_str(DOC).unwrap();
        let status = store.viewer_status("u-1").await.unwrap().unwrap();
        assert!(status.talent_status);
        assert!(!status.mentor_status);
        assert!(store.viewer_status("u-2").await.unwrap().is_none());
    }
}
