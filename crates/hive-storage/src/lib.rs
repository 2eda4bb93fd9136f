//! Listing persistence for GoodHive: Postgres through sqlx, or an in-memory
//! fixture store that evaluates the same predicates without SQL.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hive_core::{FilterRequest, PageDefaults, ViewerAccess, ViewerStatus};
use hive_query::{
    AdminListing, ComposeError, ComposedQuery, JobListing, ListingQueryBuilder, TalentListing,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const CRATE_NAME: &str = "hive-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("row from {table} does not decode: {source}")]
    Decode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Unsupported(String),
}

/// The database capability: run a composed query against one table.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn count(&self, table: &str, query: &ComposedQuery) -> Result<i64, StoreError>;

    /// One page of rows, each a JSON object keyed by column name.
    async fn fetch_rows(
        &self,
        table: &str,
        query: &ComposedQuery,
    ) -> Result<Vec<Value>, StoreError>;
}

/// Viewer identity lookup. `Ok(None)` means the id is unknown.
#[async_trait]
pub trait ViewerDirectory: Send + Sync {
    async fn viewer_status(&self, viewer_id: &str) -> Result<Option<ViewerStatus>, StoreError>;
}

/// Resolve the tier for one request. Lookup failures resolve to anonymous.
pub async fn resolve_access<D>(directory: &D, viewer_id: Option<&str>) -> ViewerAccess
where
    D: ViewerDirectory + ?Sized,
{
    let Some(viewer_id) = viewer_id.map(str::trim).filter(|id| !id.is_empty()) else {
        return ViewerAccess::anonymous();
    };
    match directory.viewer_status(viewer_id).await {
        Ok(Some(status)) if status.has_approved_role() => ViewerAccess::approved(),
        Ok(Some(_)) => ViewerAccess::unverified(),
        Ok(None) => {
            debug!(viewer_id, "unknown viewer, treating as anonymous");
            ViewerAccess::anonymous()
        }
        Err(err) => {
            warn!(viewer_id, error = %err, "viewer lookup failed, treating as anonymous");
            ViewerAccess::anonymous()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingPage<V> {
    pub rows: Vec<V>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobsPage {
    pub jobs: Vec<hive_core::JobView>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TalentsPage {
    pub talents: Vec<hive_core::TalentView>,
    pub count: i64,
}

/// Admin rows are returned as stored, under `rows`.
pub type AdminPage = ListingPage<Value>;

/// Compose, COUNT, then SELECT one page and map every row for the viewer.
pub async fn fetch_listing<B>(
    store: &dyn ListingStore,
    builder: &B,
    filters: &FilterRequest,
    defaults: PageDefaults,
    access: &ViewerAccess,
    now: DateTime<Utc>,
) -> Result<ListingPage<B::View>, StoreError>
where
    B: ListingQueryBuilder,
{
    let table = builder.table();
    let query = builder.compose(filters, filters.pagination(defaults), now)?;
    debug!(
        table,
        sort = query.sort.token,
        values = query.values.len(),
        where_clause = %query.where_clause,
        "composed listing query"
    );

    let count = store.count(table, &query).await?;
    let raw_rows = store.fetch_rows(table, &query).await?;

    let mut rows = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        let row = serde_json::from_value::<B::Row>(raw)
            .map_err(|source| StoreError::Decode { table, source })?;
        rows.push(builder.map_row(row, access));
    }
    Ok(ListingPage { rows, count })
}

/// The listing entry points route handlers call.
#[derive(Clone)]
pub struct ListingService {
    store: Arc<dyn ListingStore>,
    directory: Arc<dyn ViewerDirectory>,
    defaults: PageDefaults,
}

impl ListingService {
    pub fn new(
        store: Arc<dyn ListingStore>,
        directory: Arc<dyn ViewerDirectory>,
        defaults: PageDefaults,
    ) -> Self {
        Self {
            store,
            directory,
            defaults,
        }
    }

    pub fn page_defaults(&self) -> PageDefaults {
        self.defaults
    }

    pub async fn fetch_jobs(
        &self,
        filters: &FilterRequest,
        viewer_id: Option<&str>,
    ) -> Result<JobsPage, StoreError> {
        let access = resolve_access(self.directory.as_ref(), viewer_id).await;
        let page = fetch_listing(
            self.store.as_ref(),
            &JobListing,
            filters,
            self.defaults,
            &access,
            Utc::now(),
        )
        .await?;
        Ok(JobsPage {
            jobs: page.rows,
            count: page.count,
        })
    }

    pub async fn fetch_talents(
        &self,
        filters: &FilterRequest,
        viewer_id: Option<&str>,
    ) -> Result<TalentsPage, StoreError> {
        let access = resolve_access(self.directory.as_ref(), viewer_id).await;
        let page = fetch_listing(
            self.store.as_ref(),
            &TalentListing,
            filters,
            self.defaults,
            &access,
            Utc::now(),
        )
        .await?;
        Ok(TalentsPage {
            talents: page.rows,
            count: page.count,
        })
    }

    /// Admin listings skip tier resolution; callers gate access before this.
    pub async fn fetch_admin_rows(
        &self,
        listing: &AdminListing,
        filters: &FilterRequest,
    ) -> Result<AdminPage, StoreError> {
        fetch_listing(
            self.store.as_ref(),
            listing,
            filters,
            self.defaults,
            &ViewerAccess::approved(),
            Utc::now(),
        )
        .await
    }
}
