//! Axum JSON API over the GoodHive listing engine.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap},
    routing::get,
    Json, Router,
};
use hive_core::{FilterRequest, HiveConfig};
use hive_query::AdminListing;
use hive_storage::{AdminPage, JobsPage, ListingService, MemoryStore, PgStore, TalentsPage};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, info};

mod error;

pub use error::{sanitize_message, ApiError};

pub const CRATE_NAME: &str = "hive-web";

/// Header carrying the authenticated viewer id, set by the session layer in front of us.
pub const VIEWER_HEADER: &str = "x-viewer-id";

#[derive(Clone)]
pub struct AppState {
    pub service: ListingService,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(service: ListingService, admin_token: Option<String>) -> Self {
        Self { service, admin_token }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/jobs", get(jobs_handler))
        .route("/api/talents", get(talents_handler))
        .route("/api/admin/{table}", get(admin_handler))
        .with_state(Arc::new(state))
}

/// Postgres when `DATABASE_URL` is set, the fixture file otherwise.
pub async fn build_service(config: &HiveConfig) -> anyhow::Result<ListingService> {
    if let Some(url) = &config.database_url {
        let store = Arc::new(
            PgStore::connect(url, config)
                .await
                .context("connecting to DATABASE_URL")?,
        );
        info!(max_connections = config.db_max_connections, "using postgres listing store");
        return Ok(ListingService::new(store.clone(), store, config.page_defaults));
    }

    let store = Arc::new(MemoryStore::load(&config.fixtures_path).await?);
    info!(path = %config.fixtures_path.display(), "using fixture listing store");
    Ok(ListingService::new(store.clone(), store, config.page_defaults))
}

pub async fn serve(config: HiveConfig) -> anyhow::Result<()> {
    let service = build_service(&config).await?;
    let state = AppState::new(service, config.admin_token.clone());
    let listener = TcpListener::bind(("0.0.0.0", config.web_port))
        .await
        .with_context(|| format!("binding port {}", config.web_port))?;
    info!(port = config.web_port, "listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(HiveConfig::from_env()).await
}

/// Malformed query strings degrade to "no filters".
fn parse_filters(raw: Option<String>) -> FilterRequest {
    let raw = raw.unwrap_or_default();
    FilterRequest::from_query_str(&raw).unwrap_or_else(|err| {
        debug!(error = %err, "ignoring unparseable query string");
        FilterRequest::default()
    })
}

fn viewer_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(VIEWER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError::Forbidden("admin listings are disabled"));
    };
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    match provided {
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(ApiError::Unauthorized("invalid admin token")),
        None => Err(ApiError::Unauthorized("missing bearer token")),
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn jobs_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Json<JobsPage>, ApiError> {
    let filters = parse_filters(query);
    let page = state.service.fetch_jobs(&filters, viewer_id(&headers)).await?;
    Ok(Json(page))
}

async fn talents_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Json<TalentsPage>, ApiError> {
    let filters = parse_filters(query);
    let page = state.service.fetch_talents(&filters, viewer_id(&headers)).await?;
    Ok(Json(page))
}

async fn admin_handler(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Json<AdminPage>, ApiError> {
    authorize_admin(&state, &headers)?;
    let listing = AdminListing::for_slug(&table)
        .ok_or_else(|| ApiError::NotFound(format!("admin table {table}")))?;
    let filters = parse_filters(query);
    let page = state.service.fetch_admin_rows(&listing, &filters).await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use hive_core::{PageDefaults, ViewerStatus};
    use hive_query::ComposedQuery;
    use hive_storage::{ListingStore, StoreError, ViewerDirectory};
    use http_body_util::BodyExt;
    use std::path::Path as FsPath;
    use tower::ServiceExt;

    const TOKEN: &str = "s3cret";

    fn fixture_config() -> HiveConfig {
        HiveConfig {
            fixtures_path: FsPath::new(env!("CARGO_MANIFEST_DIR"))
                .join("../../fixtures/listings.json"),
            ..HiveConfig::default()
        }
    }

    async fn fixture_app() -> Router {
        let config = fixture_config();
        let service = build_service(&config).await.unwrap();
        app(AppState::new(service, Some(TOKEN.into())))
    }

    async fn get_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(request).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn handler_smoke_health() {
        let (status, body) = get_json(fixture_app().await, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn jobs_search_returns_envelope() {
        let (status, body) = get_json(
            fixture_app().await,
            get("/api/jobs?search=solidity&location=DE&page=1&items=9"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 4);
        assert_eq!(body["jobs"].as_array().unwrap().len(), 4);
        assert!(body["jobs"][0].get("companyEmail").is_none());
    }

    #[tokio::test]
    async fn malformed_filters_degrade_to_defaults() {
        let (status, body) = get_json(
            fixture_app().await,
            get("/api/jobs?datePosted=yesterday-ish&budgetRange=abc-5000\
                 &sort=drop%20table&items=-3"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 15);
        assert_eq!(body["jobs"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn talents_reveal_contacts_to_approved_viewers() {
        let app = fixture_app().await;
        let (_, anonymous) = get_json(app.clone(), get("/api/talents?search=solidity")).await;
        let talents = anonymous["talents"].as_array().unwrap();
        assert!(!talents.is_empty());
        assert!(talents.iter().all(|t| t.get("email").is_none() && t.get("telegram").is_none()));

        let request = Request::builder()
            .uri("/api/talents?search=solidity")
            .header(VIEWER_HEADER, "u-approved")
            .body(Body::empty())
            .unwrap();
        let (status, approved) = get_json(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["count"], anonymous["count"]);
        assert!(approved["talents"]
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t.get("email").is_some()));
    }

    #[tokio::test]
    async fn admin_requires_bearer_token() {
        let app = fixture_app().await;
        let (status, _) = get_json(app.clone(), get("/api/admin/users")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .uri("/api/admin/users")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_json(app.clone(), wrong).await.0, StatusCode::UNAUTHORIZED);

        let unknown = Request::builder()
            .uri("/api/admin/pg_shadow")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_json(app.clone(), unknown).await.0, StatusCode::NOT_FOUND);

        let ok = Request::builder()
            .uri("/api/admin/users?status=approved")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = get_json(app, ok).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert!(body["rows"][0].get("email").is_some());
    }

    #[tokio::test]
    async fn admin_disabled_without_configured_token() {
        let service = build_service(&fixture_config()).await.unwrap();
        let app = app(AppState::new(service, None));
        let request = Request::builder()
            .uri("/api/admin/jobs")
            .header(header::AUTHORIZATION, "Bearer anything")
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_json(app, request).await.0, StatusCode::FORBIDDEN);
    }

    struct BrokenStore;

    #[async_trait]
    impl ListingStore for BrokenStore {
        async fn count(&self, _table: &str, _query: &ComposedQuery) -> Result<i64, StoreError> {
            Err(StoreError::Unsupported("connection refused at postgres://db:5432".into()))
        }

        async fn fetch_rows(
            &self,
            _table: &str,
            _query: &ComposedQuery,
        ) -> Result<Vec<Value>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl ViewerDirectory for BrokenStore {
        async fn viewer_status(
            &self,
            _viewer_id: &str,
        ) -> Result<Option<ViewerStatus>, StoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn store_failures_are_500_with_sanitized_message() {
        let store = Arc::new(BrokenStore);
        let service = ListingService::new(store.clone(), store, PageDefaults::default());
        let (status, body) = get_json(app(AppState::new(service, None)), get("/api/jobs")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("connection refused"));
        assert!(!message.contains("postgres://"));
    }
}
