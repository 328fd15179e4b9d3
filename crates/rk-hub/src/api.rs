//! # API Handlers
//!
//! Axum handlers mapping REST verbs onto [`RecordService`] operations.
//! `/:resource` addresses every row matching the query string;
//! `/:resource/:id` addresses one row.

use crate::qs;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rk_core::{FindResult, OneOrMany, Record, Target};
use rk_service::{ErrorKind, Params, RecordService, ServiceError};
use serde_json::{json, Map, Value};
use std::sync::Arc;

type Pairs = Query<Vec<(String, String)>>;

// =============================================================================
// Errors
// =============================================================================

/// Error body: `{ "name": "NotFound", "message": "...", "code": 404 }`.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    UnknownResource(String),
    BadQuery(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::Service(err) => {
                let (status, name) = match err.kind() {
                    ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NotFound"),
                    ErrorKind::BadRequest => (StatusCode::BAD_REQUEST, "BadRequest"),
                    ErrorKind::Config | ErrorKind::Storage => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "GeneralError")
                    }
                };
                (status, name, err.to_string())
            }
            Self::UnknownResource(name) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                format!("No resource named '{}'", name),
            ),
            Self::BadQuery(message) => (StatusCode::BAD_REQUEST, "BadRequest", message.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, name, message) = self.parts();
        let body = json!({
            "name": name,
            "message": message,
            "code": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn service(state: &AppState, resource: &str) -> Result<Arc<RecordService>, ApiError> {
    state
        .resources
        .get(resource)
        .cloned()
        .ok_or_else(|| ApiError::UnknownResource(resource.to_string()))
}

fn query(pairs: &[(String, String)]) -> Result<Map<String, Value>, ApiError> {
    qs::decode(pairs).map_err(ApiError::BadQuery)
}

fn body_record(body: Value) -> Result<Record, ApiError> {
    match body {
        Value::Object(map) => Ok(Record::from(map)),
        _ => Err(ApiError::BadQuery("request body must be a JSON object".into())),
    }
}

// =============================================================================
// Collection routes
// =============================================================================

pub async fn find(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Query(pairs): Pairs,
) -> ApiResult<FindResult> {
    let service = service(&state, &resource)?;
    let params = Params::query(query(&pairs)?);
    Ok(Json(service.find(params).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Json(body): Json<OneOrMany<Record>>,
) -> Result<(StatusCode, Json<OneOrMany<Record>>), ApiError> {
    let service = service(&state, &resource)?;
    let created = service.create(body, Params::default()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn patch_many(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Query(pairs): Pairs,
    Json(body): Json<Value>,
) -> ApiResult<OneOrMany<Record>> {
    let service = service(&state, &resource)?;
    let target = Target::AllMatching(query(&pairs)?);
    Ok(Json(service.patch(target, body_record(body)?, Params::default()).await?))
}

pub async fn update_many(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Query(pairs): Pairs,
    Json(body): Json<Value>,
) -> ApiResult<Record> {
    let service = service(&state, &resource)?;
    let target = Target::AllMatching(query(&pairs)?);
    Ok(Json(service.update(target, body_record(body)?, Params::default()).await?))
}

pub async fn remove_many(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Query(pairs): Pairs,
) -> ApiResult<OneOrMany<Record>> {
    let service = service(&state, &resource)?;
    let target = Target::AllMatching(query(&pairs)?);
    Ok(Json(service.remove(target, Params::default()).await?))
}

// =============================================================================
// Item routes
// =============================================================================

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((resource, id)): Path<(String, String)>,
    Query(pairs): Pairs,
) -> ApiResult<Record> {
    let service = service(&state, &resource)?;
    let params = Params::query(query(&pairs)?);
    Ok(Json(service.get(qs::parse_id(&id), params).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path((resource, id)): Path<(String, String)>,
    Query(pairs): Pairs,
    Json(body): Json<Value>,
) -> ApiResult<Record> {
    let service = service(&state, &resource)?;
    let params = Params::query(query(&pairs)?);
    let target = Target::Single(qs::parse_id(&id));
    Ok(Json(service.update(target, body_record(body)?, params).await?))
}

pub async fn patch(
    State(state): State<Arc<AppState>>,
    Path((resource, id)): Path<(String, String)>,
    Query(pairs): Pairs,
    Json(body): Json<Value>,
) -> ApiResult<OneOrMany<Record>> {
    let service = service(&state, &resource)?;
    let params = Params::query(query(&pairs)?);
    let target = Target::Single(qs::parse_id(&id));
    Ok(Json(service.patch(target, body_record(body)?, params).await?))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path((resource, id)): Path<(String, String)>,
    Query(pairs): Pairs,
) -> ApiResult<OneOrMany<Record>> {
    let service = service(&state, &resource)?;
    let params = Params::query(query(&pairs)?);
    let target = Target::Single(qs::parse_id(&id));
    Ok(Json(service.remove(target, params).await?))
}

// =============================================================================
// Health
// =============================================================================

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut resources: Vec<&String> = state.resources.keys().collect();
    resources.sort();
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "resources": resources,
    }))
}
