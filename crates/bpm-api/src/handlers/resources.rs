//! Resource handlers shared by every family.
//!
//! | Method | Path              | Handler    |
//! |--------|-------------------|------------|
//! | GET    | `/{resource}`     | [`list`]   |
//! | POST   | `/{resource}`     | [`create`] |
//! | GET    | `/{resource}/:id` | [`get`]    |
//! | PUT    | `/{resource}/:id` | [`update`] |
//! | DELETE | `/{resource}/:id` | [`delete`] |
//!
//! Extractor rejections are mapped to `400` with the JSON error body instead
//! of axum's plain-text defaults.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use bpm_core::{EntityQuery, EntityTx, Mutable, Page, PageRequest, PatchTx, Resource, Store};
use serde::{de::DeserializeOwned, Serialize};

use crate::auth::Caller;
use crate::{ApiError, AppState};

/// List one page of records.
///
/// # Query Parameters
/// - `page` (default 1), `page_size` (default 20, 5..=200)
/// - the family's filters; `organization_id` is ignored for scoped callers
///
/// # Returns
/// - 200 OK with `{ total, page, page_size, items }`
/// - 400 Bad Request for malformed or out-of-range parameters
pub async fn list<R, S>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    page: Result<Query<PageRequest>, QueryRejection>,
    filter: Result<Query<R::Filter>, QueryRejection>,
) -> Result<Json<Page<R>>, ApiError>
where
    R: Resource + Serialize,
    R::Filter: DeserializeOwned,
    S: Store + EntityQuery<R>,
{
    let Query(page) = page?;
    let Query(filter) = filter?;
    let result = state.service.list::<R>(filter, page, &caller).await?;
    Ok(Json(result))
}

/// Fetch one active record.
///
/// # Returns
/// - 200 OK with the record
/// - 404 Not Found when absent, deleted, or outside the caller's organization
pub async fn get<R, S>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<R>, ApiError>
where
    R: Resource + Serialize,
    S: Store + EntityQuery<R>,
{
    let Path(id) = id?;
    let record = state.service.get::<R>(id, &caller).await?;
    Ok(Json(record))
}

/// Create a record.
///
/// # Returns
/// - 201 Created with the stored record
/// - 400 / 403 / 409 / 422 per the error mapping
pub async fn create<R, S>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    payload: Result<Json<R::New>, JsonRejection>,
) -> Result<(StatusCode, Json<R>), ApiError>
where
    R: Resource + Serialize,
    R::New: DeserializeOwned,
    S: Store,
    S::Tx: EntityTx<R>,
{
    let Json(new) = payload?;
    let record = state.service.create::<R>(new, &caller).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Apply a partial update. Fields absent from the body keep their values.
///
/// # Returns
/// - 200 OK with the updated record
/// - 400 / 403 / 404 / 409 / 422 per the error mapping
pub async fn update<R, S>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<R::Patch>, JsonRejection>,
) -> Result<Json<R>, ApiError>
where
    R: Mutable + Serialize,
    R::Patch: DeserializeOwned,
    S: Store,
    S::Tx: PatchTx<R>,
{
    let Path(id) = id?;
    let Json(patch) = payload?;
    let record = state.service.update::<R>(id, patch, &caller).await?;
    Ok(Json(record))
}

/// Soft-delete a record.
///
/// # Returns
/// - 204 No Content
/// - 403 / 404 per the error mapping
pub async fn delete<R, S>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError>
where
    R: Mutable,
    S: Store,
    S::Tx: EntityTx<R>,
{
    let Path(id) = id?;
    state.service.delete::<R>(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}
