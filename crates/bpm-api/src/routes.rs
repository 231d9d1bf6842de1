//! Router construction.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use bpm_core::{Element, EntityQuery, Meeting, Mutable, Node, PatchTx, Store, Team, Template, Upload};
use serde::{de::DeserializeOwned, Serialize};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::handlers::{health, resources};
use crate::AppState;

/// Request bodies are small JSON documents; uploads carry metadata only.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

fn parse_allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}

/// Full CRUD routes for a family at `/api/v1/{name}`.
fn crud_routes<R, S>(router: Router<AppState<S>>, name: &str) -> Router<AppState<S>>
where
    R: Mutable + Serialize,
    R::New: DeserializeOwned,
    R::Patch: DeserializeOwned,
    R::Filter: DeserializeOwned,
    S: Store + EntityQuery<R>,
    S::Tx: PatchTx<R>,
{
    router
        .route(
            &format!("/api/v1/{}", name),
            get(resources::list::<R, S>).post(resources::create::<R, S>),
        )
        .route(
            &format!("/api/v1/{}/:id", name),
            get(resources::get::<R, S>)
                .put(resources::update::<R, S>)
                .delete(resources::delete::<R, S>),
        )
}

/// Build the application router with all routes and middleware.
pub fn build_router<S: Store>(state: AppState<S>, allowed_origins: &[String]) -> Router {
    let api = Router::new();
    let api = crud_routes::<Template, S>(api, "templates");
    let api = crud_routes::<Node, S>(api, "nodes");
    let api = crud_routes::<Element, S>(api, "elements");
    let api = crud_routes::<Team, S>(api, "teams");
    let api = crud_routes::<Meeting, S>(api, "meetings");
    // Uploads are immutable once recorded.
    let api = api
        .route(
            "/api/v1/uploads",
            get(resources::list::<Upload, S>).post(resources::create::<Upload, S>),
        )
        .route("/api/v1/uploads/:id", get(resources::get::<Upload, S>));

    api.route("/health", get(health::health_check::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins(allowed_origins)))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .max_age(Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
