use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{
        HeaderMap, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, HOST},
    },
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde_json::Value;

use crate::application::{
    error::ErrorReport,
    page_settings::PageSettingsService,
    sitemap::{RequestHost, SitemapService},
};

use super::middleware::{log_responses, set_request_context};

const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

#[derive(Clone)]
pub struct HttpState {
    pub sitemap: Arc<SitemapService>,
    pub page_settings: Arc<PageSettingsService>,
}

/// Build the public router.
///
/// The dynamic sitemap route only exists behind the SEO flag; a disabled
/// deployment is expected to serve a pre-built static artifact instead.
pub fn build_router(state: HttpState, enable_seo: bool) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(health))
        .route("/robots.txt", get(robots_txt))
        .route("/api/page-settings/{page}", get(page_settings));

    if enable_seo {
        router = router.route("/sitemap.xml", get(sitemap));
    }

    router
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

fn request_host(headers: &HeaderMap) -> RequestHost {
    RequestHost {
        host: headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        forwarded_proto: headers
            .get(FORWARDED_PROTO_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}

async fn sitemap(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let outcome = state.sitemap.generate(&request_host(&headers)).await;
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/xml; charset=utf-8")
        .header(CACHE_CONTROL, outcome.cache_control())
        .body(Body::from(outcome.xml().to_string()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn robots_txt(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let body = state.sitemap.robots(&request_host(&headers));
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn page_settings(
    State(state): State<HttpState>,
    Path(page): Path<String>,
) -> Json<Value> {
    Json(state.page_settings.load(&page).await.unwrap_or(Value::Null))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found() -> Response {
    let mut response = (StatusCode::NOT_FOUND, "Resource not found").into_response();
    ErrorReport::from_message(
        "infra::http::public::not_found",
        StatusCode::NOT_FOUND,
        "no route matched the request path",
    )
    .attach(&mut response);
    response
}
