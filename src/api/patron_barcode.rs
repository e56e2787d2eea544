//! Patron barcode lookup for partner systems.
//!
//! API-key gated; the key arrives in the X-API-Key header or an api_key
//! parameter (the parameter wins).

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BarcodeQuery {
    pub uni: Option<String>,
    pub api_key: Option<String>,
}

/// GET /patron_barcode?uni=...
pub async fn lookup(
    State(state): State<AppState>,
    Query(query): Query<BarcodeQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(uni) = query.uni.filter(|u| !u.is_empty()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let header_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let Some(api_key) = query.api_key.or(header_key) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if !state.config.patron_api.api_keys.iter().any(|k| *k == api_key) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let barcode = match state.services.patrons.lookup_barcode(&uni).await {
        Ok(barcode) => barcode,
        Err(e) => {
            tracing::error!("patron barcode lookup failed for {}: {}", uni, e);
            None
        }
    };

    Json(json!({ "uni": uni, "barcode": barcode })).into_response()
}
