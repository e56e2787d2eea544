//! Form/bounce request handlers
//!
//! Every service key routes here: GET renders or redirects, POST submits.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde_json::json;
use std::collections::HashMap;

use crate::models::Patron;
use crate::services::workflow::{RequestParams, WorkflowOutcome};
use crate::AppState;

/// GET /:service/:id - show the service for a bib record.
pub async fn show(
    State(state): State<AppState>,
    Path((service, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut params = RequestParams::new(query);
    params.insert("id", id);
    run_show(state, service, params, headers).await
}

/// GET /:service - services callable without a bib id (ILL, Borrow Direct,
/// OpenURL pass-throughs).
pub async fn show_bare(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    run_show(state, service, RequestParams::new(query), headers).await
}

/// POST /:service - the form processor.
pub async fn create(
    State(state): State<AppState>,
    Path(service): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let user = current_user(&state, &headers).await;
    let outcome = state
        .services
        .workflow
        .run_submit(&service, RequestParams::new(form), user)
        .await;
    render(outcome)
}

async fn run_show(
    state: AppState,
    service: String,
    params: RequestParams,
    headers: HeaderMap,
) -> Response {
    let user = current_user(&state, &headers).await;
    let outcome = state
        .services
        .workflow
        .run_show(&service, params, user)
        .await;
    render(outcome)
}

/// Identity arrives pre-authenticated from the SSO proxy; absent headers
/// mean an anonymous request.
async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<Patron> {
    let uni = header(headers, "x-remote-user")?;
    let email = header(headers, "x-remote-email");
    let affils = header(headers, "x-remote-affils")
        .map(|raw| {
            raw.split(';')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(state.services.patrons.resolve(&uni, email, affils).await)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

fn render(outcome: WorkflowOutcome) -> Response {
    match outcome {
        WorkflowOutcome::Redirect { url } => Redirect::to(&url).into_response(),
        WorkflowOutcome::Form { template, locals } => Json(json!({
            "kind": "form",
            "template": template,
            "locals": locals,
        }))
        .into_response(),
        WorkflowOutcome::Confirmation { template, locals } => Json(json!({
            "kind": "confirmation",
            "template": template,
            "locals": locals,
        }))
        .into_response(),
        WorkflowOutcome::Error { message } => Json(json!({
            "kind": "error",
            "message": message,
        }))
        .into_response(),
    }
}
