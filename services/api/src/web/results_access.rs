//! services/api/src/web/results_access.rs
//!
//! Result-access tokens and the public result-checking endpoint.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use school_directory_core::domain::{ResultSheet, Term, TokenRecord};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::web::rest::{not_found, reject, HandlerError};
use crate::web::state::AppState;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    /// Public student id ("STU-1001").
    pub student_id: String,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    pub student_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultCheckRequest {
    pub student_id: String,
    pub token: String,
    pub term: Option<Term>,
    pub session: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /tokens - Issue a token; earlier tokens for the student stop working.
#[utoipa::path(
    post,
    path = "/tokens",
    request_body = CreateTokenRequest,
    responses(
        (status = 201, description = "Token issued", body = TokenRecord),
        (status = 422, description = "Unknown student")
    ),
    tag = "Result access"
)]
pub async fn create_token_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTokenRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let token = state
        .directory
        .create_token(&req.student_id)
        .await
        .map_err(|e| reject("issue token", e))?;
    Ok((StatusCode::CREATED, Json(token)))
}

#[utoipa::path(
    get,
    path = "/tokens",
    params(TokenQuery),
    responses((status = 200, description = "Issued tokens, oldest first", body = [TokenRecord])),
    tag = "Result access"
)]
pub async fn list_tokens_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<TokenRecord>>, HandlerError> {
    let tokens = state
        .directory
        .list_tokens(query.student_id.as_deref())
        .await
        .map_err(|e| reject("list tokens", e))?;
    Ok(Json(tokens))
}

/// GET /tokens/active/{student_id} - The student's usable token, if any.
#[utoipa::path(
    get,
    path = "/tokens/active/{student_id}",
    params(("student_id" = String, Path, description = "Public student id")),
    responses(
        (status = 200, description = "Active, unexpired token with attempts left", body = TokenRecord),
        (status = 404, description = "No usable token")
    ),
    tag = "Result access"
)]
pub async fn active_token_handler(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Result<Json<TokenRecord>, HandlerError> {
    state
        .directory
        .find_token_by_student_id(&student_id)
        .await
        .map_err(|e| reject("find token", e))?
        .map(Json)
        .ok_or_else(|| not_found("Active token for", &student_id))
}

/// POST /tokens/{id}/attempts - Count one use of a token.
#[utoipa::path(
    post,
    path = "/tokens/{id}/attempts",
    params(("id" = String, Path, description = "Token record id")),
    responses(
        (status = 200, description = "Token after the attempt", body = TokenRecord),
        (status = 404, description = "No such token")
    ),
    tag = "Result access"
)]
pub async fn increment_attempt_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TokenRecord>, HandlerError> {
    let token = state
        .directory
        .increment_attempt(&id)
        .await
        .map_err(|e| reject("count token attempt", e))?
        .ok_or_else(|| not_found("Token", &id))?;
    if !token.active {
        info!("Token {} for {} is no longer active", token.id, token.student_id);
    }
    Ok(Json(token))
}

/// POST /result-check - Public result checking with a student id and token.
///
/// Every check with a live token spends one attempt, including a wrong token.
#[utoipa::path(
    post,
    path = "/result-check",
    request_body = ResultCheckRequest,
    responses(
        (status = 200, description = "Published results for the student", body = ResultSheet),
        (status = 403, description = "Token missing, wrong, expired or exhausted")
    ),
    tag = "Result access"
)]
pub async fn result_check_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResultCheckRequest>,
) -> Result<Json<ResultSheet>, HandlerError> {
    let sheet = state
        .directory
        .check_results(&req.student_id, &req.token, req.term, req.session.as_deref())
        .await
        .map_err(|e| reject("check results", e))?;
    Ok(Json(sheet))
}
