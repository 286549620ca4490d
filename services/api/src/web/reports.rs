//! services/api/src/web/reports.rs
//!
//! Admin dashboard and activity feed.

use axum::{
    extract::{Query, State},
    Json,
};
use school_directory_core::dashboard::AdminDashboard;
use school_directory_core::domain::ActivityEntry;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::web::rest::{reject, HandlerError};
use crate::web::state::AppState;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DashboardQuery {
    /// Restrict every figure to one school.
    #[serde(alias = "schoolId")]
    pub school_id: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/dashboard",
    params(DashboardQuery),
    responses((status = 200, description = "Snapshot computed from the live collections", body = AdminDashboard)),
    tag = "Reports"
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<AdminDashboard>, HandlerError> {
    let dashboard = state
        .directory
        .admin_dashboard(query.school_id.as_deref())
        .await
        .map_err(|e| reject("build dashboard", e))?;
    Ok(Json(dashboard))
}

/// Newest entries first.
#[utoipa::path(
    get,
    path = "/activity",
    params(ActivityQuery),
    responses((status = 200, description = "Recent directory activity", body = [ActivityEntry])),
    tag = "Reports"
)]
pub async fn activity_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>, HandlerError> {
    let entries = state
        .directory
        .list_activity(query.limit)
        .await
        .map_err(|e| reject("list activity", e))?;
    Ok(Json(entries))
}
