//! Dashboard endpoint

use axum::{extract::State, Json};

use crate::{error::AppResult, services::stats::Dashboard};

use super::AuthenticatedUser;

/// Library counts, recent activity and overdue loans
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard", body = Dashboard),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_dashboard(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Dashboard>> {
    let dashboard = state.services.stats.dashboard().await?;
    Ok(Json(dashboard))
}
