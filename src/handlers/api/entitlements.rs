use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::access;
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path, Query};
use crate::models::{Entitlement, GrantEntitlement};
use crate::util::now_ms;

use super::ActiveFilterQuery;

#[derive(Deserialize)]
pub struct EntitlementPath {
    pub app_user_id: String,
    pub entitlement_id: String,
}

#[derive(Serialize)]
pub struct EntitlementCheck {
    pub app_user_id: String,
    pub entitlement_id: String,
    pub active: bool,
}

/// GET /v1/customers/{app_user_id}/entitlements
pub async fn list_entitlements(
    State(state): State<AppState>,
    Path(app_user_id): Path<String>,
    Query(query): Query<ActiveFilterQuery>,
) -> Result<Json<Vec<Entitlement>>> {
    let conn = state.db.get()?;
    let entitlements = if query.active {
        access::list_active_entitlements(&conn, &app_user_id, now_ms())?
    } else {
        access::list_all_entitlements(&conn, &app_user_id)?
    };
    Ok(Json(entitlements))
}

/// GET /v1/customers/{app_user_id}/entitlements/{entitlement_id}
/// Unknown entitlements read as inactive rather than 404.
pub async fn check_entitlement(
    State(state): State<AppState>,
    Path(path): Path<EntitlementPath>,
) -> Result<Json<EntitlementCheck>> {
    let conn = state.db.get()?;
    let active = access::check_entitlement(&conn, &path.app_user_id, &path.entitlement_id, now_ms())?;
    Ok(Json(EntitlementCheck {
        app_user_id: path.app_user_id,
        entitlement_id: path.entitlement_id,
        active,
    }))
}

/// POST /v1/customers/{app_user_id}/entitlements/{entitlement_id}
pub async fn grant_entitlement(
    State(state): State<AppState>,
    Path(path): Path<EntitlementPath>,
    Json(input): Json<GrantEntitlement>,
) -> Result<Json<Entitlement>> {
    let conn = state.db.get()?;
    let entitlement = access::grant_entitlement_manually(
        &conn,
        &path.app_user_id,
        &path.entitlement_id,
        &input,
        now_ms(),
    )?;
    Ok(Json(entitlement))
}

/// DELETE /v1/customers/{app_user_id}/entitlements/{entitlement_id}
pub async fn revoke_entitlement(
    State(state): State<AppState>,
    Path(path): Path<EntitlementPath>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    access::revoke_entitlement(&conn, &path.app_user_id, &path.entitlement_id)?;
    Ok(StatusCode::NO_CONTENT)
}
