use axum::extract::State;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::Experiment;

#[derive(Deserialize)]
pub struct ExperimentPath {
    pub app_user_id: String,
    pub experiment_id: String,
}

/// GET /v1/customers/{app_user_id}/experiments
pub async fn list_experiments(
    State(state): State<AppState>,
    Path(app_user_id): Path<String>,
) -> Result<Json<Vec<Experiment>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_experiments(&conn, &app_user_id)?))
}

/// GET /v1/customers/{app_user_id}/experiments/{experiment_id}
pub async fn get_experiment(
    State(state): State<AppState>,
    Path(path): Path<ExperimentPath>,
) -> Result<Json<Experiment>> {
    let conn = state.db.get()?;
    let experiment = queries::get_experiment(&conn, &path.app_user_id, &path.experiment_id)?
        .or_not_found(msg::EXPERIMENT_NOT_FOUND)?;
    Ok(Json(experiment))
}

/// GET /v1/experiments/{experiment_id}/enrollments
pub async fn list_enrollments(
    State(state): State<AppState>,
    Path(experiment_id): Path<String>,
) -> Result<Json<Vec<Experiment>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_experiment_enrollments(&conn, &experiment_id)?))
}
