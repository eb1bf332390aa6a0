use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::AppState;
use crate::error::AppError;
use crate::util::{extract_bearer_token, secrets_match};

/// Gate the read API behind `API_KEY` when one is configured.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.api_key.as_deref() {
        let provided = extract_bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
        if !secrets_match(expected, provided) {
            return Err(AppError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}
