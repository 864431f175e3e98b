use crate::modules::{
    error::ApiError,
    extract::{CurrentUser, ValidatedJson, ValidatedQuery},
};
use axum::{extract::Extension, Json};
use chrono::Utc;
use contest_tracker_libs::{
    api::{AdminCheckResponse, ContestResponse, SolutionQueryParameters, SolutionRequest},
    models::{Identity, User},
    storage::{ContestStore, Storage, UserStore},
};
use std::sync::Arc;

/// 管理者でなければForbiddenを返す
async fn require_admin(store: &dyn Storage, identity: &Identity) -> Result<User, ApiError> {
    match store.get_user(&identity.user_id).await? {
        Some(user) if user.is_admin => Ok(user),
        _ => {
            tracing::warn!("user {} is not an admin", identity.user_id);
            Err(ApiError::Forbidden)
        }
    }
}

pub async fn check_admin(
    CurrentUser(identity): CurrentUser,
    Extension(store): Extension<Arc<dyn Storage>>,
) -> Result<Json<AdminCheckResponse>, ApiError> {
    require_admin(store.as_ref(), &identity).await?;

    Ok(Json(AdminCheckResponse { is_admin: true }))
}

pub async fn list_solutions(
    CurrentUser(identity): CurrentUser,
    ValidatedQuery(params): ValidatedQuery<SolutionQueryParameters>,
    Extension(store): Extension<Arc<dyn Storage>>,
) -> Result<Json<Vec<ContestResponse>>, ApiError> {
    require_admin(store.as_ref(), &identity).await?;

    let contests = store
        .list_past_contests(Utc::now(), params.missing.unwrap_or(false))
        .await?;

    Ok(Json(
        contests.into_iter().map(ContestResponse::from).collect(),
    ))
}

pub async fn set_solution(
    CurrentUser(identity): CurrentUser,
    Extension(store): Extension<Arc<dyn Storage>>,
    ValidatedJson(request): ValidatedJson<SolutionRequest>,
) -> Result<Json<ContestResponse>, ApiError> {
    require_admin(store.as_ref(), &identity).await?;

    let contest = store
        .set_solution_url(request.contest_id, &request.solution_url)
        .await?;
    tracing::info!(
        "solution of contest {} set to {} by {}",
        contest.id,
        request.solution_url,
        identity.user_id
    );

    Ok(Json(ContestResponse::from(contest)))
}
