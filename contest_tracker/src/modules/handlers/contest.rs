use crate::modules::{error::ApiError, extract::ValidatedQuery};
use axum::{
    extract::{rejection::PathRejection, Extension, Path},
    Json,
};
use chrono::Utc;
use contest_tracker_libs::{
    api::{ContestQueryParameters, ContestResponse},
    storage::{ContestStore, Storage},
};
use std::sync::Arc;

pub async fn list_contests(
    ValidatedQuery(params): ValidatedQuery<ContestQueryParameters>,
    Extension(store): Extension<Arc<dyn Storage>>,
) -> Result<Json<Vec<ContestResponse>>, ApiError> {
    let contests = store.list_contests(&params.to_filter(), Utc::now()).await?;

    Ok(Json(
        contests.into_iter().map(ContestResponse::from).collect(),
    ))
}

pub async fn get_contest(
    id: Result<Path<i64>, PathRejection>,
    Extension(store): Extension<Arc<dyn Storage>>,
) -> Result<Json<ContestResponse>, ApiError> {
    let Path(id) = id.map_err(|rejection| {
        tracing::error!("Parsing error: {}", rejection);
        ApiError::BadRequest(format!("invalid contest id: [{}]", rejection.body_text()))
    })?;

    match store.get_contest(id).await? {
        Some(contest) => Ok(Json(ContestResponse::from(contest))),
        None => Err(ApiError::NotFound(format!("contest {} not found", id))),
    }
}
