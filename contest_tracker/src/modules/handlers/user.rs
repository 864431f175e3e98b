use crate::modules::{
    error::ApiError,
    extract::{CurrentUser, ValidatedJson},
};
use axum::{extract::Extension, Json};
use contest_tracker_libs::{
    api::PreferencesPayload,
    storage::{Storage, UserStore},
};
use std::sync::Arc;

pub async fn get_preferences(
    CurrentUser(identity): CurrentUser,
    Extension(store): Extension<Arc<dyn Storage>>,
) -> Result<Json<PreferencesPayload>, ApiError> {
    let user = store.ensure_user(&identity).await?;

    Ok(Json(PreferencesPayload::from(user)))
}

pub async fn save_preferences(
    CurrentUser(identity): CurrentUser,
    Extension(store): Extension<Arc<dyn Storage>>,
    ValidatedJson(payload): ValidatedJson<PreferencesPayload>,
) -> Result<Json<PreferencesPayload>, ApiError> {
    let user = store
        .save_preferences(&identity, &payload.into_preferences())
        .await?;
    tracing::info!("preferences of user {} updated", identity.user_id);

    Ok(Json(PreferencesPayload::from(user)))
}
