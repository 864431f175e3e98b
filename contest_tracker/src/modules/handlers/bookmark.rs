use crate::modules::{
    error::ApiError,
    extract::{CurrentUser, ValidatedJson},
};
use axum::{extract::Extension, http::StatusCode, Json};
use contest_tracker_libs::{
    api::{BookmarkRequest, BookmarkResponse, MessageResponse},
    models::BookmarkedContest,
    storage::{BookmarkStore, ContestStore, Storage, UserStore},
};
use std::sync::Arc;

pub async fn list_bookmarks(
    CurrentUser(identity): CurrentUser,
    Extension(store): Extension<Arc<dyn Storage>>,
) -> Result<Json<Vec<BookmarkResponse>>, ApiError> {
    let bookmarks = store.list_bookmarks(&identity.user_id).await?;

    Ok(Json(
        bookmarks.into_iter().map(BookmarkResponse::from).collect(),
    ))
}

/// ブックマークを追加する
///
/// 初めてのユーザであればデフォルト設定でユーザを作成する
pub async fn add_bookmark(
    CurrentUser(identity): CurrentUser,
    Extension(store): Extension<Arc<dyn Storage>>,
    ValidatedJson(request): ValidatedJson<BookmarkRequest>,
) -> Result<(StatusCode, Json<BookmarkResponse>), ApiError> {
    let contest = store
        .get_contest(request.contest_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("contest {} not found", request.contest_id)))?;

    store.ensure_user(&identity).await?;
    let bookmark = store
        .add_bookmark(&identity.user_id, request.contest_id)
        .await?;
    tracing::info!(
        "user {} bookmarked contest {}",
        identity.user_id,
        request.contest_id
    );

    Ok((
        StatusCode::CREATED,
        Json(BookmarkResponse::from(BookmarkedContest { bookmark, contest })),
    ))
}

pub async fn remove_bookmark(
    CurrentUser(identity): CurrentUser,
    Extension(store): Extension<Arc<dyn Storage>>,
    ValidatedJson(request): ValidatedJson<BookmarkRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    store
        .remove_bookmark(&identity.user_id, request.contest_id)
        .await?;

    Ok(Json(MessageResponse::new("bookmark removed")))
}
