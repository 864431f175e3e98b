pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{
    Bookmark, BookmarkedContest, Contest, ContestFilter, ContestRecord, Identity,
    PendingReminder, Preferences, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database operation failed")]
    DatabaseError(#[from] sqlx::Error),
    #[error("contest {0} not found")]
    ContestNotFound(i64),
    #[error("bookmark of contest {contest_id} for user {user_id} not found")]
    BookmarkNotFound { user_id: String, contest_id: i64 },
    #[error("user {0} not found")]
    UserNotFound(String),
}

/// upsertの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

#[async_trait]
pub trait ContestStore: Send + Sync {
    /// (platform, external_id)をキーにコンテストを挿入または更新する
    ///
    /// 既存レコードと値が変わらない場合は何も書き込まない
    async fn upsert_contest(&self, record: &ContestRecord) -> StoreResult<UpsertOutcome>;
    async fn get_contest(&self, id: i64) -> StoreResult<Option<Contest>>;
    /// 開始時刻の昇順で返す
    async fn list_contests(
        &self,
        filter: &ContestFilter,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Contest>>;
    /// 終了済みのコンテストを終了時刻の降順で返す
    async fn list_past_contests(
        &self,
        now: DateTime<Utc>,
        missing_solution_only: bool,
    ) -> StoreResult<Vec<Contest>>;
    async fn set_solution_url(&self, id: i64, solution_url: &str) -> StoreResult<Contest>;
    async fn count_contests(&self) -> StoreResult<i64>;
}

#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// ブックマークを追加する。既に存在する場合は既存のものを返す
    async fn add_bookmark(&self, user_id: &str, contest_id: i64) -> StoreResult<Bookmark>;
    async fn remove_bookmark(&self, user_id: &str, contest_id: i64) -> StoreResult<()>;
    async fn list_bookmarks(&self, user_id: &str) -> StoreResult<Vec<BookmarkedContest>>;
    /// 未通知かつ開始前のコンテストに対するブックマークを返す
    async fn pending_reminders(&self, now: DateTime<Utc>) -> StoreResult<Vec<PendingReminder>>;
    async fn mark_reminder_sent(&self, bookmark_id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>>;
    /// ユーザが存在しなければデフォルト設定で作成する
    async fn ensure_user(&self, identity: &Identity) -> StoreResult<User>;
    async fn save_preferences(
        &self,
        identity: &Identity,
        preferences: &Preferences,
    ) -> StoreResult<User>;
}

/// HTTP層やバッチ処理が使うストレージ全体
pub trait Storage: ContestStore + BookmarkStore + UserStore {}

impl<T> Storage for T where T: ContestStore + BookmarkStore + UserStore {}
