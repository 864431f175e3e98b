pub mod codechef;
pub mod codeforces;
pub mod leetcode;

pub use codechef::CodeChefSource;
pub use codeforces::CodeforcesSource;
pub use leetcode::LeetCodeSource;

use crate::models::{ContestRecord, Platform, RecordError};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Duration;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to request to contest source")]
    RequestError(#[from] reqwest::Error),
    #[error("failed to deserialize JSON data")]
    DeserializeError(#[from] serde_json::Error),
    #[error("contest source returned an error: {0}")]
    UpstreamError(String),
    #[error("contest source didn't respond within {0:?}")]
    Timeout(Duration),
}

/// コンテスト情報の取得元となるプラットフォームごとの実装
#[async_trait]
pub trait ContestSource: Send + Sync {
    fn platform(&self) -> Platform;

    /// コンテスト一覧を取得して正規化したレコードを返す
    ///
    /// 不正なレコードは読み飛ばし、取得元全体の失敗のみをエラーとして返す
    async fn fetch(&self) -> Result<Vec<ContestRecord>>;
}

/// 各アダプタが共有するHTTPクライアントを作る
pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .gzip(true)
        .timeout(timeout)
        .user_agent(concat!("contest_tracker/", env!("CARGO_PKG_VERSION")))
        .build()?;

    Ok(client)
}

/// 対応しているすべてのプラットフォームのアダプタを返す
pub fn default_sources(client: Client) -> Vec<Arc<dyn ContestSource>> {
    Platform::ALL
        .iter()
        .map(|platform| -> Arc<dyn ContestSource> {
            match platform {
                Platform::Codeforces => Arc::new(CodeforcesSource::new(client.clone())),
                Platform::CodeChef => Arc::new(CodeChefSource::new(client.clone())),
                Platform::LeetCode => Arc::new(LeetCodeSource::new(client.clone())),
            }
        })
        .collect()
}

/// Unix時間(秒)を日時に変換する
pub(crate) fn from_epoch(
    field: &'static str,
    seconds: i64,
) -> std::result::Result<DateTime<Utc>, RecordError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or(RecordError::InvalidDate {
            field,
            value: seconds.to_string(),
        })
}

/// 正規化の途中で不正と判定されたレコードを警告として記録して取り除く
pub(crate) fn keep_valid<I, T>(platform: Platform, items: I) -> Vec<ContestRecord>
where
    I: IntoIterator<Item = (T, std::result::Result<ContestRecord, RecordError>)>,
    T: std::fmt::Display,
{
    let mut skipped = 0usize;
    let records: Vec<ContestRecord> = items
        .into_iter()
        .filter_map(|(label, result)| match result {
            Ok(record) => Some(record),
            Err(e) => {
                skipped += 1;
                tracing::warn!("skip {} contest {}: {}", platform, label, e);
                None
            }
        })
        .collect();

    if skipped > 0 {
        tracing::warn!("{} malformed {} contests were skipped", skipped, platform);
    }

    records
}
