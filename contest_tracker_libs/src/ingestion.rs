use crate::models::Platform;
use crate::schedule::Job;
use crate::sources::{ContestSource, SourceError};
use crate::storage::{ContestStore, StoreError, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{self, Duration};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(60);

/// プラットフォームごとの取り込み件数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub platform: Platform,
    pub fetched: usize,
    pub outdated: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl SourceReport {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            fetched: 0,
            outdated: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub sources: Vec<SourceReport>,
}

impl IngestionReport {
    pub fn stored(&self) -> usize {
        self.sources
            .iter()
            .map(|source| source.inserted + source.updated)
            .sum()
    }
}

#[derive(Debug, Error)]
pub enum SourceFailure {
    #[error("failed to fetch {platform} contests")]
    Fetch {
        platform: Platform,
        #[source]
        source: SourceError,
    },
    #[error("failed to save {platform} contests")]
    Store {
        platform: Platform,
        #[source]
        source: StoreError,
    },
}

impl SourceFailure {
    pub fn platform(&self) -> Platform {
        match self {
            SourceFailure::Fetch { platform, .. } => *platform,
            SourceFailure::Store { platform, .. } => *platform,
        }
    }
}

/// 一部のプラットフォームで取り込みに失敗したことを表すエラー
///
/// 成功したプラットフォームの結果は`report`に残る
#[derive(Debug, Error)]
#[error("contest ingestion failed for {}", failed_platforms(.failures))]
pub struct IngestionError {
    pub report: IngestionReport,
    pub failures: Vec<SourceFailure>,
}

fn failed_platforms(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.platform().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct IngestionCoordinator<S: ContestStore + ?Sized> {
    sources: Vec<Arc<dyn ContestSource>>,
    store: Arc<S>,
    timeout: Duration,
}

impl<S: ContestStore + ?Sized> IngestionCoordinator<S> {
    pub fn new(sources: Vec<Arc<dyn ContestSource>>, store: Arc<S>) -> Self {
        Self {
            sources,
            store,
            timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    /// 1つのプラットフォームからの取得に許す時間を設定する
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// すべてのプラットフォームから並行にコンテストを取得して保存する
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<IngestionReport, IngestionError> {
        let results = join_all(
            self.sources
                .iter()
                .map(|source| self.ingest(source.as_ref(), now)),
        )
        .await;

        let mut report = IngestionReport::default();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(source) => report.sources.push(source),
                Err(e) => {
                    tracing::error!("{:?}", e);
                    failures.push(e);
                }
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(IngestionError { report, failures })
        }
    }

    async fn ingest(
        &self,
        source: &dyn ContestSource,
        now: DateTime<Utc>,
    ) -> Result<SourceReport, SourceFailure> {
        let platform = source.platform();
        tracing::info!("Fetch {} contests", platform);

        let records = match time::timeout(self.timeout, source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(self.timeout)),
        }
        .map_err(|source| SourceFailure::Fetch { platform, source })?;

        let mut report = SourceReport::new(platform);
        report.fetched = records.len();

        for record in records.iter() {
            if !record.is_retained(now) {
                report.outdated += 1;
                continue;
            }

            let outcome = self
                .store
                .upsert_contest(record)
                .await
                .map_err(|source| SourceFailure::Store { platform, source })?;
            match outcome {
                UpsertOutcome::Inserted => report.inserted += 1,
                UpsertOutcome::Updated => report.updated += 1,
                UpsertOutcome::Unchanged => report.unchanged += 1,
            }
        }

        tracing::info!(
            "{}: {} fetched, {} inserted, {} updated, {} unchanged, {} outside of retention window",
            platform,
            report.fetched,
            report.inserted,
            report.updated,
            report.unchanged,
            report.outdated
        );

        Ok(report)
    }
}

#[async_trait]
impl<S: ContestStore + ?Sized + 'static> Job for IngestionCoordinator<S> {
    fn name(&self) -> &str {
        "contest ingestion"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let result = self.run_at(Utc::now()).await;

        match self.store.count_contests().await {
            Ok(count) => tracing::info!("{} contests are stored", count),
            Err(e) => tracing::warn!("failed to count stored contests: {:?}", e),
        }

        result?;
        Ok(())
    }
}
