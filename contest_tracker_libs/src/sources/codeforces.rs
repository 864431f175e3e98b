use crate::{
    models::{ContestRecord, Platform, RecordError},
    sources::{from_epoch, keep_valid, ContestSource, Result, SourceError},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

const CONTEST_LIST_URL: &str = "https://codeforces.com/api/contest.list";

/// 通常のコンテストとして扱う種別(gymは含まない)
const CONTEST_KINDS: [&str; 3] = ["CF", "ICPC", "IOI"];

#[derive(Debug, Deserialize)]
pub struct CodeforcesResponse {
    pub status: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub result: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeforcesContest {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub phase: Option<String>,
    pub duration_seconds: i64,
    #[serde(default)]
    pub start_time_seconds: Option<i64>,
}

impl CodeforcesContest {
    pub fn is_regular(&self) -> bool {
        CONTEST_KINDS.contains(&self.kind.as_str())
    }

    pub fn to_record(&self) -> std::result::Result<ContestRecord, RecordError> {
        let start_seconds = self
            .start_time_seconds
            .ok_or(RecordError::MissingField("startTimeSeconds"))?;
        let start_time = from_epoch("startTimeSeconds", start_seconds)?;
        let end_time = from_epoch(
            "durationSeconds",
            start_seconds.saturating_add(self.duration_seconds),
        )?;

        ContestRecord::new(
            Platform::Codeforces,
            self.id.to_string(),
            self.name.trim(),
            start_time,
            end_time,
            format!("https://codeforces.com/contest/{}", self.id),
        )
    }
}

/// Codeforcesのレスポンスを正規化する
///
/// 個々のコンテストのデシリアライズに失敗した場合はそのコンテストのみを読み飛ばす
pub fn normalize(response: CodeforcesResponse) -> Result<Vec<ContestRecord>> {
    if response.status != "OK" {
        return Err(SourceError::UpstreamError(
            response
                .comment
                .unwrap_or_else(|| format!("status {}", response.status)),
        ));
    }

    let items = response
        .result
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| {
            let label = value
                .get("id")
                .map(|id| id.to_string())
                .unwrap_or_else(|| format!("at index {}", i));
            match serde_json::from_value::<CodeforcesContest>(value) {
                Ok(contest) if !contest.is_regular() => None,
                Ok(contest) => Some((label, contest.to_record())),
                Err(e) => Some((label, Err(RecordError::Malformed(e.to_string())))),
            }
        });

    Ok(keep_valid(Platform::Codeforces, items))
}

pub struct CodeforcesSource {
    client: Client,
}

impl CodeforcesSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContestSource for CodeforcesSource {
    fn platform(&self) -> Platform {
        Platform::Codeforces
    }

    /// Codeforces APIからコンテスト情報を取得するメソッド
    async fn fetch(&self) -> Result<Vec<ContestRecord>> {
        tracing::info!("Start to retrieve contests information from Codeforces");
        let res = self
            .client
            .get(CONTEST_LIST_URL)
            .query(&[("gym", "false")])
            .send()
            .await?
            .error_for_status()?;
        let response: CodeforcesResponse = res.json().await?;
        let contests = normalize(response)?;

        tracing::info!(
            "{} contests information successfully retrieved from Codeforces.",
            contests.len()
        );

        Ok(contests)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_normalize_contest_list() {
        let raw = r#"
        {
            "status": "OK",
            "result": [
                {"id": 1915, "name": "Codeforces Round 916 (Div. 3)", "type": "ICPC", "phase": "BEFORE", "frozen": false, "durationSeconds": 8100, "startTimeSeconds": 1703774100, "relativeTimeSeconds": -100},
                {"id": 1900, "name": " Codeforces Round 911 (Div. 2) ", "type": "CF", "phase": "FINISHED", "frozen": false, "durationSeconds": 7200, "startTimeSeconds": 1700922900},
                {"id": 1899, "name": "Unscheduled Round", "type": "CF", "phase": "BEFORE", "frozen": false, "durationSeconds": 7200},
                {"id": "broken", "name": "Broken", "type": "CF"},
                {"id": 1898, "name": "Zero length", "type": "CF", "phase": "BEFORE", "durationSeconds": 0, "startTimeSeconds": 1700922900},
                {"id": 1897, "name": "Endless Round", "type": "CF", "phase": "BEFORE", "durationSeconds": 1000000000000, "startTimeSeconds": 1700922900},
                {"id": 104000, "name": "Some Gym", "type": "GYM", "phase": "FINISHED", "durationSeconds": 7200, "startTimeSeconds": 1700922900}
            ]
        }
        "#;
        let response: CodeforcesResponse = serde_json::from_str(raw).unwrap();
        let records = normalize(response).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].external_id(), "1915");
        assert_eq!(records[0].duration_minutes(), 135);
        assert_eq!(
            records[0].start_time(),
            Utc.timestamp_opt(1703774100, 0).unwrap()
        );
        assert_eq!(records[1].name(), "Codeforces Round 911 (Div. 2)");
        assert_eq!(records[1].url(), "https://codeforces.com/contest/1900");
        assert_eq!(records[1].duration_minutes(), 120);
    }

    #[test]
    fn test_failed_status_is_an_error() {
        let raw = r#"{"status": "FAILED", "comment": "Call limit exceeded"}"#;
        let response: CodeforcesResponse = serde_json::from_str(raw).unwrap();

        match normalize(response) {
            Err(SourceError::UpstreamError(message)) => {
                assert_eq!(message, "Call limit exceeded")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
