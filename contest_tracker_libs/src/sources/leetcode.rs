use crate::{
    models::{ContestRecord, Platform, RecordError},
    sources::{from_epoch, keep_valid, ContestSource, Result, SourceError},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const GRAPHQL_URL: &str = "https://leetcode.com/graphql";

const ALL_CONTESTS_QUERY: &str = r#"
query {
    allContests {
        title
        titleSlug
        startTime
        duration
    }
}
"#;

#[derive(Debug, Deserialize)]
pub struct LeetCodeResponse {
    #[serde(default)]
    pub data: Option<LeetCodeData>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeetCodeData {
    #[serde(default)]
    pub all_contests: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeetCodeContest {
    pub title: String,
    pub title_slug: String,
    pub start_time: i64,
    pub duration: i64,
}

impl LeetCodeContest {
    pub fn to_record(&self) -> std::result::Result<ContestRecord, RecordError> {
        let start_time = from_epoch("startTime", self.start_time)?;
        let end_time = from_epoch("duration", self.start_time.saturating_add(self.duration))?;

        ContestRecord::new(
            Platform::LeetCode,
            self.title_slug.trim(),
            self.title.trim(),
            start_time,
            end_time,
            format!("https://leetcode.com/contest/{}", self.title_slug.trim()),
        )
    }
}

/// LeetCodeのGraphQLレスポンスを正規化する
pub fn normalize(response: LeetCodeResponse) -> Result<Vec<ContestRecord>> {
    if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
        let message = errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<&str>>()
            .join("; ");
        return Err(SourceError::UpstreamError(message));
    }

    let contests = response
        .data
        .and_then(|data| data.all_contests)
        .ok_or_else(|| SourceError::UpstreamError(String::from("`allContests` is missing")))?;

    let items = contests.into_iter().enumerate().map(|(i, value)| {
        let label = value
            .get("titleSlug")
            .and_then(|slug| slug.as_str())
            .map(|slug| slug.to_string())
            .unwrap_or_else(|| format!("at index {}", i));
        let record = serde_json::from_value::<LeetCodeContest>(value)
            .map_err(|e| RecordError::Malformed(e.to_string()))
            .and_then(|contest| contest.to_record());
        (label, record)
    });

    Ok(keep_valid(Platform::LeetCode, items))
}

pub struct LeetCodeSource {
    client: Client,
}

impl LeetCodeSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContestSource for LeetCodeSource {
    fn platform(&self) -> Platform {
        Platform::LeetCode
    }

    /// LeetCodeのGraphQL APIからコンテスト情報を取得するメソッド
    async fn fetch(&self) -> Result<Vec<ContestRecord>> {
        tracing::info!("Start to retrieve contests information from LeetCode");
        let res = self
            .client
            .post(GRAPHQL_URL)
            .json(&json!({ "query": ALL_CONTESTS_QUERY }))
            .send()
            .await?
            .error_for_status()?;
        let response: LeetCodeResponse = res.json().await?;
        let contests = normalize(response)?;

        tracing::info!(
            "{} contests information successfully retrieved from LeetCode.",
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
    fn test_normalize_all_contests() {
        let raw = r#"
        {
            "data": {
                "allContests": [
                    {"title": "Weekly Contest 380", "titleSlug": "weekly-contest-380", "startTime": 1705199400, "duration": 5400, "description": ""},
                    {"title": "Biweekly Contest 122", "titleSlug": "biweekly-contest-122", "startTime": "tomorrow", "duration": 5400},
                    {"title": "Weekly Contest 379", "titleSlug": "weekly-contest-379", "startTime": 1704594600, "duration": 5400}
                ]
            }
        }
        "#;
        let response: LeetCodeResponse = serde_json::from_str(raw).unwrap();
        let records = normalize(response).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].external_id(), "weekly-contest-380");
        assert_eq!(records[0].name(), "Weekly Contest 380");
        assert_eq!(
            records[0].start_time(),
            Utc.timestamp_opt(1705199400, 0).unwrap()
        );
        assert_eq!(records[0].duration_minutes(), 90);
        assert_eq!(
            records[0].url(),
            "https://leetcode.com/contest/weekly-contest-380"
        );
        assert_eq!(records[1].external_id(), "weekly-contest-379");
    }

    #[test]
    fn test_graphql_errors() {
        let raw = r#"{"errors": [{"message": "rate limited"}], "data": null}"#;
        let response: LeetCodeResponse = serde_json::from_str(raw).unwrap();

        match normalize(response) {
            Err(SourceError::UpstreamError(message)) => assert_eq!(message, "rate limited"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_missing_data() {
        let response: LeetCodeResponse = serde_json::from_str(r#"{"data": {}}"#).unwrap();
        assert!(normalize(response).is_err());
    }
}
