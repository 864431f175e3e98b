use crate::{
    models::{ContestRecord, Platform, RecordError},
    sources::{keep_valid, ContestSource, Result, SourceError},
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

const CONTEST_LIST_URL: &str = "https://www.codechef.com/api/list/contests/all";

/// `contest_start_date`などの書式(インド標準時)
const LEGACY_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S";
const IST_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

#[derive(Debug, Deserialize)]
pub struct CodeChefResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub future_contests: Vec<Value>,
    #[serde(default)]
    pub present_contests: Vec<Value>,
    #[serde(default)]
    pub past_contests: Vec<Value>,
}

/// CodeChefのコンテスト情報
///
/// 日時は応答の版によって入るフィールドが異なるため、すべて省略可能として受け取る
#[derive(Debug, Default, Deserialize)]
pub struct CodeChefContest {
    #[serde(default)]
    pub contest_code: Option<String>,
    #[serde(default)]
    pub contest_name: Option<String>,
    #[serde(default)]
    pub contest_start_date_iso: Option<String>,
    #[serde(default)]
    pub contest_end_date_iso: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub contest_start_date: Option<String>,
    #[serde(default)]
    pub contest_end_date: Option<String>,
}

enum DateFormat {
    Rfc3339,
    Legacy,
}

fn parse_date(
    field: &'static str,
    value: &str,
    format: &DateFormat,
) -> std::result::Result<DateTime<Utc>, RecordError> {
    let invalid = || RecordError::InvalidDate {
        field,
        value: value.to_string(),
    };

    match format {
        DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(value.trim())
            .map(|date| date.with_timezone(&Utc))
            .map_err(|_| invalid()),
        DateFormat::Legacy => {
            // 日付と時刻の間に空白が2つ入ることがある
            let normalized = value.split_whitespace().collect::<Vec<&str>>().join(" ");
            let naive = NaiveDateTime::parse_from_str(&normalized, LEGACY_DATE_FORMAT)
                .map_err(|_| invalid())?;
            FixedOffset::east_opt(IST_OFFSET_SECONDS)
                .and_then(|ist| ist.from_local_datetime(&naive).single())
                .map(|date| date.with_timezone(&Utc))
                .ok_or_else(invalid)
        }
    }
}

impl CodeChefContest {
    /// 開始・終了日時を候補のフィールドから順に解釈し、最初に解釈できた組を返す
    pub fn schedule(&self) -> std::result::Result<(DateTime<Utc>, DateTime<Utc>), RecordError> {
        let candidates = [
            (
                ("contest_start_date_iso", &self.contest_start_date_iso),
                ("contest_end_date_iso", &self.contest_end_date_iso),
                DateFormat::Rfc3339,
            ),
            (
                ("start_date", &self.start_date),
                ("end_date", &self.end_date),
                DateFormat::Rfc3339,
            ),
            (
                ("contest_start_date", &self.contest_start_date),
                ("contest_end_date", &self.contest_end_date),
                DateFormat::Legacy,
            ),
        ];

        let mut last_error = RecordError::MissingField("contest_start_date");
        for ((start_field, start), (end_field, end), format) in candidates.iter() {
            let (start, end) = match (start, end) {
                (Some(start), Some(end)) => (start, end),
                _ => continue,
            };

            let parsed = parse_date(*start_field, start, format)
                .and_then(|start| Ok((start, parse_date(*end_field, end, format)?)));
            match parsed {
                Ok(schedule) => return Ok(schedule),
                Err(e) => last_error = e,
            }
        }

        Err(last_error)
    }

    pub fn to_record(&self) -> std::result::Result<ContestRecord, RecordError> {
        let code = self
            .contest_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .ok_or(RecordError::MissingField("contest_code"))?;
        let name = self
            .contest_name
            .as_deref()
            .ok_or(RecordError::MissingField("contest_name"))?;
        let (start_time, end_time) = self.schedule()?;

        ContestRecord::new(
            Platform::CodeChef,
            code,
            name.trim(),
            start_time,
            end_time,
            format!("https://www.codechef.com/{}", code),
        )
    }
}

/// CodeChefのレスポンスを正規化する
///
/// 開催予定、開催中、終了済みの順に処理する
pub fn normalize(response: CodeChefResponse) -> Result<Vec<ContestRecord>> {
    if let Some(status) = response.status.as_deref() {
        if status != "success" {
            return Err(SourceError::UpstreamError(
                response
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("status {}", status)),
            ));
        }
    }

    let items = response
        .future_contests
        .into_iter()
        .chain(response.present_contests.into_iter())
        .chain(response.past_contests.into_iter())
        .enumerate()
        .map(|(i, value)| {
            let label = value
                .get("contest_code")
                .and_then(|code| code.as_str())
                .map(|code| code.to_string())
                .unwrap_or_else(|| format!("at index {}", i));
            let record = serde_json::from_value::<CodeChefContest>(value)
                .map_err(|e| RecordError::Malformed(e.to_string()))
                .and_then(|contest| contest.to_record());
            (label, record)
        });

    Ok(keep_valid(Platform::CodeChef, items))
}

pub struct CodeChefSource {
    client: Client,
}

impl CodeChefSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContestSource for CodeChefSource {
    fn platform(&self) -> Platform {
        Platform::CodeChef
    }

    /// CodeChefのAPIからコンテスト情報を取得するメソッド
    async fn fetch(&self) -> Result<Vec<ContestRecord>> {
        tracing::info!("Start to retrieve contests information from CodeChef");
        let res = self
            .client
            .get(CONTEST_LIST_URL)
            .send()
            .await?
            .error_for_status()?;
        let response: CodeChefResponse = res.json().await?;
        let contests = normalize(response)?;

        tracing::info!(
            "{} contests information successfully retrieved from CodeChef.",
            contests.len()
        );

        Ok(contests)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize_contest_list() {
        let raw = r#"
        {
            "status": "success",
            "message": "All contests list",
            "present_contests": [],
            "future_contests": [
                {
                    "contest_code": "START120",
                    "contest_name": "Starters 120 ",
                    "contest_start_date": "07 Feb 2024  20:00:00",
                    "contest_end_date": "07 Feb 2024  22:00:00",
                    "contest_start_date_iso": "2024-02-07T20:00:00+05:30",
                    "contest_end_date_iso": "2024-02-07T22:00:00+05:30",
                    "contest_duration": "120",
                    "distinct_users": 0
                },
                {
                    "contest_code": "START121",
                    "contest_name": "Starters 121",
                    "contest_start_date": "14 Feb 2024  20:00:00",
                    "contest_end_date": "14 Feb 2024  23:00:00"
                },
                {
                    "contest_code": "BROKEN",
                    "contest_name": "Broken dates",
                    "contest_start_date_iso": "not a date",
                    "contest_end_date_iso": "2024-02-07T22:00:00+05:30"
                },
                {
                    "contest_code": "NODATE",
                    "contest_name": "No dates at all"
                }
            ],
            "past_contests": [
                {
                    "contest_code": "START119",
                    "contest_name": "Starters 119",
                    "start_date": "2024-01-31T14:30:00Z",
                    "end_date": "2024-01-31T16:30:00Z"
                },
                {
                    "contest_name": "Missing code",
                    "contest_start_date_iso": "2024-01-31T20:00:00+05:30",
                    "contest_end_date_iso": "2024-01-31T22:00:00+05:30"
                }
            ]
        }
        "#;
        let response: CodeChefResponse = serde_json::from_str(raw).unwrap();
        let records = normalize(response).unwrap();

        let codes: Vec<&str> = records.iter().map(|r| r.external_id()).collect();
        assert_eq!(codes, vec!["START120", "START121", "START119"]);

        assert_eq!(records[0].name(), "Starters 120");
        assert_eq!(
            records[0].start_time(),
            Utc.with_ymd_and_hms(2024, 2, 7, 14, 30, 0).unwrap()
        );
        assert_eq!(records[0].duration_minutes(), 120);
        assert_eq!(records[0].url(), "https://www.codechef.com/START120");

        // 旧形式の日時はインド標準時として解釈する
        assert_eq!(
            records[1].start_time(),
            Utc.with_ymd_and_hms(2024, 2, 14, 14, 30, 0).unwrap()
        );
        assert_eq!(records[1].duration_minutes(), 180);

        assert_eq!(records[2].duration_minutes(), 120);
    }

    #[test]
    fn test_fall_back_to_next_date_fields() {
        let contest = CodeChefContest {
            contest_code: Some(String::from("COOK1")),
            contest_name: Some(String::from("Cook-Off")),
            contest_start_date_iso: Some(String::from("garbage")),
            contest_end_date_iso: Some(String::from("garbage")),
            contest_start_date: Some(String::from("01 Mar 2024 21:30:00")),
            contest_end_date: Some(String::from("01 Mar 2024 23:30:00")),
            ..CodeChefContest::default()
        };

        let (start, end) = contest.schedule().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 1, 16, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_unparseable_dates() {
        let contest = CodeChefContest {
            contest_code: Some(String::from("LTIME1")),
            contest_name: Some(String::from("Lunchtime")),
            start_date: Some(String::from("2024-13-40")),
            end_date: Some(String::from("2024-13-41")),
            ..CodeChefContest::default()
        };

        assert!(matches!(
            contest.to_record(),
            Err(RecordError::InvalidDate {
                field: "start_date",
                ..
            })
        ));
    }

    #[test]
    fn test_error_status() {
        let raw = r#"{"status": "error", "message": "Service unavailable"}"#;
        let response: CodeChefResponse = serde_json::from_str(raw).unwrap();

        assert!(matches!(
            normalize(response),
            Err(SourceError::UpstreamError(_))
        ));
    }
}
