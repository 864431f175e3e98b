use crate::models::{
    BookmarkedContest, Contest, ContestFilter, NotificationType, Platform, PlatformToggles,
    Preferences, User, DEFAULT_REMINDER_MINUTES,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::str::FromStr;
use url::Url;
use validator::{Validate, ValidationError};

/// 1週間
pub const MAX_REMINDER_MINUTES: i32 = 7 * 24 * 60;

fn validate_platform(value: &str) -> Result<(), ValidationError> {
    Platform::from_str(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("unknown platform"))
}

fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ValidationError::new("invalid solution url")),
    }
}

fn default_reminder_time() -> i32 {
    DEFAULT_REMINDER_MINUTES
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct ContestQueryParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub past: Option<bool>,
    #[validate(custom = "validate_platform")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl ContestQueryParameters {
    pub fn to_filter(&self) -> ContestFilter {
        ContestFilter {
            past: self.past,
            platform: self
                .platform
                .as_ref()
                .and_then(|platform| Platform::from_str(platform).ok()),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct SolutionQueryParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<bool>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContestResponse {
    #[serde_as(as = "DisplayFromStr")]
    pub id: i64,
    pub platform: Platform,
    pub external_id: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: i32,
    pub url: String,
    pub solution_url: Option<String>,
}

impl From<Contest> for ContestResponse {
    fn from(contest: Contest) -> Self {
        Self {
            id: contest.id,
            platform: contest.platform,
            external_id: contest.external_id,
            name: contest.name,
            start_time: contest.start_time,
            end_time: contest.end_time,
            duration: contest.duration,
            url: contest.url,
            solution_url: contest.solution_url,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkResponse {
    #[serde_as(as = "DisplayFromStr")]
    pub id: i64,
    #[serde_as(as = "DisplayFromStr")]
    pub contest_id: i64,
    pub reminder_sent: bool,
    pub contest: ContestResponse,
}

impl From<BookmarkedContest> for BookmarkResponse {
    fn from(value: BookmarkedContest) -> Self {
        Self {
            id: value.bookmark.id,
            contest_id: value.bookmark.contest_id,
            reminder_sent: value.bookmark.reminder_sent,
            contest: ContestResponse::from(value.contest),
        }
    }
}

/// ブックマークの追加・削除リクエスト
///
/// contestIdは数値と文字列のどちらでも受け付ける
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRequest {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub contest_id: i64,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SolutionRequest {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub contest_id: i64,
    #[validate(custom = "validate_http_url")]
    pub solution_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPayload {
    #[serde(default)]
    pub platforms: PlatformToggles,
    #[serde(default)]
    pub notification_type: NotificationType,
    #[validate(range(min = 1, max = 10080))]
    #[serde(default = "default_reminder_time")]
    pub reminder_time: i32,
    #[validate(length(max = 32))]
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl PreferencesPayload {
    /// 空白のみの電話番号は未設定として扱う
    pub fn into_preferences(self) -> Preferences {
        Preferences {
            platforms: self.platforms,
            notification_type: self.notification_type,
            reminder_time: self.reminder_time,
            phone_number: self
                .phone_number
                .map(|phone| phone.trim().to_string())
                .filter(|phone| !phone.is_empty()),
        }
    }
}

impl From<Preferences> for PreferencesPayload {
    fn from(preferences: Preferences) -> Self {
        Self {
            platforms: preferences.platforms,
            notification_type: preferences.notification_type,
            reminder_time: preferences.reminder_time,
            phone_number: preferences.phone_number,
        }
    }
}

impl From<User> for PreferencesPayload {
    fn from(user: User) -> Self {
        Self::from(user.preferences())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheckResponse {
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reminder_time_range() {
        let payload: PreferencesPayload = serde_json::from_value(json!({
            "platforms": {"Codeforces": true, "CodeChef": false, "LeetCode": true},
            "notificationType": "both",
            "reminderTime": 10081,
        }))
        .unwrap();
        assert!(payload.validate().is_err());

        let payload = PreferencesPayload {
            reminder_time: 0,
            ..payload
        };
        assert!(payload.validate().is_err());

        let payload = PreferencesPayload {
            reminder_time: MAX_REMINDER_MINUTES,
            ..payload
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_empty_phone_number_is_cleared() {
        let payload: PreferencesPayload = serde_json::from_value(json!({
            "notificationType": "sms",
            "reminderTime": 30,
            "phoneNumber": "  ",
        }))
        .unwrap();

        let preferences = payload.into_preferences();
        assert_eq!(preferences.phone_number, None);
        assert_eq!(preferences.notification_type, NotificationType::Sms);
        assert_eq!(preferences.platforms, PlatformToggles::default());
    }

    #[test]
    fn test_contest_id_accepts_string_and_number() {
        let from_number: BookmarkRequest =
            serde_json::from_value(json!({"contestId": 12})).unwrap();
        let from_string: BookmarkRequest =
            serde_json::from_value(json!({"contestId": "12"})).unwrap();
        assert_eq!(from_number, from_string);
        assert!(serde_json::from_value::<BookmarkRequest>(json!({"contestId": "abc"})).is_err());
    }

    #[test]
    fn test_solution_url_validation() {
        let valid = SolutionRequest {
            contest_id: 1,
            solution_url: String::from("https://codeforces.com/blog/entry/1"),
        };
        assert!(valid.validate().is_ok());

        for url in ["ftp://example.com/file", "not a url", "https://"] {
            let invalid = SolutionRequest {
                contest_id: 1,
                solution_url: String::from(url),
            };
            assert!(invalid.validate().is_err(), "{} should be rejected", url);
        }
    }

    #[test]
    fn test_contest_query_filter() {
        let params: ContestQueryParameters = serde_json::from_value(json!({
            "past": true,
            "platform": "leetcode",
        }))
        .unwrap();
        assert!(params.validate().is_ok());
        assert_eq!(
            params.to_filter(),
            ContestFilter {
                past: Some(true),
                platform: Some(Platform::LeetCode),
            }
        );

        let params = ContestQueryParameters {
            past: None,
            platform: Some(String::from("atcoder")),
        };
        assert!(params.validate().is_err());
    }
}
