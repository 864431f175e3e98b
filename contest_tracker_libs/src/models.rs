use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// 保存対象とするコンテストの終了時刻の下限(現在時刻からの日数)
pub const RETENTION_DAYS: i64 = 7;

/// 保持期間の開始時刻を返す
///
/// 終了時刻がこの時刻以降のコンテストのみ保存・更新の対象となる
pub fn retention_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(RETENTION_DAYS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "platform")]
pub enum Platform {
    Codeforces,
    CodeChef,
    LeetCode,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Codeforces, Platform::CodeChef, Platform::LeetCode];
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Platform::Codeforces => write!(f, "Codeforces"),
            Platform::CodeChef => write!(f, "CodeChef"),
            Platform::LeetCode => write!(f, "LeetCode"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown platform `{0}`")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "codeforces" => Ok(Platform::Codeforces),
            "codechef" => Ok(Platform::CodeChef),
            "leetcode" => Ok(Platform::LeetCode),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "notification_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Email,
    Sms,
    Both,
}

impl NotificationType {
    pub fn wants_email(&self) -> bool {
        matches!(self, NotificationType::Email | NotificationType::Both)
    }

    pub fn wants_sms(&self) -> bool {
        matches!(self, NotificationType::Sms | NotificationType::Both)
    }
}

impl Default for NotificationType {
    fn default() -> Self {
        NotificationType::Email
    }
}

/// 取り込み時に不正と判定されたレコード
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("required field `{0}` is missing or empty")]
    MissingField(&'static str),
    #[error("couldn't parse `{field}` from `{value}`")]
    InvalidDate { field: &'static str, value: String },
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("contest ends at {end} which is not after its start {start}")]
    NonPositiveDuration {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("contest duration of {0} minutes is out of range")]
    DurationOutOfRange(i64),
}

/// 各プラットフォームから取得して正規化したコンテスト情報
///
/// 生成時に開始時刻と終了時刻の前後関係を検証するため、
/// このモデルが存在する時点で長さは必ず正になる
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestRecord {
    platform: Platform,
    external_id: String,
    name: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration: i32, // 分
    url: String,
}

impl ContestRecord {
    pub fn new(
        platform: Platform,
        external_id: impl Into<String>,
        name: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        url: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let external_id: String = external_id.into();
        let name: String = name.into();

        if external_id.trim().is_empty() {
            return Err(RecordError::MissingField("external_id"));
        }
        if name.trim().is_empty() {
            return Err(RecordError::MissingField("name"));
        }
        if end_time <= start_time {
            return Err(RecordError::NonPositiveDuration {
                start: start_time,
                end: end_time,
            });
        }
        let minutes = (end_time - start_time).num_minutes();
        let duration =
            i32::try_from(minutes).map_err(|_| RecordError::DurationOutOfRange(minutes))?;

        Ok(Self {
            platform,
            external_id,
            name,
            start_time,
            end_time,
            duration,
            url: url.into(),
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// コンテストの長さ(分)。端数は切り捨てる
    pub fn duration_minutes(&self) -> i32 {
        self.duration
    }

    pub fn is_retained(&self, now: DateTime<Utc>) -> bool {
        self.end_time >= retention_start(now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Contest {
    pub id: i64,
    pub platform: Platform,
    pub external_id: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: i32, // 分
    pub url: String,
    pub solution_url: Option<String>,
}

impl Contest {
    /// 取り込んだ値と保存済みの値が一致するかどうか
    pub fn matches(&self, record: &ContestRecord) -> bool {
        self.name == record.name()
            && self.start_time == record.start_time()
            && self.end_time == record.end_time()
            && self.url == record.url()
            && self.duration == record.duration_minutes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Bookmark {
    pub id: i64,
    pub user_id: String,
    pub contest_id: i64,
    pub reminder_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkedContest {
    pub bookmark: Bookmark,
    pub contest: Contest,
}

/// 通知判定の対象となるブックマーク
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReminder {
    pub bookmark_id: i64,
    pub user: User,
    pub contest: Contest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformToggles {
    #[serde(rename = "Codeforces")]
    pub codeforces: bool,
    #[serde(rename = "CodeChef")]
    pub codechef: bool,
    #[serde(rename = "LeetCode")]
    pub leetcode: bool,
}

impl PlatformToggles {
    pub fn enabled(&self, platform: Platform) -> bool {
        match platform {
            Platform::Codeforces => self.codeforces,
            Platform::CodeChef => self.codechef,
            Platform::LeetCode => self.leetcode,
        }
    }
}

impl Default for PlatformToggles {
    fn default() -> Self {
        Self {
            codeforces: true,
            codechef: true,
            leetcode: true,
        }
    }
}

pub const DEFAULT_REMINDER_MINUTES: i32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub platforms: PlatformToggles,
    pub notification_type: NotificationType,
    pub reminder_time: i32,
    pub phone_number: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            platforms: PlatformToggles::default(),
            notification_type: NotificationType::default(),
            reminder_time: DEFAULT_REMINDER_MINUTES,
            phone_number: None,
        }
    }
}

/// 認証基盤から渡されるユーザの識別情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub external_id: String,                 // 認証基盤のユーザID
    pub email: Option<String>,               // メールアドレス
    pub phone_number: Option<String>,        // 電話番号
    pub codeforces: bool,                    // Codeforcesの通知可否
    pub codechef: bool,                      // CodeChefの通知可否
    pub leetcode: bool,                      // LeetCodeの通知可否
    pub notification_type: NotificationType, // 通知手段
    pub reminder_time: i32,                  // 何分前に通知するか
    pub is_admin: bool,                      // 管理者フラグ
}

impl User {
    /// デフォルトの設定でユーザを作る
    pub fn new(identity: &Identity) -> Self {
        Self::with_preferences(identity, &Preferences::default())
    }

    pub fn with_preferences(identity: &Identity, preferences: &Preferences) -> Self {
        Self {
            external_id: identity.user_id.clone(),
            email: identity.email.clone(),
            phone_number: preferences.phone_number.clone(),
            codeforces: preferences.platforms.codeforces,
            codechef: preferences.platforms.codechef,
            leetcode: preferences.platforms.leetcode,
            notification_type: preferences.notification_type,
            reminder_time: preferences.reminder_time,
            is_admin: false,
        }
    }

    pub fn platforms(&self) -> PlatformToggles {
        PlatformToggles {
            codeforces: self.codeforces,
            codechef: self.codechef,
            leetcode: self.leetcode,
        }
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            platforms: self.platforms(),
            notification_type: self.notification_type,
            reminder_time: self.reminder_time,
            phone_number: self.phone_number.clone(),
        }
    }

    pub fn apply(&mut self, preferences: &Preferences) {
        self.codeforces = preferences.platforms.codeforces;
        self.codechef = preferences.platforms.codechef;
        self.leetcode = preferences.platforms.leetcode;
        self.notification_type = preferences.notification_type;
        self.reminder_time = preferences.reminder_time;
        self.phone_number = preferences.phone_number.clone();
    }
}

/// コンテスト一覧取得時の絞り込み条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContestFilter {
    pub past: Option<bool>,
    pub platform: Option<Platform>,
}

impl ContestFilter {
    pub fn accepts(&self, contest: &Contest, now: DateTime<Utc>) -> bool {
        if let Some(platform) = self.platform {
            if contest.platform != platform {
                return false;
            }
        }

        match self.past {
            Some(true) => contest.end_time < now,
            Some(false) => contest.start_time > now,
            None => contest.end_time >= retention_start(now),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_duration_derivation() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        let record = ContestRecord::new(
            Platform::Codeforces,
            "1900",
            "Codeforces Round",
            start,
            end,
            "https://codeforces.com/contest/1900",
        )
        .unwrap();

        assert_eq!(record.duration_minutes(), 120);
    }

    #[test]
    fn test_duration_is_floored() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + Duration::seconds(150);
        let record =
            ContestRecord::new(Platform::LeetCode, "weekly", "Weekly", start, end, "").unwrap();

        assert_eq!(record.duration_minutes(), 2);
    }

    #[test]
    fn test_reject_non_positive_duration() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();

        let same = ContestRecord::new(Platform::CodeChef, "START1", "Starters", start, start, "");
        assert!(matches!(
            same,
            Err(RecordError::NonPositiveDuration { .. })
        ));

        let reversed = ContestRecord::new(
            Platform::CodeChef,
            "START1",
            "Starters",
            start,
            start - Duration::hours(1),
            "",
        );
        assert!(matches!(
            reversed,
            Err(RecordError::NonPositiveDuration { .. })
        ));
    }

    #[test]
    fn test_reject_duration_out_of_range() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let record = ContestRecord::new(
            Platform::Codeforces,
            "1915",
            "Codeforces Round 916 (Div. 3)",
            start,
            start + Duration::seconds(1_000_000_000_000),
            "",
        );
        assert_eq!(record, Err(RecordError::DurationOutOfRange(16_666_666_666)));
    }

    #[test]
    fn test_reject_missing_identifier() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let result = ContestRecord::new(
            Platform::CodeChef,
            " ",
            "Starters",
            start,
            start + Duration::hours(2),
            "",
        );
        assert_eq!(result, Err(RecordError::MissingField("external_id")));
    }

    #[test]
    fn test_retention_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let make = |end: DateTime<Utc>| {
            ContestRecord::new(
                Platform::Codeforces,
                "1",
                "Round",
                end - Duration::hours(2),
                end,
                "",
            )
            .unwrap()
        };

        assert!(!make(now - Duration::days(8)).is_retained(now));
        assert!(make(now - Duration::days(6)).is_retained(now));
        assert!(make(now + Duration::days(365)).is_retained(now));
    }

    #[test]
    fn test_parse_platform() {
        assert_eq!("codeforces".parse::<Platform>(), Ok(Platform::Codeforces));
        assert_eq!("CodeChef".parse::<Platform>(), Ok(Platform::CodeChef));
        assert_eq!("LEETCODE".parse::<Platform>(), Ok(Platform::LeetCode));
        assert!("atcoder".parse::<Platform>().is_err());
    }

    #[test]
    fn test_serialize_platform_and_notification_type() {
        assert_eq!(
            serde_json::to_string(&Platform::CodeChef).unwrap(),
            r#""CodeChef""#
        );
        assert_eq!(
            serde_json::to_string(&NotificationType::Both).unwrap(),
            r#""both""#
        );
        assert!(NotificationType::Both.wants_email());
        assert!(NotificationType::Both.wants_sms());
        assert!(!NotificationType::Email.wants_sms());
        assert!(!NotificationType::Sms.wants_email());
    }

    #[test]
    fn test_contest_filter() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let contest = |start: DateTime<Utc>, platform: Platform| Contest {
            id: 1,
            platform,
            external_id: String::from("1"),
            name: String::from("Round"),
            start_time: start,
            end_time: start + Duration::hours(2),
            duration: 120,
            url: String::new(),
            solution_url: None,
        };

        let upcoming = contest(now + Duration::days(1), Platform::Codeforces);
        let running = contest(now - Duration::hours(1), Platform::Codeforces);
        let recent = contest(now - Duration::days(3), Platform::LeetCode);
        let old = contest(now - Duration::days(30), Platform::LeetCode);

        let default = ContestFilter::default();
        assert!(default.accepts(&upcoming, now));
        assert!(default.accepts(&running, now));
        assert!(default.accepts(&recent, now));
        assert!(!default.accepts(&old, now));

        let past = ContestFilter {
            past: Some(true),
            platform: None,
        };
        assert!(!past.accepts(&upcoming, now));
        assert!(!past.accepts(&running, now));
        assert!(past.accepts(&old, now));

        let future_codeforces = ContestFilter {
            past: Some(false),
            platform: Some(Platform::Codeforces),
        };
        assert!(future_codeforces.accepts(&upcoming, now));
        assert!(!future_codeforces.accepts(&running, now));
        assert!(!future_codeforces.accepts(&recent, now));
    }
}
