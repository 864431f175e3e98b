//! In-memory storage used by tests and local experiments.
use super::{
    BookmarkStore, ContestStore, StoreError, StoreResult, UpsertOutcome, UserStore,
};
use crate::models::{
    Bookmark, BookmarkedContest, Contest, ContestFilter, ContestRecord, Identity,
    PendingReminder, Platform, Preferences, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    contests: BTreeMap<i64, Contest>,
    contest_keys: HashMap<(Platform, String), i64>,
    bookmarks: BTreeMap<i64, Bookmark>,
    users: HashMap<String, User>,
    next_contest_id: i64,
    next_bookmark_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 管理者フラグを立てる
    pub async fn grant_admin(&self, user_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        user.is_admin = true;
        Ok(())
    }

    pub async fn bookmark(&self, bookmark_id: i64) -> Option<Bookmark> {
        self.tables.read().await.bookmarks.get(&bookmark_id).cloned()
    }
}

#[async_trait]
impl ContestStore for MemoryStore {
    async fn upsert_contest(&self, record: &ContestRecord) -> StoreResult<UpsertOutcome> {
        let mut tables = self.tables.write().await;
        let key = (record.platform(), record.external_id().to_string());

        if let Some(id) = tables.contest_keys.get(&key).copied() {
            let contest = tables
                .contests
                .get_mut(&id)
                .ok_or(StoreError::ContestNotFound(id))?;
            if contest.matches(record) {
                return Ok(UpsertOutcome::Unchanged);
            }
            contest.name = record.name().to_string();
            contest.start_time = record.start_time();
            contest.end_time = record.end_time();
            contest.url = record.url().to_string();
            contest.duration = record.duration_minutes();
            return Ok(UpsertOutcome::Updated);
        }

        tables.next_contest_id += 1;
        let id = tables.next_contest_id;
        tables.contests.insert(
            id,
            Contest {
                id,
                platform: record.platform(),
                external_id: record.external_id().to_string(),
                name: record.name().to_string(),
                start_time: record.start_time(),
                end_time: record.end_time(),
                duration: record.duration_minutes(),
                url: record.url().to_string(),
                solution_url: None,
            },
        );
        tables.contest_keys.insert(key, id);

        Ok(UpsertOutcome::Inserted)
    }

    async fn get_contest(&self, id: i64) -> StoreResult<Option<Contest>> {
        Ok(self.tables.read().await.contests.get(&id).cloned())
    }

    async fn list_contests(
        &self,
        filter: &ContestFilter,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Contest>> {
        let tables = self.tables.read().await;
        let mut contests: Vec<Contest> = tables
            .contests
            .values()
            .filter(|contest| filter.accepts(contest, now))
            .cloned()
            .collect();
        contests.sort_by_key(|contest| (contest.start_time, contest.id));

        Ok(contests)
    }

    async fn list_past_contests(
        &self,
        now: DateTime<Utc>,
        missing_solution_only: bool,
    ) -> StoreResult<Vec<Contest>> {
        let tables = self.tables.read().await;
        let mut contests: Vec<Contest> = tables
            .contests
            .values()
            .filter(|contest| contest.end_time < now)
            .filter(|contest| !missing_solution_only || contest.solution_url.is_none())
            .cloned()
            .collect();
        contests.sort_by(|a, b| b.end_time.cmp(&a.end_time).then(a.id.cmp(&b.id)));

        Ok(contests)
    }

    async fn set_solution_url(&self, id: i64, solution_url: &str) -> StoreResult<Contest> {
        let mut tables = self.tables.write().await;
        let contest = tables
            .contests
            .get_mut(&id)
            .ok_or(StoreError::ContestNotFound(id))?;
        contest.solution_url = Some(solution_url.to_string());

        Ok(contest.clone())
    }

    async fn count_contests(&self) -> StoreResult<i64> {
        Ok(self.tables.read().await.contests.len() as i64)
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn add_bookmark(&self, user_id: &str, contest_id: i64) -> StoreResult<Bookmark> {
        let mut tables = self.tables.write().await;
        if !tables.contests.contains_key(&contest_id) {
            return Err(StoreError::ContestNotFound(contest_id));
        }
        if !tables.users.contains_key(user_id) {
            return Err(StoreError::UserNotFound(user_id.to_string()));
        }

        if let Some(existing) = tables
            .bookmarks
            .values()
            .find(|bookmark| bookmark.user_id == user_id && bookmark.contest_id == contest_id)
        {
            return Ok(existing.clone());
        }

        tables.next_bookmark_id += 1;
        let bookmark = Bookmark {
            id: tables.next_bookmark_id,
            user_id: user_id.to_string(),
            contest_id,
            reminder_sent: false,
        };
        tables.bookmarks.insert(bookmark.id, bookmark.clone());

        Ok(bookmark)
    }

    async fn remove_bookmark(&self, user_id: &str, contest_id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let id = tables
            .bookmarks
            .values()
            .find(|bookmark| bookmark.user_id == user_id && bookmark.contest_id == contest_id)
            .map(|bookmark| bookmark.id)
            .ok_or_else(|| StoreError::BookmarkNotFound {
                user_id: user_id.to_string(),
                contest_id,
            })?;
        tables.bookmarks.remove(&id);

        Ok(())
    }

    async fn list_bookmarks(&self, user_id: &str) -> StoreResult<Vec<BookmarkedContest>> {
        let tables = self.tables.read().await;
        let bookmarks = tables
            .bookmarks
            .values()
            .filter(|bookmark| bookmark.user_id == user_id)
            .filter_map(|bookmark| {
                tables
                    .contests
                    .get(&bookmark.contest_id)
                    .map(|contest| BookmarkedContest {
                        bookmark: bookmark.clone(),
                        contest: contest.clone(),
                    })
            })
            .collect();

        Ok(bookmarks)
    }

    async fn pending_reminders(&self, now: DateTime<Utc>) -> StoreResult<Vec<PendingReminder>> {
        let tables = self.tables.read().await;
        let reminders = tables
            .bookmarks
            .values()
            .filter(|bookmark| !bookmark.reminder_sent)
            .filter_map(|bookmark| {
                let contest = tables.contests.get(&bookmark.contest_id)?;
                let user = tables.users.get(&bookmark.user_id)?;
                (contest.start_time > now).then(|| PendingReminder {
                    bookmark_id: bookmark.id,
                    user: user.clone(),
                    contest: contest.clone(),
                })
            })
            .collect();

        Ok(reminders)
    }

    async fn mark_reminder_sent(&self, bookmark_id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(bookmark) = tables.bookmarks.get_mut(&bookmark_id) {
            bookmark.reminder_sent = true;
        }

        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn ensure_user(&self, identity: &Identity) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .entry(identity.user_id.clone())
            .or_insert_with(|| User::new(identity));
        if identity.email.is_some() {
            user.email = identity.email.clone();
        }

        Ok(user.clone())
    }

    async fn save_preferences(
        &self,
        identity: &Identity,
        preferences: &Preferences,
    ) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .entry(identity.user_id.clone())
            .and_modify(|user| user.apply(preferences))
            .or_insert_with(|| User::with_preferences(identity, preferences));
        if identity.email.is_some() {
            user.email = identity.email.clone();
        }

        Ok(user.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(external_id: &str, start: DateTime<Utc>) -> ContestRecord {
        ContestRecord::new(
            Platform::Codeforces,
            external_id,
            format!("Round {}", external_id),
            start,
            start + Duration::hours(2),
            format!("https://codeforces.com/contest/{}", external_id),
        )
        .unwrap()
    }

    fn identity(user_id: &str) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            email: Some(format!("{}@example.com", user_id)),
        }
    }

    #[tokio::test]
    async fn test_upsert_outcomes() {
        let store = MemoryStore::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let first = record("100", start);
        assert_eq!(
            store.upsert_contest(&first).await.unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert_contest(&first).await.unwrap(),
            UpsertOutcome::Unchanged
        );

        let moved = record("100", start + Duration::hours(1));
        assert_eq!(
            store.upsert_contest(&moved).await.unwrap(),
            UpsertOutcome::Updated
        );
        assert_eq!(store.count_contests().await.unwrap(), 1);

        let contest = store.get_contest(1).await.unwrap().unwrap();
        assert_eq!(contest.start_time, start + Duration::hours(1));
    }

    #[tokio::test]
    async fn test_bookmark_is_unique_per_user_and_contest() {
        let store = MemoryStore::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store.upsert_contest(&record("1", start)).await.unwrap();
        store.ensure_user(&identity("alice")).await.unwrap();

        let first = store.add_bookmark("alice", 1).await.unwrap();
        let second = store.add_bookmark("alice", 1).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.list_bookmarks("alice").await.unwrap().len(), 1);

        store.remove_bookmark("alice", 1).await.unwrap();
        assert!(store.list_bookmarks("alice").await.unwrap().is_empty());
        assert!(matches!(
            store.remove_bookmark("alice", 1).await,
            Err(StoreError::BookmarkNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_bookmark_unknown_contest() {
        let store = MemoryStore::new();
        store.ensure_user(&identity("alice")).await.unwrap();

        assert!(matches!(
            store.add_bookmark("alice", 42).await,
            Err(StoreError::ContestNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_save_preferences_keeps_email_and_admin_flag() {
        let store = MemoryStore::new();
        store.ensure_user(&identity("bob")).await.unwrap();
        store.grant_admin("bob").await.unwrap();

        let preferences = Preferences {
            reminder_time: 30,
            phone_number: Some(String::from("+15550000000")),
            ..Preferences::default()
        };
        let user = store
            .save_preferences(&identity("bob"), &preferences)
            .await
            .unwrap();

        assert!(user.is_admin);
        assert_eq!(user.email.as_deref(), Some("bob@example.com"));
        assert_eq!(user.preferences(), preferences);
    }

    #[tokio::test]
    async fn test_past_contests_order_and_solution_filter() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        store
            .upsert_contest(&record("1", now - Duration::days(10)))
            .await
            .unwrap();
        store
            .upsert_contest(&record("2", now - Duration::days(2)))
            .await
            .unwrap();
        store
            .upsert_contest(&record("3", now + Duration::days(2)))
            .await
            .unwrap();
        store
            .set_solution_url(2, "https://www.youtube.com/watch?v=abc")
            .await
            .unwrap();

        let past: Vec<i64> = store
            .list_past_contests(now, false)
            .await
            .unwrap()
            .iter()
            .map(|contest| contest.id)
            .collect();
        assert_eq!(past, vec![2, 1]);

        let missing: Vec<i64> = store
            .list_past_contests(now, true)
            .await
            .unwrap()
            .iter()
            .map(|contest| contest.id)
            .collect();
        assert_eq!(missing, vec![1]);
    }
}
