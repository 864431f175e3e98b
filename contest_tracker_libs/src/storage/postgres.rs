use super::{
    BookmarkStore, ContestStore, StoreError, StoreResult, UpsertOutcome, UserStore,
};
use crate::models::{
    retention_start, Bookmark, BookmarkedContest, Contest, ContestFilter, ContestRecord,
    Identity, PendingReminder, Preferences, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgRow, Postgres},
    Pool, Row,
};

pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

/// `contest_`を接頭辞に持つ列からコンテスト情報を読み出す
fn read_contest(row: &PgRow) -> Result<Contest, sqlx::Error> {
    Ok(Contest {
        id: row.try_get("contest_id")?,
        platform: row.try_get("contest_platform")?,
        external_id: row.try_get("contest_external_id")?,
        name: row.try_get("contest_name")?,
        start_time: row.try_get("contest_start_time")?,
        end_time: row.try_get("contest_end_time")?,
        duration: row.try_get("contest_duration")?,
        url: row.try_get("contest_url")?,
        solution_url: row.try_get("contest_solution_url")?,
    })
}

/// `user_`を接頭辞に持つ列からユーザ情報を読み出す
fn read_user(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        external_id: row.try_get("user_external_id")?,
        email: row.try_get("user_email")?,
        phone_number: row.try_get("user_phone_number")?,
        codeforces: row.try_get("user_codeforces")?,
        codechef: row.try_get("user_codechef")?,
        leetcode: row.try_get("user_leetcode")?,
        notification_type: row.try_get("user_notification_type")?,
        reminder_time: row.try_get("user_reminder_time")?,
        is_admin: row.try_get("user_is_admin")?,
    })
}

#[async_trait]
impl ContestStore for PgStore {
    async fn upsert_contest(&self, record: &ContestRecord) -> StoreResult<UpsertOutcome> {
        // 値が変わらない場合はWHERE句によって更新が行われず、行が返らない
        let row = sqlx::query(
            r#"
            INSERT INTO "contests" (
                "platform", "external_id", "name", "start_time", "end_time", "duration", "url"
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ("platform", "external_id") DO UPDATE SET
                "name" = EXCLUDED."name",
                "start_time" = EXCLUDED."start_time",
                "end_time" = EXCLUDED."end_time",
                "duration" = EXCLUDED."duration",
                "url" = EXCLUDED."url",
                "updated_at" = NOW()
            WHERE
                ("contests"."name", "contests"."start_time", "contests"."end_time", "contests"."duration", "contests"."url")
                IS DISTINCT FROM
                (EXCLUDED."name", EXCLUDED."start_time", EXCLUDED."end_time", EXCLUDED."duration", EXCLUDED."url")
            RETURNING ("xmax" = 0) AS "inserted";
            "#,
        )
        .bind(record.platform())
        .bind(record.external_id())
        .bind(record.name())
        .bind(record.start_time())
        .bind(record.end_time())
        .bind(record.duration_minutes())
        .bind(record.url())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(UpsertOutcome::Unchanged),
            Some(row) => {
                if row.try_get::<bool, _>("inserted")? {
                    Ok(UpsertOutcome::Inserted)
                } else {
                    Ok(UpsertOutcome::Updated)
                }
            }
        }
    }

    async fn get_contest(&self, id: i64) -> StoreResult<Option<Contest>> {
        let contest = sqlx::query_as::<_, Contest>(
            r#"
            SELECT
                "id", "platform", "external_id", "name", "start_time", "end_time", "duration", "url", "solution_url"
            FROM
                "contests"
            WHERE
                "id" = $1;
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contest)
    }

    async fn list_contests(
        &self,
        filter: &ContestFilter,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Contest>> {
        let contests = sqlx::query_as::<_, Contest>(
            r#"
            SELECT
                "id", "platform", "external_id", "name", "start_time", "end_time", "duration", "url", "solution_url"
            FROM
                "contests"
            WHERE
                ($1::platform IS NULL OR "platform" = $1)
                AND CASE
                    WHEN $2::boolean IS NULL THEN "end_time" >= $4
                    WHEN $2 THEN "end_time" < $3
                    ELSE "start_time" > $3
                END
            ORDER BY
                "start_time" ASC, "id" ASC;
            "#,
        )
        .bind(filter.platform)
        .bind(filter.past)
        .bind(now)
        .bind(retention_start(now))
        .fetch_all(&self.pool)
        .await?;

        Ok(contests)
    }

    async fn list_past_contests(
        &self,
        now: DateTime<Utc>,
        missing_solution_only: bool,
    ) -> StoreResult<Vec<Contest>> {
        let contests = sqlx::query_as::<_, Contest>(
            r#"
            SELECT
                "id", "platform", "external_id", "name", "start_time", "end_time", "duration", "url", "solution_url"
            FROM
                "contests"
            WHERE
                "end_time" < $1
                AND (NOT $2 OR "solution_url" IS NULL)
            ORDER BY
                "end_time" DESC, "id" ASC;
            "#,
        )
        .bind(now)
        .bind(missing_solution_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(contests)
    }

    async fn set_solution_url(&self, id: i64, solution_url: &str) -> StoreResult<Contest> {
        let contest = sqlx::query_as::<_, Contest>(
            r#"
            UPDATE "contests"
            SET
                "solution_url" = $2,
                "updated_at" = NOW()
            WHERE
                "id" = $1
            RETURNING
                "id", "platform", "external_id", "name", "start_time", "end_time", "duration", "url", "solution_url";
            "#,
        )
        .bind(id)
        .bind(solution_url)
        .fetch_optional(&self.pool)
        .await?;

        contest.ok_or(StoreError::ContestNotFound(id))
    }

    async fn count_contests(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query(r#"SELECT COUNT(*) AS "count" FROM "contests";"#)
            .map(|row: PgRow| row.get("count"))
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl BookmarkStore for PgStore {
    async fn add_bookmark(&self, user_id: &str, contest_id: i64) -> StoreResult<Bookmark> {
        if self.get_contest(contest_id).await?.is_none() {
            return Err(StoreError::ContestNotFound(contest_id));
        }

        let bookmark = sqlx::query_as::<_, Bookmark>(
            r#"
            INSERT INTO "bookmarks" ("user_id", "contest_id")
            VALUES ($1, $2)
            ON CONFLICT ("user_id", "contest_id") DO UPDATE SET
                "user_id" = EXCLUDED."user_id"
            RETURNING
                "id", "user_id", "contest_id", "reminder_sent";
            "#,
        )
        .bind(user_id)
        .bind(contest_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(bookmark)
    }

    async fn remove_bookmark(&self, user_id: &str, contest_id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM "bookmarks"
            WHERE
                "user_id" = $1
                AND "contest_id" = $2;
            "#,
        )
        .bind(user_id)
        .bind(contest_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::BookmarkNotFound {
                user_id: user_id.to_string(),
                contest_id,
            });
        }

        Ok(())
    }

    async fn list_bookmarks(&self, user_id: &str) -> StoreResult<Vec<BookmarkedContest>> {
        let rows = sqlx::query(
            r#"
            SELECT
                "bookmarks"."id" AS "bookmark_id",
                "bookmarks"."user_id" AS "bookmark_user_id",
                "bookmarks"."reminder_sent" AS "bookmark_reminder_sent",
                "contests"."id" AS "contest_id",
                "contests"."platform" AS "contest_platform",
                "contests"."external_id" AS "contest_external_id",
                "contests"."name" AS "contest_name",
                "contests"."start_time" AS "contest_start_time",
                "contests"."end_time" AS "contest_end_time",
                "contests"."duration" AS "contest_duration",
                "contests"."url" AS "contest_url",
                "contests"."solution_url" AS "contest_solution_url"
            FROM
                "bookmarks"
                JOIN "contests" ON "contests"."id" = "bookmarks"."contest_id"
            WHERE
                "bookmarks"."user_id" = $1
            ORDER BY
                "contests"."start_time" ASC;
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut bookmarks = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let contest = read_contest(row)?;
            bookmarks.push(BookmarkedContest {
                bookmark: Bookmark {
                    id: row.try_get("bookmark_id")?,
                    user_id: row.try_get("bookmark_user_id")?,
                    contest_id: contest.id,
                    reminder_sent: row.try_get("bookmark_reminder_sent")?,
                },
                contest,
            });
        }

        Ok(bookmarks)
    }

    async fn pending_reminders(&self, now: DateTime<Utc>) -> StoreResult<Vec<PendingReminder>> {
        let rows = sqlx::query(
            r#"
            SELECT
                "bookmarks"."id" AS "bookmark_id",
                "users"."external_id" AS "user_external_id",
                "users"."email" AS "user_email",
                "users"."phone_number" AS "user_phone_number",
                "users"."codeforces" AS "user_codeforces",
                "users"."codechef" AS "user_codechef",
                "users"."leetcode" AS "user_leetcode",
                "users"."notification_type" AS "user_notification_type",
                "users"."reminder_time" AS "user_reminder_time",
                "users"."is_admin" AS "user_is_admin",
                "contests"."id" AS "contest_id",
                "contests"."platform" AS "contest_platform",
                "contests"."external_id" AS "contest_external_id",
                "contests"."name" AS "contest_name",
                "contests"."start_time" AS "contest_start_time",
                "contests"."end_time" AS "contest_end_time",
                "contests"."duration" AS "contest_duration",
                "contests"."url" AS "contest_url",
                "contests"."solution_url" AS "contest_solution_url"
            FROM
                "bookmarks"
                JOIN "contests" ON "contests"."id" = "bookmarks"."contest_id"
                JOIN "users" ON "users"."external_id" = "bookmarks"."user_id"
            WHERE
                "bookmarks"."reminder_sent" = FALSE
                AND "contests"."start_time" > $1
            ORDER BY
                "contests"."start_time" ASC, "bookmarks"."id" ASC;
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut reminders = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            reminders.push(PendingReminder {
                bookmark_id: row.try_get("bookmark_id")?,
                user: read_user(row)?,
                contest: read_contest(row)?,
            });
        }

        Ok(reminders)
    }

    async fn mark_reminder_sent(&self, bookmark_id: i64) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE "bookmarks"
            SET
                "reminder_sent" = TRUE
            WHERE
                "id" = $1;
            "#,
        )
        .bind(bookmark_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT
                "external_id", "email", "phone_number", "codeforces", "codechef", "leetcode", "notification_type", "reminder_time", "is_admin"
            FROM
                "users"
            WHERE
                "external_id" = $1;
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn ensure_user(&self, identity: &Identity) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO "users" ("external_id", "email")
            VALUES ($1, $2)
            ON CONFLICT ("external_id") DO UPDATE SET
                "email" = COALESCE(EXCLUDED."email", "users"."email")
            RETURNING
                "external_id", "email", "phone_number", "codeforces", "codechef", "leetcode", "notification_type", "reminder_time", "is_admin";
            "#,
        )
        .bind(&identity.user_id)
        .bind(&identity.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn save_preferences(
        &self,
        identity: &Identity,
        preferences: &Preferences,
    ) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO "users" (
                "external_id", "email", "phone_number", "codeforces", "codechef", "leetcode", "notification_type", "reminder_time"
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT ("external_id") DO UPDATE SET
                "email" = COALESCE(EXCLUDED."email", "users"."email"),
                "phone_number" = EXCLUDED."phone_number",
                "codeforces" = EXCLUDED."codeforces",
                "codechef" = EXCLUDED."codechef",
                "leetcode" = EXCLUDED."leetcode",
                "notification_type" = EXCLUDED."notification_type",
                "reminder_time" = EXCLUDED."reminder_time",
                "updated_at" = NOW()
            RETURNING
                "external_id", "email", "phone_number", "codeforces", "codechef", "leetcode", "notification_type", "reminder_time", "is_admin";
            "#,
        )
        .bind(&identity.user_id)
        .bind(&identity.email)
        .bind(&preferences.phone_number)
        .bind(preferences.platforms.codeforces)
        .bind(preferences.platforms.codechef)
        .bind(preferences.platforms.leetcode)
        .bind(preferences.notification_type)
        .bind(preferences.reminder_time)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}
