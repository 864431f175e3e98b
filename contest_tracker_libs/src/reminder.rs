use crate::models::{Contest, PendingReminder};
use crate::notify::{EmailSender, SmsSender};
use crate::schedule::Job;
use crate::storage::{BookmarkStore, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// 1回のスキャン結果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReminderReport {
    pub dispatched: usize,
    pub skipped_platform: usize,
    pub not_due: usize,
    pub channel_failures: usize,
}

pub struct ReminderScheduler<S: BookmarkStore + ?Sized> {
    store: Arc<S>,
    email: Arc<dyn EmailSender>,
    sms: Option<Arc<dyn SmsSender>>,
}

impl<S: BookmarkStore + ?Sized> ReminderScheduler<S> {
    pub fn new(store: Arc<S>, email: Arc<dyn EmailSender>, sms: Option<Arc<dyn SmsSender>>) -> Self {
        if sms.is_none() {
            tracing::warn!("SMS gateway is not configured, SMS reminders will be skipped");
        }
        Self { store, email, sms }
    }

    /// 通知期限に入ったブックマークへリマインダーを送る
    ///
    /// 送信を試みたブックマークは送信の成否によらず送信済みにする。
    /// 永続化のエラーが起きた場合はスキャンを中断してエラーを返す。
    pub async fn run_at(&self, now: DateTime<Utc>) -> StoreResult<ReminderReport> {
        let mut report = ReminderReport::default();

        for reminder in self.store.pending_reminders(now).await? {
            let PendingReminder {
                bookmark_id,
                user,
                contest,
            } = &reminder;

            if !user.platforms().enabled(contest.platform) {
                report.skipped_platform += 1;
                continue;
            }

            let minutes_remaining =
                (contest.start_time - now).num_milliseconds() as f64 / 60_000.0;
            if minutes_remaining <= 0.0 || minutes_remaining > user.reminder_time as f64 {
                report.not_due += 1;
                continue;
            }

            tracing::info!(
                "send reminder of {} to user {} ({:.1} minutes before start)",
                contest.name,
                user.external_id,
                minutes_remaining
            );
            report.channel_failures += self.dispatch(&reminder).await;

            self.store.mark_reminder_sent(*bookmark_id).await?;
            report.dispatched += 1;
        }

        Ok(report)
    }

    /// 各チャネルへ送信し、失敗したチャネル数を返す
    async fn dispatch(&self, reminder: &PendingReminder) -> usize {
        let PendingReminder { user, contest, .. } = reminder;
        let mut failures = 0;

        if user.notification_type.wants_email() {
            match &user.email {
                Some(address) => {
                    if let Err(e) = self
                        .email
                        .send_email(address, &email_subject(contest), &email_body(contest))
                        .await
                    {
                        tracing::error!(
                            "failed to send reminder email to user {}: {:?}",
                            user.external_id,
                            e
                        );
                        failures += 1;
                    }
                }
                None => tracing::warn!(
                    "user {} has no email address, skip email reminder",
                    user.external_id
                ),
            }
        }

        if user.notification_type.wants_sms() {
            match (&self.sms, &user.phone_number) {
                (Some(sms), Some(phone)) => {
                    if let Err(e) = sms.send_sms(phone, &sms_text(contest)).await {
                        tracing::error!(
                            "failed to send reminder SMS to user {}: {:?}",
                            user.external_id,
                            e
                        );
                        failures += 1;
                    }
                }
                (None, _) => tracing::warn!(
                    "SMS gateway is not configured, skip SMS reminder for user {}",
                    user.external_id
                ),
                (_, None) => tracing::warn!(
                    "user {} has no phone number, skip SMS reminder",
                    user.external_id
                ),
            }
        }

        failures
    }
}

#[async_trait]
impl<S: BookmarkStore + ?Sized + 'static> Job for ReminderScheduler<S> {
    fn name(&self) -> &str {
        "reminder scan"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let report = self.run_at(Utc::now()).await?;
        tracing::info!(
            "{} reminders dispatched, {} skipped by platform preference, {} not yet due, {} channel failures",
            report.dispatched,
            report.skipped_platform,
            report.not_due,
            report.channel_failures
        );
        Ok(())
    }
}

pub fn email_subject(contest: &Contest) -> String {
    format!("Reminder: {} starts soon", contest.name)
}

pub fn email_body(contest: &Contest) -> String {
    format!(
        "{} on {} starts at {}.\n\nContest page: {}\n\nGood luck!\n",
        contest.name,
        contest.platform,
        contest.start_time.format(TIME_FORMAT),
        contest.url
    )
}

pub fn sms_text(contest: &Contest) -> String {
    format!(
        "Reminder: {} on {} starts at {}. Good luck!",
        contest.name,
        contest.platform,
        contest.start_time.format(TIME_FORMAT)
    )
}
