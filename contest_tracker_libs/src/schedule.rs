//! Timer driven background jobs.
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};

/// 定期実行される処理
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &str;
    async fn run(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("period of `{0}` must be non-zero")]
    ZeroPeriod(String),
}

pub struct PeriodicTask<J: Job> {
    job: Arc<J>,
    period: Duration,
    run_at_startup: bool,
    in_flight: Arc<Mutex<()>>,
}

impl<J: Job> PeriodicTask<J> {
    pub fn new(job: Arc<J>, period: Duration) -> Result<Self, ScheduleError> {
        if period.is_zero() {
            return Err(ScheduleError::ZeroPeriod(job.name().to_string()));
        }

        Ok(Self {
            job,
            period,
            run_at_startup: false,
            in_flight: Arc::new(Mutex::new(())),
        })
    }

    /// 起動直後にも一度実行する
    pub fn run_at_startup(mut self, enabled: bool) -> Self {
        self.run_at_startup = enabled;
        self
    }

    /// 一回分の実行を起動する
    ///
    /// 前回の実行が終わっていなければ何もせずにNoneを返す
    pub fn trigger(&self) -> Option<JoinHandle<()>> {
        let guard = match self.in_flight.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(
                    "previous run of {} is still in progress, skip this tick",
                    self.job.name()
                );
                return None;
            }
        };

        let job = self.job.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            tracing::info!("Start {}", job.name());
            match job.run().await {
                Ok(_) => tracing::info!(
                    "{} finished in {} ms",
                    job.name(),
                    started.elapsed().as_millis()
                ),
                Err(e) => tracing::error!("{} failed: {:?}", job.name(), e),
            }
        }))
    }

    /// シャットダウンが通知されるまで一定間隔でジョブを実行し続ける
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = if self.run_at_startup {
                Instant::now()
            } else {
                Instant::now() + self.period
            };
            let mut interval = time::interval_at(start, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                "{} scheduled every {} seconds",
                self.job.name(),
                self.period.as_secs()
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.trigger();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            // 実行中のジョブがあれば終わるまで待つ
            let _ = self.in_flight.lock().await;
            tracing::info!("{} stopped", self.job.name());
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &str {
            "counting job"
        }

        async fn run(&self) -> anyhow::Result<()> {
            time::sleep(self.delay).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_trigger_is_skipped() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            delay: Duration::from_secs(60),
        });
        let task = PeriodicTask::new(job.clone(), Duration::from_secs(10)).unwrap();

        let first = task.trigger().expect("first run must start");
        tokio::task::yield_now().await;
        assert!(task.trigger().is_none());

        first.await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        let second = task.trigger().expect("guard must be released");
        second.await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_periodically_until_shutdown() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            delay: Duration::from_secs(1),
        });
        let (tx, rx) = watch::channel(false);
        let handle = PeriodicTask::new(job.clone(), Duration::from_secs(60))
            .unwrap()
            .run_at_startup(true)
            .spawn(rx);

        // 起動時の1回 + 60秒後 + 120秒後
        time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(job.runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_reject_zero_period() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            delay: Duration::from_secs(1),
        });

        let result = PeriodicTask::new(job, Duration::ZERO);
        assert_eq!(
            result.err(),
            Some(ScheduleError::ZeroPeriod(String::from("counting job")))
        );
    }
}
