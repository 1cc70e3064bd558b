//! Recurring pushes

use adaptor_core::ScheduleConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::journal::PushKind;
use crate::service::{PushService, PushStart};

/// Starts full pushes every `full_interval` and incremental pushes every
/// `incremental_period`. A tick that lands while the previous push of the
/// same kind is still running is skipped.
pub struct PushScheduler {
    service: Arc<PushService>,
    full_interval: Duration,
    incremental_period: Option<Duration>,
    push_on_startup: bool,
}

impl PushScheduler {
    pub fn new(service: Arc<PushService>, full_interval: Duration) -> Self {
        Self {
            service,
            full_interval,
            incremental_period: None,
            push_on_startup: true,
        }
    }

    pub fn from_config(service: Arc<PushService>, config: &ScheduleConfig) -> Self {
        Self {
            service,
            full_interval: config.full_push_interval(),
            incremental_period: config.incremental_poll_period(),
            push_on_startup: config.push_doc_ids_on_startup,
        }
    }

    pub fn with_incremental_period(mut self, period: Option<Duration>) -> Self {
        self.incremental_period = period;
        self
    }

    pub fn with_push_on_startup(mut self, enabled: bool) -> Self {
        self.push_on_startup = enabled;
        self
    }

    /// Run until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let incremental = if self.service.repository().supports_incremental() {
            self.incremental_period
        } else {
            None
        };
        info!(
            full_interval_secs = self.full_interval.as_secs(),
            incremental_period_secs = incremental.map(|p| p.as_secs()),
            push_on_startup = self.push_on_startup,
            "Push scheduler started"
        );

        let full = self.schedule(PushKind::Full, Some(self.full_interval), self.push_on_startup, &cancel);
        let incremental = self.schedule(PushKind::Incremental, incremental, false, &cancel);
        tokio::join!(full, incremental);

        info!("Push scheduler stopped");
    }

    async fn schedule(
        &self,
        kind: PushKind,
        period: Option<Duration>,
        run_first: bool,
        cancel: &CancellationToken,
    ) {
        if run_first {
            self.trigger(kind);
        }

        let Some(period) = period.filter(|p| !p.is_zero()) else {
            cancel.cancelled().await;
            return;
        };

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.trigger(kind),
            }
        }
    }

    fn trigger(&self, kind: PushKind) {
        let start = match kind {
            PushKind::Full => self.service.start_full_push(),
            PushKind::Incremental => self.service.start_incremental_push(),
        };
        match start {
            PushStart::Started(_) => debug!(kind = %kind, "Scheduled push started"),
            PushStart::AlreadyRunning => info!(kind = %kind, "Previous push still running, skipping tick"),
        }
    }
}
