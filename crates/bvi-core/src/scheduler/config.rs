use std::{sync::Arc, time::Duration, time::Instant};

use bvi_model::TaskConfig;
use tracing::{debug, error, info};

use super::Inner;
use crate::events::{Event, EventKind};

impl Inner {
    pub(super) async fn run_config_consumer(self: Arc<Self>) {
        let heartbeat = self.config.heartbeat();
        let mut last_beat = Instant::now();

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            if last_beat.elapsed() >= heartbeat {
                debug!("config consumer has been running");
                last_beat = Instant::now();
            }

            let step = self
                .contained("config consumer", Arc::clone(&self).consume_config_once())
                .await
                .unwrap_or_else(|| Some(self.config.idle_fetch()));

            if let Some(pause) = step
                && !self.pause(pause).await
            {
                break;
            }
        }
        debug!("config consumer stopped");
    }

    async fn consume_config_once(self: Arc<Self>) -> Option<Duration> {
        let delivery = match self.configs.fetch_one().await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return Some(self.config.idle_fetch()),
            Err(e) => {
                error!(error = %e, "config consumer fetch failed");
                return Some(self.config.idle_fetch());
            }
        };
        if let Err(e) = delivery.ack().await {
            error!(error = %e, "failed to acknowledge config message");
            return Some(self.config.idle_fetch());
        }

        self.apply_config(&delivery.message.task);
        None
    }

    /// Retune the global limiter and replace the live timeouts.
    ///
    /// Running jobs are untouched; a lower capacity only throttles future admissions.
    pub(super) fn apply_config(&self, config: &TaskConfig) {
        self.pool.tune(config.concurrency);
        let settings = self.settings.apply(config);

        let (capacity, running) = self.pool.snapshot();
        info!(
            capacity,
            running,
            sca_timeout = ?settings.sca_timeout,
            sast_timeout = ?settings.sast_timeout,
            bha_timeout = ?settings.bha_timeout,
            "task config applied"
        );
        self.emit(Event::new(EventKind::CapacityTuned).with_slots(capacity, running));
    }
}
