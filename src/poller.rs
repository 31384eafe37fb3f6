//! Periodic head polling.
//!
//! A separate task on the network's polling interval that fetches the latest
//! block and hands it to the pipeline. Poll failures never inject into the
//! pipeline; they burn the poller's own error budget, and exhausting it
//! reports a fatal error to the service.

use std::{sync::Arc, time::Duration};

use alloy::eips::BlockNumberOrTag;
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::{error, info, trace, warn};

use crate::{
    request_queue::RequestQueue,
    service::{Command, MAX_CONSECUTIVE_ERRORS, backoff_delay},
};

pub(crate) struct Poller<Q> {
    queue: Arc<Q>,
    commands: mpsc::Sender<Command>,
    interval: Duration,
}

impl<Q: RequestQueue> Poller<Q> {
    pub(crate) fn new(queue: Arc<Q>, commands: mpsc::Sender<Command>, interval: Duration) -> Self {
        Self { queue, commands, interval }
    }

    pub(crate) async fn run(self) {
        info!(interval = ?self.interval, "starting head poller");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_errors = 0usize;

        loop {
            ticker.tick().await;

            match self.queue.get_block_by_number(BlockNumberOrTag::Latest).await {
                Ok(block) => {
                    consecutive_errors = 0;
                    trace!(block_number = block.number, "polled latest head");
                    if self.commands.send(Command::Enqueue(block)).await.is_err() {
                        // service stopped
                        break;
                    }
                }
                Err(err) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!(error = %err, "head polling error budget exhausted");
                        let _ = self.commands.send(Command::Fatal(err)).await;
                        break;
                    }
                    let delay = backoff_delay(consecutive_errors);
                    warn!(
                        error = %err,
                        consecutive = consecutive_errors,
                        "head poll failed, backing off for {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        info!("head poller stopped");
    }
}
