//! The sync service: builder, single-consumer queue driver, and supervisor.
//!
//! Mirrors the crate's public entry point: configure a [`ChainSync`], connect
//! it to a [`RequestQueue`], and `run()` it to spawn the consumer service and
//! the head poller. Subscribers read the downstream event stream; the
//! [`SyncHandle`] kills the service.

use std::{sync::Arc, time::Duration};

use alloy::eips::BlockNumberOrTag;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use crate::{
    engine::SyncEngine,
    error::SyncError,
    event::SyncResult,
    filter::Sources,
    poller::Poller,
    request_queue::RequestQueue,
    types::{LightBlock, Network, SyncBlock},
};

/// Default capacity of the downstream event channel.
pub const DEFAULT_EVENT_BUFFER_CAPACITY: usize = 1024;

const COMMAND_BUFFER_CAPACITY: usize = 64;

/// Backoff schedule in seconds, indexed by consecutive-error count. Reaching
/// the end of the schedule promotes the error to fatal.
pub(crate) const ERROR_TIMEOUTS: [u64; 14] =
    [1, 2, 5, 10, 30, 60, 60, 60, 60, 60, 60, 60, 60, 60];

/// Consecutive failures after which an error becomes fatal.
pub(crate) const MAX_CONSECUTIVE_ERRORS: usize = ERROR_TIMEOUTS.len();

pub(crate) fn backoff_delay(consecutive_errors: usize) -> Duration {
    let index = consecutive_errors.saturating_sub(1).min(ERROR_TIMEOUTS.len() - 1);
    Duration::from_secs(ERROR_TIMEOUTS[index])
}

#[derive(Debug)]
pub(crate) enum Command {
    /// A freshly polled head block for the pipeline.
    Enqueue(SyncBlock),
    /// A collaborator (the poller) exhausted its error budget.
    Fatal(SyncError),
    /// Stop the service, discarding pending work.
    Kill { response: oneshot::Sender<()> },
}

/// Configuration for one per-chain sync pipeline.
#[derive(Clone, Debug)]
pub struct ChainSync {
    pub buffer_capacity: usize,
}

impl Default for ChainSync {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainSync {
    #[must_use]
    pub fn new() -> Self {
        Self { buffer_capacity: DEFAULT_EVENT_BUFFER_CAPACITY }
    }

    /// Sets the downstream event channel capacity.
    #[must_use]
    pub fn buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// Binds the pipeline to a network, a source list, and an RPC
    /// collaborator.
    ///
    /// # Errors
    ///
    /// Returns an error when the polling interval is zero or the buffer
    /// capacity is zero.
    pub fn connect<Q: RequestQueue>(
        self,
        network: Network,
        sources: Sources,
        queue: Q,
    ) -> Result<ConnectedChainSync<Q>, SyncError> {
        if network.polling_interval.is_zero() {
            return Err(SyncError::InvalidPollingInterval);
        }
        if self.buffer_capacity == 0 {
            return Err(SyncError::InvalidBufferCapacity);
        }
        Ok(ConnectedChainSync {
            network,
            sources,
            queue: Arc::new(queue),
            buffer_capacity: self.buffer_capacity,
        })
    }
}

pub struct ConnectedChainSync<Q> {
    network: Network,
    sources: Sources,
    queue: Arc<Q>,
    buffer_capacity: usize,
}

impl<Q: RequestQueue> ConnectedChainSync<Q> {
    /// Spawns the consumer service and the head poller, returning a kill
    /// handle and the downstream event stream.
    ///
    /// The stream yields `Ok(SyncEvent)` items in strict pipeline order. A
    /// fatal error is delivered as a single `Err` item, after which the
    /// stream closes.
    pub fn run(self) -> (SyncHandle, ReceiverStream<SyncResult>) {
        let (events_tx, events_rx) = mpsc::channel(self.buffer_capacity);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER_CAPACITY);

        let poller = Poller::new(
            Arc::clone(&self.queue),
            command_tx.clone(),
            self.network.polling_interval,
        );
        tokio::spawn(poller.run());

        let service = Service {
            network: self.network,
            sources: self.sources,
            queue: self.queue,
            commands: command_rx,
            events: events_tx,
        };
        tokio::spawn(service.run());

        (SyncHandle { commands: command_tx }, ReceiverStream::new(events_rx))
    }
}

/// Client handle for a running sync service.
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
}

impl SyncHandle {
    /// Stops the service: pending work is discarded, the poller exits on its
    /// next tick, and the event stream closes once the in-flight block (if
    /// any) has completed.
    pub async fn kill(&self) {
        let (response_tx, response_rx) = oneshot::channel();
        if self.commands.send(Command::Kill { response: response_tx }).await.is_ok() {
            let _ = response_rx.await;
        }
    }
}

struct Service<Q> {
    network: Network,
    sources: Sources,
    queue: Arc<Q>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<SyncResult>,
}

impl<Q: RequestQueue> Service<Q> {
    async fn run(mut self) {
        info!(network = %self.network.name, chain_id = self.network.chain_id, "starting sync service");

        let finalized = match self.bootstrap().await {
            Ok(block) => block,
            Err(err) => {
                error!(error = %err, "bootstrap failed");
                let _ = self.events.send(Err(err)).await;
                return;
            }
        };
        info!(
            block_number = finalized.number,
            block_hash = %finalized.hash,
            "bootstrapped from finalized block"
        );

        let mut engine = SyncEngine::new(
            self.network.clone(),
            self.sources.clone(),
            Arc::clone(&self.queue),
            finalized,
            self.events.clone(),
        );
        let mut consecutive_errors = 0usize;

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Enqueue(block) => {
                    engine.enqueue(block);
                    if !self.drain(&mut engine, &mut consecutive_errors).await {
                        break;
                    }
                }
                Command::Fatal(err) => {
                    error!(error = %err, "fatal error reported by collaborator");
                    let _ = self.events.send(Err(err)).await;
                    break;
                }
                Command::Kill { response } => {
                    engine.clear_pending();
                    let _ = response.send(());
                    break;
                }
            }
        }

        info!("sync service stopped");
    }

    /// Processes pending blocks until the queue is empty. Returns `false`
    /// when the service must stop.
    async fn drain(&mut self, engine: &mut SyncEngine<Q>, consecutive_errors: &mut usize) -> bool {
        while let Some(block) = engine.next_pending() {
            match engine.process(block).await {
                Ok(()) => {
                    *consecutive_errors = 0;
                }
                Err(SyncError::ServiceShutdown) => return false,
                Err(err) if err.is_fatal() => {
                    error!(error = %err, "fatal pipeline error");
                    let _ = self.events.send(Err(err)).await;
                    return false;
                }
                Err(err) => {
                    *consecutive_errors += 1;
                    // a poison pill must not loop; the next poll re-enqueues
                    // from `latest`
                    engine.clear_pending();
                    if *consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!(
                            error = %err,
                            consecutive = *consecutive_errors,
                            "error budget exhausted"
                        );
                        let _ = self.events.send(Err(err)).await;
                        return false;
                    }
                    let delay = backoff_delay(*consecutive_errors);
                    warn!(
                        error = %err,
                        consecutive = *consecutive_errors,
                        "block ingestion failed, backing off for {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
        true
    }

    /// Determines the starting finalized block: the latest head minus the
    /// network's finality depth.
    async fn bootstrap(&self) -> Result<LightBlock, SyncError> {
        let mut consecutive_errors = 0usize;
        loop {
            match self.try_bootstrap().await {
                Ok(block) => return Ok(block),
                Err(err) => {
                    consecutive_errors += 1;
                    if err.is_fatal() || consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(err);
                    }
                    let delay = backoff_delay(consecutive_errors);
                    warn!(error = %err, "bootstrap attempt failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_bootstrap(&self) -> Result<LightBlock, SyncError> {
        let latest = self.queue.get_block_by_number(BlockNumberOrTag::Latest).await?;
        let start = latest.number.saturating_sub(self.network.finality_block_count);
        if start == latest.number {
            return Ok(latest.light());
        }
        let block = self.queue.get_block_by_number(start.into()).await?;
        Ok(block.light())
    }
}
