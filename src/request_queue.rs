//! The RPC collaborator boundary.
//!
//! The pipeline never talks to a transport directly; it goes through
//! [`RequestQueue`], which owns rate limiting and transport mechanics. The
//! [`Retrying`] decorator adds bounded exponential backoff and a total
//! per-call timeout on top of any implementation, so transient transport
//! errors never reach the pipeline's own error budget.

use std::{future::Future, time::Duration};

use alloy::{eips::BlockNumberOrTag, primitives::B256};
use backon::{ExponentialBuilder, Retryable};
use tokio::time::timeout;
use tracing::debug;

use crate::{
    error::SyncError,
    types::{CallTrace, LogEntry, ReceiptRecord, SyncBlock},
};

/// Default total timeout for one logical RPC call, retries included.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of backoff retries per call.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Default minimum backoff delay.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(250);

/// The RPC surface the pipeline consumes.
///
/// Implementations return [`SyncError::BlockNotFound`] for absent blocks and
/// a retryable error kind for transport failures.
pub trait RequestQueue: Send + Sync + 'static {
    /// `eth_getBlockByNumber`, with full transaction bodies.
    fn get_block_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> impl Future<Output = Result<SyncBlock, SyncError>> + Send;

    /// `eth_getBlockByHash`, with full transaction bodies.
    fn get_block_by_hash(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<SyncBlock, SyncError>> + Send;

    /// `eth_getLogs` scoped to one block hash.
    fn get_logs(&self, block_hash: B256)
    -> impl Future<Output = Result<Vec<LogEntry>, SyncError>> + Send;

    /// `debug_traceBlockByHash`, flattened to call frames in deterministic
    /// trace order.
    fn trace_block(
        &self,
        block_hash: B256,
    ) -> impl Future<Output = Result<Vec<CallTrace>, SyncError>> + Send;

    /// `eth_getTransactionReceipt`.
    fn get_transaction_receipt(
        &self,
        transaction_hash: B256,
    ) -> impl Future<Output = Result<ReceiptRecord, SyncError>> + Send;
}

/// Adds retry, backoff, and a total timeout to any [`RequestQueue`].
#[derive(Clone, Debug)]
pub struct Retrying<Q> {
    inner: Q,
    max_retries: usize,
    min_delay: Duration,
    call_timeout: Duration,
}

impl<Q> Retrying<Q> {
    #[must_use]
    pub fn new(inner: Q) -> Self {
        Self {
            inner,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Bounds the entire call including all retries and backoff sleeps.
    #[must_use]
    pub fn call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    async fn call<'a, T, F, Fut>(&'a self, operation: F) -> Result<T, SyncError>
    where
        F: Fn(&'a Q) -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let strategy = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_delay);

        timeout(
            self.call_timeout,
            (|| operation(&self.inner))
                .retry(strategy)
                .when(SyncError::is_retryable)
                .notify(|err: &SyncError, dur: Duration| {
                    debug!(error = %err, "RPC call failed, retrying after {:?}", dur);
                })
                .sleep(tokio::time::sleep),
        )
        .await
        .map_err(|_| SyncError::Timeout)?
    }
}

impl<Q: RequestQueue> RequestQueue for Retrying<Q> {
    async fn get_block_by_number(&self, number: BlockNumberOrTag) -> Result<SyncBlock, SyncError> {
        self.call(|queue| queue.get_block_by_number(number)).await
    }

    async fn get_block_by_hash(&self, hash: B256) -> Result<SyncBlock, SyncError> {
        self.call(|queue| queue.get_block_by_hash(hash)).await
    }

    async fn get_logs(&self, block_hash: B256) -> Result<Vec<LogEntry>, SyncError> {
        self.call(|queue| queue.get_logs(block_hash)).await
    }

    async fn trace_block(&self, block_hash: B256) -> Result<Vec<CallTrace>, SyncError> {
        self.call(|queue| queue.trace_block(block_hash)).await
    }

    async fn get_transaction_receipt(
        &self,
        transaction_hash: B256,
    ) -> Result<ReceiptRecord, SyncError> {
        self.call(|queue| queue.get_transaction_receipt(transaction_hash)).await
    }
}
