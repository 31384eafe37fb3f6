use std::{mem::discriminant, sync::Arc};

use alloy::{
    eips::BlockId,
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;

use crate::event::SyncResult;

#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("RPC error: {0}")]
    Rpc(Arc<RpcError<TransportErrorKind>>),

    #[error("block not found, block id: {0}")]
    BlockNotFound(BlockId),

    #[error("inconsistent RPC response: {0}")]
    InconsistentResponse(String),

    #[error("operation timed out")]
    Timeout,

    #[error("unrecoverable reorg: no common ancestor above finalized block {finalized}")]
    UnrecoverableReorg { finalized: u64 },

    #[error("service is shutting down")]
    ServiceShutdown,

    #[error("polling interval must be greater than zero")]
    InvalidPollingInterval,

    #[error("event buffer capacity must be greater than 0")]
    InvalidBufferCapacity,

    #[error("max queued blocks must be greater than 0")]
    InvalidMaxQueuedBlocks,
}

impl SyncError {
    /// Whether the error is expected to clear on its own (network hiccups,
    /// RPC-node lag near the chain tip) and is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Rpc(_)
                | SyncError::BlockNotFound(_)
                | SyncError::InconsistentResponse(_)
                | SyncError::Timeout
        )
    }

    /// Whether the error must terminate the pipeline without retry.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::UnrecoverableReorg { .. })
    }
}

impl From<RpcError<TransportErrorKind>> for SyncError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        SyncError::Rpc(Arc::new(error))
    }
}

impl PartialEq<SyncError> for SyncResult {
    fn eq(&self, other: &SyncError) -> bool {
        match self {
            Ok(_) => false,
            Err(err) => discriminant(err) == discriminant(other),
        }
    }
}
