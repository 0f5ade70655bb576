use thiserror::Error;

/// Failure taxonomy for upstream exchange calls.
///
/// Transient variants are retried by the outbound queue with backoff up to
/// its attempt cap; everything else surfaces to the caller immediately.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Upstream connection error: {0}")]
    Connection(String),

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Upstream server error (HTTP {status})")]
    Server { status: u16 },

    #[error("Upstream rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Upstream rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The upstream has not indexed the transaction yet (or never will).
    /// Status polling maps this to a pending view rather than an error.
    #[error("Upstream transaction not found")]
    NotFound,

    /// A consumed field was absent or had the wrong type. Never persisted.
    #[error("Malformed upstream response: {0}")]
    Malformed(String),

    /// The outbound queue was torn down before this call was dispatched.
    #[error("Outbound queue is shut down")]
    QueueClosed,
}

impl UpstreamError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::Connection(_)
                | UpstreamError::Timeout
                | UpstreamError::Server { .. }
                | UpstreamError::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, UpstreamError>;
