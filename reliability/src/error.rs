//! Error taxonomy for the reliability envelope (§4.6.1). Every recoverable
//! failure is classified into exactly one category; retry policy is then
//! configured against categories rather than individual error variants.

use std::collections::HashSet;

/// The category a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Safe to retry: transport hiccups, connection resets.
    Transient,
    /// A phase deadline elapsed.
    Timeout,
    /// The circuit breaker is open or the connection pool is exhausted.
    Resource,
    /// Misconfiguration; retrying will not help.
    Configuration,
    /// A protocol-level violation (bad PDU, unexpected state).
    Protocol,
    /// A permanent failure from the peer (e.g. a permanent association
    /// rejection, an unsupported SOP class).
    Permanent,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 6] = [
        ErrorCategory::Transient,
        ErrorCategory::Timeout,
        ErrorCategory::Resource,
        ErrorCategory::Configuration,
        ErrorCategory::Protocol,
        ErrorCategory::Permanent,
    ];
}

/// The default retryable set: Transient ∪ Timeout ∪ Resource (§4.6.1).
pub fn default_retryable_categories() -> HashSet<ErrorCategory> {
    [ErrorCategory::Transient, ErrorCategory::Timeout, ErrorCategory::Resource]
        .into_iter()
        .collect()
}

/// Classifies an association-layer error into one of the taxonomy's
/// categories. Association rejection splits on its result field: a
/// permanent rejection classifies as `Permanent`, a transient one as
/// `Transient` (§4.6.1).
pub fn classify(error: &dicom_ul::Error) -> ErrorCategory {
    use dicom_ul::Error::*;

    match error {
        ConnectionFailed { .. } | ConnectionClosed => ErrorCategory::Transient,
        Timeout | OperationTimeout { .. } | ArtimTimerExpired => ErrorCategory::Timeout,
        InvalidPdu
        | UnrecognizedPduType { .. }
        | UnexpectedEndOfData
        | PduTooLarge { .. }
        | UnexpectedPduType { .. }
        | InvalidState { .. }
        | EncodingFailed
        | DecodingFailed => ErrorCategory::Protocol,
        AssociationRejected { result, .. } => match result {
            dicom_ul::pdu::RjResult::Permanent => ErrorCategory::Permanent,
            dicom_ul::pdu::RjResult::Transient => ErrorCategory::Transient,
        },
        AssociationAborted { .. } => ErrorCategory::Transient,
        NoPresentationContextAccepted
        | MissingAbstractSyntax
        | SopClassNotSupported { .. }
        | InvalidAeTitle { .. } => ErrorCategory::Configuration,
        StoreFailed { .. } | QueryFailed { .. } | RetrieveFailed { .. } => ErrorCategory::Transient,
        PartialFailure { .. } => ErrorCategory::Transient,
        _ => ErrorCategory::Permanent,
    }
}

/// Whether `category` is retryable under `retryable`.
pub fn is_retryable(category: ErrorCategory, retryable: &HashSet<ErrorCategory>) -> bool {
    retryable.contains(&category)
}

/// A resource-exhaustion failure raised by the circuit breaker or the
/// connection pool, surfaced to callers as `ErrorCategory::Resource`.
#[derive(Debug, Clone, snafu::Snafu)]
#[snafu(visibility(pub))]
pub enum ResourceError {
    #[snafu(display("circuit open for {host}:{port}, retry after {retry_after_secs}s"))]
    CircuitOpen { host: String, port: u16, retry_after_secs: u64 },

    #[snafu(display("pool exhausted: {in_use}/{max_connections} connections in use"))]
    PoolExhausted { in_use: usize, max_connections: usize },

    #[snafu(display("timed out waiting {waited_ms}ms to acquire a pooled connection"))]
    AcquireTimeout { waited_ms: u64 },
}

/// The aggregate error surfaced when a retry executor exhausts its policy
/// (§4.6.2): carries every attempt's underlying error in order.
#[derive(Debug)]
pub struct RetriesExhausted<E> {
    pub attempts: Vec<E>,
}

impl<E: std::fmt::Display> std::fmt::Display for RetriesExhausted<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exhausted {} attempt(s); last error: ", self.attempts.len())?;
        match self.attempts.last() {
            Some(e) => write!(f, "{e}"),
            None => write!(f, "none recorded"),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetriesExhausted<E> {}

/// The error returned by a retry executor: either the operation's own
/// error propagated unretried (not in the retryable set), an aggregate of
/// every attempt once the policy is exhausted, or cancellation.
#[derive(Debug)]
pub enum RetryError<E> {
    Exhausted(RetriesExhausted<E>),
    Cancelled,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Exhausted(e) => write!(f, "{e}"),
            RetryError::Cancelled => write!(f, "retry cancelled"),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}
