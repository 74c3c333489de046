//! Tracing hooks for query execution.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]`
//! boilerplate at every call site.

/// Emit a debug-level event with the SQL text and parameter count.
///
/// ```ignore
/// tessera_trace_query!(stmt.sql(), stmt.params().len());
/// ```
macro_rules! tessera_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(sql = %$sql, params = $param_count, "tessera.query");
    };
}

/// Emit a debug-level event when a cancellation token stops an operation.
macro_rules! tessera_trace_cancel {
    ($stage:literal) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(stage = $stage, "tessera.cancelled");
    };
}

/// Emit a trace-level event for a follow-up relation query.
macro_rules! tessera_trace_relation {
    ($relation:expr, $parents:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!(relation = %$relation, parents = $parents, "tessera.load");
    };
}

/// Emit a debug-level event when closing a cursor fails after an earlier
/// error already ended the operation.
macro_rules! tessera_trace_close {
    ($error:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(error = %$error, "tessera.close_failed");
        #[cfg(not(feature = "tracing"))]
        let _ = &$error;
    };
}
