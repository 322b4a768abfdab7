//! Structured logging for the LOB meta merge-scan.
//!
//! Every event goes through `tracing` with the target `lob_meta_scan` and an
//! `event` field for filtering. The crate never installs a subscriber; the
//! load worker embedding it decides where events go.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: subsystem (`translate`, `merge`, `reassemble`, `iter`)
//! - Use `%` for Display, `?` for Debug formatting
//! - Per-row events stay at debug level

/// Target for all merge-scan log events.
pub(crate) const LOB_SCAN_TARGET: &str = "lob_meta_scan";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "iter",
///     event = "lob_meta_iter_opened",
///     tablet = %tablet,
///     sources = count,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::LOB_SCAN_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::LOB_SCAN_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::LOB_SCAN_TARGET, $($field)*)
    };
}

/// Macro for error-level log events.
macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::LOB_SCAN_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
