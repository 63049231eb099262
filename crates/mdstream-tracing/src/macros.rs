//! Convenience macros for performance tracing

/// Create a performance span with optional fields.
///
/// Returns a [`crate::performance::PerformanceSpan`] guard that logs the
/// elapsed time when dropped. The fields are recorded on the guard's span;
/// enter it with [`enter`](crate::performance::PerformanceSpan::enter) to
/// nest work under it.
///
/// ```rust
/// use mdstream_tracing::perf_span;
///
/// {
///     let _span = perf_span!("upload", stream = "posq", bytes = 4096);
///     // ... operation code ...
/// }
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name, None)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let span = tracing::debug_span!(
            "perf",
            name = $name,
            $($field = $value),+
        );
        $crate::performance::PerformanceSpan::with_span($name, None, span)
    }};
}

/// Emit a standardized performance event at debug level.
///
/// ```rust
/// use mdstream_tracing::perf_event;
///
/// perf_event!("collapse_complete", elements = 4096, duration_us = 12);
/// ```
#[macro_export]
macro_rules! perf_event {
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {
        tracing::debug!(
            event = $name,
            $($field = $value),+
        );
    };
}
