//! Performance-focused tracing utilities
//!
//! Timing spans with threshold filtering and standard event shapes for the
//! three things a stream does that cost time: allocating, transferring and
//! reshaping.
//!
//! ## Example
//!
//! ```rust
//! use mdstream_tracing::performance::{record_allocation, record_transfer, PerformanceSpan};
//!
//! let span = PerformanceSpan::new("upload_positions", Some(100));
//! // ... do work ...
//! drop(span); // Logs only if duration > 100μs
//!
//! record_allocation("posq", 4096, 12);
//! record_transfer("posq", "H2D", 4096, 30);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(true);
static THRESHOLD_US: AtomicU64 = AtomicU64::new(0);

/// Set process-wide performance span behaviour.
///
/// Called by [`crate::init_global_tracing`]; spans created afterwards pick up
/// the new settings.
pub fn configure(enabled: bool, default_threshold_us: Option<u64>) {
    ENABLED.store(enabled, Ordering::Relaxed);
    THRESHOLD_US.store(default_threshold_us.unwrap_or(0), Ordering::Relaxed);
}

/// Whether performance spans currently log anything.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Bandwidth in MiB/s for `bytes` moved in `duration_us` (0 when too fast to measure).
pub fn bandwidth_mbps(bytes: usize, duration_us: u64) -> f64 {
    if duration_us > 0 {
        (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0)
    } else {
        0.0
    }
}

/// RAII guard that measures span duration and conditionally logs based on threshold.
///
/// ```rust
/// use mdstream_tracing::performance::PerformanceSpan;
///
/// {
///     let _span = PerformanceSpan::new("collapse", Some(1000));
///     // ... operation code ...
/// } // Span logged only if duration > 1000μs
/// ```
pub struct PerformanceSpan {
    name: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Create a new performance span with optional threshold filtering.
    ///
    /// When no threshold is given the process-wide default from [`configure`] applies.
    pub fn new(span_name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let name = span_name.into();
        let span = tracing::debug_span!("perf", name = %name);
        Self::with_span(name, threshold_us, span)
    }

    /// Time `span`, a caller-built span that carries extra fields.
    ///
    /// The completion event is logged inside `span`, so its fields travel
    /// with the duration.
    pub fn with_span(span_name: impl Into<String>, threshold_us: Option<u64>, span: tracing::Span) -> Self {
        Self {
            name: span_name.into(),
            threshold_us,
            start_time: Instant::now(),
            span,
        }
    }

    /// Name given at construction
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the elapsed time since span creation.
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// The underlying tracing span
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Enter this span's context.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    fn effective_threshold(&self) -> u64 {
        self.threshold_us
            .unwrap_or_else(|| THRESHOLD_US.load(Ordering::Relaxed))
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        if !is_enabled() {
            return;
        }

        let elapsed_us = self.elapsed_us();
        if elapsed_us >= self.effective_threshold() {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Record a device or host allocation made for a stream.
pub fn record_allocation(stream: &str, size_bytes: usize, duration_us: u64) {
    tracing::debug!(
        event = "allocation",
        stream = stream,
        size_bytes = size_bytes,
        size_kb = size_bytes as f64 / 1024.0,
        duration_us = duration_us,
        "memory_allocation"
    );
}

/// Record a host/device transfer with bandwidth calculation.
///
/// `direction` is `"H2D"` or `"D2H"`.
pub fn record_transfer(stream: &str, direction: &str, bytes: usize, duration_us: u64) {
    let bandwidth = bandwidth_mbps(bytes, duration_us);

    tracing::debug!(
        event = "transfer",
        stream = stream,
        direction = direction,
        bytes = bytes,
        kb = bytes as f64 / 1024.0,
        duration_us = duration_us,
        bandwidth_mbps = bandwidth,
        bandwidth_gbps = bandwidth / 1024.0,
        "data_transfer"
    );
}

/// Record a sub-stream reshape.
pub fn record_reshape(stream: &str, from_sub_streams: usize, to_sub_streams: usize, elements: usize, duration_us: u64) {
    let elements_per_sec = if duration_us > 0 {
        (elements as f64 / duration_us as f64) * 1_000_000.0
    } else {
        0.0
    };

    tracing::debug!(
        event = "reshape",
        stream = stream,
        from_sub_streams = from_sub_streams,
        to_sub_streams = to_sub_streams,
        elements = elements,
        duration_us = duration_us,
        melems_per_sec = elements_per_sec / 1_000_000.0,
        "stream_reshape"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_performance_span_creation() {
        let span = PerformanceSpan::new("test_span", Some(1000));
        assert_eq!(span.name(), "test_span");
        assert_eq!(span.threshold_us, Some(1000));
        assert_eq!(span.effective_threshold(), 1000);
    }

    #[test]
    fn test_with_span_keeps_caller_span() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = PerformanceSpan::with_span("tagged", None, tracing::debug_span!("perf", stream = "posq"));
            assert_eq!(span.name(), "tagged");
            assert!(span.span().field("stream").is_some());
            assert!(!span.span().is_disabled());
        });
    }

    #[test]
    fn test_performance_span_elapsed() {
        let span = PerformanceSpan::new("test_span", None);
        thread::sleep(Duration::from_millis(10));
        assert!(span.elapsed_us() >= 10_000, "elapsed should be at least 10ms");
    }

    #[test]
    fn test_bandwidth_calculation() {
        // 1 MiB in 1 ms = 1000 MiB/s
        assert!((bandwidth_mbps(1024 * 1024, 1000) - 1000.0).abs() < 0.01);
        assert_eq!(bandwidth_mbps(4096, 0), 0.0);
    }

    #[test]
    fn test_record_events() {
        // Just verify they don't panic without a subscriber
        record_allocation("posq", 1024, 15);
        record_transfer("posq", "H2D", 4096, 250);
        record_reshape("force4", 4, 1, 4096, 80);
        record_reshape("force4", 1, 4, 4096, 0);
    }
}
