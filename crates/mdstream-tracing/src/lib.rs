//! Subscriber setup and performance events for the mdstream workspace.
//!
//! Host setup code, integration tests and benches install their `tracing`
//! subscriber through this crate so that stream allocation, transfer and
//! reshape events look the same everywhere.
//!
//! ```rust,no_run
//! use mdstream_tracing::{init_global_tracing, TracingConfig};
//!
//! init_global_tracing(&TracingConfig::from_env()).expect("tracing already installed");
//! ```
//!
//! # Environment
//!
//! | variable | effect |
//! |----------|--------|
//! | `MDSTREAM_TRACING_PROFILE` | `local` (default), `ci` or `performance` |
//! | `MDSTREAM_TRACING_DIRECTIVES` | filter directives, overriding `RUST_LOG` |
//! | `MDSTREAM_TRACING_FORMAT` | `pretty`, `compact` or `json` |
//! | `MDSTREAM_PERF_TRACING` | `true`/`1`/`yes` turns performance spans on |
//! | `MDSTREAM_PERF_THRESHOLD_US` | shortest performance span that is logged |

pub mod performance;

#[macro_use]
pub mod macros;

use std::str::FromStr;

pub use tracing::{debug, error, info, trace, warn};

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

/// Filter used when neither explicit directives nor `RUST_LOG` are set
pub const DEFAULT_DIRECTIVE: &str = "warn,mdstream_core=info,mdstream_backends=info";

/// Named preset a [`TracingConfig`] starts from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TracingProfile {
    /// Pretty, coloured output; performance spans on in debug builds
    #[default]
    Local,
    /// JSON without colour codes, performance spans off
    Ci,
    /// JSON with span close events and debug-level stream/backend events
    Performance,
}

impl FromStr for TracingProfile {
    type Err = TracingSetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ci" => Ok(Self::Ci),
            "performance" | "perf" => Ok(Self::Performance),
            other => Err(TracingSetupError::UnknownProfile(other.to_string())),
        }
    }
}

/// Output format of the formatter layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl FromStr for TracingOutput {
    type Err = TracingSetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TracingSetupError::UnknownFormat(other.to_string())),
        }
    }
}

/// How the shared subscriber is built
#[derive(Clone, Debug)]
pub struct TracingConfig {
    pub profile: TracingProfile,
    /// Filter directives such as `mdstream_core=debug`. When absent `RUST_LOG`
    /// is used, then [`DEFAULT_DIRECTIVE`].
    pub directives: Option<String>,
    /// Show event targets (module paths)
    pub include_targets: bool,
    pub ansi: bool,
    /// Span lifecycle events to emit
    pub span_events: FmtSpan,
    pub output: TracingOutput,
    /// When false, [`performance::PerformanceSpan`]s log nothing
    pub enable_performance_tracing: bool,
    /// Shortest performance span that is logged, in microseconds
    pub performance_threshold_us: Option<u64>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_profile(TracingProfile::Local)
    }
}

impl TracingConfig {
    /// Preset for `profile`
    pub fn for_profile(profile: TracingProfile) -> Self {
        let local = Self {
            profile,
            directives: None,
            include_targets: true,
            ansi: true,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Pretty,
            enable_performance_tracing: cfg!(debug_assertions),
            performance_threshold_us: None,
        };
        match profile {
            TracingProfile::Local => local,
            TracingProfile::Ci => Self {
                ansi: false,
                output: TracingOutput::Json,
                enable_performance_tracing: false,
                ..local
            },
            TracingProfile::Performance => Self {
                directives: Some("mdstream_backends=debug,mdstream_core=debug".to_string()),
                ansi: false,
                span_events: FmtSpan::CLOSE,
                output: TracingOutput::Json,
                enable_performance_tracing: true,
                ..local
            },
        }
    }

    pub fn for_local() -> Self {
        Self::for_profile(TracingProfile::Local)
    }

    pub fn for_ci() -> Self {
        Self::for_profile(TracingProfile::Ci)
    }

    /// Transfer and reshape analysis: every upload, download and collapse
    /// span is closed with its duration
    pub fn for_performance() -> Self {
        Self::for_profile(TracingProfile::Performance)
    }

    /// Read the `MDSTREAM_TRACING_*` and `MDSTREAM_PERF_*` variables
    ///
    /// Any unparseable value drops back to the default configuration with a
    /// note on stderr, since no subscriber exists yet to report it.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok()).unwrap_or_else(|err| {
            eprintln!("mdstream-tracing: {err}, using defaults");
            Self::default()
        })
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TracingSetupError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let profile = match var("MDSTREAM_TRACING_PROFILE") {
            Some(value) => value.parse()?,
            None => TracingProfile::default(),
        };
        let mut config = Self::for_profile(profile);

        if let Some(directives) = var("MDSTREAM_TRACING_DIRECTIVES") {
            config.directives = Some(directives);
        }
        if let Some(format) = var("MDSTREAM_TRACING_FORMAT") {
            config.output = format.parse()?;
            if config.output == TracingOutput::Json {
                config.ansi = false;
            }
        }
        if let Some(flag) = var("MDSTREAM_PERF_TRACING") {
            config.enable_performance_tracing =
                matches!(flag.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on");
        }
        if let Some(threshold) = var("MDSTREAM_PERF_THRESHOLD_US") {
            let threshold_us = threshold
                .trim()
                .parse::<u64>()
                .map_err(|_| TracingSetupError::InvalidThreshold(threshold.clone()))?;
            config.performance_threshold_us = Some(threshold_us);
        }

        Ok(config)
    }

    fn resolve_filter(&self) -> Result<EnvFilter, TracingSetupError> {
        match &self.directives {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))
            }
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))),
        }
    }
}

/// Failure to configure or install the subscriber
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    #[error("invalid tracing directive: {0}")]
    InvalidFilter(String),

    #[error("unknown tracing profile '{0}'")]
    UnknownProfile(String),

    #[error("unknown tracing format '{0}'")]
    UnknownFormat(String),

    #[error("invalid performance threshold '{0}'")]
    InvalidThreshold(String),

    /// Usually a subscriber is already installed
    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Subscriber for `config`, not yet installed
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let (filter, fmt_layer) = subscriber_layers(config)?;
    Ok(Registry::default().with(fmt_layer).with(filter))
}

/// Filter and formatting layers, for callers composing their own registry
pub fn subscriber_layers(
    config: &TracingConfig,
) -> Result<(EnvFilter, Box<dyn Layer<Registry> + Send + Sync>), TracingSetupError> {
    let filter = config.resolve_filter()?;
    let base = tracing_fmt::layer()
        .with_target(config.include_targets)
        .with_span_events(config.span_events.clone());

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.output {
        TracingOutput::Compact => Box::new(base.compact().with_ansi(config.ansi)),
        TracingOutput::Pretty => Box::new(base.pretty().with_ansi(config.ansi)),
        TracingOutput::Json => Box::new(base.json().with_ansi(false)),
    };

    Ok((filter, layer))
}

/// Install the configured subscriber as the process-wide default
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    performance::configure(config.enable_performance_tracing, config.performance_threshold_us);
    build_subscriber(config)?.try_init()?;
    Ok(())
}

/// Install a compact warn-level subscriber for tests
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let config = TracingConfig {
        directives: Some(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string())),
        output: TracingOutput::Compact,
        ansi: false,
        ..TracingConfig::default()
    };
    if let Ok(subscriber) = build_subscriber(&config) {
        let _ = subscriber.try_init();
    }
}
