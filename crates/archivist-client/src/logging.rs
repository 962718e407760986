//! Log output
//!
//! Libraries in this workspace only emit `tracing` events. Installing a sink
//! is up to the application: [`init`] sets the process-wide subscriber once,
//! [`scoped`] installs one for the current thread until its guard drops.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when none is given or the given one does not parse
pub const DEFAULT_FILTER: &str = "info";

/// Line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single line
    #[default]
    Compact,
    /// One JSON object per line
    Json,
}

fn env_filter(filter: Option<&str>) -> EnvFilter {
    filter
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber
///
/// Returns `false` if one was already installed, in which case nothing changes.
pub fn init(filter: Option<&str>, format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(filter));
    let installed = match format {
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().with_target(true).compact())
            .try_init()
            .is_ok(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
            .is_ok(),
    };
    if installed {
        tracing::debug!(?format, "logging initialised");
    }
    installed
}

/// Subscriber active on the current thread while held
#[must_use = "logging stops when the guard is dropped"]
#[derive(Debug)]
pub struct LoggingGuard {
    _guard: tracing::subscriber::DefaultGuard,
}

/// Install a thread-local subscriber writing through the test harness
pub fn scoped(filter: Option<&str>) -> LoggingGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(filter))
        .with_test_writer()
        .finish();
    LoggingGuard {
        _guard: tracing::subscriber::set_default(subscriber),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_guard_sets_thread_level() {
        let _guard = scoped(Some("debug"));
        assert!(tracing::enabled!(tracing::Level::DEBUG));
        assert!(!tracing::enabled!(tracing::Level::TRACE));
    }

    #[test]
    fn init_is_idempotent() {
        init(Some("warn"), LogFormat::Compact);
        assert!(!init(Some("debug"), LogFormat::Json));
    }
}
