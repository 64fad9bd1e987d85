//! Structured logging setup for Mirage tooling and tests.
//!
//! The rlib crates log through `tracing`; the shim itself uses its own
//! heap-free ring buffer and only mirrors to stderr when `MIRAGE_DEBUG`
//! is set. Never install a subscriber from inside the shim.

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Install a stderr subscriber at the given default level, honoring
/// `RUST_LOG` when set. Safe to call more than once; later calls are
/// no-ops.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_logging(LogLevel::Debug);
        init_logging(LogLevel::Trace);
    }
}
