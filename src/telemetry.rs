use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins when set; otherwise
/// `level` is used, falling back to INFO if it does not parse.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(level.parse().unwrap_or(Level::INFO.into()))
    });
    fmt().with_env_filter(filter).with_target(false).init();
}
