use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

use crate::util::env::init_env;

/// Sets up the global tracing subscriber with a fmt formatter and env filter.
///
/// `default_filter` applies when `RUST_LOG` is not set, so every binary
/// shares the same formatting rules. `.env` is loaded first so a `RUST_LOG`
/// set there takes effect.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    init_env();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::env::env_loaded;

    #[test]
    fn loads_dotenv_before_reading_filter() {
        // A second global init in the same process may fail; the load must still happen.
        let _ = init_tracing("warn");
        assert!(env_loaded());
    }
}
