//! Tracing subscriber setup for services hosting the catalog.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::CatalogConfig;

/// Builds the filter: `RUST_LOG` when set, otherwise the configured directive.
pub fn env_filter(config: &CatalogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
}

/// Installs the global tracing subscriber.
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(config: &CatalogConfig) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    let result = if config.json_logs {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_false() {
        let config = CatalogConfig::default();
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
