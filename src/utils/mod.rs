//! Utilities: logging setup.
//!
//! Key items:
//!   derive_level / init_logging
//!
//! Logs go to stderr; stdout is reserved for the JSON result line.

/// Logging helpers.
pub mod logging {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::EnvFilter;

    pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
        if quiet {
            return LevelFilter::ERROR;
        }
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Build the filter: a non-empty RUST_LOG wins over the CLI-derived level.
    pub fn env_filter(level: LevelFilter, rust_log: Option<&str>) -> EnvFilter {
        match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
            Some(directives) => EnvFilter::try_new(directives)
                .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into())),
            None => EnvFilter::default().add_directive(level.into()),
        }
    }

    pub fn init_logging(level: LevelFilter) {
        let rust_log = std::env::var("RUST_LOG").ok();
        // try_init: a second init (tests) is a no-op
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter(level, rust_log.as_deref()))
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

}

pub use logging::{derive_level, init_logging};
