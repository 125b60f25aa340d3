pub mod config;
pub mod forwarder;
pub mod predictor;
pub mod server;
pub mod torch;
pub mod vision;

/// Logging and test helpers shared by both binaries
pub mod util {
    use tracing_subscriber::EnvFilter;

    /// Log filter used when `RUST_LOG` is not set
    pub const DEFAULT_LOG: &str = "info,actix_web=info";

    /// Install the global fmt subscriber. `RUST_LOG` takes precedence over
    /// `DEFAULT_LOG`
    pub fn init_tracing() {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

}
