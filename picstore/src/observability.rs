//! Observability (logging and tracing)
//!
//! Structured logging through `tracing`. Storage operations open spans keyed
//! by image name, so rollbacks and cleanup failures can be correlated with
//! the upload that caused them.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging stack
///
/// Sets up:
/// - Pretty formatting in debug builds, JSON formatting in release builds
/// - Level filtering from `RUST_LOG`, falling back to the given default
///
/// # Example
///
/// ```rust,no_run
/// use picstore::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init("info")?;
/// tracing::info!("Application started");
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(default_filter: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new(format!("{default_filter},picstore=debug"))
        } else {
            EnvFilter::new(default_filter)
        }
    });

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    }

    Ok(())
}
