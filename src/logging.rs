//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout stays clean for reports. `RUST_LOG` wins over
//! the `--log-level` / `SURR_LOG` setting.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Build the filter: `RUST_LOG` if set and valid, else `level`.
pub fn env_filter(level: &str) -> Result<EnvFilter, AppError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| AppError::usage(format!("Invalid log level '{level}': {e}"))),
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(level: &str) -> Result<(), AppError> {
    let filter = env_filter(level)?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_directive_levels() {
        assert!(EnvFilter::try_new("warn").is_ok());
        assert!(EnvFilter::try_new("isolation_surrogate=debug,warn").is_ok());
    }

    #[test]
    fn init_twice_is_harmless() {
        assert!(init("info").is_ok());
        assert!(init("info").is_ok());
    }
}
