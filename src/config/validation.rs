use crate::config::types::{OutputConfig, RunnerConfig, ScanConfig};
use crate::transport::ProxyEndpoint;
use crate::ConfigError;

/// Upper bound on concurrently processed targets
pub const MAX_WORKERS: usize = 32;

/// Validates the entire configuration
pub fn validate(config: &ScanConfig) -> Result<(), ConfigError> {
    if config.input.targets.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "input.targets cannot be empty".to_string(),
        ));
    }

    validate_proxy_address(&config.proxy.socks)?;
    validate_output_config(&config.output)?;
    validate_runner_config(&config.runner)?;
    Ok(())
}

/// Validates the proxy address shape; reachability is checked at provisioning
fn validate_proxy_address(socks: &str) -> Result<(), ConfigError> {
    ProxyEndpoint::parse(socks)
        .map(|_| ())
        .map_err(|reason| ConfigError::Validation(format!("proxy.socks: {}", reason)))
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output.dir cannot be empty".to_string(),
        ));
    }

    if config.log.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output.log cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_runner_config(config: &RunnerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "runner.workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    Ok(())
}
