//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Discovery timeouts inside this range are accepted without a warning.
const DISCOVERY_TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 10_000..=15_000;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_browser(config, &mut result);
        Self::validate_timing(config, &mut result);
        Self::validate_providers(config, &mut result);

        Ok(result)
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        if config.browser.debug_port == 0 {
            result.add_error(ValidationError::new(
                "browser.debug_port",
                "Debug port cannot be 0",
            ));
        }

        if let Some(ref path) = config.browser.chrome_path {
            let expanded = shellexpand::tilde(path).to_string();
            if !std::path::Path::new(&expanded).exists() {
                result.add_warning(ValidationWarning::new(
                    "browser.chrome_path",
                    format!("Browser executable does not exist: {}", expanded),
                ));
            }
        }
    }

    fn validate_timing(config: &Config, result: &mut ValidationResult) {
        let timing = &config.timing;

        if timing.discovery_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "timing.discovery_timeout_ms",
                "discovery_timeout_ms must be greater than 0",
            ));
        } else if !DISCOVERY_TIMEOUT_RANGE_MS.contains(&timing.discovery_timeout_ms) {
            result.add_warning(ValidationWarning::new(
                "timing.discovery_timeout_ms",
                format!(
                    "discovery_timeout_ms = {} is outside the usual {}..={} ms range",
                    timing.discovery_timeout_ms,
                    DISCOVERY_TIMEOUT_RANGE_MS.start(),
                    DISCOVERY_TIMEOUT_RANGE_MS.end()
                ),
            ));
        }

        if timing.page_load_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "timing.page_load_timeout_ms",
                "page_load_timeout_ms must be greater than 0",
            ));
        }

        if timing.ready_state_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "timing.ready_state_timeout_ms",
                "ready_state_timeout_ms must be greater than 0",
            ));
        }

        if timing.submit_poll_attempts == 0 {
            result.add_warning(ValidationWarning::new(
                "timing.submit_poll_attempts",
                "submit_poll_attempts is 0, send buttons will never be looked up and Enter is always used",
            ));
        }
    }

    fn validate_providers(config: &Config, result: &mut ValidationResult) {
        for (id, provider) in &config.providers {
            if let Some(ref url) = provider.url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    result.add_error(ValidationError::new(
                        format!("providers.{}.url", id),
                        "url must start with http:// or https://",
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
