use crate::config::types::{Config, CrawlerConfig, DelayRangeConfig, OutputConfig, RequestConfig};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_request_config(&config.request)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl loop configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.start_page < 1 {
        return Err(ConfigError::Validation(
            "start_page must be >= 1, got 0".to_string(),
        ));
    }

    if config.page_limit == Some(0) {
        return Err(ConfigError::Validation(
            "page_limit must be >= 1 when set, got 0".to_string(),
        ));
    }

    if config.max_retries_per_page < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries_per_page must be >= 1, got {}",
            config.max_retries_per_page
        )));
    }

    if config.fallback_total_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "fallback_total_pages must be >= 1, got {}",
            config.fallback_total_pages
        )));
    }

    validate_delay_range("retry_backoff", &config.retry_backoff)?;
    validate_delay_range("inter_page_delay", &config.inter_page_delay)?;

    Ok(())
}

/// Validates a randomized delay window
fn validate_delay_range(name: &str, range: &DelayRangeConfig) -> Result<(), ConfigError> {
    for value in [range.min_secs, range.max_secs] {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Validation(format!(
                "{} bounds must be finite and >= 0, got {}",
                name, value
            )));
        }
    }

    if range.min_secs > range.max_secs {
        return Err(ConfigError::Validation(format!(
            "{} min-secs ({}) must not exceed max-secs ({})",
            name, range.min_secs, range.max_secs
        )));
    }

    Ok(())
}

/// Validates the request profile
fn validate_request_config(config: &RequestConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.list_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid list_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "list_url must use HTTP or HTTPS, got '{}'",
            url.scheme()
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1, got 0".to_string(),
        ));
    }

    HeaderValue::from_str(&config.user_agent)
        .map_err(|_| ConfigError::InvalidHeader("user_agent is not a valid header value".to_string()))?;

    HeaderValue::from_str(&config.cookie)
        .map_err(|_| ConfigError::InvalidHeader("cookie is not a valid header value".to_string()))?;

    for (name, value) in &config.headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(format!("'{}' is not a valid header name", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::InvalidHeader(format!("value for '{}' is not a valid header value", name))
        })?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.csv_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "csv_path cannot be empty".to_string(),
        ));
    }

    if let Some(path) = &config.skipped_pages_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "skipped_pages_path cannot be empty when set".to_string(),
            ));
        }

        if path == &config.csv_path {
            return Err(ConfigError::Validation(
                "skipped_pages_path must differ from csv_path".to_string(),
            ));
        }
    }

    Ok(())
}
