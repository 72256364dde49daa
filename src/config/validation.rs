use crate::config::types::{Config, CrawlerConfig, FetchConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_fetch_config(&config.fetch)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.politeness_delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "politeness_delay_ms must be <= 60000ms, got {}ms",
            config.politeness_delay_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the fetch chain configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.proxy_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "proxy_attempts must be <= 10, got {}",
            config.proxy_attempts
        )));
    }

    for template in &config.proxy_templates {
        // Substitute a sample target so the template itself can be parsed
        let sample = if template.contains("{url}") {
            template.replace("{url}", "https%3A%2F%2Fexample.com%2F")
        } else {
            format!("{}https%3A%2F%2Fexample.com%2F", template)
        };
        validate_http_url(&sample, "proxy template", template)?;
    }

    if let Some(endpoint) = &config.server_endpoint {
        validate_http_url(endpoint, "server_endpoint", endpoint)?;
    }

    if let Some(endpoint) = &config.render_endpoint {
        validate_http_url(endpoint, "render_endpoint", endpoint)?;
    }

    if config.settle_delay_min_ms > config.settle_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "settle_delay_min_ms ({}) must not exceed settle_delay_max_ms ({})",
            config.settle_delay_min_ms, config.settle_delay_max_ms
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(candidate: &str, field: &str, shown: &str) -> Result<(), ConfigError> {
    let url = Url::parse(candidate)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, shown, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, shown
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
