use super::{AppConfig, ConfigError};

/// Largest candidate count a single fan-out may request.
pub const MAX_CANDIDATES: usize = 16;

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_client_config(config)?;
    validate_upstream_config(config)?;
    validate_generation_defaults(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_client_config(config: &AppConfig) -> Result<(), ConfigError> {
    let client = &config.client;
    if client.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "client.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if client.timeout == 0 {
        return Err(validation_err("client.timeout must be greater than 0"));
    }
    if client.connect_timeout == 0 {
        return Err(validation_err(
            "client.connect_timeout must be greater than 0",
        ));
    }
    validate_http_url("client.proxy", client.proxy.as_deref())
}

fn validate_upstream_config(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    validate_http_url("upstream.base_url", Some(&upstream.base_url))?;
    if let Some(key) = upstream.api_key.as_deref() {
        if key.trim().is_empty() {
            return Err(validation_err("upstream.api_key cannot be empty when set"));
        }
    }
    if upstream.title.trim().is_empty() {
        return Err(validation_err("upstream.title cannot be empty"));
    }
    if http::HeaderValue::from_str(&upstream.referer).is_err() {
        return Err(validation_err(
            "upstream.referer must be a valid header value",
        ));
    }
    if http::HeaderValue::from_str(&upstream.title).is_err() {
        return Err(validation_err("upstream.title must be a valid header value"));
    }
    Ok(())
}

fn validate_generation_defaults(config: &AppConfig) -> Result<(), ConfigError> {
    let defaults = &config.defaults;
    if defaults.model.trim().is_empty() {
        return Err(validation_err("defaults.model cannot be empty"));
    }
    if defaults.n == 0 || defaults.n > MAX_CANDIDATES {
        return Err(validation_err(format!(
            "defaults.n must be between 1 and {MAX_CANDIDATES}"
        )));
    }
    if !(0.0..=2.0).contains(&defaults.temperature) {
        return Err(validation_err(
            "defaults.temperature must be between 0.0 and 2.0",
        ));
    }
    Ok(())
}

fn validate_http_url(field_name: &str, value: Option<&str>) -> Result<(), ConfigError> {
    let Some(value) = value.map(str::trim) else {
        return Ok(());
    };
    if value.is_empty() {
        return Err(validation_err(format!(
            "{field_name} cannot be empty when set"
        )));
    }
    let parsed = url::Url::parse(value)
        .map_err(|err| validation_err(format!("{field_name} is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "{field_name} must use http:// or https://"
        )));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = [
        "TRACE", "DEBUG", "INFO", "WARN", "WARNING", "ERROR", "CRITICAL", "DISABLED",
    ];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.upstream.api_key = Some("sk-or-test".to_string());
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&make_valid_config()).is_ok());
    }

    #[test]
    fn test_missing_api_key_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_api_key() {
        let mut config = make_valid_config();
        config.upstream.api_key = Some("  ".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = make_valid_config();
        config.upstream.base_url = "not-a-url".to_string();
        assert!(validate_config(&config).is_err());

        config.upstream.base_url = "ftp://openrouter.ai/api/v1".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_proxy() {
        let mut config = make_valid_config();
        config.client.proxy = Some(String::new());
        assert!(validate_config(&config).is_err());

        config.client.proxy = Some("http://127.0.0.1:8080".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_candidate_count() {
        let mut config = make_valid_config();
        config.defaults.n = 0;
        assert!(validate_config(&config).is_err());
        config.defaults.n = MAX_CANDIDATES + 1;
        assert!(validate_config(&config).is_err());
        config.defaults.n = MAX_CANDIDATES;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_temperature() {
        let mut config = make_valid_config();
        config.defaults.temperature = 2.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = make_valid_config();
        config.features.log_level = "VERBOSE".to_string();
        assert!(validate_config(&config).is_err());
        config.features.log_level = "warning".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_pool_max_idle_per_host() {
        let mut config = make_valid_config();
        config.client.http_pool_max_idle_per_host = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_title_header() {
        let mut config = make_valid_config();
        config.upstream.title = "bad\ntitle".to_string();
        assert!(validate_config(&config).is_err());
    }
}
