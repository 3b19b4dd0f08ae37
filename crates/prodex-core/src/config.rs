use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::llm::LlmParams;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the
/// process, without touching `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup.
///
/// The parsing logic is decoupled from the real environment so tests can
/// drive it with a plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<f64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_bool = |var: &str, default: &str| -> bool {
        or_default(var, default).eq_ignore_ascii_case("true")
    };

    let rate_limit = parse_u32("PRODEX_RATE_LIMIT", "10")?;
    if rate_limit == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PRODEX_RATE_LIMIT".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(AppConfig {
        rate_limit,
        user_agent: or_default("PRODEX_USER_AGENT", "prodex/0.1 (product-extraction)"),
        request_timeout_ms: parse_u64("PRODEX_REQUEST_TIMEOUT_MS", "60000")?,
        js_rendering: parse_bool("PRODEX_JS_RENDERING", "false"),
        headless: parse_bool("PRODEX_HEADLESS", "true"),
        max_retries: parse_u32("PRODEX_MAX_RETRIES", "3")?,
        retry_base_delay_secs: parse_f64("PRODEX_RETRY_BASE_DELAY_SECS", "2.0")?,
        storage_dir: PathBuf::from(or_default("PRODEX_STORAGE_DIR", "./data/products")),
        schema_cache_dir: PathBuf::from(or_default("PRODEX_SCHEMA_CACHE_DIR", "./cache/schemas")),
        log_level: or_default("PRODEX_LOG_LEVEL", "info"),
        llm_provider: or_default("PRODEX_LLM_PROVIDER", "openai"),
        llm: LlmParams {
            model: or_default("PRODEX_LLM_MODEL", "gpt-4"),
            temperature: parse_f64("PRODEX_LLM_TEMPERATURE", "0.0")?,
            max_tokens: parse_u32("PRODEX_LLM_MAX_TOKENS", "2000")?,
        },
        llm_api_key: lookup("PRODEX_LLM_API_KEY").ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        build_app_config(|key| map.get(key).cloned().ok_or(std::env::VarError::NotPresent))
    }

    #[test]
    fn defaults_apply_with_empty_environment() {
        let config = config_from(&[]).expect("defaults should be valid");
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.request_timeout_ms, 60_000);
        assert!(!config.js_rendering);
        assert!(config.headless);
        assert_eq!(config.llm.model, "gpt-4");
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn overrides_are_picked_up() {
        let config = config_from(&[
            ("PRODEX_RATE_LIMIT", "30"),
            ("PRODEX_JS_RENDERING", "true"),
            ("PRODEX_LLM_MODEL", "claude-3-opus"),
            ("PRODEX_LLM_API_KEY", "sk-test"),
        ])
        .expect("valid overrides");
        assert_eq!(config.rate_limit, 30);
        assert!(config.js_rendering);
        assert_eq!(config.llm.model, "claude-3-opus");
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let err = config_from(&[("PRODEX_RATE_LIMIT", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "PRODEX_RATE_LIMIT"));
    }

    #[test]
    fn invalid_number_is_rejected_with_var_name() {
        let err = config_from(&[("PRODEX_MAX_RETRIES", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "PRODEX_MAX_RETRIES"));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = config_from(&[("PRODEX_LLM_API_KEY", "sk-secret")]).expect("valid");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[redacted]"));
    }
}
