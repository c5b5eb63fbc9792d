//! Endpoint registry for managing multiple LLM endpoints.

use crate::client::{HealthCheckResult, HealthStatus, LLMClient};
use crate::models::{Config, Result, expand_headers};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Registry of configured LLM endpoints.
///
/// Provides access to `LLMClient` instances by endpoint name. All clients are
/// wrapped in `Arc` for shared access.
///
/// # Example
///
/// ```ignore
/// use prefbench::{Config, EndpointRegistry};
///
/// let config = Config::load(None)?;
/// let registry = EndpointRegistry::from_config(&config)?;
///
/// if let Some(local) = registry.get("local") {
///     // Use local client
/// }
///
/// let results = registry.health_check_all().await;
/// ```
pub struct EndpointRegistry {
    endpoints: HashMap<String, Arc<LLMClient>>,
}

impl EndpointRegistry {
    /// Build registry from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingApiKey` if an endpoint requires an API key
    /// but none is configured or found in environment variables, or a network
    /// error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut endpoints = HashMap::new();

        for (name, endpoint_config) in &config.endpoints {
            let api_key = config.resolve_endpoint_api_key(name)?;
            let headers = expand_headers(&endpoint_config.headers);

            let client = LLMClient::new(
                name.clone(),
                api_key,
                endpoint_config.base_url.clone(),
                headers,
                endpoint_config.timeout_secs,
                endpoint_config.max_retries,
            )?;

            endpoints.insert(name.clone(), Arc::new(client));
        }

        Ok(Self { endpoints })
    }

    /// Get client by endpoint name.
    ///
    /// Returns None if endpoint is not configured.
    pub fn get(&self, name: &str) -> Option<&Arc<LLMClient>> {
        self.endpoints.get(name)
    }

    /// Get all endpoint names, sorted.
    pub fn endpoint_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of configured endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Run health checks on all endpoints, in name order.
    pub async fn health_check_all(&self) -> Vec<HealthCheckResult> {
        let mut results = Vec::with_capacity(self.endpoints.len());

        for name in self.endpoint_names() {
            let result = self.endpoints[name].health_check().await;

            match result.status {
                HealthStatus::Healthy => {
                    info!(
                        endpoint = %name,
                        latency_ms = result.latency_ms.unwrap_or_default(),
                        "Endpoint healthy"
                    );
                }
                HealthStatus::Unhealthy => {
                    warn!(
                        endpoint = %name,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "Endpoint unhealthy"
                    );
                }
                HealthStatus::Unreachable => {
                    warn!(
                        endpoint = %name,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "Endpoint unreachable"
                    );
                }
            }

            results.push(result);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_ENDPOINT, EndpointConfig};

    #[test]
    fn test_from_default_config() {
        let config = Config::default();
        let registry = EndpointRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.endpoint_names(), vec![DEFAULT_ENDPOINT]);
        assert_eq!(
            registry.get(DEFAULT_ENDPOINT).unwrap().base_url(),
            "http://localhost:8000/v1"
        );
    }

    #[test]
    fn test_custom_endpoint_replaces_default() {
        let mut config = Config::default();
        config.endpoints.clear();
        config.endpoints.insert(
            "remote".to_string(),
            EndpointConfig {
                base_url: "https://example.invalid/v1/".to_string(),
                ..Default::default()
            },
        );

        let registry = EndpointRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.get("remote").unwrap().base_url(),
            "https://example.invalid/v1"
        );
        assert!(registry.get(DEFAULT_ENDPOINT).is_none());
    }
}
