//! Configuration models for prefbench.
//!
//! Everything the comparison tool used to hardcode (checkpoint locations,
//! base models, scenarios) is a parameter here. With no config file the
//! built-in defaults reproduce the stock DPO vs GRPO comparison.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "prefbench.toml";

/// Endpoint name used by models that do not name one.
pub const DEFAULT_ENDPOINT: &str = "local";

/// Top-level configuration for prefbench.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenAI-compatible endpoints serving the models
    #[serde(default = "default_endpoints")]
    pub endpoints: HashMap<String, EndpointConfig>,

    /// Models by alias
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelSpec>,

    /// Comparison run settings
    #[serde(default)]
    pub comparison: ComparisonConfig,

    /// Predefined comparison scenarios, run in order
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<Scenario>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            models: default_models(),
            comparison: ComparisonConfig::default(),
            scenarios: default_scenarios(),
        }
    }
}

/// Configuration for an OpenAI-compatible endpoint.
///
/// Supports on-prem servers (vLLM, TGI, Ollama, llama.cpp) and hosted
/// aggregators alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL for the API (e.g., "http://localhost:8000/v1")
    pub base_url: String,

    /// API key (optional, can be omitted for local endpoints)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Custom headers to include in requests
    /// Values can contain ${ENV_VAR} for environment variable expansion
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Request timeout in seconds (default: 180)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum attempts per request (default: 1, no retry)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_env: None,
            headers: HashMap::new(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_timeout() -> u64 {
    180
}

fn default_max_retries() -> u32 {
    1
}

fn default_endpoints() -> HashMap<String, EndpointConfig> {
    HashMap::from([(DEFAULT_ENDPOINT.to_string(), EndpointConfig::default())])
}

/// Specification for a model served by an endpoint.
///
/// The id is whatever the endpoint serves the model under: a hub name
/// ("Qwen/Qwen2-0.5B-Instruct") or a checkpoint path registered with the
/// server ("output/learn_dpo/checkpoint-50").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Endpoint name, references [endpoints.<name>]
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model ID as served by the endpoint
    pub id: String,

    /// Human-readable label
    #[serde(default)]
    pub label: Option<String>,

    /// Short glyph printed before the label
    #[serde(default)]
    pub marker: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Default token budget when a scenario does not set one
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Command that produces this model, shown when it is not being served
    #[serde(default)]
    pub setup_hint: Option<String>,
}

impl ModelSpec {
    /// Create a spec with defaults for everything but the id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            endpoint: default_endpoint(),
            id: id.into(),
            label: None,
            marker: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            setup_hint: None,
        }
    }

    fn with_label(mut self, marker: &str, label: &str) -> Self {
        self.marker = Some(marker.to_string());
        self.label = Some(label.to_string());
        self
    }

    fn with_hint(mut self, hint: &str) -> Self {
        self.setup_hint = Some(hint.to_string());
        self
    }

    /// Label if set, else the model id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Heading line for this model's output block.
    pub fn heading(&self) -> String {
        match &self.marker {
            Some(marker) => format!("{marker} {}:", self.display_name()),
            None => format!("{}:", self.display_name()),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    128
}

fn default_models() -> BTreeMap<String, ModelSpec> {
    BTreeMap::from([
        (
            "dpo".to_string(),
            ModelSpec::new("output/learn_dpo/checkpoint-50")
                .with_label("🟢", "DPO Model (after preference training)")
                .with_hint("oumi train -c configs/examples/learn_dpo_laptop.yaml"),
        ),
        (
            "grpo".to_string(),
            ModelSpec::new("output/learn_grpo/checkpoint-30")
                .with_label("🟡", "GRPO Model (after reward-based training)")
                .with_hint("oumi train -c configs/examples/learn_grpo_laptop.yaml"),
        ),
        (
            "base_falcon".to_string(),
            ModelSpec::new("tiiuae/Falcon-H1-0.5B-Instruct")
                .with_label("🔵", "Base Model (Falcon 0.5B - before DPO)"),
        ),
        (
            "base_qwen".to_string(),
            ModelSpec::new("Qwen/Qwen2-0.5B-Instruct")
                .with_label("🟣", "Base Model (Qwen 0.5B - before GRPO)"),
        ),
    ])
}

/// Comparison run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Model aliases compared in every scenario, in print order
    #[serde(default = "default_contenders")]
    pub contenders: Vec<String>,

    /// Wait for Enter between scenarios
    #[serde(default = "default_true")]
    pub pause: bool,

    /// Token budget for interactive prompts
    #[serde(default = "default_max_tokens")]
    pub interactive_max_tokens: u32,

    /// Append every generation to this JSONL file
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            contenders: default_contenders(),
            pause: true,
            interactive_max_tokens: default_max_tokens(),
            report_path: None,
        }
    }
}

fn default_contenders() -> Vec<String> {
    vec!["dpo".to_string(), "grpo".to_string()]
}

fn default_true() -> bool {
    true
}

/// A predefined comparison scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Section title
    pub name: String,

    /// Prompt sent to every model
    pub prompt: String,

    /// Token budget for this scenario; each model's own budget when unset
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// What a good answer looks like (printed, not checked)
    #[serde(default)]
    pub expected: String,

    /// Answer expected inside \boxed{...} (checked when set)
    #[serde(default)]
    pub expected_answer: Option<String>,

    /// Untuned models shown alongside the contenders
    #[serde(default)]
    pub baselines: Vec<Baseline>,
}

/// A baseline model attached to a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    /// Model alias
    pub model: String,

    /// Contender alias this baseline is printed before (default: first contender)
    #[serde(default)]
    pub before: Option<String>,
}

fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "Conversation Quality (DPO's Strength)".to_string(),
            prompt: "Explain why the sky is blue in simple terms that a child could understand."
                .to_string(),
            max_tokens: Some(150),
            expected: "DPO model should give more structured, helpful response".to_string(),
            expected_answer: None,
            baselines: vec![Baseline {
                model: "base_falcon".to_string(),
                before: Some("dpo".to_string()),
            }],
        },
        Scenario {
            name: "Letter Counting (GRPO's Strength)".to_string(),
            prompt: "How many times does the letter 't' appear in the word 'constitution'? \
                     Format your answer as \\boxed{number}."
                .to_string(),
            max_tokens: Some(100),
            expected: "GRPO model should correctly answer \\boxed{3}".to_string(),
            expected_answer: Some("3".to_string()),
            baselines: vec![Baseline {
                model: "base_qwen".to_string(),
                before: Some("grpo".to_string()),
            }],
        },
        Scenario {
            name: "General Reasoning".to_string(),
            prompt: "If a train leaves New York at 3pm traveling at 60mph, and another train \
                     leaves Boston at 4pm traveling at 80mph, and they're 200 miles apart, \
                     when will they meet?"
                .to_string(),
            max_tokens: Some(200),
            expected: "Compare reasoning quality between both models".to_string(),
            expected_answer: None,
            baselines: Vec::new(),
        },
    ]
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Load an explicit config file, else `prefbench.toml` if present,
    /// else the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Look up a model by alias.
    pub fn model(&self, alias: &str) -> Result<&ModelSpec, ConfigError> {
        self.models
            .get(alias)
            .ok_or_else(|| ConfigError::UnknownModel(alias.to_string()))
    }

    /// Resolve API key for a specific endpoint.
    ///
    /// `Ok(None)` means the endpoint needs no key.
    pub fn resolve_endpoint_api_key(
        &self,
        endpoint_name: &str,
    ) -> Result<Option<String>, ConfigError> {
        let endpoint = self
            .endpoints
            .get(endpoint_name)
            .ok_or_else(|| ConfigError::EndpointNotFound(endpoint_name.to_string()))?;

        if let Some(key) = &endpoint.api_key {
            return Ok(Some(expand_env_vars(key)));
        }

        if let Some(env_var) = &endpoint.api_key_env {
            return match std::env::var(env_var) {
                Ok(key) => Ok(Some(key)),
                Err(_) => Err(ConfigError::MissingApiKey {
                    endpoint: endpoint_name.to_string(),
                    env_var: env_var.clone(),
                }),
            };
        }

        Ok(None)
    }

    /// Get all unique endpoint names referenced by models.
    pub fn referenced_endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self.models.values().map(|m| m.endpoint.clone()).collect();
        endpoints.sort();
        endpoints.dedup();
        endpoints
    }

    /// Check that every alias and endpoint reference resolves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.comparison.contenders.is_empty() {
            return Err(ConfigError::NoContenders);
        }

        for alias in &self.comparison.contenders {
            self.model(alias)?;
        }

        for scenario in &self.scenarios {
            for baseline in &scenario.baselines {
                self.model(&baseline.model)?;
                if let Some(before) = &baseline.before {
                    if !self.comparison.contenders.contains(before) {
                        return Err(ConfigError::Invalid(format!(
                            "scenario '{}': baseline '{}' is placed before '{}', which is not a contender",
                            scenario.name, baseline.model, before
                        )));
                    }
                }
            }
        }

        for endpoint in self.referenced_endpoints() {
            if !self.endpoints.contains_key(&endpoint) {
                return Err(ConfigError::EndpointNotFound(endpoint));
            }
        }

        Ok(())
    }
}

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(s) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Expand environment variables in all headers.
pub fn expand_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.clone(), expand_env_vars(v)))
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(
        "Missing API key for endpoint '{endpoint}': set {env_var} env var or api_key in config"
    )]
    MissingApiKey { endpoint: String, env_var: String },

    #[error("Endpoint not found: '{0}' (referenced by a model but not configured in [endpoints.*])")]
    EndpointNotFound(String),

    #[error("Unknown model alias: '{0}' (not configured in [models.*])")]
    UnknownModel(String),

    #[error("No contenders configured in [comparison]")]
    NoContenders,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.scenarios.len(), 3);
        assert_eq!(config.comparison.contenders, vec!["dpo", "grpo"]);
        assert_eq!(config.model("dpo").unwrap().id, "output/learn_dpo/checkpoint-50");
        assert_eq!(config.referenced_endpoints(), vec![DEFAULT_ENDPOINT]);
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.models.len(), 4);
        assert!(config.comparison.pause);
        assert_eq!(config.comparison.interactive_max_tokens, 128);
    }

    #[test]
    fn test_parse_custom_config() {
        let config: Config = toml::from_str(
            r#"
            [endpoints.ollama]
            base_url = "http://localhost:11434/v1"
            max_retries = 3

            [models.tuned]
            endpoint = "ollama"
            id = "tuned:latest"
            temperature = 0.2

            [models.base]
            endpoint = "ollama"
            id = "qwen2:0.5b"

            [comparison]
            contenders = ["tuned"]
            pause = false

            [[scenarios]]
            name = "Counting"
            prompt = "How many r's in strawberry?"
            expected_answer = "3"
            baselines = [{ model = "base" }]
            "#,
        )
        .unwrap();

        config.validate().unwrap();
        let tuned = config.model("tuned").unwrap();
        assert_eq!(tuned.max_tokens, 128);
        assert!((tuned.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(tuned.display_name(), "tuned:latest");
        assert_eq!(config.endpoints["ollama"].max_retries, 3);
        assert_eq!(config.endpoints["ollama"].timeout_secs, 180);
        assert_eq!(config.scenarios[0].max_tokens, None);
        assert!(config.scenarios[0].baselines[0].before.is_none());
    }

    #[test]
    fn test_validate_unknown_contender() {
        let mut config = Config::default();
        config.comparison.contenders.push("sft".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownModel(alias)) if alias == "sft"
        ));
    }

    #[test]
    fn test_validate_missing_endpoint() {
        let mut config = Config::default();
        config.endpoints.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EndpointNotFound(name)) if name == DEFAULT_ENDPOINT
        ));
    }

    #[test]
    fn test_validate_baseline_before_non_contender() {
        let mut config = Config::default();
        config.comparison.contenders = vec!["dpo".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_no_contenders() {
        let mut config = Config::default();
        config.comparison.contenders.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoContenders)));
    }

    #[test]
    fn test_resolve_api_key() {
        let mut config = Config::default();
        assert_eq!(config.resolve_endpoint_api_key(DEFAULT_ENDPOINT).unwrap(), None);

        let endpoint = config.endpoints.get_mut(DEFAULT_ENDPOINT).unwrap();
        endpoint.api_key_env = Some("PREFBENCH_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        assert!(matches!(
            config.resolve_endpoint_api_key(DEFAULT_ENDPOINT),
            Err(ConfigError::MissingApiKey { .. })
        ));

        let endpoint = config.endpoints.get_mut(DEFAULT_ENDPOINT).unwrap();
        endpoint.api_key = Some("sk-literal".to_string());
        assert_eq!(
            config.resolve_endpoint_api_key(DEFAULT_ENDPOINT).unwrap(),
            Some("sk-literal".to_string())
        );

        assert!(matches!(
            config.resolve_endpoint_api_key("nowhere"),
            Err(ConfigError::EndpointNotFound(_))
        ));
    }

    #[test]
    fn test_expand_env_vars_leaves_unset_placeholder() {
        let s = "Bearer ${PREFBENCH_TEST_KEY_THAT_IS_NEVER_SET}";
        assert_eq!(expand_env_vars(s), s);
        assert_eq!(expand_env_vars("no placeholders"), "no placeholders");
    }

    #[test]
    fn test_model_heading() {
        let config = Config::default();
        assert_eq!(
            config.model("grpo").unwrap().heading(),
            "🟡 GRPO Model (after reward-based training):"
        );
        assert_eq!(ModelSpec::new("plain").heading(), "plain:");
    }
}
