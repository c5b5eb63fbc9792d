//! Text generation behind a trait, so comparisons can run against any backend.

use crate::client::EndpointRegistry;
use crate::models::{ConfigError, Message, ModelSpec, PrefbenchError, Result};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// Produces a completion for a single user prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, model: &ModelSpec, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Generator backed by the configured OpenAI-compatible endpoints.
pub struct EndpointGenerator {
    registry: EndpointRegistry,
}

impl EndpointGenerator {
    pub fn new(registry: EndpointRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Generator for EndpointGenerator {
    async fn generate(&self, model: &ModelSpec, prompt: &str, max_tokens: u32) -> Result<String> {
        let client = self
            .registry
            .get(&model.endpoint)
            .ok_or_else(|| ConfigError::EndpointNotFound(model.endpoint.clone()))?;

        let response = client
            .complete(model, &[Message::user(prompt)], Some(max_tokens))
            .await?;

        debug!(
            endpoint = %model.endpoint,
            model = %response.model,
            tokens_out = response.output_tokens,
            duration_ms = response.duration.as_millis() as u64,
            "Generated response"
        );

        Ok(response.content)
    }
}

/// What came back from one generation attempt.
#[derive(Debug)]
pub enum Outcome {
    /// Non-empty completion text
    Response(String),
    /// The model answered with nothing
    Empty,
    /// The request failed
    Failed(PrefbenchError),
}

impl Outcome {
    /// User-facing text: the response, or an "Error: ..." line.
    pub fn render(&self) -> String {
        match self {
            Outcome::Response(text) => text.clone(),
            Outcome::Empty => "Error: No response generated".to_string(),
            Outcome::Failed(e) => format!("Error: {e}"),
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Outcome::Response(_))
    }

    /// Response text, if there is one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Outcome::Response(text) => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PrefbenchError> {
        match self {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// A timed generation.
#[derive(Debug)]
pub struct Generation {
    pub outcome: Outcome,
    pub duration: Duration,
}

/// Generate a response, turning every failure into an [`Outcome`] instead
/// of an error.
pub async fn generate_or_error(
    generator: &dyn Generator,
    model: &ModelSpec,
    prompt: &str,
    max_tokens: u32,
) -> Generation {
    let start = Instant::now();

    let outcome = match generator.generate(model, prompt, max_tokens).await {
        Ok(text) if text.trim().is_empty() => Outcome::Empty,
        Ok(text) => Outcome::Response(text),
        Err(e) => {
            debug!(model = %model.id, error = %e, "Generation failed");
            Outcome::Failed(e)
        }
    };

    Generation {
        outcome,
        duration: start.elapsed(),
    }
}
