//! Record types flowing through prefbench.
//!
//! Dataset side: raw preference records and their conversation form.
//! Comparison side: one record per generation plus run statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }
}

/// A dataset field holding either plain text or a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrChat {
    Text(String),
    Chat(Vec<Message>),
}

impl From<&str> for TextOrChat {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Raw preference record as published by the dataset.
///
/// ```json
/// {"prompt": "How is the weather in Tokyo?",
///  "chosen": "It's sunny and warm.",
///  "rejected": "It's rainy and cold."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceExample {
    pub prompt: TextOrChat,
    pub chosen: TextOrChat,
    pub rejected: TextOrChat,
}

impl PreferenceExample {
    /// Build a plain-text record.
    pub fn text(prompt: &str, chosen: &str, rejected: &str) -> Self {
        Self {
            prompt: prompt.into(),
            chosen: chosen.into(),
            rejected: rejected.into(),
        }
    }
}

/// Preference pair in conversation form, ready for a DPO trainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencePair {
    /// Conversation leading up to the response
    pub prompt: Vec<Message>,
    /// Preferred response
    pub chosen: Vec<Message>,
    /// Dispreferred response
    pub rejected: Vec<Message>,
}

/// Why a model appeared in a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    /// One of the tuned models under comparison
    Contender,
    /// Untuned reference model
    Baseline,
}

/// One generation captured during a comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    /// Unique identifier for this record
    pub id: String,

    /// Identifier shared by all records of one run
    pub run_id: String,

    /// Scenario name, or "interactive"
    pub scenario: String,

    /// Model alias from the config
    pub model_alias: String,

    /// Model id sent to the endpoint
    pub model_id: String,

    pub role: ModelRole,

    pub prompt: String,

    /// Rendered response (an "Error: ..." string on failure)
    pub response: String,

    /// Underlying error message, if generation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Last \boxed{...} content found in the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boxed_answer: Option<String>,

    /// Whether the boxed answer matched the scenario's expected answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_matches: Option<bool>,

    /// Generation time in milliseconds
    pub duration_ms: u64,

    pub generated_at: DateTime<Utc>,
}

/// Statistics for a comparison run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Scenarios (or interactive prompts) processed
    pub total_prompts: usize,

    /// Generations attempted
    pub total_generations: usize,

    /// Generations that ended in an error
    pub total_failed: usize,

    /// Responses checked against an expected answer
    pub answers_checked: usize,

    /// Checked responses whose answer matched
    pub answers_correct: usize,

    /// Total runtime in seconds
    pub runtime_secs: f64,
}

impl RunStats {
    /// Fraction of generations that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.total_generations == 0 {
            return 0.0;
        }
        (self.total_generations - self.total_failed) as f64 / self.total_generations as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_or_chat_deserialize() {
        let text: TextOrChat = serde_json::from_str(r#""It's sunny.""#).unwrap();
        assert_eq!(text, TextOrChat::Text("It's sunny.".to_string()));

        let chat: TextOrChat =
            serde_json::from_str(r#"[{"role": "assistant", "content": "It's sunny."}]"#).unwrap();
        assert_eq!(chat, TextOrChat::Chat(vec![Message::assistant("It's sunny.")]));
    }

    #[test]
    fn test_preference_example_requires_all_fields() {
        let missing = serde_json::from_str::<PreferenceExample>(
            r#"{"prompt": "Hi", "chosen": "Hello!"}"#,
        );
        assert!(missing.is_err());

        let example: PreferenceExample = serde_json::from_str(
            r#"{"prompt": "Hi", "chosen": "Hello!", "rejected": "What.", "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(example, PreferenceExample::text("Hi", "Hello!", "What."));
    }

    #[test]
    fn test_success_rate() {
        let mut stats = RunStats::default();
        assert_eq!(stats.success_rate(), 0.0);
        stats.total_generations = 4;
        stats.total_failed = 1;
        assert!((stats.success_rate() - 0.75).abs() < f64::EPSILON);
    }
}
