//! Preference dataset adapters.
//!
//! An adapter maps one published dataset's records onto [`PreferencePair`].
//! The shared mapping lives in the trait's default
//! [`PreferenceDataset::transform_preference`]; adapters whose records
//! already use the `prompt`/`chosen`/`rejected` keys keep it as is.

use crate::models::{Message, PreferenceExample, PreferencePair, PrefbenchError, Result, TextOrChat};

/// A named preference dataset.
pub trait PreferenceDataset: Send + Sync {
    /// Registry name of this adapter.
    fn name(&self) -> &str;

    /// Dataset id on the hub this adapter reads by default.
    fn default_dataset(&self) -> &str;

    /// Transform a raw record into conversation form.
    fn transform_preference(&self, example: &PreferenceExample) -> Result<PreferencePair> {
        default_transform(example)
    }
}

/// Conversation-form mapping shared by all adapters.
///
/// - prompt text becomes a single user turn; a prompt transcript is kept
/// - chosen/rejected text becomes a single assistant turn; a transcript is
///   reduced to its last assistant turn
pub fn default_transform(example: &PreferenceExample) -> Result<PreferencePair> {
    let prompt = match &example.prompt {
        TextOrChat::Text(text) => vec![Message::user(text.as_str())],
        TextOrChat::Chat(messages) if messages.is_empty() => {
            return Err(PrefbenchError::Dataset(
                "prompt transcript is empty".to_string(),
            ));
        }
        TextOrChat::Chat(messages) => messages.clone(),
    };

    Ok(PreferencePair {
        prompt,
        chosen: vec![Message::assistant(response_text(&example.chosen, "chosen")?)],
        rejected: vec![Message::assistant(response_text(
            &example.rejected,
            "rejected",
        )?)],
    })
}

fn response_text<'a>(field: &'a TextOrChat, key: &str) -> Result<&'a str> {
    match field {
        TextOrChat::Text(text) => Ok(text.as_str()),
        TextOrChat::Chat(messages) => messages
            .iter()
            .rev()
            .find(|m| m.is_assistant())
            .map(|m| m.content.as_str())
            .ok_or_else(|| {
                PrefbenchError::Dataset(format!("'{key}' transcript has no assistant turn"))
            }),
    }
}

/// Human-Like DPO Dataset for preference tuning.
///
/// Human preference pairs for training conversational models, published at
/// <https://huggingface.co/datasets/HumanLLMs/Human-Like-DPO-Dataset>.
/// Records already carry `prompt`, `chosen` and `rejected`, so the default
/// transformation applies unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct HumanLikeDpoDataset;

impl HumanLikeDpoDataset {
    pub const NAME: &'static str = "HumanLLMs/Human-Like-DPO-Dataset";
}

impl PreferenceDataset for HumanLikeDpoDataset {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_dataset(&self) -> &str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(turns: &[(&str, &str)]) -> TextOrChat {
        TextOrChat::Chat(
            turns
                .iter()
                .map(|(role, content)| Message {
                    role: role.to_string(),
                    content: content.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_text_record() {
        let example = PreferenceExample::text(
            "How is the weather in Tokyo?",
            "It's sunny and warm.",
            "It's rainy and cold.",
        );

        let pair = default_transform(&example).unwrap();
        assert_eq!(pair.prompt, vec![Message::user("How is the weather in Tokyo?")]);
        assert_eq!(pair.chosen, vec![Message::assistant("It's sunny and warm.")]);
        assert_eq!(pair.rejected, vec![Message::assistant("It's rainy and cold.")]);
    }

    #[test]
    fn test_chat_record_uses_last_assistant_turn() {
        let example = PreferenceExample {
            prompt: chat(&[("system", "Be brief."), ("user", "Hi")]),
            chosen: chat(&[("user", "Hi"), ("assistant", "Hello!"), ("assistant", "How can I help?")]),
            rejected: chat(&[("assistant", "What.")]),
        };

        let pair = default_transform(&example).unwrap();
        assert_eq!(pair.prompt.len(), 2);
        assert_eq!(pair.prompt[0], Message::system("Be brief."));
        assert_eq!(pair.chosen, vec![Message::assistant("How can I help?")]);
        assert_eq!(pair.rejected, vec![Message::assistant("What.")]);
    }

    #[test]
    fn test_transcript_without_assistant_turn() {
        let example = PreferenceExample {
            prompt: "Hi".into(),
            chosen: "Hello!".into(),
            rejected: chat(&[("user", "Hi")]),
        };

        let err = default_transform(&example).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dataset error: 'rejected' transcript has no assistant turn"
        );
    }

    #[test]
    fn test_empty_prompt_transcript() {
        let example = PreferenceExample {
            prompt: TextOrChat::Chat(Vec::new()),
            chosen: "a".into(),
            rejected: "b".into(),
        };
        assert!(default_transform(&example).is_err());
    }

    #[test]
    fn test_human_like_matches_default_transform() {
        let dataset = HumanLikeDpoDataset;
        let examples = [
            PreferenceExample::text("Do you like pizza?", "Oh, I love it! 🍕", "I am an AI."),
            PreferenceExample::text("", "", ""),
            PreferenceExample {
                prompt: chat(&[("user", "Tell me a joke")]),
                chosen: chat(&[("assistant", "Why did the chicken...")]),
                rejected: "No.".into(),
            },
        ];

        for example in &examples {
            assert_eq!(
                dataset.transform_preference(example).unwrap(),
                default_transform(example).unwrap()
            );
        }
        assert_eq!(dataset.name(), dataset.default_dataset());
    }
}
