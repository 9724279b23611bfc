use async_trait::async_trait;
use thiserror::Error;

use crate::core::roster::PersonRecord;

/// Relationship used when the sheet leaves `parentesco` blank.
pub const DEFAULT_RELATIONSHIP: &str = "an acquaintance";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Text generation request failed: {0}")]
    Request(String),

    #[error("Text generation API error: {0}")]
    Api(String),

    #[error("Text generation returned no usable text")]
    Empty,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Sends a single prompt and returns the generated text.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Greeting used whenever generation fails.
pub fn fallback_greeting(name: &str) -> String {
    format!("Happy birthday, {}! 🎉", name)
}

/// Builds the instruction sent to the model for one person.
pub fn build_prompt(person: &PersonRecord) -> String {
    let name = person.name().unwrap_or_default();

    let gender = person
        .gender()
        .map(|g| format!(" (gender: {})", g))
        .unwrap_or_default();

    // Only positive ages are mentioned.
    let age = person
        .age()
        .filter(|age| *age > 0)
        .map(|age| format!(" who is turning {} years old", age))
        .unwrap_or_default();

    let relationship = person.relationship().unwrap_or(DEFAULT_RELATIONSHIP);

    format!(
        "Write a short, warm birthday message for {name}{gender}{age}. \
         {name} is my: {relationship}. \
         Do not include a signature or the sender's name."
    )
}

/// Produces birthday greetings. Never fails: errors become the fallback text.
pub struct GreetingService<G: TextGenerator> {
    generator: G,
}

impl<G: TextGenerator> GreetingService<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub async fn greeting_for(&self, person: &PersonRecord) -> String {
        let name = person.name().unwrap_or_default();
        let prompt = build_prompt(person);

        tracing::debug!("Greeting prompt: {}", prompt);

        let result = self
            .generator
            .generate(&prompt)
            .await
            .map(|text| text.trim().to_string())
            .and_then(|text| {
                if text.is_empty() {
                    Err(GenerationError::Empty)
                } else {
                    Ok(text)
                }
            });

        match result {
            Ok(text) => {
                tracing::debug!("Greeting generated: {}", text);
                text
            }
            Err(e) => {
                tracing::warn!("Greeting generation failed for {}, using fallback: {}", name, e);
                fallback_greeting(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every prompt and answers with a fixed result.
    struct StubGenerator {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl StubGenerator {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(GenerationError::Api)
        }
    }

    fn ana() -> PersonRecord {
        PersonRecord::from_pairs([("nombre", "Ana"), ("parentesco", "hermana")]).with_age(30)
    }

    #[tokio::test]
    async fn test_prompt_mentions_name_age_relationship() {
        let service = GreetingService::new(StubGenerator::replying("¡Feliz cumpleaños!"));

        service.greeting_for(&ana()).await;

        let prompts = service.generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.contains("Ana"));
        assert!(prompt.contains("30"));
        assert!(prompt.contains("hermana"));
        assert!(prompt.contains("Do not include a signature"));
    }

    #[test]
    fn test_prompt_defaults_and_optional_phrases() {
        let prompt = build_prompt(&PersonRecord::from_pairs([("nombre", "Luis")]));

        assert!(prompt.contains(DEFAULT_RELATIONSHIP));
        assert!(!prompt.contains("turning"));
        assert!(!prompt.contains("gender"));

        let prompt = build_prompt(&PersonRecord::from_pairs([
            ("nombre", "Eva"),
            ("genero", "femenino"),
        ]));
        assert!(prompt.contains("(gender: femenino)"));
    }

    #[test]
    fn test_prompt_omits_non_positive_age() {
        let prompt = build_prompt(&PersonRecord::from_pairs([("nombre", "Bebé")]).with_age(0));
        assert!(!prompt.contains("turning"));
    }

    #[tokio::test]
    async fn test_generated_text_is_trimmed() {
        let service = GreetingService::new(StubGenerator::replying("  Happy day, Ana!  \n"));

        assert_eq!(service.greeting_for(&ana()).await, "Happy day, Ana!");
    }

    #[tokio::test]
    async fn test_generation_error_uses_fallback() {
        let service = GreetingService::new(StubGenerator::failing("quota exceeded"));

        assert_eq!(service.greeting_for(&ana()).await, "Happy birthday, Ana! 🎉");
    }

    #[tokio::test]
    async fn test_blank_generation_uses_fallback() {
        let service = GreetingService::new(StubGenerator::replying("   "));

        assert_eq!(service.greeting_for(&ana()).await, "Happy birthday, Ana! 🎉");
    }
}
