use crate::affect::{AffectClassifier, KeywordClassifier};
use crate::types::{AffectLabel, AudioClip, Language};
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

/// A hosted language model that can answer one user message.
///
/// Providers are interchangeable: the generator tries them in order and moves
/// on when one fails.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String>;
}

/// Text-to-speech backend.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;
}

/// Persona used when no prompt file is configured.
pub const DEFAULT_PERSONA: &str = "You are CZ Judge Companion, a supportive AI legal assistant that helps users \
navigate legal situations. Treat any situation the user describes as a legitimate case: outline its \
strengths and weaknesses, relevant precedents and practical next steps, and say when formal counsel \
is advisable. Redirect non-legal topics back to legal matters. Be professional, supportive and \
solution-oriented, and keep replies to 2-4 sentences.";

fn language_instruction(language: Language) -> &'static str {
    match language {
        Language::En => {
            "IMPORTANT: You MUST respond in English. All your responses must be in English, not Chinese."
        }
        Language::Zh => {
            "IMPORTANT: You MUST respond in Chinese (中文). All your responses must be in Chinese characters, not English."
        }
    }
}

/// Reply substituted when a provider answers with nothing.
pub fn busy_message(language: Language) -> &'static str {
    match language {
        Language::En => "Oops! My response circuits are a bit busy. Could you try again?",
        Language::Zh => "哎呀！我的响应线路有点忙。您能再试一次吗？",
    }
}

/// Reply when every configured provider failed.
pub fn apology_message(language: Language) -> &'static str {
    match language {
        Language::En => "Oops! There was a small error processing that. Could you try again?",
        Language::Zh => "哎呀！处理时出了点小错误。您能再试一次吗？",
    }
}

/// Reply embedded in a 500 when generation itself broke down.
pub fn unavailable_message(language: Language) -> &'static str {
    match language {
        Language::En => "Sorry, the AI service is temporarily unavailable. Please try again later.",
        Language::Zh => "抱歉，AI 服务暂时不可用。请稍后再试。",
    }
}

/// Reply when no provider is configured at all.
pub fn unconfigured_message(language: Language) -> &'static str {
    match language {
        Language::En => {
            "Hello! It looks like I don't have AI credentials configured. Please make sure OPENAI_API_KEY or ANTHROPIC_API_KEY is set."
        }
        Language::Zh => {
            "您好！看起来我没有配置AI凭证。请确保设置了OPENAI_API_KEY或ANTHROPIC_API_KEY。"
        }
    }
}

/// Everything the server needs to build the companion's message.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReply {
    pub message: String,
    pub affect: AffectLabel,
    pub audio: Option<AudioClip>,
    pub analytics: Option<serde_json::Value>,
}

impl GeneratedReply {
    fn fallback(message: &str) -> Self {
        Self {
            message: message.to_string(),
            affect: AffectLabel::Idle,
            audio: None,
            analytics: None,
        }
    }
}

/// Runs the provider fallback chain and decorates the winning reply with an
/// affect label and, when possible, synthesized speech.
pub struct ResponseGenerator {
    providers: Vec<Arc<dyn ChatProvider>>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    classifier: Arc<dyn AffectClassifier>,
    persona: String,
}

impl Default for ResponseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseGenerator {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            speech: None,
            classifier: Arc::new(KeywordClassifier::new()),
            persona: DEFAULT_PERSONA.to_string(),
        }
    }

    /// Appends a provider to the end of the chain.
    pub fn with_provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn AffectClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn system_prompt(&self, language: Language) -> String {
        format!("{}\n\n{}", self.persona.trim(), language_instruction(language))
    }

    /// Produces a reply for `user_text`. Never fails: provider errors are
    /// logged and replaced by a localized fallback message.
    pub async fn generate(&self, user_text: &str, language: Language) -> GeneratedReply {
        if self.providers.is_empty() {
            tracing::warn!("no chat provider configured");
            return GeneratedReply::fallback(unconfigured_message(language));
        }

        let system_prompt = self.system_prompt(language);
        for provider in &self.providers {
            match provider.complete(&system_prompt, user_text).await {
                Ok(text) => {
                    tracing::debug!("{} answered", provider.name());
                    let message = if text.trim().is_empty() {
                        busy_message(language).to_string()
                    } else {
                        text
                    };
                    return self.decorate(message).await;
                }
                Err(e) => {
                    tracing::warn!("{} failed, trying next provider: {:#}", provider.name(), e);
                }
            }
        }

        tracing::error!("all chat providers failed");
        GeneratedReply::fallback(apology_message(language))
    }

    async fn decorate(&self, message: String) -> GeneratedReply {
        let affect = self.classifier.classify(&message);
        let audio = match &self.speech {
            Some(speech) => match speech.synthesize(&message).await {
                Ok(clip) if !clip.is_empty() => Some(clip),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("speech synthesis failed, replying without audio: {:#}", e);
                    None
                }
            },
            None => None,
        };

        GeneratedReply {
            message,
            affect,
            audio,
            analytics: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &'static str, reply: Result<&'static str, &'static str>) -> MockChatProvider {
        let mut mock = MockChatProvider::new();
        mock.expect_name().return_const(name);
        mock.expect_complete()
            .times(1)
            .returning(move |_, _| match reply {
                Ok(text) => Ok(text.to_string()),
                Err(e) => Err(anyhow::anyhow!(e)),
            });
        mock
    }

    #[tokio::test]
    async fn primary_provider_answer_is_used() {
        let mut secondary = MockChatProvider::new();
        secondary.expect_name().return_const("secondary");
        secondary.expect_complete().never();

        let generator = ResponseGenerator::new()
            .with_provider(Arc::new(provider(
                "primary",
                Ok("Well done, that is an excellent defense."),
            )))
            .with_provider(Arc::new(secondary));

        let reply = generator.generate("I won my case", Language::En).await;
        assert_eq!(reply.message, "Well done, that is an excellent defense.");
        assert_eq!(reply.affect, AffectLabel::Approving);
        assert_eq!(reply.audio, None);
        assert_eq!(reply.analytics, None);
    }

    #[tokio::test]
    async fn failure_falls_through_to_the_next_provider() {
        let generator = ResponseGenerator::new()
            .with_provider(Arc::new(provider("primary", Err("rate limited"))))
            .with_provider(Arc::new(provider("secondary", Ok("Gather your receipts."))));

        let reply = generator.generate("help", Language::En).await;
        assert_eq!(reply.message, "Gather your receipts.");
    }

    #[tokio::test]
    async fn total_failure_is_a_localized_apology() {
        let generator = ResponseGenerator::new()
            .with_provider(Arc::new(provider("primary", Err("down"))))
            .with_provider(Arc::new(provider("secondary", Err("also down"))));

        let reply = generator.generate("help", Language::Zh).await;
        assert_eq!(reply.message, apology_message(Language::Zh));
        assert_eq!(reply.affect, AffectLabel::Idle);
        assert_eq!(reply.audio, None);
    }

    #[tokio::test]
    async fn no_providers_explains_missing_credentials() {
        let reply = ResponseGenerator::new().generate("help", Language::En).await;
        assert_eq!(reply.message, unconfigured_message(Language::En));
        assert_eq!(reply.affect, AffectLabel::Idle);
    }

    #[tokio::test]
    async fn empty_answer_becomes_the_busy_message() {
        let generator =
            ResponseGenerator::new().with_provider(Arc::new(provider("primary", Ok("   "))));

        let reply = generator.generate("help", Language::En).await;
        assert_eq!(reply.message, busy_message(Language::En));
    }

    #[tokio::test]
    async fn speech_is_attached_when_synthesis_succeeds() {
        let mut speech = MockSpeechSynthesizer::new();
        speech
            .expect_synthesize()
            .withf(|text| text == "Keep every document.")
            .times(1)
            .returning(|_| Ok(AudioClip::new("SUQz")));

        let generator = ResponseGenerator::new()
            .with_provider(Arc::new(provider("primary", Ok("Keep every document."))))
            .with_speech(Arc::new(speech));

        let reply = generator.generate("what now", Language::En).await;
        assert_eq!(reply.audio, Some(AudioClip::new("SUQz")));
    }

    #[tokio::test]
    async fn speech_failure_only_drops_the_audio() {
        let mut speech = MockSpeechSynthesizer::new();
        speech
            .expect_synthesize()
            .returning(|_| Err(anyhow::anyhow!("tts quota exceeded")));

        let generator = ResponseGenerator::new()
            .with_provider(Arc::new(provider("primary", Ok("Keep every document."))))
            .with_speech(Arc::new(speech));

        let reply = generator.generate("what now", Language::En).await;
        assert_eq!(reply.message, "Keep every document.");
        assert_eq!(reply.audio, None);
    }

    #[tokio::test]
    async fn fallback_replies_are_not_spoken() {
        let mut speech = MockSpeechSynthesizer::new();
        speech.expect_synthesize().never();

        let generator = ResponseGenerator::new()
            .with_provider(Arc::new(provider("primary", Err("down"))))
            .with_speech(Arc::new(speech));

        let reply = generator.generate("help", Language::En).await;
        assert_eq!(reply.audio, None);
    }

    #[tokio::test]
    async fn system_prompt_carries_the_language_instruction() {
        let mut mock = MockChatProvider::new();
        mock.expect_name().return_const("primary");
        mock.expect_complete()
            .withf(|system, user| system.contains("Chinese (中文)") && user == "你好")
            .times(1)
            .returning(|_, _| Ok("你好".to_string()));

        let generator = ResponseGenerator::new()
            .with_persona("You are a test persona.")
            .with_provider(Arc::new(mock));

        let reply = generator.generate("你好", Language::Zh).await;
        assert_eq!(reply.message, "你好");
        assert!(generator.system_prompt(Language::Zh).starts_with("You are a test persona."));
    }
}
