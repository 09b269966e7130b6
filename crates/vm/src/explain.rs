//! Explanations for decisions and verification results.
//!
//! Any [`ExplanationProvider`] may back the service. When the primary
//! provider is missing, unavailable or fails, the deterministic
//! [`TemplateResponder`] answers with the same contract.

use crate::error::ProviderError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.0,
        }
    }
}

pub trait ExplanationProvider: Send {
    fn name(&self) -> &str;

    fn generate_text(&self, prompt: &str, options: &GenerationOptions)
        -> Result<String, ProviderError>;

    fn generate_json_value(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<serde_json::Value, ProviderError>;

    fn is_available(&self) -> bool;
}

/// Typed JSON generation over any provider.
pub fn generate_json<T: DeserializeOwned>(
    provider: &dyn ExplanationProvider,
    prompt: &str,
    options: &GenerationOptions,
) -> Result<T, ProviderError> {
    let value = provider.generate_json_value(prompt, options)?;
    serde_json::from_value(value).map_err(|e| ProviderError::Malformed(e.to_string()))
}

/// Deterministic fallback responder.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResponder;

impl ExplanationProvider for TemplateResponder {
    fn name(&self) -> &str {
        "template"
    }

    fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let text: String = format!("explanation: {prompt}")
            .chars()
            .take(options.max_tokens.saturating_mul(4))
            .collect();
        Ok(text)
    }

    fn generate_json_value(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<serde_json::Value, ProviderError> {
        Ok(json!({
            "summary": self.generate_text(prompt, options)?,
            "confidence": 0.85,
            "factors": [],
        }))
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Structured explanation returned by [`ExplanationService::explain_decision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub confidence: f64,
    #[serde(default)]
    pub factors: Vec<String>,
}

#[derive(Default)]
pub struct ExplanationService {
    primary: Option<Box<dyn ExplanationProvider>>,
    fallback: TemplateResponder,
    options: GenerationOptions,
}

impl ExplanationService {
    pub fn new(primary: Box<dyn ExplanationProvider>) -> Self {
        Self {
            primary: Some(primary),
            ..Self::default()
        }
    }

    /// The provider that would answer right now.
    pub fn provider(&self) -> &dyn ExplanationProvider {
        match &self.primary {
            Some(p) if p.is_available() => p.as_ref(),
            _ => &self.fallback,
        }
    }

    pub fn explain_decision(&self, entity: &str, action: &str) -> Explanation {
        let prompt = format!("why '{entity}' decided '{action}'");
        match generate_json(self.provider(), &prompt, &self.options) {
            Ok(explanation) => explanation,
            Err(e) => {
                debug!(error = %e, "explanation provider failed, using template");
                self.template_explanation(&prompt)
            }
        }
    }

    pub fn summarize_verification(&self, entity: &str, passed: bool, reasons: &[String]) -> String {
        let prompt = if passed {
            format!("verification of '{entity}' passed")
        } else {
            format!("verification of '{entity}' failed: {}", reasons.join("; "))
        };
        self.provider()
            .generate_text(&prompt, &self.options)
            .or_else(|_| self.fallback.generate_text(&prompt, &self.options))
            .unwrap_or(prompt)
    }

    fn template_explanation(&self, prompt: &str) -> Explanation {
        generate_json(&self.fallback, prompt, &self.options).unwrap_or_else(|_| Explanation {
            summary: prompt.to_string(),
            confidence: 0.0,
            factors: Vec::new(),
        })
    }
}

impl std::fmt::Debug for ExplanationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplanationService")
            .field("primary", &self.primary.as_ref().map(|p| p.name().to_string()))
            .field("options", &self.options)
            .finish()
    }
}
