//! Model resolution: request override, then environment, then defaults.

use crate::core::ModelSource;
use crate::error::SelectorError;

/// A resolved provider/model pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    /// Provider name.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Where the choice came from.
    pub source: ModelSource,
}

/// Resolves the effective provider/model for a run.
#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    /// Provider supplied by the deployment environment.
    pub env_provider: Option<String>,
    /// Model supplied by the deployment environment.
    pub env_model: Option<String>,
    default_provider: Option<String>,
    default_model: Option<String>,
}

impl ModelSelector {
    /// Creates a selector with no environment values and no defaults.
    #[must_use]
    pub fn new(env_provider: Option<String>, env_model: Option<String>) -> Self {
        Self {
            env_provider,
            env_model,
            default_provider: None,
            default_model: None,
        }
    }

    /// Sets the built-in fallback pair.
    #[must_use]
    pub fn with_default(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.default_provider = Some(provider.into());
        self.default_model = Some(model.into());
        self
    }

    /// Resolves a request's provider/model overrides into a concrete
    /// choice. A request-supplied model wins, then the environment pair,
    /// then the default pair.
    ///
    /// # Errors
    ///
    /// Returns an error when no model, or no provider for the chosen
    /// model, is configured anywhere.
    pub fn resolve(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<ModelChoice, SelectorError> {
        let (model, source) = if let Some(model) = model {
            (model.to_string(), ModelSource::Request)
        } else if let Some(model) = &self.env_model {
            (model.clone(), ModelSource::Env)
        } else if let Some(model) = &self.default_model {
            (model.clone(), ModelSource::Default)
        } else {
            return Err(SelectorError::NoModelConfigured);
        };

        let provider = provider
            .map(str::to_string)
            .or_else(|| self.env_provider.clone())
            .or_else(|| self.default_provider.clone())
            .ok_or_else(|| SelectorError::NoProviderConfigured {
                model: model.clone(),
            })?;

        Ok(ModelChoice {
            provider,
            model,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_override_wins() {
        let selector = ModelSelector::new(
            Some("anthropic".to_string()),
            Some("env-model".to_string()),
        );
        let choice = selector
            .resolve(Some("openai"), Some("requested-model"))
            .unwrap();
        assert_eq!(choice.provider, "openai");
        assert_eq!(choice.model, "requested-model");
        assert_eq!(choice.source, ModelSource::Request);
    }

    #[test]
    fn env_pair_backs_the_request() {
        let selector = ModelSelector::new(
            Some("anthropic".to_string()),
            Some("env-model".to_string()),
        );
        let choice = selector.resolve(None, None).unwrap();
        assert_eq!(choice.provider, "anthropic");
        assert_eq!(choice.model, "env-model");
        assert_eq!(choice.source, ModelSource::Env);
    }

    #[test]
    fn defaults_are_the_last_resort() {
        let selector = ModelSelector::new(None, None).with_default("anthropic", "default-model");
        let choice = selector.resolve(None, None).unwrap();
        assert_eq!(choice.source, ModelSource::Default);
    }

    #[test]
    fn request_model_uses_env_provider() {
        let selector = ModelSelector::new(Some("anthropic".to_string()), None);
        let choice = selector.resolve(None, Some("requested-model")).unwrap();
        assert_eq!(choice.provider, "anthropic");
        assert_eq!(choice.source, ModelSource::Request);
    }

    #[test]
    fn nothing_configured_is_an_error() {
        let selector = ModelSelector::new(None, None);
        assert_eq!(
            selector.resolve(None, None).unwrap_err(),
            SelectorError::NoModelConfigured
        );
    }

    #[test]
    fn model_without_any_provider_is_an_error() {
        let selector = ModelSelector::new(None, None);
        let err = selector.resolve(None, Some("m")).unwrap_err();
        assert!(matches!(err, SelectorError::NoProviderConfigured { .. }));
    }
}
