//! A trivial agent that echoes the prompt back (for development and
//! smoke tests).

use crate::core::{AgentCore, AgentRequest, AgentRunResult};
use crate::error::AgentError;
use crate::event::AgentEvent;
use crate::selector::ModelSelector;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// An [`AgentCore`] that performs no code modification: it resolves the
/// model like a real agent would, streams the prompt back as a single
/// token, and succeeds with the prompt as output.
pub struct EchoAgent {
    selector: ModelSelector,
}

impl EchoAgent {
    /// Creates an echo agent resolving models through the given selector.
    #[must_use]
    pub fn new(selector: ModelSelector) -> Self {
        Self { selector }
    }
}

#[async_trait]
impl AgentCore for EchoAgent {
    async fn run(
        &self,
        request: AgentRequest,
        _cancel: CancellationToken,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<AgentRunResult, AgentError> {
        let choice = self
            .selector
            .resolve(request.provider.as_deref(), request.model.as_deref())
            .map_err(|e| AgentError::Failed {
                message: e.to_string(),
            })?;

        let _ = events.send(AgentEvent::token(&request.prompt));

        Ok(AgentRunResult {
            output: request.prompt,
            provider: choice.provider,
            model: choice.model,
            model_source: choice.source,
            usage: None,
            duration_ms: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runforge_core::RunId;

    #[tokio::test]
    async fn echo_returns_the_prompt() {
        let agent = EchoAgent::new(ModelSelector::new(None, None).with_default("anthropic", "dev"));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = agent
            .run(
                AgentRequest {
                    run_id: RunId::new(),
                    prompt: "say hi".to_string(),
                    input: None,
                    provider: None,
                    model: None,
                    workspace_backend: "host".to_string(),
                },
                CancellationToken::new(),
                tx,
            )
            .await
            .unwrap();

        assert_eq!(result.output, "say hi");
        assert_eq!(result.provider, "anthropic");
        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload["text"], "say hi");
    }

    #[tokio::test]
    async fn echo_fails_without_a_model() {
        let agent = EchoAgent::new(ModelSelector::new(None, None));
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = agent
            .run(
                AgentRequest {
                    run_id: RunId::new(),
                    prompt: "hi".to_string(),
                    input: None,
                    provider: None,
                    model: None,
                    workspace_backend: "host".to_string(),
                },
                CancellationToken::new(),
                tx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Failed { .. }));
    }
}
